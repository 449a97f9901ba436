//! Typed views of third party CRDs this operator writes.
//!
//! Only the fields the operator reads or sets are modelled; unknown fields
//! returned by the API server are dropped on deserialization.

pub mod image_stream;
pub mod kafka_topic;
pub mod route;
pub mod service_monitor;

pub use image_stream::ImageStream;
pub use kafka_topic::KafkaTopic;
pub use route::Route;
pub use service_monitor::ServiceMonitor;
