pub mod errors;
pub mod hash;
pub mod labels;
pub mod metrics;
pub mod service_status;
pub mod status;
pub mod telemetry;
