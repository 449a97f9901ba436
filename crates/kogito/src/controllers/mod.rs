pub mod comparators;
pub mod context;
pub mod deployer;
pub mod infra_controller;
pub mod service_controller;

mod config;
mod deployment;
mod image;
mod infra;
mod messaging;
mod monitoring;
mod network;
mod protobuf;
mod truststore;

pub use context::{Context, Diagnostics, State};
