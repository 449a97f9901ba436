use kogito::api::v1beta1::{KogitoRuntime, KogitoSupportingService};
use kogito::controllers::{infra_controller, service_controller, State};
use kogito::util::telemetry;
use kube::Client;
use tracing::*;

use clap::Parser;

mod config;
mod handlers;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    telemetry::init(config.log_format);

    let client = Client::try_default().await?;
    let namespace = config.watched_namespace();
    info!(
        "Starting kogito-operator, watching {}",
        namespace.as_deref().unwrap_or("all namespaces")
    );

    // One registry and diagnostics shared by every controller
    let state = State::default();
    let runtime_controller =
        service_controller::run::<KogitoRuntime>(state.clone(), client.clone(), namespace.clone());
    let supporting_controller =
        service_controller::run::<KogitoSupportingService>(state.clone(), client.clone(), namespace.clone());
    let infra_controller = infra_controller::run(state.clone(), client, namespace);

    // All runtimes implement graceful shutdown, so poll until all are done
    tokio::join!(
        runtime_controller,
        supporting_controller,
        infra_controller,
        server::start_server(state, config.bind_address)
    )
    .3?;
    Ok(())
}
