use anyhow::Context as _;
use authorino_operator::controllers::authorino_controller::{self, State};
use authorino_operator::util::telemetry;
use clap::Parser;
use kube::Client;
use tracing::info;

mod args;
mod handlers;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = args::Args::parse();
    telemetry::init(args.log_json);

    let config = args.operator_config();
    match &config.watch_namespace {
        Some(ns) => info!("Watching Authorino instances in namespace {}", ns),
        None => info!("Watching Authorino instances in all namespaces"),
    }

    // Initiatilize Kubernetes controller state
    let state = State::new(config);
    let client = Client::try_default()
        .await
        .context("failed to create kube Client")?;
    let controller = authorino_controller::run(state.clone(), client);
    let server = server::start_server(state, args.bind_addr);

    // Both runtimes implements graceful shutdown, so poll until both are done
    let (controller, server) = tokio::join!(controller, server);
    controller?;
    server
}
