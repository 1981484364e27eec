//! blobstage - Azure blob staging pipeline task
//!
//! Entry point: parses the command line, runs the selected action and
//! reports the outcome to the pipeline agent.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blobstage::cli::Cli;
use blobstage::pipeline::{AgentCommandWriter, TaskHost, TaskResult};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Dev mode logs at debug level like --debug
    let node_env = std::env::var("NODE_ENV").ok();
    let is_dev = cli
        .source_kind(node_env.as_deref())
        .map(|kind| kind.is_dev())
        .unwrap_or(false);
    init_logging(cli.debug || is_dev);

    info!("Starting blobstage {}", env!("CARGO_PKG_VERSION"));
    let host = AgentCommandWriter::stdout();

    match cli.execute(&host).await {
        Ok(()) => {
            if let Err(e) = host.set_result(TaskResult::Succeeded, "Task completed") {
                error!("Failed to report task result: {}", e);
            }
        }
        Err(e) => {
            error!("Error: {}", e);
            if let Err(report_err) = host.set_result(TaskResult::Failed, &e.to_string()) {
                eprintln!("Failed to report task result: {}", report_err);
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "blobstage=debug" } else { "blobstage=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
