//! # Message Relay
//!
//! Reads signed messages from stdin, one JSON object per line, and
//! announces them to the configured consensus nodes and the gossip topic.
//!
//! See [`relay_runtime::config`] for the `RELAY_*` environment variables.
//! Log filtering follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use relay_runtime::{run_feed, RelayConfig, RelayRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RelayConfig::from_env().context("Invalid relay configuration")?;
    let runtime = RelayRuntime::new(config);
    let pipeline = runtime
        .start()
        .await
        .context("Failed to assemble publisher pipeline")?;
    let publisher = pipeline.publisher();
    let store = runtime.store();

    info!("Relay is running. Reading messages from stdin, Ctrl+C to stop.");
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = run_feed(stdin, &store, publisher.as_ref()) => {
            let stats = result.context("Failed to read stdin")?;
            info!(
                published = stats.published,
                malformed = stats.malformed,
                failed = stats.failed,
                "Input exhausted"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Interrupt received");
        }
    }

    pipeline.shutdown();
    info!(
        annotated = store.annotation_writes(),
        live_nodes = pipeline.dispatcher().live_nodes().len(),
        "Shutdown complete"
    );
    Ok(())
}
