//! hlinkd — the device-side hlink daemon.
//!
//! Loads configuration, seeds the in-memory catalog, and runs the
//! dispatcher until the operator stops it or a launch hand-off ends the
//! serve loop.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;

use hlink::catalog::{MemoryCatalog, PolicyHooks, TitleCatalog, TitleMeta, UiHooks};
use hlink::config::{load_config, HlinkConfig};
use hlink::net::{Dispatcher, ServerState};
use hlink::observability::init_logging;

#[derive(Parser)]
#[command(name = "hlinkd")]
#[command(about = "LAN remote-control daemon for the content client", long_about = None)]
struct Cli {
    /// Path to the TOML config. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HlinkConfig::default(),
    };
    init_logging(&config.observability.log_filter);

    tracing::info!("hlinkd v0.1.0 starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        transaction_port = config.transaction.port,
        http_port = config.http.port,
        root_dir = %config.http.root_dir.display(),
        titles = config.titles.len(),
        "Configuration loaded"
    );

    let catalog = Arc::new(MemoryCatalog::new());
    for title in &config.titles {
        catalog.insert(
            TitleMeta { id: title.id, name: title.name.clone() },
            title.location(),
        );
    }

    let hooks = Arc::new(PolicyHooks::new(config.trust.auto_accept));
    let serving = hooks.serving_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            serving.store(false, Ordering::SeqCst);
        }
    });

    let state = Arc::new(ServerState::new(
        Arc::new(config),
        Arc::clone(&catalog) as Arc<dyn TitleCatalog>,
        Arc::clone(&hooks) as Arc<dyn UiHooks>,
    ));

    let dispatcher = Dispatcher::bind(state).await?;
    match dispatcher.run().await {
        Some(target) => {
            // The serve loop is gone; hand the process to the title.
            catalog.launch(&target)?;
        }
        None => tracing::info!("Shutdown complete"),
    }
    Ok(())
}
