//! scenelink-viewer - headless viewer attached to a broker

use anyhow::Context;
use clap::Parser;
use scenelink_client::ViewerLink;
use scenelink_protocol::{InMemoryViewer, StructureFormat, ViewerSession};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scenelink viewer CLI
#[derive(Parser)]
#[command(name = "scenelink-viewer")]
#[command(about = "Headless scenelink viewer - executes broker requests in memory", long_about = None)]
#[command(version)]
struct Cli {
    /// Broker endpoint
    #[arg(short, long, env = "SCENELINK_BROKER", default_value = "http://127.0.0.1:3000")]
    broker: String,

    /// Also execute fire-and-forget actions from the publish leg
    #[arg(long)]
    follow_events: bool,

    /// PDB file to load before linking
    #[arg(long)]
    load: Option<PathBuf>,

    /// Reference id for the preloaded structure
    #[arg(long, default_value = "model")]
    ref_id: String,

    /// Log level
    #[arg(long, env = "SCENELINK_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "SCENELINK_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut session = ViewerSession::new(InMemoryViewer::new());

    if let Some(path) = &cli.load {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        session
            .load_structure(&text, StructureFormat::Pdb, &label, &cli.ref_id)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
    }

    let link = ViewerLink::new(&cli.broker, session)?.follow_events(cli.follow_events);
    let session = link
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!(
        "Viewer stopped with {} registered references",
        session.registry().references().len()
    );
    Ok(())
}
