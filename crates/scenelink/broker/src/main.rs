//! scenelinkd - relay between a control process and connected viewers

use clap::Parser;
use scenelink_broker::{BrokerConfig, BrokerResult, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scenelink broker CLI
#[derive(Parser)]
#[command(name = "scenelinkd")]
#[command(about = "Scenelink broker - relays viewer commands over SSE and WebSocket", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SCENELINK_CONFIG")]
    config: Option<String>,

    /// Bind host
    #[arg(long, env = "SCENELINK_HOST")]
    host: Option<String>,

    /// TCP port
    #[arg(short, long, env = "SCENELINK_PORT")]
    port: Option<u16>,

    /// Broadcast-and-collect deadline in milliseconds
    #[arg(long, env = "SCENELINK_COLLECT_TIMEOUT_MS")]
    collect_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, env = "SCENELINK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SCENELINK_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> BrokerResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = BrokerConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(timeout) = cli.collect_timeout_ms {
        config.relay.collect_timeout_ms = timeout;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
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

    println!(
        r#"
  Scenelink broker
  Version: {}
  Listening: http://{}
  Collect deadline: {}ms
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr(),
        config.relay.collect_timeout_ms
    );

    Server::new(config).run().await
}
