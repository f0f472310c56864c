//! LG TV bridge entry point.
//!
//! ```text
//! lgtv-bridge                   Run in the foreground
//! lgtv-bridge --config <path>   Load a custom config TOML
//! lgtv-bridge --host <addr>     Override the TV address
//! lgtv-bridge --gen-config      Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lgtv_bridge::config::BridgeConfig;
use lgtv_bridge::service::BridgeService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lgtv-bridge", about = "LG TV serial-over-TCP bridge")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "lgtv-bridge.toml")]
    config: PathBuf,

    /// TV address, overriding the config file.
    #[arg(long)]
    host: Option<String>,

    /// TV port, overriding the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&BridgeConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let (mut config, source) = BridgeConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.tv.host = host;
    }
    if let Some(port) = cli.port {
        config.tv.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    source.log(&cli.config);

    info!("lgtv-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("TV: {}:{} (set {})", config.tv.host, config.tv.port, config.tv.set_id);
    info!("poll interval: {} ms", config.timing.poll_interval_ms);

    let service = BridgeService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; shutting down");
        stop.cancel();
    });

    service.run().await
}
