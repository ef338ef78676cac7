//! Module gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                       GATEWAY                         │
//!                              │                                                       │
//!     Client Request           │  ┌──────────┐   ┌─────────┐   ┌──────────────┐       │
//!     ─────────────────────────┼─▶│ security │──▶│  cache  │──▶│   routing    │       │
//!                              │  │   cors   │   │ (GET..) │   │   registry   │       │
//!                              │  └──────────┘   └─────────┘   └──────┬───────┘       │
//!                              │                                       │               │
//!                              │                                       ▼               │
//!                              │  ┌──────────┐   ┌─────────┐   ┌──────────────┐       │
//!     Client Response          │  │ response │◀──│dispatch │──▶│   upstream   │───────┼──── Upstream
//!     ◀────────────────────────┼──│ mapping  │   │ + params│   │    client    │       │     API
//!                              │  └──────────┘   └─────────┘   └──────────────┘       │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use module_gateway::config::{load_config, GatewayConfig};
use module_gateway::lifecycle;
use module_gateway::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "module-gateway", version, about = "Module-routing HTTP gateway")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind (all interfaces when unset)
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory holding module files
    #[arg(short, long, env = "GATEWAY_MODULES")]
    modules: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(host) = self.host.filter(|h| !h.is_empty()) {
            config.listener.host = Some(host);
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(modules) = self.modules {
            config.modules.directory = modules;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        modules = %config.modules.directory.display(),
        cache_enabled = config.cache.enabled,
        "module-gateway starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
