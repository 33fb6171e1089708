//! api-gatekeeper
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 GATEKEEPER                   │
//!     Client Request     │  ┌─────────┐  ┌──────────┐  ┌────────────┐   │
//!     ───────────────────┼─▶│ metrics │─▶│ recovery │─▶│ rate limit │   │
//!                        │  └─────────┘  └──────────┘  └─────┬──────┘   │
//!                        │                                   ▼          │
//!                        │  ┌─────────┐  ┌──────────┐  ┌────────────┐   │
//!     Client Response    │  │ handler │◀─│  access  │◀─│ authenti-  │   │
//!     ◀──────────────────┼──│         │  │   gate   │  │  cation    │   │
//!                        │  └─────────┘  └──────────┘  └────────────┘   │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gatekeeper::auth::InMemoryStore;
use api_gatekeeper::config::{read_config, validate_config, Environment, GatewayConfig};
use api_gatekeeper::lifecycle::{spawn_signal_listener, Shutdown};
use api_gatekeeper::observability::{init_logging, metrics};
use api_gatekeeper::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "api-gatekeeper", version, about = "Rate limiting and bearer authentication in front of an HTTP API")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// API server port.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, value_enum)]
    env: Option<Environment>,

    /// Rate limiter maximum requests per second.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter maximum burst.
    #[arg(long)]
    limiter_burst: Option<u32>,

    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Trusted CORS origins (space separated).
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    cors_trusted_origins: Option<Vec<String>>,
}

impl Cli {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{port}"),
            };
        }
        if let Some(env) = self.env {
            config.environment = env;
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(origins) = self.cors_trusted_origins {
            // Repeated spaces split into empty entries.
            config.cors.trusted_origins = origins.into_iter().filter(|o| !o.is_empty()).collect();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);

    init_logging(&config.observability);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        environment = config.environment.as_str(),
        requests_per_second = config.rate_limit.requests_per_second,
        burst = config.rate_limit.burst,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // validate_config already checked the address
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let store = Arc::new(InMemoryStore::from_fixtures(&config.fixtures));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config, store.clone(), store);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
