//! route-gateway
//!
//! A reverse proxy that picks an upstream per request by evaluating route
//! predicates (host, path, method, header, query) in order.
//!
//! ```text
//!   Client ──▶ server ──▶ router ──▶ filter chain ──▶ forward ──▶ Upstream
//!                            │            ▲                 │
//!                            ▼            └── response ◀────┘
//!                       route table
//!                  (ArcSwap snapshot)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use route_gateway::config::loader::load_config;
use route_gateway::config::GatewayConfig;
use route_gateway::lifecycle::{shutdown_signal, Shutdown};
use route_gateway::observability::{logging, metrics};
use route_gateway::{GatewayServer, RouteTable};

#[derive(Parser)]
#[command(name = "route-gateway")]
#[command(about = "Predicate-routed HTTP gateway", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Load the configuration, print the route table and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("route-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.check {
        let table = RouteTable::from_gateway_config(&config);
        for route in table.routes() {
            println!("{:>6}  {:<24} {}", route.order(), route.id(), route.target());
        }
        println!("{} route(s)", table.len());
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len() + config.shorthand_routes.len(),
        connect_ms = config.timeouts.connect_ms,
        upstream_ms = config.timeouts.upstream_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    GatewayServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
