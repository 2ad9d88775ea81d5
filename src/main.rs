//! DBA MCP Server - Main entry point.
//!
//! MCP tools for running SQL and performance reports against Microsoft SQL
//! Server, served over stdio or HTTP.

use std::sync::Arc;

use dba_mcp_server::config::{Config, SERVER_NAME, SERVER_VERSION, TransportMode};
use dba_mcp_server::db::ConnectionManager;
use dba_mcp_server::tools::Dispatcher;
use dba_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Everything goes to stderr: on the stdio transport, stdout belongs to the
/// wire protocol.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    let manager = Arc::new(ConnectionManager::with_defaults());
    info!(
        server = SERVER_NAME,
        version = SERVER_VERSION,
        transport = %config.transport,
        drivers = ?manager.driver_names(),
        "Starting DBA MCP Server"
    );

    let dispatcher = Dispatcher::new(manager);

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(dispatcher);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(dispatcher, &config.http_host, config.http_port);
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
