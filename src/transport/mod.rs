//! Transport layer.
//!
//! Two ways to reach the dispatcher:
//! - Stdio: line-delimited JSON-RPC for a single CLI or editor peer
//! - HTTP: REST endpoints plus a Server-Sent Events stream for web clients

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use std::future::Future;

use tokio::signal;
use tracing::info;

use crate::error::DbaResult;

/// Trait for transport implementations.
///
/// A transport owns the process's serving loop: it accepts requests, feeds
/// them to the dispatcher, and drains database connections on the way out.
pub trait Transport: Send + Sync {
    /// Serve until the peer goes away or a shutdown signal arrives.
    fn run(&self) -> impl Future<Output = DbaResult<()>> + Send;

    /// Name of this transport for logging.
    fn name(&self) -> &'static str;
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
