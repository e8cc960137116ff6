//! The OSCAR TCP listener: accepts connections, applies the per-IP rate
//! limit, and hands each socket to the dispatcher.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::connection;
use crate::error::{Result, ServerError};
use crate::rate_limit::IpRateLimiter;
use crate::services::Services;

pub async fn run(
    services: Arc<Services>,
    ip_limiter: IpRateLimiter,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(services.config.oscar_bind).await?;
    info!(
        bind = %services.config.oscar_bind,
        advertised = %services.config.advertised_address,
        "OSCAR listener running"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                if !ip_limiter.check(addr.ip()).await {
                    drop(stream);
                    continue;
                }
                let services = services.clone();
                tokio::spawn(async move {
                    match connection::handle_connection(stream, addr, services).await {
                        Ok(()) => {}
                        Err(ServerError::Io(e)) => {
                            // Dropped sockets are routine; not worth a warn.
                            tracing::debug!(addr = %addr, error = %e, "connection io error");
                        }
                        Err(e) => {
                            warn!(addr = %addr, error = %e, "connection terminated");
                        }
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("OSCAR listener shutting down");
                return Ok(());
            }
        }
    }
}
