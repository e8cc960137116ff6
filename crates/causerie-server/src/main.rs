mod api;
mod chat;
mod config;
mod connection;
mod error;
mod listener;
mod presence;
mod rate_limit;
mod services;
mod session;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use causerie_store::{Database, SessionStateStore};
use causerie_wire::cookie::CookieBaker;

use crate::chat::ChatRegistry;
use crate::config::ServerConfig;
use crate::presence::PresenceNotifier;
use crate::rate_limit::{IpRateLimiter, RateClassTable};
use crate::services::Services;
use crate::session::{DisconnectReason, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,causerie_server=debug")),
        )
        .init();

    info!("Starting causerie OSCAR server v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(ServerConfig::from_env());
    info!(?config, "Loaded configuration");
    if config.disable_auth {
        tracing::warn!("disable-auth is ON: unknown screen names will be auto-provisioned");
    }

    let db = Arc::new(Database::open_at(&config.db_path)?);
    // Drop "online" markers a previous crash may have left behind.
    db.clear_buddy_list_registry()?;

    let sessions = Arc::new(SessionRegistry::new());
    let presence = Arc::new(PresenceNotifier::new(sessions.clone(), db.clone()));
    let services = Arc::new(Services {
        config: config.clone(),
        sessions: sessions.clone(),
        rooms: Arc::new(ChatRegistry::new()),
        presence,
        users: db.clone(),
        feedbags: db.clone(),
        profiles: db.clone(),
        directory: db.clone(),
        bart: db.clone(),
        offline: db.clone(),
        session_state: db.clone(),
        cookie_baker: Arc::new(CookieBaker::ephemeral()),
        rate_classes: Arc::new(RateClassTable::default()),
    });

    let ip_limiter = IpRateLimiter::default();

    // Connection-limiter cleanup every 5 min, evict buckets idle >10 min.
    let purge_limiter = ip_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            purge_limiter.purge_stale(600.0).await;
        }
    });

    let api_state = api::AppState {
        users: db.clone(),
        sessions: sessions.clone(),
    };
    let http_bind = config.http_bind;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, http_bind).await {
            tracing::error!(error = %e, "management API failed");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::select! {
        result = listener::run(services.clone(), ip_limiter, shutdown_rx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "OSCAR listener failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    // Bounded drain: give writer tasks a moment to flush sign-offs.
    for session in sessions.all() {
        session.disconnect(DisconnectReason::ServerShutdown);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    Ok(())
}
