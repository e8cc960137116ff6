use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Wire error: {0}")]
    Wire(#[from] causerie_wire::WireError),

    #[error("Store error: {0}")]
    Store(#[from] causerie_store::StoreError),

    #[error("Cookie error: {0}")]
    Cookie(#[from] causerie_wire::cookie::CookieError),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Authentication handshake timed out")]
    AuthTimeout,

    #[error("Connection idle timeout")]
    IdleTimeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
