use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the OSCAR listener binds to.
    pub oscar_bind: SocketAddr,
    /// host:port clients are told to reconnect to; distinct from the bind
    /// address when running behind NAT.
    pub advertised_address: String,
    /// Address of the management HTTP API.
    pub http_bind: SocketAddr,
    pub db_path: PathBuf,
    /// Lab mode: unknown screen names are auto-provisioned with password
    /// "welcome1". Never the default.
    pub disable_auth: bool,
    pub cookie_ttl_secs: u32,
    pub auth_timeout: Duration,
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            oscar_bind: ([0, 0, 0, 0], 5190).into(),
            advertised_address: "127.0.0.1:5190".to_string(),
            http_bind: ([0, 0, 0, 0], 8080).into(),
            db_path: PathBuf::from("./causerie.db"),
            disable_auth: false,
            cookie_ttl_secs: 300,
            auth_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("OSCAR_BIND") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.oscar_bind = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid OSCAR_BIND, using default");
            }
        }

        if let Ok(addr) = std::env::var("OSCAR_ADVERTISED_ADDRESS") {
            config.advertised_address = addr;
        }

        if let Ok(addr) = std::env::var("HTTP_BIND") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_bind = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_BIND, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("DISABLE_AUTH") {
            config.disable_auth = val == "true" || val == "1";
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.oscar_bind.port(), 5190);
        assert!(!config.disable_auth);
        assert_eq!(config.auth_timeout, Duration::from_secs(30));
    }
}
