//! Relay configuration

/// Default per-room broadcast capacity
pub const DEFAULT_ROOM_CHANNEL_CAPACITY: usize = 64;

/// Relay configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub bind_addr: String,
    /// HTTP + WebSocket port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// tracing filter directive, e.g. `info` or `vitrine_relay=debug`
    pub log_level: String,
    /// Daily rolling log files go here when set
    pub log_dir: Option<String>,
    /// Per-room broadcast buffer; slow members beyond it get a resync
    pub room_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            http_port: 8080,
            environment: "development".into(),
            log_level: "info".into(),
            log_dir: None,
            room_channel_capacity: DEFAULT_ROOM_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            http_port: var("HTTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.http_port),
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: var("LOG_DIR").filter(|s| !s.is_empty()),
            room_channel_capacity: var("ROOM_CHANNEL_CAPACITY")
                .and_then(|c| c.parse().ok())
                .filter(|c| *c > 0)
                .unwrap_or(defaults.room_channel_capacity),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.http_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
