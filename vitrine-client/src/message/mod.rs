// vitrine-client/src/message/mod.rs
// 同步通道 - 连接配置、退避策略和传输层

pub mod backoff;
pub mod transport;

pub use backoff::Backoff;
pub use transport::{Connection, Connector, MemoryConnector, MemoryPeer, Outbound, WsConnector};

use std::fmt;
use std::time::Duration;

/// 同步通道配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 首次重连延迟
    pub reconnect_delay: Duration,
    /// 最大重连延迟 (指数退避上限)
    pub max_reconnect_delay: Duration,
    /// Relative jitter applied to each delay (0.2 = ±20 %)
    pub reconnect_jitter: f64,
    /// Consecutive failures before the status turns `Offline` (0 = never)
    pub max_reconnect_attempts: u32,
    /// WebSocket ping 间隔 (0 表示禁用)
    pub heartbeat_interval: Duration,
    /// Presence announcement interval
    pub presence_interval: Duration,
    /// Roster sweep interval
    pub sweep_interval: Duration,
    /// Silence after which a roster entry turns OFFLINE
    pub offline_after: Duration,
    /// Window after a remote apply during which local commits are held back
    pub echo_window: Duration,
    /// Depth of the handle → worker queue
    pub outbound_capacity: usize,
}

impl Default for SyncConfig {
    /// 局域网配置
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(30),
            reconnect_jitter: 0.2,
            max_reconnect_attempts: 0,
            heartbeat_interval: Duration::from_secs(15),
            presence_interval: Duration::from_secs(20),
            sweep_interval: Duration::from_secs(20),
            offline_after: Duration::from_secs(40),
            echo_window: Duration::from_millis(100),
            outbound_capacity: 64,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 局域网配置 (默认)
    pub fn lan() -> Self {
        Self::default()
    }

    /// 广域网/互联网配置
    ///
    /// Slower first retry and sparser pings; presence timing is unchanged so
    /// mixed rooms agree on when a device is offline.
    pub fn wan() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// 设置最大重连尝试次数 (0 表示无限重试)
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// 设置心跳间隔 (0 表示禁用)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_presence(mut self, interval: Duration, offline_after: Duration) -> Self {
        self.presence_interval = interval;
        self.sweep_interval = interval;
        self.offline_after = offline_after;
        self
    }

    pub fn with_echo_window(mut self, window: Duration) -> Self {
        self.echo_window = window;
        self
    }
}

/// Observable relay connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// First connection attempt in progress
    Connecting,
    /// Joined and exchanging frames
    Online,
    /// Disconnected; retrying after `retry_in`
    Degraded { attempt: u32, retry_in: Duration },
    /// Retry limit exceeded; still retrying at the backoff cap
    Offline { attempt: u32 },
}

impl ConnectionStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Online => write!(f, "online"),
            Self::Degraded { attempt, retry_in } => {
                write!(f, "degraded (attempt {attempt}, retry in {}ms)", retry_in.as_millis())
            }
            Self::Offline { attempt } => write!(f, "offline (attempt {attempt})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 0);
        assert_eq!(config.presence_interval, Duration::from_secs(20));
        assert_eq!(config.offline_after, Duration::from_secs(40));
        assert_eq!(config.echo_window, Duration::from_millis(100));
    }

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::wan()
            .with_max_reconnect_attempts(5)
            .with_jitter(3.0)
            .with_heartbeat_interval(Duration::ZERO);

        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_jitter, 1.0);
        assert!(config.heartbeat_interval.is_zero());
    }

    #[test]
    fn test_status_display() {
        let status = ConnectionStatus::Degraded {
            attempt: 2,
            retry_in: Duration::from_millis(1000),
        };
        assert_eq!(status.to_string(), "degraded (attempt 2, retry in 1000ms)");
        assert!(!status.is_online());
        assert!(ConnectionStatus::Online.is_online());
    }
}
