use std::time::Duration;

use crate::{
    protocol::WireConfig,
    retry::{COMMAND_RETRY_POLICY, RetryPolicy, WATCH_RETRY_POLICY},
};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 7379;
pub const DEFAULT_DIAL_ATTEMPTS: u32 = 3;
pub const DEFAULT_WATCH_QUEUE_CAPACITY: usize = 64;

/// Everything a [`Client`](super::Client) needs to reach and talk to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Identity announced during the handshake. A random UUID is used when unset.
    pub id: Option<String>,
    /// Dial attempts made by [`Client::connect`](super::Client::connect) before giving up.
    pub dial_attempts: u32,
    pub wire: WireConfig,
    pub command_retry: RetryPolicy,
    pub watch_retry: RetryPolicy,
    /// Pushed responses buffered before the watch thread blocks.
    pub watch_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            id: None,
            dial_attempts: DEFAULT_DIAL_ATTEMPTS,
            wire: WireConfig::default(),
            command_retry: COMMAND_RETRY_POLICY,
            watch_retry: WATCH_RETRY_POLICY,
            watch_queue_capacity: DEFAULT_WATCH_QUEUE_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_dial_attempts(mut self, attempts: u32) -> Self {
        self.dial_attempts = attempts;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.wire.max_message_size = max_message_size;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.wire.dial_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wire.io_timeout = timeout;
        self
    }

    pub fn with_command_retry(mut self, policy: RetryPolicy) -> Self {
        self.command_retry = policy;
        self
    }

    pub fn with_watch_retry(mut self, policy: RetryPolicy) -> Self {
        self.watch_retry = policy;
        self
    }

    pub fn with_watch_queue_capacity(mut self, capacity: usize) -> Self {
        self.watch_queue_capacity = capacity;
        self
    }

    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.address(), ("localhost", 7379));
        assert_eq!(config.dial_attempts, 3);
        assert_eq!(config.command_retry, RetryPolicy::new(3, Duration::from_secs(5)));
        assert_eq!(config.watch_retry, RetryPolicy::new(5, Duration::from_secs(5)));
        assert_eq!(config.wire.max_message_size, 32 * 1024 * 1024);
        assert!(config.id.is_none());
    }

    #[test]
    fn builders_override_defaults() {
        let config = ClientConfig::new("db.internal", 9000)
            .with_id("worker-7")
            .with_max_message_size(1024)
            .with_watch_queue_capacity(1);

        assert_eq!(config.address(), ("db.internal", 9000));
        assert_eq!(config.id.as_deref(), Some("worker-7"));
        assert_eq!(config.wire.max_message_size, 1024);
        assert_eq!(config.watch_queue_capacity, 1);
    }
}
