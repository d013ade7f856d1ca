use serde::{Deserialize, Serialize};
use std::time::Duration;

use fingerkey_core::constants::{
    DEFAULT_ARGUMENT_WAIT_MS, DEFAULT_CAPTURE_POLL_INTERVAL_MS, DEFAULT_REMOVAL_SETTLE_MS,
};

/// Timing and behaviour of the controller.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fingerkey_controller::ControllerConfig;
///
/// let config = ControllerConfig::default()
///     .capture_poll_limit(Some(120))
///     .progress_messages(false);
///
/// assert_eq!(config.poll_interval, Duration::from_millis(500));
/// assert_eq!(config.capture_poll_limit, Some(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Delay between capture polls.
    #[serde(with = "millis")]
    pub poll_interval: Duration,

    /// Delay after the first image before polling for finger removal.
    #[serde(with = "millis")]
    pub removal_settle: Duration,

    /// How long to wait for the argument of `E`/`D`.
    #[serde(with = "millis")]
    pub argument_wait: Duration,

    /// Maximum polls per finger wait. `None` waits forever.
    pub capture_poll_limit: Option<u32>,

    /// Print human-readable progress lines between responses.
    pub progress_messages: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_CAPTURE_POLL_INTERVAL_MS),
            removal_settle: Duration::from_millis(DEFAULT_REMOVAL_SETTLE_MS),
            argument_wait: Duration::from_millis(DEFAULT_ARGUMENT_WAIT_MS),
            capture_poll_limit: None,
            progress_messages: true,
        }
    }
}

impl ControllerConfig {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn removal_settle(mut self, settle: Duration) -> Self {
        self.removal_settle = settle;
        self
    }

    pub fn argument_wait(mut self, wait: Duration) -> Self {
        self.argument_wait = wait;
        self
    }

    pub fn capture_poll_limit(mut self, limit: Option<u32>) -> Self {
        self.capture_poll_limit = limit;
        self
    }

    pub fn progress_messages(mut self, enabled: bool) -> Self {
        self.progress_messages = enabled;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.removal_settle, Duration::from_millis(2000));
        assert_eq!(config.argument_wait, Duration::from_millis(100));
        assert_eq!(config.capture_poll_limit, None);
        assert!(config.progress_messages);
    }

    #[test]
    fn test_partial_json() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"poll_interval": 50, "capture_poll_limit": 3}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.capture_poll_limit, Some(3));
        assert_eq!(config.removal_settle, Duration::from_millis(2000));
    }
}
