//! TOML configuration for the `fingerkey` binary.
//!
//! Every section is optional; missing keys take the library defaults.
//!
//! ```toml
//! [sensor]
//! backend = "serial"
//!
//! [sensor.serial]
//! path = "/dev/ttyUSB0"
//! baud_rate = 57600
//!
//! [controller]
//! poll_interval = 500
//! capture_poll_limit = 120
//!
//! [server]
//! bind_addr = "0.0.0.0:7300"
//!
//! [client]
//! server_addr = "192.168.1.20:7300"
//! enroll_timeout = 90000
//!
//! [database]
//! database_path = "/var/lib/fingerkey/registry.db"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use fingerkey_controller::ControllerConfig;
use fingerkey_hardware::SerialConfig;
use fingerkey_network::{CommandServerConfig, HostClientConfig};
use fingerkey_storage::DatabaseConfig;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fingerkey.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which sensor `serve` drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    #[default]
    Serial,
    Mock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub backend: SensorBackend,
    pub serial: SerialConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: SocketAddr,

    /// Stop after this many host sessions.
    pub max_sessions: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = CommandServerConfig::default();
        Self {
            bind_addr: defaults.bind_addr,
            max_sessions: defaults.max_sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub server_addr: SocketAddr,

    #[serde(with = "millis")]
    pub connect_timeout: Duration,

    #[serde(with = "millis")]
    pub response_timeout: Duration,

    #[serde(with = "millis")]
    pub enroll_timeout: Duration,
}

impl Default for ClientSection {
    fn default() -> Self {
        let defaults = HostClientConfig::default();
        Self {
            server_addr: defaults.server_addr,
            connect_timeout: defaults.connect_timeout,
            response_timeout: defaults.response_timeout,
            enroll_timeout: defaults.enroll_timeout,
        }
    }
}

/// Whole-application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorSection,
    pub controller: ControllerConfig,
    pub server: ServerSection,
    pub client: ClientSection,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load `path`, or `fingerkey.toml` if present, or the defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn server_config(&self) -> CommandServerConfig {
        CommandServerConfig::default()
            .bind_addr(self.server.bind_addr)
            .max_sessions(self.server.max_sessions)
    }

    pub fn client_config(&self) -> HostClientConfig {
        HostClientConfig::default()
            .server_addr(self.client.server_addr)
            .connect_timeout(self.client.connect_timeout)
            .response_timeout(self.client.response_timeout)
            .enroll_timeout(self.client.enroll_timeout)
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
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sensor.backend, SensorBackend::Serial);
        assert_eq!(config.client.server_addr, config.server.bind_addr);
    }

    #[test]
    fn test_parse_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [sensor]
            backend = "mock"

            [sensor.serial]
            path = "/dev/ttyAMA0"
            baud_rate = 115200

            [controller]
            poll_interval = 50
            capture_poll_limit = 20
            progress_messages = false

            [server]
            bind_addr = "0.0.0.0:9000"
            max_sessions = 3

            [client]
            server_addr = "10.0.0.5:9000"
            enroll_timeout = 90000

            [database]
            database_path = "/tmp/registry.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.backend, SensorBackend::Mock);
        assert_eq!(config.sensor.serial.path, "/dev/ttyAMA0");
        assert_eq!(config.sensor.serial.baud_rate, 115200);
        assert_eq!(config.controller.poll_interval, Duration::from_millis(50));
        assert_eq!(config.controller.capture_poll_limit, Some(20));
        assert!(!config.controller.progress_messages);
        assert_eq!(config.database.database_path, "/tmp/registry.db");

        let server = config.server_config();
        assert_eq!(server.bind_addr.port(), 9000);
        assert_eq!(server.max_sessions, Some(3));

        let client = config.client_config();
        assert_eq!(client.server_addr, "10.0.0.5:9000".parse().unwrap());
        assert_eq!(client.enroll_timeout, Duration::from_secs(90));
        assert_eq!(client.response_timeout, HostClientConfig::default().response_timeout);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_addr = \"127.0.0.1:7400\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.bind_addr.port(), 7400);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_invalid_backend() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sensor]\nbackend = \"usb\"").unwrap();

        let result = AppConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
