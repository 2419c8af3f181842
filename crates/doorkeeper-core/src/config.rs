//! Runtime configuration for the controller.
//!
//! Every section is `#[serde(default)]`, so a configuration file only needs
//! the keys it wants to override:
//!
//! ```
//! use doorkeeper_core::ControllerConfig;
//!
//! let config = ControllerConfig::from_json_str(r#"{
//!     "admin_uid": "04A1B2C3",
//!     "network": { "peer_url": "http://10.0.0.7:8080" }
//! }"#).unwrap();
//!
//! assert_eq!(config.admin_uid, "04A1B2C3");
//! assert_eq!(config.network.notify_path, "/notify");
//! assert_eq!(config.timing.alarm_duration().as_secs(), 15);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::{Credential, Error, Result};

/// Top-level controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Hex UID of the admin tag.
    pub admin_uid: String,

    /// Password written on first run.
    pub default_password: String,

    /// Capacity of the allowed-credential set.
    pub max_cards: usize,

    /// Maximum characters in any keypad buffer.
    pub max_input_length: usize,

    /// Wrong passwords in a row that trip the alarm.
    pub max_failed_attempts: u32,

    pub timing: TimingConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            admin_uid: DEFAULT_ADMIN_UID.iter().map(|b| format!("{b:02X}")).collect(),
            default_password: DEFAULT_PASSWORD.to_string(),
            max_cards: MAX_CARDS,
            max_input_length: MAX_INPUT_LENGTH,
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            timing: TimingConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// Returns `Error::Json` for malformed JSON and `Error::Config` when a
    /// value fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// The admin tag as a credential.
    ///
    /// # Errors
    /// Returns `Error::Config` if `admin_uid` is not a valid UID.
    pub fn admin_credential(&self) -> Result<Credential> {
        Credential::new(&self.admin_uid)
            .map_err(|e| Error::Config(format!("admin_uid: {e}")))
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first offending value.
    pub fn validate(&self) -> Result<()> {
        self.admin_credential()?;

        if self.max_input_length == 0 {
            return Err(Error::Config("max_input_length must be positive".into()));
        }
        if self.default_password.is_empty()
            || self.default_password.len() > self.max_input_length
        {
            return Err(Error::Config(format!(
                "default_password must be 1-{} characters",
                self.max_input_length
            )));
        }
        if self.max_cards == 0 {
            return Err(Error::Config("max_cards must be positive".into()));
        }
        if self.max_failed_attempts == 0 {
            return Err(Error::Config("max_failed_attempts must be positive".into()));
        }

        self.timing.validate()?;
        self.network.validate()?;
        self.storage.validate()
    }
}

/// Timing knobs, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub alarm_duration_ms: u64,
    pub alarm_toggle_period_ms: u64,
    pub admin_timeout_ms: u64,
    pub door_pulse_ms: u64,
    pub door_open_dwell_ms: u64,
    pub poll_interval_ms: u64,
    pub service_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            alarm_duration_ms: ALARM_DURATION_MS,
            alarm_toggle_period_ms: ALARM_TOGGLE_PERIOD_MS,
            admin_timeout_ms: ADMIN_TIMEOUT_MS,
            door_pulse_ms: DOOR_PULSE_MS,
            door_open_dwell_ms: DOOR_OPEN_DWELL_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            service_interval_ms: SERVICE_INTERVAL_MS,
        }
    }
}

impl TimingConfig {
    pub fn alarm_duration(&self) -> Duration {
        Duration::from_millis(self.alarm_duration_ms)
    }

    pub fn alarm_toggle_period(&self) -> Duration {
        Duration::from_millis(self.alarm_toggle_period_ms)
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_timeout_ms)
    }

    pub fn door_pulse(&self) -> Duration {
        Duration::from_millis(self.door_pulse_ms)
    }

    pub fn door_open_dwell(&self) -> Duration {
        Duration::from_millis(self.door_open_dwell_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn service_interval(&self) -> Duration {
        Duration::from_millis(self.service_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        let must_be_positive = [
            ("alarm_duration_ms", self.alarm_duration_ms),
            ("alarm_toggle_period_ms", self.alarm_toggle_period_ms),
            ("admin_timeout_ms", self.admin_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("service_interval_ms", self.service_interval_ms),
        ];
        for (name, value) in must_be_positive {
            if value == 0 {
                return Err(Error::Config(format!("timing.{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Observer peer and link maintenance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL of the observer, e.g. `http://192.168.1.20`.
    pub peer_url: String,

    /// Path of the notification endpoint.
    pub notify_path: String,

    /// `host:port` probed to decide whether the link is up.
    pub link_probe_addr: String,

    pub connect_wait_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub link_poll_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peer_url: DEFAULT_PEER_URL.to_string(),
            notify_path: NOTIFY_PATH.to_string(),
            link_probe_addr: "192.168.212.57:80".to_string(),
            connect_wait_ms: LINK_CONNECT_WAIT_MS,
            connect_timeout_ms: NOTIFY_CONNECT_TIMEOUT_MS,
            request_timeout_ms: NOTIFY_REQUEST_TIMEOUT_MS,
            reconnect_interval_ms: RECONNECT_INTERVAL_MS,
            link_poll_ms: LINK_POLL_INTERVAL_MS,
        }
    }
}

impl NetworkConfig {
    /// Full URL of the notification endpoint, without query.
    pub fn notify_url(&self) -> String {
        format!(
            "{}/{}",
            self.peer_url.trim_end_matches('/'),
            self.notify_path.trim_start_matches('/')
        )
    }

    pub fn connect_wait(&self) -> Duration {
        Duration::from_millis(self.connect_wait_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn link_poll(&self) -> Duration {
        Duration::from_millis(self.link_poll_ms)
    }

    fn validate(&self) -> Result<()> {
        if !self.peer_url.starts_with("http://") {
            return Err(Error::Config(format!(
                "network.peer_url must be a plain http:// URL, got '{}'",
                self.peer_url
            )));
        }
        if self.link_probe_addr.is_empty() {
            return Err(Error::MissingConfig("network.link_probe_addr".into()));
        }
        if self.link_poll_ms == 0 || self.reconnect_interval_ms == 0 {
            return Err(Error::Config(
                "network.link_poll_ms and network.reconnect_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            namespace: STORE_NAMESPACE.to_string(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.database_path.is_empty() {
            return Err(Error::MissingConfig("storage.database_path".into()));
        }
        if self.namespace.is_empty() {
            return Err(Error::MissingConfig("storage.namespace".into()));
        }
        Ok(())
    }
}
