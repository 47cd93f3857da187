//! Controller configuration.
//!
//! Every option has a default matching the simulator's stock setup (both
//! processes on loopback, simulator on port 65000). A JSON file may override
//! any subset of fields; the binary then applies command-line flags on top.
//!
//! ```json
//! {
//!   "remote_port": 65000,
//!   "timeout_poll_count": 5000,
//!   "poll_sleep_interval_us": 1000,
//!   "proportional_gain": -0.001,
//!   "well": 1
//! }
//! ```

use std::fs;
use std::net::AddrParseError;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::bootstrap::Well;
use crate::law::DEFAULT_PROPORTIONAL_GAIN;
use crate::net::Endpoint;

/// Largest accepted empty-poll sleep. Anything longer makes the timeout
/// window meaningless at the default poll count.
const MAX_POLL_SLEEP: Duration = Duration::from_secs(1);

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid JSON for [`ControllerConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// An address option is not an IP literal.
    #[error("invalid {field}: {source}")]
    Address {
        field: &'static str,
        source: AddrParseError,
    },
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Runtime options for one controller process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// IP literal to bind the controller socket to.
    ///
    /// **Default**: `127.0.0.1`
    pub local_address: String,

    /// UDP port the simulator sends measurements to.
    ///
    /// **Default**: 65008
    pub local_port: u16,

    /// IP literal of the simulator.
    ///
    /// **Default**: `127.0.0.1`
    pub remote_address: String,

    /// UDP port the simulator listens for commands on.
    ///
    /// **Default**: 65000
    pub remote_port: u16,

    /// Consecutive empty polls before the session resets.
    ///
    /// With the default sleep this is roughly five seconds of silence.
    ///
    /// **Default**: 5000
    pub timeout_poll_count: u32,

    /// Sleep after a poll that produced no measurement.
    ///
    /// Read in microseconds from the `poll_sleep_interval_us` key, or its
    /// short form `poll_sleep_interval`.
    ///
    /// **Default**: 1ms
    #[serde(
        rename = "poll_sleep_interval_us",
        alias = "poll_sleep_interval",
        deserialize_with = "micros"
    )]
    pub poll_sleep_interval: Duration,

    /// Gain of the proportional choke law. Negative: a pressure deficit
    /// closes the choke.
    ///
    /// **Default**: -0.001
    pub proportional_gain: f64,

    /// Test well whose setpoints seed the run. `None` asks on the console.
    ///
    /// **Default**: none
    pub well: Option<Well>,

    /// Kernel receive buffer size in bytes. `None` keeps the OS default.
    ///
    /// **Default**: none
    pub recv_buffer_size: Option<usize>,

    /// Log a one-line summary every this many advanced cycles. 0 disables.
    ///
    /// **Default**: 1000
    pub summary_interval: u64,

    /// Core to pin the control loop thread to. `None` leaves placement to
    /// the OS.
    ///
    /// **Default**: none
    pub cpu_core: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            local_address: "127.0.0.1".to_owned(),
            local_port: 65008,
            remote_address: "127.0.0.1".to_owned(),
            remote_port: 65000,
            timeout_poll_count: 5000,
            poll_sleep_interval: Duration::from_millis(1),
            proportional_gain: DEFAULT_PROPORTIONAL_GAIN,
            well: None,
            recv_buffer_size: None,
            summary_interval: 1000,
            cpu_core: None,
        }
    }
}

impl ControllerConfig {
    /// Loads a config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The result is
    /// not validated; call [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Checks ranges and address syntax.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.local_endpoint()?;
        let remote = self.remote_endpoint()?;
        if remote.port() == 0 {
            return Err(ConfigError::Invalid {
                field: "remote_port",
                reason: "must be non-zero",
            });
        }
        self.timeout_polls()?;
        if self.poll_sleep_interval > MAX_POLL_SLEEP {
            return Err(ConfigError::Invalid {
                field: "poll_sleep_interval",
                reason: "must be at most 1s",
            });
        }
        if !self.proportional_gain.is_finite() {
            return Err(ConfigError::Invalid {
                field: "proportional_gain",
                reason: "must be finite",
            });
        }
        if self.recv_buffer_size == Some(0) {
            return Err(ConfigError::Invalid {
                field: "recv_buffer_size",
                reason: "must be > 0",
            });
        }
        Ok(())
    }

    /// `timeout_poll_count` as a non-zero count.
    ///
    /// # Errors
    ///
    /// Returns an error if the count is zero.
    pub fn timeout_polls(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.timeout_poll_count).ok_or(ConfigError::Invalid {
            field: "timeout_poll_count",
            reason: "must be > 0",
        })
    }

    /// Address the controller binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `local_address` is not an IP literal.
    pub fn local_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.local_address, self.local_port).map_err(|source| {
            ConfigError::Address {
                field: "local_address",
                source,
            }
        })
    }

    /// Address of the simulator.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_address` is not an IP literal.
    pub fn remote_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.remote_address, self.remote_port).map_err(|source| {
            ConfigError::Address {
                field: "remote_address",
                source,
            }
        })
    }

    /// Approximate silence that triggers a reset, ignoring send/receive time.
    #[must_use]
    pub fn timeout_window(&self) -> Duration {
        self.poll_sleep_interval * self.timeout_poll_count
    }
}

fn micros<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
    u64::deserialize(de).map(Duration::from_micros)
}
