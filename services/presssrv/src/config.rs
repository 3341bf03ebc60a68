//! Polling configuration
//!
//! Layering, lowest priority first:
//!
//! ```text
//! built-in defaults -> config file (toml/yaml/json) -> PRESSSRV_* env -> CLI flags
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use press_protocol::constants::MAX_SLAVE_ADDRESS;
use press_protocol::QueryTarget;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PressSrvError, Result};

/// Environment variable prefix for configuration keys
pub const ENV_PREFIX: &str = "PRESSSRV_";

mod defaults {
    pub fn port() -> String {
        "/dev/ttyUSB0".to_string()
    }

    pub fn baud_rate() -> u32 {
        9600
    }

    pub fn read_timeout_ms() -> u64 {
        1000
    }

    pub fn poll_period_ms() -> u64 {
        50
    }

    /// Turnaround pause between sending the query and reading the reply
    pub fn settle_delay_ms() -> u64 {
        10
    }

    pub fn slave_address() -> u8 {
        press_protocol::constants::DEFAULT_SLAVE_ADDRESS
    }

    pub fn register_address() -> u16 {
        press_protocol::constants::DEFAULT_REGISTER_ADDRESS
    }

    pub fn output_path() -> std::path::PathBuf {
        std::path::PathBuf::from("pressure_data.csv")
    }

    pub fn bool_true() -> bool {
        true
    }
}

/// Engine configuration, fixed for the lifetime of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Serial device path
    #[serde(default = "defaults::port")]
    pub port: String,

    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on waiting for a 7-byte reply
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Target spacing between successive queries
    #[serde(default = "defaults::poll_period_ms")]
    pub poll_period_ms: u64,

    #[serde(default = "defaults::settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "defaults::slave_address")]
    pub slave_address: u8,

    #[serde(default = "defaults::register_address")]
    pub register_address: u16,

    /// CSV record store
    #[serde(default = "defaults::output_path")]
    pub output_path: PathBuf,

    /// Persist failed ticks with an empty value and their status
    #[serde(default = "defaults::bool_true")]
    pub record_invalid: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            baud_rate: defaults::baud_rate(),
            read_timeout_ms: defaults::read_timeout_ms(),
            poll_period_ms: defaults::poll_period_ms(),
            settle_delay_ms: defaults::settle_delay_ms(),
            slave_address: defaults::slave_address(),
            register_address: defaults::register_address(),
            output_path: defaults::output_path(),
            record_invalid: true,
        }
    }
}

impl PollConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn query_target(&self) -> QueryTarget {
        QueryTarget {
            slave_address: self.slave_address,
            register_address: self.register_address,
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(PressSrvError::config("port cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(PressSrvError::config("baud_rate must be greater than zero"));
        }
        if self.read_timeout_ms == 0 {
            return Err(PressSrvError::config(
                "read_timeout_ms must be greater than zero",
            ));
        }
        if self.poll_period_ms == 0 {
            return Err(PressSrvError::config(
                "poll_period_ms must be greater than zero",
            ));
        }
        if self.slave_address == 0 || self.slave_address > MAX_SLAVE_ADDRESS {
            return Err(PressSrvError::config(format!(
                "slave_address must be in 1..={MAX_SLAVE_ADDRESS}, got {}",
                self.slave_address
            )));
        }
        if self.settle_delay_ms >= self.poll_period_ms {
            return Err(PressSrvError::config(format!(
                "settle_delay_ms ({}) must be shorter than poll_period_ms ({})",
                self.settle_delay_ms, self.poll_period_ms
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(PressSrvError::config("output_path cannot be empty"));
        }
        Ok(())
    }
}

/// Values supplied on the command line; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_period_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave_address: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_address: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// Builds a [`PollConfig`] from all configuration layers
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and merge every layer; the result is not validated
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PollConfig> {
        let figment = Self::figment(path, overrides)?;
        let config: PollConfig = figment.extract()?;
        debug!("Config loaded: {:?}", config);
        Ok(config)
    }

    /// Load, merge and validate
    pub fn load_validated(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PollConfig> {
        let config = Self::load(path, overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(PollConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(PressSrvError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }

            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .ok_or_else(|| PressSrvError::config("Invalid file extension"))?;

            figment = match extension {
                "json" => figment.merge(Json::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                _ => {
                    return Err(PressSrvError::config(format!(
                        "Unsupported config format: {extension}"
                    )))
                },
            };
        }

        figment = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides));

        Ok(figment)
    }
}
