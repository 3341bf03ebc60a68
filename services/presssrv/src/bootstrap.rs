//! Command-line arguments and logging setup

use std::path::PathBuf;

use clap::Parser;
use common::logging::{parse_level, LogConfig};

use crate::config::ConfigOverrides;

/// RS-485 pressure transducer poller
#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "PRESSSRV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial device path
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baudrate: Option<u32>,

    /// Poll period in milliseconds
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Output CSV file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Read timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Modbus slave address
    #[arg(short, long)]
    pub slave: Option<u8>,

    /// Holding register address
    #[arg(short, long)]
    pub register: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Directory for daily rolling log files
    #[arg(long, env = "PRESSSRV_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Disable colored output (useful for log files)
    #[arg(long)]
    pub no_color: bool,

    /// Only validate configuration without polling
    #[arg(long)]
    pub validate: bool,

    /// Take a single reading, print it as JSON and exit
    #[arg(long)]
    pub once: bool,
}

impl Args {
    /// CLI values layered over file and environment configuration
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port.clone(),
            baud_rate: self.baudrate,
            read_timeout_ms: self.timeout,
            poll_period_ms: self.interval,
            slave_address: self.slave,
            register_address: self.register,
            output_path: self.file.clone(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            service_name: "presssrv".to_string(),
            log_dir: self.log_dir.clone(),
            level: parse_level(&self.log_level),
            ansi: !self.no_color,
            enable_json: false,
        }
    }
}

/// Initialize logging from the parsed arguments
pub fn init_logging(args: &Args) -> anyhow::Result<()> {
    common::logging::init_with_config(args.log_config())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_parse_long_flags() {
        let args = Args::try_parse_from([
            "presssrv",
            "--port",
            "/dev/ttyS0",
            "--baudrate",
            "19200",
            "--interval",
            "100",
            "--file",
            "out.csv",
            "--timeout",
            "500",
            "--slave",
            "3",
            "--register",
            "16",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.port.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(overrides.baud_rate, Some(19200));
        assert_eq!(overrides.poll_period_ms, Some(100));
        assert_eq!(overrides.output_path, Some(PathBuf::from("out.csv")));
        assert_eq!(overrides.read_timeout_ms, Some(500));
        assert_eq!(overrides.slave_address, Some(3));
        assert_eq!(overrides.register_address, Some(16));
        assert!(!args.once);
        assert!(!args.validate);
    }

    #[test]
    fn test_unset_flags_do_not_override() {
        let args = Args::try_parse_from(["presssrv", "--once"]).unwrap();
        assert!(args.once);
        assert_eq!(args.overrides(), ConfigOverrides::default());
    }

    #[test]
    fn test_log_config_from_args() {
        let args =
            Args::try_parse_from(["presssrv", "--log-level", "debug", "--no-color"]).unwrap();
        let config = args.log_config();
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.ansi);
    }

    #[test]
    fn test_rejects_out_of_range_slave() {
        assert!(Args::try_parse_from(["presssrv", "--slave", "300"]).is_err());
    }
}
