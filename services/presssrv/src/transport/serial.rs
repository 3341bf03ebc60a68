//! Serial Transport Implementation
//!
//! RS-485 link to the transducer over `tokio-serial`, fixed at 8N1.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use super::traits::{Transport, TransportError, TransportStats};
use crate::config::PollConfig;

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialTransportConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout for individual operations
    pub read_timeout: Duration,
    /// Write timeout for individual operations
    pub write_timeout: Duration,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl From<&PollConfig> for SerialTransportConfig {
    fn from(config: &PollConfig) -> Self {
        Self {
            port: config.port.clone(),
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout(),
            write_timeout: config.read_timeout(),
        }
    }
}

impl SerialTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port.is_empty() {
            return Err(TransportError::ConfigError(
                "Port path cannot be empty".to_string(),
            ));
        }

        if self.baud_rate == 0 {
            return Err(TransportError::ConfigError(
                "Baud rate must be greater than zero".to_string(),
            ));
        }

        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Serial transport implementation
#[derive(Debug)]
pub struct SerialTransport {
    config: SerialTransportConfig,
    connection: Option<SerialStream>,
    stats: TransportStats,
}

impl SerialTransport {
    /// Create new serial transport with configuration
    pub fn new(config: SerialTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        Ok(Self {
            config,
            connection: None,
            stats: TransportStats::new(),
        })
    }

    pub fn config(&self) -> &SerialTransportConfig {
        &self.config
    }

    fn port_mut(&mut self) -> Result<&mut SerialStream, TransportError> {
        let name = self.config.port.clone();
        self.connection
            .as_mut()
            .ok_or(TransportError::NotOpen(name))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.config.port
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            debug!("Serial port already open: {}", self.config.port);
            return Ok(());
        }

        debug!("RTU: {} @{}baud", self.config.port, self.config.baud_rate);

        let port_result = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.config.read_timeout)
            .open_native_async();

        match port_result {
            Ok(mut port) => {
                #[cfg(unix)]
                port.set_exclusive(true).map_err(|e| {
                    TransportError::OpenFailed(format!(
                        "Failed to lock serial port {}: {e}",
                        self.config.port
                    ))
                })?;

                self.connection = Some(port);
                self.stats.record_open();

                info!("RTU opened: {}", self.config.port);
                Ok(())
            },
            Err(e) => {
                let error_msg = format!("Failed to open serial port {}: {e}", self.config.port);
                error!("{error_msg}");
                Err(TransportError::OpenFailed(error_msg))
            },
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let write_timeout = self.config.write_timeout;
        let port = self.port_mut()?;

        // Drop whatever is left from the previous exchange so it cannot
        // prefix the next response
        port.clear(tokio_serial::ClearBuffer::Input).map_err(|e| {
            error!("RTU clear: {}", e);
            TransportError::WriteFailed(format!("Failed to clear input buffer: {e}"))
        })?;

        let send_operation = async {
            port.write_all(data).await?;
            port.flush().await?;
            Ok::<_, std::io::Error>(())
        };

        let result = timeout(write_timeout, send_operation).await;
        match result {
            Ok(Ok(())) => {
                self.stats.record_write(data.len());
                debug!(hex_data = %common::hex::encode_spaced(data), length = data.len(), direction = "send", "[Serial Transport] Raw packet");
                Ok(())
            },
            Ok(Err(e)) => {
                error!("RTU TX: {}", e);
                Err(TransportError::WriteFailed(format!("Serial send error: {e}")))
            },
            Err(_) => {
                error!("RTU TX timeout after {:?}", write_timeout);
                Err(TransportError::WriteFailed(format!(
                    "Send operation timed out after {write_timeout:?}"
                )))
            },
        }
    }

    async fn read_exact(
        &mut self,
        max_bytes: usize,
        read_timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let port = self.port_mut()?;

        let deadline = Instant::now() + read_timeout;
        let mut buffer = vec![0u8; max_bytes];
        let mut total_bytes = 0;

        while total_bytes < max_bytes {
            match timeout_at(deadline, port.read(&mut buffer[total_bytes..])).await {
                Ok(Ok(0)) => {
                    warn!("RTU closed after {}B", total_bytes);
                    break;
                },
                Ok(Ok(bytes)) => total_bytes += bytes,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                    debug!("RTU timeout: {}B", total_bytes);
                    break;
                },
                Ok(Err(e)) => {
                    error!("RTU RX: {}", e);
                    return Err(TransportError::ReadFailed(format!("Serial read error: {e}")));
                },
                Err(_) => {
                    debug!("RTU timeout: {}B of {}B", total_bytes, max_bytes);
                    break;
                },
            }
        }

        buffer.truncate(total_bytes);
        self.stats.record_read(total_bytes, max_bytes);
        debug!(hex_data = %common::hex::encode_spaced(&buffer), length = total_bytes, direction = "recv", "[Serial Transport] Raw packet");

        Ok(buffer)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.connection.take().is_some() {
            // Serial port is closed when dropped
            info!("Closed serial port: {}", self.config.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_validation() {
        let mut config = SerialTransportConfig::default();
        assert!(config.validate().is_ok());

        config.port = "".to_string();
        assert!(config.validate().is_err());

        config.port = "/dev/ttyUSB0".to_string();
        config.baud_rate = 0;
        assert!(config.validate().is_err());

        config.baud_rate = 9600;
        config.read_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serial_config_from_poll_config() {
        let poll = PollConfig {
            port: "/dev/ttyS3".to_string(),
            baud_rate: 19200,
            read_timeout_ms: 250,
            ..Default::default()
        };
        let config = SerialTransportConfig::from(&poll);
        assert_eq!(config.port, "/dev/ttyS3");
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_serial_transport_not_open_initially() {
        let mut transport = SerialTransport::new(SerialTransportConfig::default()).unwrap();

        assert!(!transport.is_open());
        assert_eq!(transport.name(), "/dev/ttyUSB0");

        let err = transport.write(&[0x01]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen(_)));

        let err = transport
            .read_exact(7, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotOpen(_)));
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let config = SerialTransportConfig {
            port: "/dev/this-port-does-not-exist".to_string(),
            ..Default::default()
        };
        let mut transport = SerialTransport::new(config).unwrap();

        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::OpenFailed(_)));
        assert!(!transport.is_open());
        assert_eq!(transport.stats().opens, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut transport = SerialTransport::new(SerialTransportConfig::default()).unwrap();
        assert!(transport.close().await.is_ok());
        assert!(transport.close().await.is_ok());
        assert!(!transport.is_open());
    }
}
