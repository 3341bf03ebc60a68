//! Transport Layer Traits
//!
//! The polling engine talks to the transducer only through [`Transport`],
//! so the scheduler can run against a real serial port or a scripted mock.

use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Transport layer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Device absent, permission denied or busy
    #[error("Open failed: {0}")]
    OpenFailed(String),

    /// Write or flush failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Read failed with an I/O error (not a timeout)
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Operation on a port that is not open
    #[error("Port not open: {0}")]
    NotOpen(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Number of completed writes
    pub writes: u64,
    /// Reads that returned fewer bytes than requested
    pub short_reads: u64,
    /// Number of successful opens
    pub opens: u64,
    /// Last successful open time
    pub last_open: Option<SystemTime>,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful open
    pub fn record_open(&mut self) {
        self.opens += 1;
        self.last_open = Some(SystemTime::now());
    }

    /// Record bytes sent
    pub fn record_write(&mut self, bytes: usize) {
        self.writes += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record a read of `received` out of `requested` bytes
    pub fn record_read(&mut self, received: usize, requested: usize) {
        self.bytes_received += received as u64;
        if received < requested {
            self.short_reads += 1;
        }
    }
}

impl fmt::Display for TransportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} writes, {} bytes sent, {} bytes received, {} short reads, {} opens",
            self.writes, self.bytes_sent, self.bytes_received, self.short_reads, self.opens
        )
    }
}

/// Exclusive byte-level link to the transducer
#[async_trait]
pub trait Transport: Send + fmt::Debug {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Open the underlying device
    ///
    /// Failure is fatal to the engine; no retry is attempted here.
    async fn open(&mut self) -> std::result::Result<(), TransportError>;

    /// Discard buffered input, then transmit `data` and flush
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError>;

    /// Read up to `max_bytes`, waiting at most `timeout`
    ///
    /// A short (possibly empty) result is a normal return and means the
    /// device did not answer in full before the deadline.
    async fn read_exact(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError>;

    /// Release the device; calling it on a closed port is a no-op
    async fn close(&mut self) -> std::result::Result<(), TransportError>;

    /// Check if the port is currently open
    fn is_open(&self) -> bool;

    /// Current transport statistics
    fn stats(&self) -> TransportStats;
}

/// Allows `Box<dyn Transport>` where a `Transport` is required
#[async_trait]
impl Transport for Box<dyn Transport> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn open(&mut self) -> std::result::Result<(), TransportError> {
        self.as_mut().open().await
    }

    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        self.as_mut().write(data).await
    }

    async fn read_exact(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        self.as_mut().read_exact(max_bytes, timeout).await
    }

    async fn close(&mut self) -> std::result::Result<(), TransportError> {
        self.as_mut().close().await
    }

    fn is_open(&self) -> bool {
        self.as_ref().is_open()
    }

    fn stats(&self) -> TransportStats {
        self.as_ref().stats()
    }
}
