//! Record sinks
//!
//! Every tick that is kept ends up as one row in a [`RecordSink`]. The
//! production sink is an append-only CSV file; tests use [`MemorySink`].

mod csv_sink;
mod memory;

pub use csv_sink::{CsvSink, CSV_HEADER};
pub use memory::MemorySink;

use thiserror::Error;

use crate::reading::Reading;

/// Record store errors
///
/// None of these stop polling; the scheduler logs them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err.to_string())
    }
}

impl From<csv::Error> for SinkError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            SinkError::Io(err.to_string())
        } else {
            SinkError::Encode(err.to_string())
        }
    }
}

/// Append-only store of readings
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    /// Persist one reading; a row is either written whole or not at all
    fn append(&self, reading: &Reading) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError>;
}
