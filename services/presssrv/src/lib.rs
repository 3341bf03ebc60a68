//! Pressure Polling Service Library
//!
//! Single-master polling of an RS-485 Modbus-RTU pressure transducer.
//!
//! ```text
//! PollScheduler ──► Transport (serial / mock)
//!       │
//!       ├──► press_protocol (frame, validate)
//!       │
//!       ├──► RecordSink (csv / memory)
//!       │
//!       └──► broadcast<Reading> subscribers
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod reading;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod transport;

pub use config::{ConfigLoader, ConfigOverrides, PollConfig};
pub use error::{PressSrvError, Result};
pub use reading::{MonotonicClock, Reading, ReadingRecord};
pub use runtime::{spawn, start_serial, PollHandle};
pub use scheduler::{PollScheduler, RunSummary, SchedulerState, StopReason};
pub use sink::{CsvSink, MemorySink, RecordSink, SinkError};
pub use transport::{MockTransport, SerialTransport, Transport, TransportError};
