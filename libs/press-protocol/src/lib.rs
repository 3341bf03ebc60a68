//! Pressure Transducer Protocol
//!
//! Wire-level pieces of the RS-485 pressure polling service. Everything in
//! this crate is synchronous and side-effect free so it can be exercised
//! without a serial port.
//!
//! # Architecture
//!
//! ```text
//! press-protocol
//!     ├── crc16 (Modbus CRC16, poly 0xA001, init 0xFFFF)
//!     ├── frame (QueryFrame assembly, ExpectedHeader derivation)
//!     └── validator (ResponseFrame checks -> ValidationOutcome)
//! ```
//!
//! The service crate (`presssrv`) owns transport, scheduling and
//! persistence and only calls into these functions.

pub mod constants;
mod crc;
mod frame;
mod validator;

pub use crc::{append_crc16, crc16};
pub use frame::{build_query, expected_header, ExpectedHeader, QueryFrame, QueryTarget};
pub use validator::{validate, ValidationOutcome};
