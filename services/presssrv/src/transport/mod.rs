//! Transport layer
//!
//! Byte-level access to the RS-485 link. The real port lives in [`serial`],
//! the scripted double used by tests in [`mock`].

pub mod mock;
pub mod serial;
pub mod traits;

pub use mock::{MockTransport, MockTransportConfig};
pub use serial::{SerialTransport, SerialTransportConfig};
pub use traits::{Transport, TransportError, TransportStats};
