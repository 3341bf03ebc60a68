//! Shared bootstrap library for the pressure polling service
//!
//! Provides the pieces every binary in the workspace needs before it does
//! any real work:
//! - logging initialization (console + daily rolling file)
//! - shutdown signal handling
//! - hex formatting for raw frames

pub mod hex;
pub mod logging;
pub mod shutdown;

pub use logging::LogConfig;
