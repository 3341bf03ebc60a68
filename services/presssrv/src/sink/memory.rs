//! In-memory record sink

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{RecordSink, SinkError};
use crate::reading::Reading;

/// Collects readings in memory; can be switched to fail every append
#[derive(Debug, Default)]
pub struct MemorySink {
    readings: Mutex<Vec<Reading>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }
}

impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, reading: &Reading) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Io("memory sink set to fail".to_string()));
        }
        self.readings.lock().push(reading.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::Local;
    use press_protocol::ValidationOutcome;

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        let reading = Reading::new(Local::now(), vec![], ValidationOutcome::Timeout);
        sink.append(&reading).unwrap();
        assert_eq!(sink.len(), 1);

        sink.set_failing(true);
        assert!(sink.append(&reading).is_err());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.readings()[0], reading);
    }
}
