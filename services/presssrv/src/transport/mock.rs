//! Mock Transport for Testing
//!
//! Scripted stand-in for the serial link. Clones share state, so a test can
//! keep one handle for inspection while the scheduler owns the other.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::traits::{Transport, TransportError, TransportStats};

/// Mock transport configuration
#[derive(Debug, Clone)]
pub struct MockTransportConfig {
    /// Transport name for identification
    pub name: String,
    /// Whether open should fail
    pub fail_open: bool,
    /// Fail every write once this many writes have succeeded
    pub fail_write_after: Option<usize>,
    /// Whether reads should fail with an I/O error
    pub fail_read: bool,
    /// Simulated device turnaround before the reply is available
    pub response_delay: Duration,
    /// Reply used when the scripted queue is empty; `None` means silence
    pub default_response: Option<Vec<u8>>,
}

impl Default for MockTransportConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fail_open: false,
            fail_write_after: None,
            fail_read: false,
            response_delay: Duration::ZERO,
            default_response: None,
        }
    }
}

#[derive(Debug)]
struct MockTransportState {
    config: MockTransportConfig,
    open: bool,
    /// Replies armed one per write, in order
    responses: VecDeque<Vec<u8>>,
    /// Bytes waiting in the simulated input buffer
    input: VecDeque<u8>,
    sent: Vec<(Instant, Vec<u8>)>,
    stale_discarded: usize,
    stats: TransportStats,
}

/// Mock transport implementation
#[derive(Debug, Clone)]
pub struct MockTransport {
    name: String,
    state: Arc<Mutex<MockTransportState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(MockTransportConfig::default())
    }
}

impl MockTransport {
    pub fn new(config: MockTransportConfig) -> Self {
        Self {
            name: config.name.clone(),
            state: Arc::new(Mutex::new(MockTransportState {
                config,
                open: false,
                responses: VecDeque::new(),
                input: VecDeque::new(),
                sent: Vec::new(),
                stale_discarded: 0,
                stats: TransportStats::new(),
            })),
        }
    }

    /// Queue the reply for a future write
    pub fn push_response(&self, data: impl Into<Vec<u8>>) {
        self.state.lock().responses.push_back(data.into());
    }

    pub fn push_responses<I, B>(&self, replies: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let mut state = self.state.lock();
        state.responses.extend(replies.into_iter().map(Into::into));
    }

    /// Put unsolicited bytes into the input buffer, as line noise or a late
    /// reply would
    pub fn inject_stale(&self, data: &[u8]) {
        self.state.lock().input.extend(data.iter().copied());
    }

    /// Frames written so far
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.iter().map(|(_, f)| f.clone()).collect()
    }

    /// Instants at which each write completed
    pub fn write_instants(&self) -> Vec<Instant> {
        self.state.lock().sent.iter().map(|(at, _)| *at).collect()
    }

    /// Stale input bytes thrown away by writes
    pub fn stale_bytes_discarded(&self) -> usize {
        self.state.lock().stale_discarded
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().config.fail_open = fail;
    }

    pub fn set_fail_write_after(&self, writes: Option<usize>) {
        self.state.lock().config.fail_write_after = writes;
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.state.lock().config.fail_read = fail;
    }

    pub fn set_response_delay(&self, delay: Duration) {
        self.state.lock().config.response_delay = delay;
    }

    pub fn set_default_response(&self, reply: Option<Vec<u8>>) {
        self.state.lock().config.default_response = reply;
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.config.fail_open {
            return Err(TransportError::OpenFailed(format!(
                "Mock open failure: {}",
                self.name
            )));
        }
        if !state.open {
            state.open = true;
            state.stats.record_open();
            debug!("Mock transport opened: {}", self.name);
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen(self.name.clone()));
        }

        if let Some(limit) = state.config.fail_write_after {
            if state.stats.writes as usize >= limit {
                return Err(TransportError::WriteFailed(format!(
                    "Mock write failure after {limit} writes"
                )));
            }
        }

        // Same contract as the serial port: input is discarded before sending
        let stale = state.input.len();
        state.input.clear();
        state.stale_discarded += stale;

        state.sent.push((Instant::now(), data.to_vec()));
        state.stats.record_write(data.len());

        let reply = match state.responses.pop_front() {
            Some(reply) => Some(reply),
            None => state.config.default_response.clone(),
        };
        if let Some(reply) = reply {
            state.input.extend(reply);
        }
        Ok(())
    }

    async fn read_exact(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let delay = {
            let state = self.state.lock();
            if !state.open {
                return Err(TransportError::NotOpen(self.name.clone()));
            }
            state.config.response_delay.min(timeout)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (bytes, fail) = {
            let mut state = self.state.lock();
            if state.config.fail_read {
                (Vec::new(), true)
            } else {
                let take = max_bytes.min(state.input.len());
                let bytes: Vec<u8> = state.input.drain(..take).collect();
                state.stats.record_read(bytes.len(), max_bytes);
                (bytes, false)
            }
        };

        if fail {
            return Err(TransportError::ReadFailed("Mock read failure".to_string()));
        }

        // A short reply means the caller waited out the whole timeout
        if bytes.len() < max_bytes {
            tokio::time::sleep(timeout.saturating_sub(delay)).await;
        }

        Ok(bytes)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            debug!("Mock transport closed: {}", self.name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn stats(&self) -> TransportStats {
        self.state.lock().stats.clone()
    }
}
