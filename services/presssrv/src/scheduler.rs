//! Poll scheduler
//!
//! Drives the query/response cycle at a fixed period:
//!
//! ```text
//! write query -> settle -> read 7 bytes (bounded) -> validate -> record
//! ```
//!
//! Per-tick protocol failures are recorded and polling continues. Only a
//! port failure (open or write) ends a run.

use std::sync::Arc;
use std::time::Duration;

use press_protocol::constants::RESPONSE_FRAME_LEN;
use press_protocol::{
    build_query, expected_header, validate, ExpectedHeader, QueryFrame, ValidationOutcome,
};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollConfig;
use crate::error::{PressSrvError, Result};
use crate::reading::{MonotonicClock, Reading};
use crate::sink::RecordSink;
use crate::transport::Transport;

/// Readings buffered per subscriber before the oldest are dropped
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Why a run ended
#[derive(Debug, Clone)]
pub enum StopReason {
    /// Stop was requested
    Cancelled,
    /// The port failed; the run cannot continue
    Fatal(PressSrvError),
}

/// Per-run counters
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub valid: u64,
    pub length_mismatch: u64,
    pub header_mismatch: u64,
    pub crc_mismatch: u64,
    pub timeout: u64,
    /// Invalid ticks not persisted because `record_invalid` is off
    pub dropped: u64,
    pub sink_failures: u64,
    pub stop_reason: Option<StopReason>,
}

impl RunSummary {
    fn count(&mut self, reading: &Reading) {
        self.ticks += 1;
        match reading.outcome() {
            ValidationOutcome::Valid(_) => self.valid += 1,
            ValidationOutcome::LengthMismatch => self.length_mismatch += 1,
            ValidationOutcome::HeaderMismatch => self.header_mismatch += 1,
            ValidationOutcome::CrcMismatch => self.crc_mismatch += 1,
            ValidationOutcome::Timeout => self.timeout += 1,
        }
    }

    pub fn invalid(&self) -> u64 {
        self.ticks - self.valid
    }

    /// Whether the run ended on a port failure
    pub fn is_fatal(&self) -> bool {
        matches!(self.stop_reason, Some(StopReason::Fatal(_)))
    }
}

/// Sleep needed after a tick that took `elapsed` to keep `period` spacing
///
/// Zero when the tick overran; there is no catch-up.
pub fn pacing_delay(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Polling engine for a single transducer
pub struct PollScheduler<T: Transport> {
    config: PollConfig,
    transport: T,
    sink: Arc<dyn RecordSink>,
    query: QueryFrame,
    expected: ExpectedHeader,
    state: SchedulerState,
    clock: MonotonicClock,
    events: broadcast::Sender<Reading>,
    summary: RunSummary,
}

impl<T: Transport> std::fmt::Debug for PollScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("transport", &self.transport.name())
            .field("sink", &self.sink.name())
            .field("query", &self.query)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Transport> PollScheduler<T> {
    /// The query frame is built once here and reused for every tick
    pub fn new(config: PollConfig, transport: T, sink: Arc<dyn RecordSink>) -> Self {
        let target = config.query_target();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            query: build_query(&target),
            expected: expected_header(&target),
            config,
            transport,
            sink,
            state: SchedulerState::Stopped,
            clock: MonotonicClock::new(),
            events,
            summary: RunSummary::default(),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn query(&self) -> &QueryFrame {
        &self.query
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Counters for the current (or last) run
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Receive every reading produced from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Reading> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<Reading> {
        self.events.clone()
    }

    /// Open the port and enter `Running`
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(PressSrvError::state("scheduler is already running"));
        }

        self.transport.open().await?;

        self.clock = self.clock.resume();
        self.summary = RunSummary::default();
        self.state = SchedulerState::Running;

        info!(
            "Polling started: {} slave={} reg=0x{:04X} period={}ms",
            self.transport.name(),
            self.config.slave_address,
            self.config.register_address,
            self.config.poll_period_ms
        );
        Ok(())
    }

    /// Close the port and flush the sink; no-op when already stopped
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.state = SchedulerState::Stopped;

        if let Err(e) = self.sink.flush() {
            warn!("Sink flush failed on stop: {}", e);
        }
        self.transport.close().await?;

        info!(
            "Polling stopped: {} ticks, {} valid, {} invalid",
            self.summary.ticks,
            self.summary.valid,
            self.summary.invalid()
        );
        Ok(())
    }

    /// One query/response exchange, without recording
    async fn exchange(&mut self) -> Result<Reading> {
        self.transport.write(self.query.as_bytes()).await?;

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let raw = match self
            .transport
            .read_exact(RESPONSE_FRAME_LEN, self.config.read_timeout())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                // Only the write side is fatal; a failed read is a lost tick
                warn!("Read failed, counting as no response: {}", e);
                Vec::new()
            },
        };

        let outcome = validate(&raw, &self.expected);
        Ok(Reading::new(self.clock.now(), raw, outcome))
    }

    /// Log, persist and publish one reading
    fn record(&mut self, reading: &Reading) {
        self.summary.count(reading);

        match reading.value() {
            Some(value) => info!("Pressure: {} g", value),
            None => warn!(
                "Invalid response: {} raw=[{}]",
                reading.outcome(),
                common::hex::encode_spaced(reading.raw())
            ),
        }

        if reading.is_valid() || self.config.record_invalid {
            if let Err(e) = self.sink.append(reading) {
                self.summary.sink_failures += 1;
                error!("Record write failed ({}): {}", self.sink.name(), e);
            }
        } else {
            self.summary.dropped += 1;
            debug!("Invalid reading not recorded: {}", reading.status());
        }

        // No subscribers is fine
        let _ = self.events.send(reading.clone());
    }

    /// Run a single tick; requires `Running`
    ///
    /// A port failure closes the port and leaves the scheduler `Stopped`.
    pub async fn tick(&mut self) -> Result<Reading> {
        if !self.is_running() {
            return Err(PressSrvError::state("scheduler is not running"));
        }

        let reading = match self.exchange().await {
            Ok(reading) => reading,
            Err(e) => {
                if e.is_fatal() {
                    error!("Port failure, stopping: {}", e);
                    if let Err(close) = self.stop().await {
                        warn!("Close after port failure failed: {}", close);
                    }
                }
                return Err(e);
            },
        };
        self.record(&reading);
        Ok(reading)
    }

    /// Open, poll once, close
    ///
    /// If the scheduler is already running it is left running.
    pub async fn read_once(&mut self) -> Result<Reading> {
        let opened_here = !self.is_running();
        if opened_here {
            self.start().await?;
        }

        let result = self.tick().await;

        if opened_here {
            if let Err(e) = self.stop().await {
                warn!("Close after single read failed: {}", e);
            }
        }
        result
    }

    /// Poll until `cancel` fires or the port fails
    ///
    /// Ticks are spaced one period apart, measured start to start. A tick
    /// that overruns the period is followed immediately by the next one;
    /// missed ticks are not made up. Cancellation is observed between
    /// ticks and during the pacing sleep, never inside an exchange.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        if !self.is_running() {
            if let Err(e) = self.start().await {
                error!("Failed to start polling: {}", e);
                self.summary = RunSummary {
                    stop_reason: Some(StopReason::Fatal(e)),
                    ..Default::default()
                };
                return self.summary.clone();
            }
        }

        let period = self.config.poll_period();

        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let started = Instant::now();
            if let Err(e) = self.tick().await {
                error!("Polling aborted: {}", e);
                break StopReason::Fatal(e);
            }

            let elapsed = started.elapsed();
            let delay = pacing_delay(period, elapsed);
            if delay.is_zero() {
                if elapsed > period {
                    debug!("Tick overran period: {:?} > {:?}", elapsed, period);
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(delay) => {},
            }
        };

        if let StopReason::Cancelled = reason {
            debug!("Stop requested");
        }
        self.summary.stop_reason = Some(reason);

        if let Err(e) = self.stop().await {
            warn!("Close on stop failed: {}", e);
        }
        self.summary.clone()
    }
}
