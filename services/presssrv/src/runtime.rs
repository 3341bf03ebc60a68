//! Background polling task
//!
//! [`spawn`] moves a scheduler onto its own task and returns a
//! [`PollHandle`] for stopping it and observing readings.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PollConfig;
use crate::error::{PressSrvError, Result};
use crate::reading::Reading;
use crate::scheduler::{PollScheduler, RunSummary};
use crate::sink::CsvSink;
use crate::transport::{SerialTransport, SerialTransportConfig, Transport};

/// Handle to a running polling task
#[derive(Debug)]
pub struct PollHandle<T: Transport> {
    cancel: CancellationToken,
    task: JoinHandle<(PollScheduler<T>, RunSummary)>,
    events: broadcast::Sender<Reading>,
}

impl<T: Transport + 'static> PollHandle<T> {
    /// Readings produced after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Reading> {
        self.events.subscribe()
    }

    /// Token that stops the task when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request a stop and wait for the port to be released
    ///
    /// The tick in flight, if any, completes first.
    pub async fn stop(self) -> Result<(PollScheduler<T>, RunSummary)> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the task to end on its own (port failure or external cancel)
    pub async fn join(self) -> Result<(PollScheduler<T>, RunSummary)> {
        self.task
            .await
            .map_err(|e| PressSrvError::internal(format!("Polling task failed: {e}")))
    }
}

/// Run `scheduler` on a new task until stopped
///
/// An already started scheduler keeps its open port; otherwise the task
/// opens it and a failure ends the run immediately.
pub fn spawn<T: Transport + 'static>(mut scheduler: PollScheduler<T>) -> PollHandle<T> {
    let cancel = CancellationToken::new();
    let events = scheduler.event_sender();

    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let summary = scheduler.run(token).await;
        (scheduler, summary)
    });

    PollHandle {
        cancel,
        task,
        events,
    }
}

/// Build the serial scheduler with its CSV sink, without opening the port
pub fn serial_scheduler(config: &PollConfig) -> Result<PollScheduler<SerialTransport>> {
    let transport = SerialTransport::new(SerialTransportConfig::from(config))?;
    let sink = CsvSink::open(&config.output_path)?;
    Ok(PollScheduler::new(config.clone(), transport, Arc::new(sink)))
}

/// Open the serial port and start polling in the background
///
/// Open failures are returned here rather than from the task.
pub async fn start_serial(config: &PollConfig) -> Result<PollHandle<SerialTransport>> {
    let mut scheduler = serial_scheduler(config)?;
    scheduler.start().await?;
    info!("Polling task spawned for {}", config.port);
    Ok(spawn(scheduler))
}
