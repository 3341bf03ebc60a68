//! Timestamped tick results

use chrono::{DateTime, Local, SubsecRound};
use press_protocol::ValidationOutcome;
use serde::Serialize;
use tokio::time::Instant;

/// Timestamp layout used in the record store and on the console
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Outcome of one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    timestamp: DateTime<Local>,
    raw: Vec<u8>,
    outcome: ValidationOutcome,
}

impl Reading {
    pub fn new(timestamp: DateTime<Local>, raw: Vec<u8>, outcome: ValidationOutcome) -> Self {
        Self {
            timestamp,
            raw,
            outcome,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Register value, present only when the response validated
    pub fn value(&self) -> Option<u16> {
        self.outcome.value()
    }

    /// Bytes exactly as received, possibly empty or truncated
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        common::hex::encode_upper(&self.raw)
    }

    pub fn outcome(&self) -> ValidationOutcome {
        self.outcome
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }

    pub fn status(&self) -> &'static str {
        self.outcome.status_token()
    }

    /// Flat view written to the record store
    pub fn record(&self) -> ReadingRecord {
        ReadingRecord {
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            value: self.value(),
            raw_hex: self.raw_hex(),
            status: self.status(),
        }
    }
}

/// One persisted row: `timestamp,value,raw_hex,status`
///
/// `value` is `None` for every non-valid outcome, which the CSV writer
/// emits as an empty field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingRecord {
    pub timestamp: String,
    pub value: Option<u16>,
    pub raw_hex: String,
    pub status: &'static str,
}

/// Wall-clock timestamps that never go backwards
///
/// The wall time is sampled once; later stamps add the elapsed monotonic
/// time, so an NTP step during a run cannot reorder readings. A clock
/// carried into the next run with [`MonotonicClock::resume`] keeps the
/// ordering across restarts too.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    wall_anchor: DateTime<Local>,
    mono_anchor: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Local::now(),
            mono_anchor: Instant::now(),
        }
    }

    /// Re-anchor on the current wall time, never earlier than our last stamp
    pub fn resume(&self) -> Self {
        let last = self.now();
        let wall = Local::now();
        Self {
            wall_anchor: if wall < last { last } else { wall },
            mono_anchor: Instant::now(),
        }
    }

    /// Current timestamp at millisecond resolution
    pub fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.mono_anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        (self.wall_anchor + elapsed).trunc_subsecs(3)
    }
}
