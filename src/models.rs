// Data structures (relay envelope, message record)

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};

/// Format used for the persisted `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

// Inbound relay frame
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayEnvelope {
    pub username: String,
    pub message: String,
}

impl RelayEnvelope {
    /// Decode a frame payload. Text and binary frames carry the same JSON.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// A relayed chat message, stamped by the server at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub timestamp: DateTime<Local>,
    pub username: String,
    pub body: String,
}

impl MessageRecord {
    pub fn new(timestamp: DateTime<Local>, envelope: RelayEnvelope) -> Self {
        Self {
            timestamp,
            username: envelope.username,
            body: envelope.message,
        }
    }

    /// The timestamp as stored in the `date` column
    pub fn date(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }
}

/// Wall clock that never goes backwards within one process.
///
/// If the system clock steps back, the last issued instant is repeated until
/// the wall clock catches up.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Local> {
        self.observe(Local::now())
    }

    fn observe(&self, wall: DateTime<Local>) -> DateTime<Local> {
        let micros = wall.timestamp_micros();
        let previous = self.last_micros.fetch_max(micros, Ordering::SeqCst);

        // Issued instants are truncated to whole microseconds, the precision of
        // the stored `date` column.
        DateTime::from_timestamp_micros(previous.max(micros))
            .map(|utc| utc.with_timezone(&Local))
            .unwrap_or(wall)
    }
}
