//! A single observed value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, FixedOffset};

/// An immutable observation held in a data item's sample history.
///
/// Structure never changes after ingestion; the one exception is the
/// `processed` flag, which consumers may flip for their own bookkeeping
/// through the read-only history view.
#[derive(Debug)]
pub struct Sample {
    value: String,
    timestamp: DateTime<FixedOffset>,
    sequence: String,
    processed: AtomicBool,
}

impl Sample {
    pub(crate) fn new(value: String, timestamp: DateTime<FixedOffset>, sequence: String) -> Self {
        Self { value, timestamp, sequence, processed: AtomicBool::new(false) }
    }

    /// Raw text value of the observation.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Timestamp of the observation, offset preserved from the agent.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Protocol sequence number, as text.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Whether a consumer has marked this sample as processed.
    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::Relaxed)
    }

    /// Consumer bookkeeping flag; no effect on the engine.
    pub fn set_processed(&self, processed: bool) {
        self.processed.store(processed, Ordering::Relaxed);
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
