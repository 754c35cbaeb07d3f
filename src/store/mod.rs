//! Time-series store boundary
//!
//! The pipeline treats persistence as an external collaborator behind a
//! narrow interface: [`TimeSeriesStore::write`] and
//! [`TimeSeriesStore::query`]. Write failures are recoverable: the
//! coordinator retains unflushed records and retries on the next cycle.
//!
//! Two implementations ship with the crate: [`MemoryStore`] for tests and
//! simulation runs, and [`InfluxStore`] speaking the InfluxDB v2 HTTP API.

pub mod influx;
pub mod memory;

pub use influx::InfluxStore;
pub use memory::MemoryStore;

use crate::error::Result;
use chrono::{DateTime, TimeZone, Utc};

/// One record at the store boundary
#[derive(Debug, Clone, PartialEq)]
pub struct ModeRecord {
    /// Record timestamp
    pub timestamp: DateTime<Utc>,
    /// Measurement name
    pub measurement: String,
    /// Tag key/value pairs
    pub tags: Vec<(String, String)>,
    /// Field key/value pairs
    pub fields: Vec<(String, f64)>,
}

impl ModeRecord {
    /// Look up a field value by name
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

/// Inclusive time range for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Narrow interface to the external time-series store
pub trait TimeSeriesStore: Send {
    /// Persist a batch of records
    fn write(&mut self, records: &[ModeRecord]) -> Result<()>;

    /// Fetch records of one measurement within a time range, ordered by
    /// timestamp
    fn query(&mut self, range: TimeRange, measurement: &str) -> Result<Vec<ModeRecord>>;
}

/// Convert epoch seconds (sub-millisecond precision) to a UTC timestamp
pub fn epoch_to_datetime(epoch_seconds: f64) -> DateTime<Utc> {
    let secs = epoch_seconds.floor() as i64;
    let nanos = ((epoch_seconds - secs as f64) * 1e9).round() as u32;
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (secs + 1, 0)
    } else {
        (secs, nanos)
    };
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
