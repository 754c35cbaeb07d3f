//! In-memory store for tests and simulation runs

use crate::error::{OscimonError, Result};
use crate::store::{ModeRecord, TimeRange, TimeSeriesStore};
use std::sync::{Arc, Mutex};

/// Stores records in memory behind a shared handle.
///
/// Clones share the same backing vector, so a test can keep one handle
/// while the coordinator owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<ModeRecord>>>,
    /// When set, the next `fail_writes` write calls are refused
    fail_writes: Arc<Mutex<u32>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` write calls, for retry-path tests
    pub fn fail_next_writes(&self, count: u32) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    /// Snapshot of all stored records
    pub fn records(&self) -> Vec<ModeRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimeSeriesStore for MemoryStore {
    fn write(&mut self, records: &[ModeRecord]) -> Result<()> {
        {
            let mut failures = self.fail_writes.lock().unwrap_or_else(|e| e.into_inner());
            if *failures > 0 {
                *failures -= 1;
                return Err(OscimonError::Store("simulated write failure".to_string()));
            }
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(records);
        Ok(())
    }

    fn query(&mut self, range: TimeRange, measurement: &str) -> Result<Vec<ModeRecord>> {
        let mut matching: Vec<ModeRecord> = self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| {
                r.measurement == measurement
                    && r.timestamp >= range.start
                    && r.timestamp <= range.stop
            })
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::epoch_to_datetime;

    fn record(ts: f64, measurement: &str) -> ModeRecord {
        ModeRecord {
            timestamp: epoch_to_datetime(ts),
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: vec![("low_f".to_string(), 0.6)],
        }
    }

    #[test]
    fn test_write_and_query_ordered() {
        let mut store = MemoryStore::new();
        store
            .write(&[record(300.0, "modes"), record(100.0, "modes")])
            .expect("write");
        store.write(&[record(200.0, "other")]).expect("write");

        let range = TimeRange {
            start: epoch_to_datetime(0.0),
            stop: epoch_to_datetime(1000.0),
        };
        let result = store.query(range, "modes").expect("query");
        assert_eq!(result.len(), 2);
        assert!(result[0].timestamp < result[1].timestamp);
    }

    #[test]
    fn test_query_respects_range() {
        let mut store = MemoryStore::new();
        store
            .write(&[record(100.0, "modes"), record(500.0, "modes")])
            .expect("write");
        let range = TimeRange {
            start: epoch_to_datetime(0.0),
            stop: epoch_to_datetime(200.0),
        };
        assert_eq!(store.query(range, "modes").expect("query").len(), 1);
    }

    #[test]
    fn test_scripted_failures() {
        let store = MemoryStore::new();
        let mut handle = store.clone();
        store.fail_next_writes(1);
        assert!(handle.write(&[record(1.0, "modes")]).is_err());
        assert!(handle.write(&[record(1.0, "modes")]).is_ok());
        // Clones observe the same backing storage.
        assert_eq!(store.len(), 1);
    }
}
