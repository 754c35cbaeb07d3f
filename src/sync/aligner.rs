//! Tolerance-based multi-stream alignment
//!
//! The [`Synchronizer`] owns one [`StreamBuffer`] per configured source and
//! produces [`AlignedFrame`]s: one sample per healthy source, all within the
//! configured timestamp tolerance, tagged with a timestamp quantized to the
//! sampling-interval grid.
//!
//! When the oldest pending samples drift apart by more than the tolerance,
//! the synchronizer discards every sample older than the newest head instead
//! of emitting a frame. This realigns lagging sources at the cost of dropped
//! samples; the drop count is an observable counter, not an error.

use crate::sync::buffer::StreamBuffer;
use crate::types::{AlignedFrame, Sample};
use std::collections::HashMap;

/// Aligns the oldest unconsumed sample across healthy sources
#[derive(Debug)]
pub struct Synchronizer {
    buffers: HashMap<String, StreamBuffer>,
    /// Configured source order, used for deterministic frame layout
    source_order: Vec<String>,
    time_tolerance: f64,
    frame_interval: f64,
    min_sources: usize,
    discarded: u64,
}

impl Synchronizer {
    /// Create a synchronizer for the given sources.
    ///
    /// `frame_interval` is the nominal sampling interval in seconds; aligned
    /// frame timestamps are rounded to the nearest multiple of it.
    pub fn new(
        source_ids: impl IntoIterator<Item = String>,
        buffer_capacity: usize,
        time_tolerance: f64,
        frame_interval: f64,
        min_sources: usize,
    ) -> Self {
        let source_order: Vec<String> = source_ids.into_iter().collect();
        let buffers = source_order
            .iter()
            .map(|id| (id.clone(), StreamBuffer::new(buffer_capacity)))
            .collect();
        Self {
            buffers,
            source_order,
            time_tolerance,
            frame_interval,
            min_sources,
            discarded: 0,
        }
    }

    /// Append a sample to its source's buffer. Unknown sources are ignored.
    pub fn add(&mut self, sample: Sample) {
        if let Some(buffer) = self.buffers.get_mut(&sample.source_id) {
            buffer.add(sample);
        } else {
            tracing::warn!("Dropping sample from unknown source '{}'", sample.source_id);
        }
    }

    /// Attempt to align one frame across the given healthy sources.
    ///
    /// Returns `None` when fewer than the configured minimum of sources are
    /// healthy, when any healthy buffer is empty, or when a resync was
    /// performed instead of emitting a frame. The decision depends only on
    /// the oldest pending sample per source, so repeated calls on identical
    /// buffer contents behave identically.
    pub fn try_align(&mut self, healthy: &[String]) -> Option<AlignedFrame> {
        if healthy.len() < self.min_sources {
            return None;
        }
        let mut oldest = Vec::with_capacity(healthy.len());
        for id in healthy {
            let buffer = self.buffers.get(id)?;
            oldest.push(buffer.peek_oldest()?.timestamp);
        }

        let min_ts = oldest.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_ts = oldest.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if max_ts - min_ts <= self.time_tolerance {
            // In-tolerance: consume exactly one sample per source, ordered
            // by the configured source layout.
            let mut samples = Vec::with_capacity(healthy.len());
            for id in &self.source_order {
                if !healthy.contains(id) {
                    continue;
                }
                if let Some(buffer) = self.buffers.get_mut(id) {
                    if let Some(sample) = buffer.pop_oldest() {
                        samples.push(sample);
                    }
                }
            }
            Some(AlignedFrame {
                timestamp: self.quantize(max_ts),
                samples,
            })
        } else {
            // Drift exceeded tolerance: discard everything older than the
            // newest head so the next attempt starts from a common point.
            for id in healthy {
                if let Some(buffer) = self.buffers.get_mut(id) {
                    self.discarded += buffer.discard_before(max_ts);
                }
            }
            None
        }
    }

    /// Round a timestamp to the nearest multiple of the sampling interval
    fn quantize(&self, timestamp: f64) -> f64 {
        (timestamp / self.frame_interval).round() * self.frame_interval
    }

    /// Total samples discarded by resynchronization
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Total samples evicted from full buffers
    pub fn evicted(&self) -> u64 {
        self.buffers.values().map(|b| b.evicted()).sum()
    }

    /// Current occupancy of each source buffer, in configured order
    pub fn buffer_lens(&self) -> Vec<usize> {
        self.source_order
            .iter()
            .filter_map(|id| self.buffers.get(id))
            .map(|b| b.len())
            .collect()
    }
}
