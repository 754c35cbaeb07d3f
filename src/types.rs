//! Core data types for the oscillation monitor
//!
//! This module contains the fundamental data structures shared across the
//! ingestion and analysis pipeline.
//!
//! # Main Types
//!
//! - [`Sample`] - One timestamped multi-channel measurement from a source
//! - [`AlignedFrame`] - One sample per healthy source on a common time base
//! - [`SourceState`] / [`SourceHealth`] - Per-source liveness state
//! - [`IngestStats`] - Counters for the ingestion path
//! - [`ThroughputMetrics`] - Snapshot of the coordinator's throughput

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Fixed channel layout index of the frequency measurement
pub const CHANNEL_FREQUENCY: usize = 0;

/// Fixed channel layout index of the phase angle
pub const CHANNEL_ANGLE: usize = 1;

/// Fixed channel layout index of the computed three-phase active power
pub const CHANNEL_ACTIVE_POWER: usize = 2;

/// One timestamped measurement from a phasor source.
///
/// Immutable once created. The channel vector has a fixed per-source layout:
/// `[frequency, phase_angle, active_power]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Name of the source that produced this sample
    pub source_id: String,
    /// Epoch seconds with sub-millisecond precision
    pub timestamp: f64,
    /// Measurement channels in the fixed layout order
    pub channels: Vec<f64>,
}

impl Sample {
    /// Create a new sample
    pub fn new(source_id: impl Into<String>, timestamp: f64, channels: Vec<f64>) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            channels,
        }
    }

    /// Channel value by index, if present
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.channels.get(index).copied()
    }
}

/// One sample per healthy source, all within the alignment tolerance.
///
/// The frame timestamp is quantized to the nearest multiple of the sampling
/// interval. Frames are consumed immediately into the rolling window and
/// never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    /// Quantized timestamp (epoch seconds)
    pub timestamp: f64,
    /// One sample per participating source, in configured source order
    pub samples: Vec<Sample>,
}

impl AlignedFrame {
    /// Look up the sample contributed by a given source
    pub fn sample_for(&self, source_id: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.source_id == source_id)
    }
}

/// Liveness state of one phasor source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    /// No sample received yet since process start
    Init,
    /// Receiving samples
    Online,
    /// Connection lost, worker is retrying with backoff
    Reconnecting,
    /// Connected but no sample within the staleness timeout
    Stale,
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceState::Init => write!(f, "INIT"),
            SourceState::Online => write!(f, "ONLINE"),
            SourceState::Reconnecting => write!(f, "RECONNECTING"),
            SourceState::Stale => write!(f, "STALE"),
        }
    }
}

/// Health record for one source, owned by the connection supervisor
#[derive(Debug, Clone)]
pub struct SourceHealth {
    /// Current liveness state
    pub state: SourceState,
    /// Wall-clock instant of the last received sample, if any
    pub last_seen: Option<Instant>,
}

impl SourceHealth {
    /// Initial health record for a source that has not produced data yet
    pub fn new() -> Self {
        Self {
            state: SourceState::Init,
            last_seen: None,
        }
    }
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the ingestion path
///
/// Discards are an expected part of resynchronization and backpressure,
/// tracked here rather than surfaced as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    /// Samples accepted into stream buffers
    pub samples_buffered: u64,
    /// Aligned frames emitted by the synchronizer
    pub frames_aligned: u64,
    /// Samples discarded during resynchronization
    pub samples_discarded: u64,
    /// Samples evicted from full stream buffers
    pub samples_evicted: u64,
    /// Mode records accepted by the store
    pub records_written: u64,
}

/// Snapshot of the coordinator's recent throughput
#[derive(Debug, Clone, Copy, Default)]
pub struct ThroughputMetrics {
    /// Aligned frames per second over the last interval
    pub current_rate: f64,
    /// Mean stream-buffer occupancy at the last report
    pub avg_buffer_len: f64,
    /// Event-queue occupancy at the last report
    pub queue_len: usize,
    /// Consecutive reporting intervals below the acceptable rate
    pub consecutive_low_rate: u32,
}
