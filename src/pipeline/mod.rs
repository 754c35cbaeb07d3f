//! Orchestration: band pipelines, supervision monitors, the coordinator
//!
//! The [`Coordinator`] runs the single-threaded poll loop tying the whole
//! system together: it drains worker events, drives synchronization, feeds
//! the rolling window, periodically runs the analysis chain and flushes
//! results to the store. [`BandPipeline`] holds the per-band acceptance and
//! smoothing state; [`RestartWatchdog`] and [`ThroughputMonitor`] implement
//! the fail-fast escalation policy.

pub mod band;
pub mod coordinator;
pub mod monitor;

pub use band::{BandPipeline, BandReading};
pub use coordinator::{Coordinator, RunOutcome};
pub use monitor::{RestartReason, RestartWatchdog, ThroughputMonitor};
