//! # oscimon: Wide-Area Oscillation Monitor
//!
//! Ingests streaming synchrophasor measurements from multiple grid sensors,
//! aligns them onto a common time base, and continuously estimates
//! low-frequency electromechanical oscillation modes (frequency and damping
//! ratio) via covariance-driven stochastic subspace identification. Damping
//! estimates are smoothed per frequency band and emitted, rate limited, to a
//! time-series store for operator display and alarm logic.
//!
//! ## Architecture
//!
//! - **Sources**: one worker thread per sensor performs blocking I/O behind
//!   the [`source::PhasorSource`] trait and forwards samples into a bounded
//!   channel
//! - **Coordinator**: a single-threaded poll loop owns all mutable pipeline
//!   state (stream buffers, the rolling window, band pipelines), so the
//!   data path needs no locks
//! - **Analysis**: band-pass, subspace identification, candidate clustering
//!   and adaptive smoothing run synchronously inside the coordinator tick
//! - **Store**: persistence sits behind the narrow
//!   [`store::TimeSeriesStore`] boundary; write failures are retried
//!
//! ## Example
//!
//! ```ignore
//! use oscimon::config::AppConfig;
//! use oscimon::pipeline::Coordinator;
//! use oscimon::source::{self, MockPhasorSource};
//! use oscimon::store::MemoryStore;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let config = AppConfig::default();
//! let stop = Arc::new(AtomicBool::new(false));
//! let (tx, rx) = crossbeam_channel::bounded(config.ingest.queue_capacity);
//!
//! let workers = source::spawn_workers(
//!     &config,
//!     |s| Box::new(MockPhasorSource::new(&s.name, config.ingest.sampling_rate_hz)),
//!     tx,
//!     stop.clone(),
//! );
//!
//! let mut coordinator = Coordinator::new(
//!     config.clone(),
//!     rx,
//!     Box::new(MemoryStore::new()),
//!     stop.clone(),
//! );
//! let outcome = coordinator.run();
//!
//! source::join_workers(workers, &config.supervision);
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{OscimonError, Result};
pub use pipeline::{Coordinator, RunOutcome};
pub use source::{MockPhasorSource, PhasorSource};
pub use store::{InfluxStore, MemoryStore, ModeRecord, TimeSeriesStore};
pub use types::{AlignedFrame, Sample, SourceState};
