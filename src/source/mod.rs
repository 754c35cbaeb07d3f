//! Phasor-source boundary and ingestion workers
//!
//! Each configured source runs one worker thread performing blocking I/O
//! against a [`PhasorSource`] implementation and forwarding decoded samples
//! into a single bounded channel. The coordinator is the channel's only
//! consumer; workers never touch shared pipeline state.
//!
//! # Components
//!
//! - [`PhasorSource`] - trait seam to the external sensor connection
//! - [`MockPhasorSource`] - simulated source for tests and `--simulate` runs
//! - [`SourceWorker`] - per-source connect/retry loop with backoff
//! - [`ConnectionSupervisor`] - per-source liveness state machine

pub mod mock;
pub mod phasor;
pub mod supervisor;
pub mod worker;

pub use mock::{MockPhasorSource, SignalPattern};
pub use phasor::{PhasorSource, SourceStats};
pub use supervisor::ConnectionSupervisor;
pub use worker::{SourceEvent, SourceEventKind, SourceWorker};

use crate::config::{AppConfig, SupervisionConfig};
use crossbeam_channel::Sender;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Spawn one worker thread per source.
///
/// `make_source` builds the [`PhasorSource`] for each configured source,
/// letting callers wire real connections or mocks without changing the
/// worker machinery.
pub fn spawn_workers(
    config: &AppConfig,
    make_source: impl Fn(&crate::config::SourceConfig) -> Box<dyn PhasorSource>,
    events: Sender<SourceEvent>,
    stop: Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    config
        .sources
        .iter()
        .map(|source_config| {
            let worker = SourceWorker::new(
                source_config.name.clone(),
                make_source(source_config),
                events.clone(),
                stop.clone(),
                &config.supervision,
            );
            let name = source_config.name.clone();
            std::thread::Builder::new()
                .name(format!("source-{}", name))
                .spawn(move || worker.run())
                .unwrap_or_else(|e| panic!("failed to spawn worker for '{}': {}", name, e))
        })
        .collect()
}

/// Wait for worker threads to finish, bounded by the configured grace
/// period.
///
/// Threads cannot be killed; workers still running after the grace period
/// are logged and abandoned, to be reclaimed by process exit.
pub fn join_workers(handles: Vec<JoinHandle<()>>, supervision: &SupervisionConfig) {
    let deadline = std::time::Instant::now()
        + std::time::Duration::from_secs_f64(supervision.shutdown_grace_s);
    let mut remaining = handles;
    loop {
        let (finished, still_running): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|h| h.is_finished());
        for handle in finished {
            let _ = handle.join();
        }
        remaining = still_running;
        if remaining.is_empty() || std::time::Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    for handle in remaining {
        tracing::warn!(
            "Source worker '{}' did not stop within the grace period; abandoning",
            handle.thread().name().unwrap_or("unnamed")
        );
    }
}
