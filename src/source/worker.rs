//! Per-source ingestion worker
//!
//! One worker thread owns one [`PhasorSource`]: it connects with exponential
//! backoff, blocks on `receive`, and forwards samples into the bounded event
//! channel shared with the coordinator. The worker never blocks on a full
//! channel: it keeps a small local pending queue and drops its own oldest
//! undelivered sample when even that overflows, because stale telemetry has
//! no operational value.

use crate::config::SupervisionConfig;
use crate::source::phasor::PhasorSource;
use crate::types::Sample;
use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Local pending-queue bound while the shared channel is full
const PENDING_MAX: usize = 64;

/// What happened on a source connection
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEventKind {
    /// Connection established
    Connected,
    /// Connection lost; the worker is backing off
    Disconnected,
    /// One decoded sample
    Sample(Sample),
}

/// Event forwarded from a worker to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    /// Source the event belongs to
    pub source_id: String,
    /// Event payload
    pub kind: SourceEventKind,
}

impl SourceEvent {
    fn new(source_id: &str, kind: SourceEventKind) -> Self {
        Self {
            source_id: source_id.to_string(),
            kind,
        }
    }
}

/// The per-source connect/receive loop
pub struct SourceWorker {
    source_id: String,
    source: Box<dyn PhasorSource>,
    events: Sender<SourceEvent>,
    stop: Arc<AtomicBool>,
    initial_delay: Duration,
    max_delay: Duration,
    pending: VecDeque<SourceEvent>,
    dropped: u64,
}

impl SourceWorker {
    /// Create a worker for one source
    pub fn new(
        source_id: String,
        source: Box<dyn PhasorSource>,
        events: Sender<SourceEvent>,
        stop: Arc<AtomicBool>,
        supervision: &SupervisionConfig,
    ) -> Self {
        Self {
            source_id,
            source,
            events,
            stop,
            initial_delay: Duration::from_secs_f64(supervision.initial_reconnect_delay_s),
            max_delay: Duration::from_secs_f64(supervision.max_reconnect_delay_s),
            pending: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Run until the stop flag is set
    pub fn run(mut self) {
        tracing::info!("Source worker '{}' started", self.source_id);
        let mut delay = self.initial_delay;

        while !self.stop.load(Ordering::SeqCst) {
            match self.source.connect() {
                Ok(()) => {
                    tracing::info!("Connected to source '{}'", self.source_id);
                    delay = self.initial_delay;
                    self.forward(SourceEventKind::Connected);
                    self.receive_loop();
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    self.forward(SourceEventKind::Disconnected);
                }
                Err(e) => {
                    tracing::warn!(
                        "Connection to '{}' failed: {}; retrying in {:?}",
                        self.source_id,
                        e,
                        delay
                    );
                }
            }
            self.sleep_interruptible(delay);
            delay = (delay * 2).min(self.max_delay);
        }

        self.source.disconnect();
        if self.dropped > 0 {
            tracing::warn!(
                "Source worker '{}' dropped {} samples on a full queue",
                self.source_id,
                self.dropped
            );
        }
        tracing::info!("Source worker '{}' stopped", self.source_id);
    }

    /// Receive until the connection drops or the stop flag is set
    fn receive_loop(&mut self) {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            match self.source.receive() {
                Ok(sample) => self.forward(SourceEventKind::Sample(sample)),
                Err(e) => {
                    if !self.stop.load(Ordering::SeqCst) {
                        tracing::warn!("Source '{}' receive failed: {}", self.source_id, e);
                    }
                    self.source.disconnect();
                    return;
                }
            }
        }
    }

    /// Queue an event and push as much of the pending queue as fits.
    ///
    /// On a full channel the oldest pending sample is dropped first; the
    /// channel itself is never blocked on.
    fn forward(&mut self, kind: SourceEventKind) {
        self.pending
            .push_back(SourceEvent::new(&self.source_id, kind));

        while let Some(event) = self.pending.pop_front() {
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.pending.push_front(event);
                    if self.pending.len() > PENDING_MAX {
                        self.pending.pop_front();
                        self.dropped += 1;
                    }
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    // Coordinator is gone; time to stop.
                    self.stop.store(true, Ordering::SeqCst);
                    return;
                }
            }
        }
    }

    /// Sleep in small slices so the stop flag stays responsive
    fn sleep_interruptible(&self, duration: Duration) {
        let slice = Duration::from_millis(50);
        let mut remaining = duration;
        while remaining > Duration::ZERO && !self.stop.load(Ordering::SeqCst) {
            let step = remaining.min(slice);
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
    }

    /// Samples dropped due to sustained backpressure
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisionConfig;
    use crate::source::mock::MockPhasorSource;
    use crossbeam_channel::bounded;

    fn fast_supervision() -> SupervisionConfig {
        SupervisionConfig {
            initial_reconnect_delay_s: 0.01,
            max_reconnect_delay_s: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_worker_forwards_samples_and_stops() {
        let (tx, rx) = bounded(256);
        let stop = Arc::new(AtomicBool::new(false));
        let source = Box::new(MockPhasorSource::new("PMU 1", 25.0).with_time_compression(0.0));
        let worker = SourceWorker::new(
            "PMU 1".to_string(),
            source,
            tx,
            stop.clone(),
            &fast_supervision(),
        );
        let handle = std::thread::spawn(move || worker.run());

        // First event is the connection notice, then samples flow.
        let first = rx.recv_timeout(Duration::from_secs(2)).expect("event");
        assert_eq!(first.kind, SourceEventKind::Connected);
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("event");
        assert!(matches!(second.kind, SourceEventKind::Sample(_)));

        stop.store(true, Ordering::SeqCst);
        // Keep draining so the worker never wedges on a full channel.
        while !handle.is_finished() {
            let _ = rx.try_recv();
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.join().expect("worker thread");
    }

    #[test]
    fn test_worker_reconnects_after_loss() {
        let (tx, rx) = bounded(1024);
        let stop = Arc::new(AtomicBool::new(false));
        let source = Box::new(
            MockPhasorSource::new("PMU 1", 25.0)
                .with_time_compression(0.0)
                .with_disconnect_after(2),
        );
        let worker = SourceWorker::new(
            "PMU 1".to_string(),
            source,
            tx,
            stop.clone(),
            &fast_supervision(),
        );
        let handle = std::thread::spawn(move || worker.run());

        let mut connects = 0;
        let mut disconnects = 0;
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while connects < 2 && std::time::Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
                match event.kind {
                    SourceEventKind::Connected => connects += 1,
                    SourceEventKind::Disconnected => disconnects += 1,
                    SourceEventKind::Sample(_) => {}
                }
            }
        }
        assert!(connects >= 2, "worker should reconnect after loss");
        assert!(disconnects >= 1);

        stop.store(true, Ordering::SeqCst);
        while !handle.is_finished() {
            let _ = rx.try_recv();
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.join().expect("worker thread");
    }

    #[test]
    fn test_backpressure_drops_oldest_not_blocks() {
        let (tx, rx) = bounded(4);
        let stop = Arc::new(AtomicBool::new(false));
        let source = Box::new(MockPhasorSource::new("PMU 1", 25.0).with_time_compression(0.0));
        let mut worker = SourceWorker::new(
            "PMU 1".to_string(),
            source,
            tx,
            stop.clone(),
            &fast_supervision(),
        );

        worker.source.connect().expect("connect");
        // Push far more samples than channel + pending can hold; forward
        // must never block and must count drops.
        for _ in 0..(4 + PENDING_MAX + 10) {
            let sample = worker.source.receive().expect("sample");
            worker.forward(SourceEventKind::Sample(sample));
        }
        assert!(worker.dropped() >= 10);
        assert_eq!(rx.len(), 4);
    }
}
