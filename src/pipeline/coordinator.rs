//! The coordinator poll loop
//!
//! A single thread owns every piece of mutable pipeline state: stream
//! buffers, the rolling window, band pipelines and the pending output
//! batch. Source workers only ever talk to it through the bounded event
//! channel, so no locking is needed anywhere in the data path.
//!
//! Each tick the loop drains pending events, updates source health,
//! aligns frames into the rolling window, periodically runs the analysis
//! chain, flushes accumulated output and feeds the restart watchdog.

use crate::analysis::{BandpassFilter, ModalEstimator, ModeSelector, RollingWindow};
use crate::config::AppConfig;
use crate::pipeline::band::BandPipeline;
use crate::pipeline::monitor::{RestartReason, RestartWatchdog, ThroughputMonitor};
use crate::source::{ConnectionSupervisor, SourceEvent, SourceEventKind};
use crate::store::{epoch_to_datetime, ModeRecord, TimeSeriesStore};
use crate::sync::Synchronizer;
use crate::types::IngestStats;
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How the coordinator loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stop flag observed; normal shutdown
    Stopped,
    /// The watchdog escalated sustained degradation; the host process
    /// should arrange a full restart
    RestartRequired(RestartReason),
}

/// Single-consumer orchestration loop
pub struct Coordinator {
    config: AppConfig,
    events: Receiver<SourceEvent>,
    supervisor: ConnectionSupervisor,
    synchronizer: Synchronizer,
    window: RollingWindow,
    bandpass: BandpassFilter,
    estimator: ModalEstimator,
    bands: Vec<BandPipeline>,
    store: Box<dyn TimeSeriesStore>,
    stop: Arc<AtomicBool>,
    monitor: ThroughputMonitor,
    watchdog: RestartWatchdog,
    stats: IngestStats,
    pending: Vec<ModeRecord>,
    last_analysis: Instant,
    last_flush: Instant,
    /// Data-time of the last emitted result set, for rate limiting
    last_emit_ts: Option<f64>,
}

impl Coordinator {
    /// Wire up a coordinator from configuration
    pub fn new(
        config: AppConfig,
        events: Receiver<SourceEvent>,
        store: Box<dyn TimeSeriesStore>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let now = Instant::now();
        let source_ids: Vec<String> = config.sources.iter().map(|s| s.name.clone()).collect();

        let supervisor = ConnectionSupervisor::new(
            source_ids.clone(),
            Duration::from_secs_f64(config.supervision.stale_timeout_s),
        );
        let synchronizer = Synchronizer::new(
            source_ids.clone(),
            config.ingest.buffer_capacity,
            config.ingest.time_tolerance_s,
            config.ingest.frame_interval_s(),
            config.ingest.min_sources,
        );
        let window = RollingWindow::new(
            source_ids,
            config.analysis.window_capacity(),
            config.analysis.channel_index,
        );
        let bandpass = BandpassFilter::new(
            config.analysis.passband_hz[0],
            config.analysis.passband_hz[1],
        );
        let estimator = ModalEstimator::new(
            config.ingest.sampling_rate_hz,
            config.analysis.pole_freq_range_hz,
        );
        let selector = ModeSelector::new(
            config.analysis.cluster_tolerance_hz,
            config.analysis.min_votes,
        );
        let bands = config
            .bands
            .iter()
            .map(|band| {
                BandPipeline::new(
                    band.clone(),
                    selector.clone(),
                    config.emission.damping_min,
                    config.emission.damping_max,
                )
            })
            .collect();
        // A rate below 60% of nominal counts as unacceptable.
        let monitor = ThroughputMonitor::new(config.ingest.sampling_rate_hz * 0.6, now);
        let watchdog = RestartWatchdog::new(&config.supervision, now);

        Self {
            events,
            supervisor,
            synchronizer,
            window,
            bandpass,
            estimator,
            bands,
            store,
            stop,
            monitor,
            watchdog,
            stats: IngestStats::default(),
            pending: Vec::new(),
            last_analysis: now,
            last_flush: now,
            last_emit_ts: None,
            config,
        }
    }

    /// Run until the stop flag is set or the watchdog escalates
    pub fn run(&mut self) -> RunOutcome {
        tracing::info!(
            "Coordinator started: {} sources, {} bands, window {} samples",
            self.supervisor.total(),
            self.bands.len(),
            self.config.analysis.window_capacity()
        );
        let tick = Duration::from_millis(self.config.ingest.tick_interval_ms);
        let cadence = Duration::from_secs_f64(self.config.analysis.cadence_s);
        let flush_interval = Duration::from_secs_f64(self.config.emission.flush_interval_s);

        let outcome = loop {
            if self.stop.load(Ordering::SeqCst) {
                break RunOutcome::Stopped;
            }
            let now = Instant::now();

            self.drain_events(now);
            self.supervisor.check_staleness(now);
            self.align_frames();

            if now.duration_since(self.last_analysis) >= cadence {
                self.run_analysis();
                self.last_analysis = now;
            }

            if now.duration_since(self.last_flush) >= flush_interval {
                self.flush();
                self.last_flush = now;
                let metrics = self.monitor.metrics();
                tracing::debug!(
                    "rate {:.1} fps | buffers {:.1} | queue {} | discarded {} | written {}",
                    metrics.current_rate,
                    metrics.avg_buffer_len,
                    metrics.queue_len,
                    self.synchronizer.discarded(),
                    self.stats.records_written
                );
            }

            self.monitor.update(
                self.stats.frames_aligned,
                &self.synchronizer.buffer_lens(),
                self.events.len(),
                now,
            );
            if let Some(reason) = self.watchdog.observe(
                self.supervisor.healthy_count(),
                self.supervisor.total(),
                self.monitor.avg_rate(),
                now,
            ) {
                tracing::error!("Watchdog escalation: {}", reason);
                break RunOutcome::RestartRequired(reason);
            }

            std::thread::sleep(tick);
        };

        // Orderly drain: whatever happened, push out what we have.
        self.flush();
        tracing::info!(
            "Coordinator stopped: {} frames aligned, {} records written, {} samples discarded",
            self.stats.frames_aligned,
            self.stats.records_written,
            self.synchronizer.discarded()
        );
        outcome
    }

    /// Ingestion counters
    pub fn stats(&self) -> IngestStats {
        let mut stats = self.stats;
        stats.samples_discarded = self.synchronizer.discarded();
        stats.samples_evicted = self.synchronizer.evicted();
        stats
    }

    /// Drain a bounded batch of worker events into health and buffers
    fn drain_events(&mut self, now: Instant) {
        for _ in 0..self.config.ingest.drain_batch {
            match self.events.try_recv() {
                Ok(event) => {
                    self.supervisor.on_event(&event, now);
                    if let SourceEventKind::Sample(sample) = event.kind {
                        self.synchronizer.add(sample);
                        self.stats.samples_buffered += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("All source workers gone; stopping");
                    self.stop.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Move every alignable frame from the buffers into the rolling window
    fn align_frames(&mut self) {
        let healthy = self.supervisor.healthy();
        while let Some(frame) = self.synchronizer.try_align(&healthy) {
            self.window.push_frame(&frame);
            self.stats.frames_aligned += 1;
        }
    }

    /// Run the full analysis chain once, if the window and rate limit allow
    fn run_analysis(&mut self) {
        if !self.window.is_full() {
            tracing::debug!(
                "Buffering {}/{} frames",
                self.window.len(),
                self.config.analysis.window_capacity()
            );
            return;
        }
        let Some(ts_now) = self.window.latest_timestamp() else {
            return;
        };
        if let Some(last) = self.last_emit_ts {
            if ts_now - last < self.config.emission.min_interval_s {
                return;
            }
        }

        let channels = self
            .window
            .usable_channels(self.config.analysis.max_gap_ratio);
        if channels.len() < self.config.analysis.min_channels {
            tracing::debug!(
                "Skipping analysis cycle: only {} usable channels",
                channels.len()
            );
            return;
        }
        let source_names: Vec<String> = channels.iter().map(|(id, _)| id.clone()).collect();

        let sample_rate = self.config.ingest.sampling_rate_hz;
        let mut candidates = Vec::new();
        for &window_len in &self.config.analysis.window_lengths {
            let filtered: Vec<Vec<f64>> = channels
                .iter()
                .filter(|(_, series)| series.len() >= window_len)
                .map(|(_, series)| {
                    self.bandpass
                        .apply(&series[series.len() - window_len..], sample_rate)
                })
                .collect();
            if filtered.len() < self.config.analysis.min_channels {
                continue;
            }
            for &order in &self.config.analysis.model_orders {
                match self.estimator.estimate(&filtered, order) {
                    Ok(found) => candidates.extend(found),
                    Err(e) => {
                        // Expected on bad windows; the cycle carries on.
                        tracing::trace!(
                            "Estimation failed (window {}, order {}): {}",
                            window_len,
                            order,
                            e
                        );
                    }
                }
            }
        }

        let mut fields = Vec::new();
        for band in &mut self.bands {
            if let Some(reading) = band.process(&candidates) {
                tracing::info!(
                    "Band '{}': {:.3} Hz, damping {:.2}% (smoothed {:.2}%, {} votes)",
                    reading.band_id,
                    reading.frequency,
                    reading.damping,
                    reading.damping_smoothed,
                    reading.votes
                );
                fields.push((format!("{}_f", reading.band_id), round_to(reading.frequency, 3)));
                fields.push((format!("{}_d", reading.band_id), round_to(reading.damping, 2)));
                fields.push((
                    format!("{}_d_smooth", reading.band_id),
                    round_to(reading.damping_smoothed, 2),
                ));
            }
        }

        if !fields.is_empty() {
            self.pending.push(ModeRecord {
                timestamp: epoch_to_datetime(ts_now),
                measurement: self.config.store.measurement.clone(),
                tags: vec![("sources".to_string(), source_names.join(","))],
                fields,
            });
            self.last_emit_ts = Some(ts_now);
        }
    }

    /// Write pending records; on failure keep them for the next cycle
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        match self.store.write(&self.pending) {
            Ok(()) => {
                self.stats.records_written += self.pending.len() as u64;
                self.pending.clear();
            }
            Err(e) => {
                tracing::warn!(
                    "Store write failed, retaining {} records: {}",
                    self.pending.len(),
                    e
                );
            }
        }
    }
}

/// Round to a fixed number of decimal places for stable store payloads
fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
