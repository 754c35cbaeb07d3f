//! Throughput accounting and the restart watchdog
//!
//! Local retry handles transient faults, but sustained degradation
//! (prolonged partial-source availability or a collapsed frame rate) is
//! treated as unrecoverable in-process. The [`RestartWatchdog`] measures how
//! long the system has been out of shape and escalates to a full restart
//! once a bound is exceeded, rather than running degraded indefinitely.
//!
//! Both types take `now` explicitly so the escalation logic is testable
//! without waiting out real timeouts.

use crate::config::SupervisionConfig;
use crate::types::ThroughputMetrics;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of rate observations kept for the moving average
const RATE_HISTORY: usize = 10;

/// Frames-per-second accounting over one-second intervals
#[derive(Debug)]
pub struct ThroughputMonitor {
    metrics: ThroughputMetrics,
    rate_history: VecDeque<f64>,
    last_count: u64,
    last_check: Instant,
    min_acceptable_rate: f64,
}

impl ThroughputMonitor {
    /// Create a monitor; rates below `min_acceptable_rate` count as low
    pub fn new(min_acceptable_rate: f64, now: Instant) -> Self {
        Self {
            metrics: ThroughputMetrics::default(),
            rate_history: VecDeque::with_capacity(RATE_HISTORY),
            last_count: 0,
            last_check: now,
            min_acceptable_rate,
        }
    }

    /// Update with the cumulative aligned-frame count and current queue and
    /// buffer occupancy. Rates are recomputed at most once per second.
    pub fn update(
        &mut self,
        total_frames: u64,
        buffer_lens: &[usize],
        queue_len: usize,
        now: Instant,
    ) {
        let elapsed = now.duration_since(self.last_check).as_secs_f64();
        if elapsed < 1.0 {
            return;
        }
        let frames = total_frames.saturating_sub(self.last_count);
        let rate = frames as f64 / elapsed;

        if self.rate_history.len() == RATE_HISTORY {
            self.rate_history.pop_front();
        }
        self.rate_history.push_back(rate);

        self.metrics.current_rate = rate;
        self.metrics.avg_buffer_len = if buffer_lens.is_empty() {
            0.0
        } else {
            buffer_lens.iter().sum::<usize>() as f64 / buffer_lens.len() as f64
        };
        self.metrics.queue_len = queue_len;
        if rate < self.min_acceptable_rate {
            self.metrics.consecutive_low_rate += 1;
        } else {
            self.metrics.consecutive_low_rate = 0;
        }

        self.last_count = total_frames;
        self.last_check = now;
    }

    /// Moving average of the recent frame rate
    pub fn avg_rate(&self) -> f64 {
        if self.rate_history.is_empty() {
            return 0.0;
        }
        self.rate_history.iter().sum::<f64>() / self.rate_history.len() as f64
    }

    /// Latest metrics snapshot
    pub fn metrics(&self) -> ThroughputMetrics {
        self.metrics
    }
}

/// Why the watchdog requested a restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// Fewer than all sources were healthy for too long
    DegradedSources { healthy: usize, total: usize },
    /// Average throughput stayed below the low-rate threshold for too long
    LowThroughput,
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartReason::DegradedSources { healthy, total } => {
                write!(f, "only {}/{} sources healthy for too long", healthy, total)
            }
            RestartReason::LowThroughput => write!(f, "sustained low throughput"),
        }
    }
}

/// Escalates sustained degradation to a restart request
#[derive(Debug)]
pub struct RestartWatchdog {
    started_at: Instant,
    degraded_since: Option<Instant>,
    low_rate_since: Option<Instant>,
    restart_after_degraded: Duration,
    low_rate_threshold: f64,
    low_rate_duration: Duration,
    startup_grace: Duration,
    fired: bool,
}

impl RestartWatchdog {
    /// Create a watchdog armed at `now`
    pub fn new(supervision: &SupervisionConfig, now: Instant) -> Self {
        Self {
            started_at: now,
            degraded_since: None,
            low_rate_since: None,
            restart_after_degraded: Duration::from_secs_f64(supervision.restart_after_degraded_s),
            low_rate_threshold: supervision.low_rate_threshold,
            low_rate_duration: Duration::from_secs_f64(supervision.low_rate_duration_s),
            startup_grace: Duration::from_secs_f64(supervision.startup_grace_s),
            fired: false,
        }
    }

    /// Observe the current system shape; returns a reason at most once.
    ///
    /// `healthy`/`total` describe source health, `avg_rate` is the moving
    /// average aligned-frame rate.
    pub fn observe(
        &mut self,
        healthy: usize,
        total: usize,
        avg_rate: f64,
        now: Instant,
    ) -> Option<RestartReason> {
        if self.fired {
            return None;
        }

        if healthy < total {
            let since = *self.degraded_since.get_or_insert(now);
            if now.duration_since(since) > self.restart_after_degraded {
                self.fired = true;
                return Some(RestartReason::DegradedSources { healthy, total });
            }
        } else {
            self.degraded_since = None;
        }

        // The rate needs time to build up after start; stay disarmed during
        // the grace period.
        if now.duration_since(self.started_at) > self.startup_grace {
            if avg_rate < self.low_rate_threshold {
                let since = *self.low_rate_since.get_or_insert(now);
                if now.duration_since(since) > self.low_rate_duration {
                    self.fired = true;
                    return Some(RestartReason::LowThroughput);
                }
            } else {
                self.low_rate_since = None;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervision() -> SupervisionConfig {
        SupervisionConfig::default()
    }

    fn at(t0: Instant, secs: f64) -> Instant {
        t0 + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_degraded_sources_escalate_once() {
        let t0 = Instant::now();
        let mut wd = RestartWatchdog::new(&supervision(), t0);

        // One source stale, the other online; healthy rate throughout.
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 1.0)), None);
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 10.0)), None);
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 20.5)), None);
        let fired = wd.observe(1, 2, 25.0, at(t0, 21.5));
        assert_eq!(
            fired,
            Some(RestartReason::DegradedSources {
                healthy: 1,
                total: 2
            })
        );
        // The restart path is invoked exactly once.
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 30.0)), None);
    }

    #[test]
    fn test_recovery_resets_degraded_timer() {
        let t0 = Instant::now();
        let mut wd = RestartWatchdog::new(&supervision(), t0);

        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 1.0)), None);
        // Full health clears the timer...
        assert_eq!(wd.observe(2, 2, 25.0, at(t0, 15.0)), None);
        // ...so renewed degradation starts counting from scratch.
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 16.0)), None);
        assert_eq!(wd.observe(1, 2, 25.0, at(t0, 35.0)), None);
        assert!(wd.observe(1, 2, 25.0, at(t0, 36.5)).is_some());
    }

    #[test]
    fn test_low_rate_waits_for_grace_period() {
        let t0 = Instant::now();
        let mut wd = RestartWatchdog::new(&supervision(), t0);

        // All sources healthy, rate is terrible; within the grace period the
        // low-rate watchdog stays disarmed.
        assert_eq!(wd.observe(2, 2, 0.0, at(t0, 5.0)), None);
        assert_eq!(wd.observe(2, 2, 0.0, at(t0, 19.0)), None);
        // Grace over at 20 s; the low-rate clock starts.
        assert_eq!(wd.observe(2, 2, 0.0, at(t0, 21.0)), None);
        assert_eq!(wd.observe(2, 2, 0.0, at(t0, 50.0)), None);
        assert_eq!(
            wd.observe(2, 2, 0.0, at(t0, 52.0)),
            Some(RestartReason::LowThroughput)
        );
    }

    #[test]
    fn test_healthy_rate_resets_low_rate_timer() {
        let t0 = Instant::now();
        let mut wd = RestartWatchdog::new(&supervision(), t0);

        assert_eq!(wd.observe(2, 2, 5.0, at(t0, 25.0)), None);
        assert_eq!(wd.observe(2, 2, 25.0, at(t0, 40.0)), None);
        assert_eq!(wd.observe(2, 2, 5.0, at(t0, 41.0)), None);
        // Only 29 s of continuous low rate since the reset.
        assert_eq!(wd.observe(2, 2, 5.0, at(t0, 70.0)), None);
        assert!(wd.observe(2, 2, 5.0, at(t0, 71.5)).is_some());
    }

    #[test]
    fn test_throughput_monitor_rates() {
        let t0 = Instant::now();
        let mut mon = ThroughputMonitor::new(15.0, t0);

        // Sub-second updates are ignored.
        mon.update(10, &[5, 7], 3, at(t0, 0.5));
        assert_eq!(mon.avg_rate(), 0.0);

        mon.update(25, &[5, 7], 3, at(t0, 1.0));
        assert!((mon.metrics().current_rate - 25.0).abs() < 1e-9);
        assert_eq!(mon.metrics().consecutive_low_rate, 0);
        assert!((mon.metrics().avg_buffer_len - 6.0).abs() < 1e-9);

        // A slow second interval counts as low rate.
        mon.update(30, &[0, 0], 0, at(t0, 2.0));
        assert_eq!(mon.metrics().consecutive_low_rate, 1);
        assert!((mon.avg_rate() - 15.0).abs() < 1e-9);
    }
}
