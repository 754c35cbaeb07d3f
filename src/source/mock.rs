//! Simulated phasor source
//!
//! Generates synthetic synchrophasor streams for tests and `--simulate`
//! runs: a configurable signal pattern rides on the nominal 50 Hz system
//! frequency, with optional measurement noise, scripted connection failures
//! and time compression so long windows can be exercised quickly.

use crate::error::{OscimonError, Result};
use crate::source::phasor::{PhasorSource, SourceStats};
use crate::types::Sample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Nominal system frequency carried on the frequency channel
const NOMINAL_FREQUENCY_HZ: f64 = 50.0;

/// Signal pattern superimposed on the nominal frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Constant offset
    Constant(f64),
    /// Sustained sinusoid
    Sine { frequency: f64, amplitude: f64 },
    /// Exponentially decaying sinusoid, re-excited every `period_s` so the
    /// stream stays active over long runs
    DecayingSine {
        frequency: f64,
        damping_pct: f64,
        amplitude: f64,
        period_s: f64,
    },
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::DecayingSine {
            frequency: 0.6,
            damping_pct: 5.0,
            amplitude: 0.05,
            period_s: 30.0,
        }
    }
}

impl SignalPattern {
    /// Evaluate the pattern at time `t` seconds with phase offset `phase`
    fn value(&self, t: f64, phase: f64) -> f64 {
        match *self {
            SignalPattern::Constant(value) => value,
            SignalPattern::Sine {
                frequency,
                amplitude,
            } => amplitude * (2.0 * PI * frequency * t + phase).sin(),
            SignalPattern::DecayingSine {
                frequency,
                damping_pct,
                amplitude,
                period_s,
            } => {
                let zeta = damping_pct / 100.0;
                let omega_n = 2.0 * PI * frequency;
                let omega_d = omega_n * (1.0 - zeta * zeta).sqrt();
                let tau = if period_s > 0.0 { t % period_s } else { t };
                amplitude * (-zeta * omega_n * tau).exp() * (omega_d * tau + phase).sin()
            }
        }
    }
}

/// Simulated source producing pattern-generated samples
pub struct MockPhasorSource {
    name: String,
    pattern: SignalPattern,
    phase: f64,
    noise_amplitude: f64,
    sample_rate: f64,
    start_epoch: f64,
    /// Sleep per sample; `None` free-runs as fast as the consumer drains
    pace: Option<Duration>,
    /// Scripted number of connect attempts that fail before one succeeds
    connect_failures_left: usize,
    /// Drop the connection after this many samples, if set
    disconnect_after: Option<u64>,
    samples_since_connect: u64,
    connected: bool,
    index: u64,
    next_emit: Option<Instant>,
    rng: StdRng,
    stats: SourceStats,
}

impl MockPhasorSource {
    /// Create a simulated source emitting at `sample_rate` Hz in real time
    pub fn new(name: impl Into<String>, sample_rate: f64) -> Self {
        let name = name.into();
        let seed = name.bytes().map(u64::from).sum::<u64>();
        Self {
            name,
            pattern: SignalPattern::default(),
            phase: 0.0,
            noise_amplitude: 0.002,
            sample_rate,
            start_epoch: 1_700_000_000.0,
            pace: Some(Duration::from_secs_f64(1.0 / sample_rate)),
            connect_failures_left: 0,
            disconnect_after: None,
            samples_since_connect: 0,
            connected: false,
            index: 0,
            next_emit: None,
            rng: StdRng::seed_from_u64(seed),
            stats: SourceStats::default(),
        }
    }

    /// Set the signal pattern
    pub fn with_pattern(mut self, pattern: SignalPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Set the per-source phase offset of the pattern
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    /// Set the measurement-noise amplitude
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Set the epoch of the first sample timestamp
    pub fn with_start_epoch(mut self, epoch: f64) -> Self {
        self.start_epoch = epoch;
        self
    }

    /// Emit `factor` times faster than real time; data timestamps still
    /// advance by the nominal sampling interval. `0.0` free-runs.
    pub fn with_time_compression(mut self, factor: f64) -> Self {
        self.pace = if factor > 0.0 {
            Some(Duration::from_secs_f64(1.0 / (self.sample_rate * factor)))
        } else {
            None
        };
        self
    }

    /// Script the next `count` connect attempts to fail
    pub fn with_connect_failures(mut self, count: usize) -> Self {
        self.connect_failures_left = count;
        self
    }

    /// Drop the connection after every `count` delivered samples
    pub fn with_disconnect_after(mut self, count: u64) -> Self {
        self.disconnect_after = Some(count);
        self
    }
}

impl PhasorSource for MockPhasorSource {
    fn connect(&mut self) -> Result<()> {
        if self.connect_failures_left > 0 {
            self.connect_failures_left -= 1;
            self.stats.record_connect(false);
            return Err(OscimonError::Source(format!(
                "simulated connect failure for '{}'",
                self.name
            )));
        }
        self.connected = true;
        self.samples_since_connect = 0;
        self.next_emit = None;
        self.stats.record_connect(true);
        Ok(())
    }

    fn receive(&mut self) -> Result<Sample> {
        if !self.connected {
            return Err(OscimonError::Source(format!(
                "'{}' is not connected",
                self.name
            )));
        }
        if let Some(limit) = self.disconnect_after {
            if self.samples_since_connect >= limit {
                self.connected = false;
                self.stats.record_receive_failure();
                return Err(OscimonError::Source(format!(
                    "simulated connection loss on '{}'",
                    self.name
                )));
            }
        }

        if let Some(pace) = self.pace {
            let now = Instant::now();
            let due = *self.next_emit.get_or_insert(now);
            if due > now {
                std::thread::sleep(due - now);
            }
            self.next_emit = Some(due + pace);
        }

        let t = self.index as f64 / self.sample_rate;
        let deviation = self.pattern.value(t, self.phase)
            + self.noise_amplitude * self.rng.gen_range(-1.0..1.0);
        let frequency = NOMINAL_FREQUENCY_HZ + deviation;
        let angle = (0.3 * t + self.phase) % (2.0 * PI) - PI;
        let power = 800.0 + 400.0 * deviation;

        let sample = Sample::new(
            self.name.clone(),
            self.start_epoch + t,
            vec![frequency, angle, power],
        );
        self.index += 1;
        self.samples_since_connect += 1;
        self.stats.record_sample();
        Ok(sample)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> &SourceStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut SourceStats {
        &mut self.stats
    }
}
