//! Configuration for the oscillation monitor
//!
//! All tunables are plain data loaded from a TOML file into [`AppConfig`]
//! and passed into constructors; no module holds ambient global state.
//!
//! # Sections
//!
//! - [`IngestConfig`] - sampling rate, alignment tolerance, buffer/queue sizes
//! - [`SourceConfig`] - one entry per phasor source (name, endpoint, idcode)
//! - [`SupervisionConfig`] - reconnect backoff, staleness, restart watchdog
//! - [`AnalysisConfig`] - window lengths, model orders, clustering, band-pass
//! - [`BandConfig`] - tracked frequency bands
//! - [`EmissionConfig`] - damping validity bounds, rate limit, flush cadence
//! - [`StoreConfig`] - time-series store endpoint
//!
//! Every section has defaults matching a two-source 25 Hz deployment, so an
//! empty file is a valid configuration.

use crate::error::{OscimonError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ingestion and alignment parameters
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Phasor sources to connect to
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Connection supervision and watchdog parameters
    #[serde(default)]
    pub supervision: SupervisionConfig,
    /// Modal analysis parameters
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Tracked frequency bands
    #[serde(default = "default_bands")]
    pub bands: Vec<BandConfig>,
    /// Output acceptance and emission parameters
    #[serde(default)]
    pub emission: EmissionConfig,
    /// Time-series store endpoint
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            sources: default_sources(),
            supervision: SupervisionConfig::default(),
            analysis: AnalysisConfig::default(),
            bands: default_bands(),
            emission: EmissionConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Ingestion and alignment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Nominal reporting rate of the sources in Hz
    pub sampling_rate_hz: f64,
    /// Maximum timestamp spread within one aligned frame, in seconds
    pub time_tolerance_s: f64,
    /// Capacity of each per-source stream buffer
    pub buffer_capacity: usize,
    /// Capacity of the worker-to-coordinator event queue
    pub queue_capacity: usize,
    /// Minimum number of healthy sources required to align a frame
    pub min_sources: usize,
    /// Maximum events drained from the queue per coordinator tick
    pub drain_batch: usize,
    /// Sleep between coordinator ticks, in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 25.0,
            time_tolerance_s: 0.001,
            buffer_capacity: 200,
            queue_capacity: 8000,
            min_sources: 2,
            drain_batch: 512,
            tick_interval_ms: 10,
        }
    }
}

impl IngestConfig {
    /// Nominal interval between consecutive samples, in seconds
    pub fn frame_interval_s(&self) -> f64 {
        1.0 / self.sampling_rate_hz
    }
}

/// One phasor source endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name, also used as the source id throughout the pipeline
    pub name: String,
    /// Network endpoint of the source, `host:port`
    pub endpoint: String,
    /// Device id code expected on the connection
    pub idcode: u16,
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "PMU 1".to_string(),
            endpoint: "127.0.0.1:4712".to_string(),
            idcode: 2,
        },
        SourceConfig {
            name: "PMU 3".to_string(),
            endpoint: "127.0.0.1:4713".to_string(),
            idcode: 1,
        },
    ]
}

/// Connection supervision and restart-watchdog parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionConfig {
    /// Seconds without a sample before an ONLINE source is marked STALE
    pub stale_timeout_s: f64,
    /// First reconnect delay after a connection failure, in seconds
    pub initial_reconnect_delay_s: f64,
    /// Upper bound on the doubling reconnect delay, in seconds
    pub max_reconnect_delay_s: f64,
    /// Continuous seconds with fewer than all sources healthy before a
    /// full restart is requested
    pub restart_after_degraded_s: f64,
    /// Aligned-frame rate below which throughput counts as degraded
    pub low_rate_threshold: f64,
    /// Continuous seconds of low throughput before a restart is requested
    pub low_rate_duration_s: f64,
    /// Seconds after startup during which the low-rate watchdog is disarmed
    pub startup_grace_s: f64,
    /// Seconds granted to source workers to observe the stop flag
    pub shutdown_grace_s: f64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            stale_timeout_s: 3.0,
            initial_reconnect_delay_s: 2.0,
            max_reconnect_delay_s: 60.0,
            restart_after_degraded_s: 20.0,
            low_rate_threshold: 10.0,
            low_rate_duration_s: 30.0,
            startup_grace_s: 20.0,
            shutdown_grace_s: 2.0,
        }
    }
}

/// Modal analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Analysis window lengths in samples; the largest sets the rolling
    /// window capacity
    pub window_lengths: Vec<usize>,
    /// Model orders evaluated per window
    pub model_orders: Vec<usize>,
    /// Minimum cluster size for a mode estimate to be considered
    pub min_votes: usize,
    /// Frequency tolerance for clustering candidates, in Hz
    pub cluster_tolerance_hz: f64,
    /// Physically meaningful pole frequency range `[min, max]` in Hz
    pub pole_freq_range_hz: [f64; 2],
    /// Band-pass passband `[low, high]` applied before identification, in Hz
    pub passband_hz: [f64; 2],
    /// Index into the sample channel vector fed to the estimator
    pub channel_index: usize,
    /// Maximum tolerated fraction of gaps in a source series per cycle
    pub max_gap_ratio: f64,
    /// Minimum usable channels for an analysis cycle
    pub min_channels: usize,
    /// Wall-clock seconds between analysis cycles
    pub cadence_s: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_lengths: vec![1500, 2500],
            model_orders: vec![10, 20, 30],
            min_votes: 3,
            cluster_tolerance_hz: 0.05,
            pole_freq_range_hz: [0.1, 2.5],
            passband_hz: [0.1, 2.5],
            channel_index: crate::types::CHANNEL_FREQUENCY,
            max_gap_ratio: 0.05,
            min_channels: 2,
            cadence_s: 1.0,
        }
    }
}

impl AnalysisConfig {
    /// Rolling window capacity: the largest configured window length
    pub fn window_capacity(&self) -> usize {
        self.window_lengths.iter().copied().max().unwrap_or(0)
    }
}

/// One tracked frequency band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    /// Band identifier used in store field names
    pub id: String,
    /// Band frequency range `[min, max)` in Hz
    pub range_hz: [f64; 2],
}

fn default_bands() -> Vec<BandConfig> {
    vec![
        BandConfig {
            id: "low".to_string(),
            range_hz: [0.1, 0.9],
        },
        BandConfig {
            id: "mid".to_string(),
            range_hz: [0.9, 1.3],
        },
        BandConfig {
            id: "high".to_string(),
            range_hz: [1.3, 2.1],
        },
    ]
}

/// Output acceptance and emission parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Lowest physically plausible damping, in percent
    pub damping_min: f64,
    /// Highest physically plausible damping, in percent
    pub damping_max: f64,
    /// Minimum data-time seconds between emitted result sets
    pub min_interval_s: f64,
    /// Wall-clock seconds between store flushes
    pub flush_interval_s: f64,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            damping_min: 0.1,
            damping_max: 20.0,
            min_interval_s: 4.9,
            flush_interval_s: 1.0,
        }
    }
}

/// Time-series store endpoint parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. `http://localhost:8086`
    pub url: String,
    /// Organization name
    pub org: String,
    /// Target bucket
    pub bucket: String,
    /// API token
    pub token: String,
    /// Measurement name for emitted mode records
    pub measurement: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "grid".to_string(),
            bucket: "pmu_modes".to_string(),
            token: String::new(),
            measurement: "oscillation_modes".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&text)
            .map_err(|e| OscimonError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| OscimonError::Serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        if self.ingest.sampling_rate_hz <= 0.0 {
            return Err(OscimonError::Config(
                "sampling_rate_hz must be positive".to_string(),
            ));
        }
        if self.sources.is_empty() {
            return Err(OscimonError::Config(
                "at least one source must be configured".to_string(),
            ));
        }
        if self.ingest.min_sources == 0 || self.ingest.min_sources > self.sources.len() {
            return Err(OscimonError::Config(format!(
                "min_sources must be in 1..={}",
                self.sources.len()
            )));
        }
        if self.analysis.window_lengths.is_empty() || self.analysis.model_orders.is_empty() {
            return Err(OscimonError::Config(
                "window_lengths and model_orders must be non-empty".to_string(),
            ));
        }
        let capacity = self.analysis.window_capacity();
        for &order in &self.analysis.model_orders {
            // The estimator needs 2*order covariance lags plus headroom.
            let needed = 2 * order + 2;
            if self.analysis.window_lengths.iter().any(|&w| w < needed) {
                return Err(OscimonError::Config(format!(
                    "model order {} requires windows of at least {} samples",
                    order, needed
                )));
            }
        }
        if capacity == 0 {
            return Err(OscimonError::Config(
                "window capacity must be positive".to_string(),
            ));
        }
        for band in &self.bands {
            if band.range_hz[0] >= band.range_hz[1] {
                return Err(OscimonError::Config(format!(
                    "band '{}' has an empty frequency range",
                    band.id
                )));
            }
        }
        if self.emission.damping_min > self.emission.damping_max {
            return Err(OscimonError::Config(
                "damping_min must not exceed damping_max".to_string(),
            ));
        }
        Ok(())
    }
}
