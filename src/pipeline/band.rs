//! Per-band mode acceptance and smoothing
//!
//! One [`BandPipeline`] exists per configured frequency band for the process
//! lifetime. Each analysis cycle it selects the dominant cluster inside its
//! band, rejects physically implausible damping values, and pushes accepted
//! estimates through the band's adaptive filter. A band without a plausible
//! mode simply withholds output for the cycle.

use crate::analysis::selector::{ModeEstimate, ModeSelector};
use crate::analysis::ssi::ModeCandidate;
use crate::analysis::AdaptiveScalarFilter;
use crate::config::BandConfig;

/// Accepted output of one band for one analysis cycle
#[derive(Debug, Clone, PartialEq)]
pub struct BandReading {
    /// Band identifier
    pub band_id: String,
    /// Selected mode frequency, in Hz
    pub frequency: f64,
    /// Instantaneous damping estimate, in percent
    pub damping: f64,
    /// Smoothed damping estimate, in percent
    pub damping_smoothed: f64,
    /// Cluster size supporting the estimate
    pub votes: usize,
}

/// Selection, validity gating and smoothing for one frequency band
#[derive(Debug)]
pub struct BandPipeline {
    config: BandConfig,
    selector: ModeSelector,
    filter: AdaptiveScalarFilter,
    damping_min: f64,
    damping_max: f64,
}

impl BandPipeline {
    /// Create the pipeline for one configured band
    pub fn new(
        config: BandConfig,
        selector: ModeSelector,
        damping_min: f64,
        damping_max: f64,
    ) -> Self {
        Self {
            config,
            selector,
            filter: AdaptiveScalarFilter::default(),
            damping_min,
            damping_max,
        }
    }

    /// Band identifier
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Process one cycle's candidates.
    ///
    /// Returns `None` when no cluster wins the vote or the winner's damping
    /// falls outside the plausible range. The smoothing filter is only fed
    /// accepted values, so rejected cycles do not perturb it.
    pub fn process(&mut self, candidates: &[ModeCandidate]) -> Option<BandReading> {
        let ModeEstimate {
            frequency,
            damping,
            votes,
        } = self
            .selector
            .select(candidates, self.config.range_hz[0], self.config.range_hz[1])?;

        if damping < self.damping_min || damping > self.damping_max {
            tracing::debug!(
                "Band '{}' rejected implausible damping {:.2}% at {:.3} Hz",
                self.config.id,
                damping,
                frequency
            );
            return None;
        }

        let damping_smoothed = self.filter.update(damping);
        Some(BandReading {
            band_id: self.config.id.clone(),
            frequency,
            damping,
            damping_smoothed,
            votes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> BandPipeline {
        BandPipeline::new(
            BandConfig {
                id: "low".to_string(),
                range_hz: [0.1, 0.9],
            },
            ModeSelector::new(0.05, 3),
            0.1,
            20.0,
        )
    }

    fn candidates(frequency: f64, damping: f64, count: usize) -> Vec<ModeCandidate> {
        vec![ModeCandidate { frequency, damping }; count]
    }

    #[test]
    fn test_accepts_plausible_mode() {
        let mut band = pipeline();
        let reading = band.process(&candidates(0.6, 5.0, 4)).expect("reading");
        assert_eq!(reading.band_id, "low");
        assert_eq!(reading.votes, 4);
        // First accepted value primes the filter and passes through.
        assert_eq!(reading.damping_smoothed, 5.0);
    }

    #[test]
    fn test_rejects_out_of_band() {
        let mut band = pipeline();
        assert!(band.process(&candidates(1.5, 5.0, 4)).is_none());
    }

    #[test]
    fn test_rejects_implausible_damping() {
        let mut band = pipeline();
        assert!(band.process(&candidates(0.6, 35.0, 4)).is_none());
        assert!(band.process(&candidates(0.6, 0.05, 4)).is_none());
        // Rejected cycles leave the filter unprimed.
        let reading = band.process(&candidates(0.6, 5.0, 4)).expect("reading");
        assert_eq!(reading.damping_smoothed, 5.0);
    }

    #[test]
    fn test_smoothing_carries_across_cycles() {
        let mut band = pipeline();
        band.process(&candidates(0.6, 5.0, 4)).expect("prime");
        let reading = band.process(&candidates(0.6, 9.0, 4)).expect("reading");
        assert_eq!(reading.damping, 9.0);
        assert!(reading.damping_smoothed > 5.0 && reading.damping_smoothed < 9.0);
    }
}
