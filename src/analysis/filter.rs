//! Adaptive scalar smoothing filter
//!
//! A recursive one-dimensional estimator used to smooth the damping value of
//! one frequency band for operator display. The process-noise parameter
//! adapts to the innovation magnitude: large prediction errors open the
//! filter up so regime shifts come through quickly, quiet periods close it
//! down for a smoother trace.

/// Parameters for [`AdaptiveScalarFilter`]
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    /// Initial process noise
    pub q_init: f64,
    /// Lower bound on the adaptive process noise
    pub q_min: f64,
    /// Upper bound on the adaptive process noise
    pub q_max: f64,
    /// Fixed measurement noise
    pub r: f64,
    /// Innovation magnitude above which the filter opens up
    pub innovation_threshold: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            q_init: 1e-4,
            q_min: 1e-5,
            q_max: 1e-2,
            r: 1.0,
            innovation_threshold: 2.0,
        }
    }
}

/// Recursive scalar filter with noise-adaptive gain
#[derive(Debug, Clone)]
pub struct AdaptiveScalarFilter {
    params: FilterParams,
    /// Adaptive process noise
    q: f64,
    /// Error covariance
    p: f64,
    /// State estimate; `None` until the first measurement
    x: Option<f64>,
}

impl AdaptiveScalarFilter {
    /// Create a filter with the given parameters
    pub fn new(params: FilterParams) -> Self {
        Self {
            q: params.q_init,
            p: 1.0,
            x: None,
            params,
        }
    }

    /// Feed one measurement and return the smoothed estimate.
    ///
    /// The first call primes the state and returns the input unchanged.
    pub fn update(&mut self, z: f64) -> f64 {
        let x = match self.x {
            None => {
                self.x = Some(z);
                return z;
            }
            Some(x) => x,
        };

        let p_pred = self.p + self.q;
        let innovation = z - x;
        let gain = p_pred / (p_pred + self.params.r);

        let x_new = x + gain * innovation;
        self.x = Some(x_new);
        self.p = (1.0 - gain) * p_pred;

        if innovation.abs() > self.params.innovation_threshold {
            self.q = (self.q * 1.1).min(self.params.q_max);
        } else {
            self.q = (self.q * 0.9).max(self.params.q_min);
        }

        x_new
    }

    /// Current state estimate, if primed
    pub fn state(&self) -> Option<f64> {
        self.x
    }

    /// Current adaptive process noise
    pub fn process_noise(&self) -> f64 {
        self.q
    }
}

impl Default for AdaptiveScalarFilter {
    fn default() -> Self {
        Self::new(FilterParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_passes_through() {
        let mut filter = AdaptiveScalarFilter::default();
        assert_eq!(filter.update(7.3), 7.3);
        assert_eq!(filter.state(), Some(7.3));
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut filter = AdaptiveScalarFilter::default();
        filter.update(0.0);
        let mut last = 0.0;
        for _ in 0..200 {
            last = filter.update(10.0);
        }
        assert!(
            (last - 10.0).abs() < 0.1,
            "state {} should converge to 10 within 1%",
            last
        );
    }

    #[test]
    fn test_smooths_between_measurements() {
        let mut filter = AdaptiveScalarFilter::default();
        filter.update(5.0);
        // A modest step moves the state only partway toward the input.
        let smoothed = filter.update(6.0);
        assert!(smoothed > 5.0 && smoothed < 6.0);
    }

    #[test]
    fn test_q_spikes_on_outlier_then_decays() {
        let mut filter = AdaptiveScalarFilter::default();
        filter.update(5.0);
        for _ in 0..5 {
            filter.update(5.0);
        }
        let q_calm = filter.process_noise();

        // A large outlier opens the filter up.
        filter.update(15.0);
        let q_spiked = filter.process_noise();
        assert!(q_spiked > q_calm);

        // Resumed steady input decays q back toward its floor.
        for _ in 0..300 {
            filter.update(5.0);
        }
        let params = FilterParams::default();
        assert!((filter.process_noise() - params.q_min).abs() < params.q_min * 0.5);
    }

    #[test]
    fn test_q_stays_bounded() {
        let params = FilterParams::default();
        let mut filter = AdaptiveScalarFilter::new(params);
        filter.update(0.0);
        // Alternate huge jumps to push q upward.
        for i in 0..500 {
            filter.update(if i % 2 == 0 { 100.0 } else { -100.0 });
            assert!(filter.process_noise() <= params.q_max);
            assert!(filter.process_noise() >= params.q_min);
        }
    }
}
