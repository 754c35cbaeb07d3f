//! Zero-phase band-pass pre-filter
//!
//! Electromechanical oscillations live well below the Nyquist rate of the
//! measurement stream; everything outside the configured passband is noise
//! to the identifier. The filter works in the frequency domain: forward FFT,
//! zero every bin outside the passband, inverse FFT. Kept bins are never
//! phase-shifted, so the filter introduces no phase distortion. That
//! matters because damping is estimated from the decay shape of the signal.

use rustfft::{num_complex::Complex, FftPlanner};

/// Frequency-domain band-pass filter with zero phase shift
pub struct BandpassFilter {
    planner: FftPlanner<f64>,
    low_hz: f64,
    high_hz: f64,
}

impl BandpassFilter {
    /// Create a filter with the given passband in Hz
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            low_hz,
            high_hz,
        }
    }

    /// Filter `samples` recorded at `sample_rate` Hz.
    ///
    /// The mean is removed before transforming; an empty input yields an
    /// empty output.
    pub fn apply(&mut self, samples: &[f64], sample_rate: f64) -> Vec<f64> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let mean: f64 = samples.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s - mean, 0.0))
            .collect();

        let forward = self.planner.plan_fft_forward(n);
        forward.process(&mut buffer);

        let bin_width = sample_rate / n as f64;
        for (k, value) in buffer.iter_mut().enumerate() {
            // Bins above n/2 carry the negative frequencies.
            let freq = if k <= n / 2 {
                k as f64 * bin_width
            } else {
                (n - k) as f64 * bin_width
            };
            if freq < self.low_hz || freq > self.high_hz {
                *value = Complex::new(0.0, 0.0);
            }
        }

        let inverse = self.planner.plan_fft_inverse(n);
        inverse.process(&mut buffer);

        // rustfft does not normalize; scale by 1/n on the way out.
        let scale = 1.0 / n as f64;
        buffer.iter().map(|c| c.re * scale).collect()
    }
}
