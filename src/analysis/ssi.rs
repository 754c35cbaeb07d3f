//! Covariance-driven stochastic subspace identification
//!
//! Estimates oscillation modes (frequency and damping ratio) from a window
//! of synchronized multi-channel measurements, output-only:
//!
//! 1. Normalize each channel (zero mean, unit variance).
//! 2. Build lagged cross-covariance blocks `R_k` of the stacked channels.
//! 3. Assemble the block Hankel matrix `H` from `R_{i+j+1}`.
//! 4. SVD of `H`; the top `order` singular pairs form the observability
//!    matrix `Obs = U₁..order · √diag(S₁..order)`.
//! 5. Solve `Obs[:-ch] · A = Obs[ch:]` in the least-squares sense for the
//!    discrete state transition matrix `A`.
//! 6. Map each eigenvalue `λ` of `A` to a continuous pole `s = ln(λ)/dt`;
//!    `f = |Im s| / 2π`, `d% = −100·Re s / |s|`.
//! 7. Keep poles inside the physically meaningful frequency range.
//!
//! Any numerical failure is reported as an [`EstimationError`]; callers
//! collapse it into an empty candidate list so a bad window never aborts an
//! analysis cycle.

use nalgebra::linalg::Schur;
use nalgebra::DMatrix;
use std::f64::consts::PI;
use thiserror::Error;

/// Variance floor guarding the per-channel normalization
const STD_FLOOR: f64 = 1e-9;

/// Iteration caps for the iterative decompositions
const SVD_MAX_ITER: usize = 250;
const SCHUR_MAX_ITER: usize = 500;

/// One identified oscillation mode candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeCandidate {
    /// Mode frequency in Hz
    pub frequency: f64,
    /// Damping ratio in percent
    pub damping: f64,
}

/// Why an estimation attempt produced no candidates.
///
/// These are expected operational outcomes, not faults; the coordinator
/// records them at trace level and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimationError {
    /// No channels were provided
    #[error("no input channels")]
    EmptyInput,

    /// Channels differ in length
    #[error("channel lengths differ")]
    RaggedChannels,

    /// The window is too short for the requested model order
    #[error("window of {len} samples is degenerate for model order {order}")]
    DegenerateWindow { len: usize, order: usize },

    /// The singular value decomposition did not converge
    #[error("singular value decomposition did not converge")]
    SvdFailed,

    /// The least-squares solve for the transition matrix failed
    #[error("least-squares solve failed: {0}")]
    LeastSquares(&'static str),

    /// The eigenvalue decomposition did not converge
    #[error("eigenvalue decomposition did not converge")]
    EigFailed,
}

/// Covariance-driven SSI estimator
#[derive(Debug, Clone)]
pub struct ModalEstimator {
    sample_rate: f64,
    freq_min: f64,
    freq_max: f64,
}

impl ModalEstimator {
    /// Create an estimator for data sampled at `sample_rate` Hz, keeping
    /// poles with frequencies inside `freq_range_hz`
    pub fn new(sample_rate: f64, freq_range_hz: [f64; 2]) -> Self {
        Self {
            sample_rate,
            freq_min: freq_range_hz[0],
            freq_max: freq_range_hz[1],
        }
    }

    /// Identify mode candidates in one window.
    ///
    /// `channels` holds one series per source, all of equal length `w`;
    /// `order` is the model order. Returns zero or more candidates, or the
    /// reason no estimate was possible.
    pub fn estimate(
        &self,
        channels: &[Vec<f64>],
        order: usize,
    ) -> Result<Vec<ModeCandidate>, EstimationError> {
        let ch = channels.len();
        if ch == 0 {
            return Err(EstimationError::EmptyInput);
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(EstimationError::RaggedChannels);
        }
        if order == 0 || len < 2 * order + 2 {
            return Err(EstimationError::DegenerateWindow { len, order });
        }

        // Stacked normalized channel matrix, ch x len.
        let mut y = DMatrix::zeros(ch, len);
        for (row, series) in channels.iter().enumerate() {
            let mean = series.iter().sum::<f64>() / len as f64;
            let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / len as f64;
            let std = var.sqrt() + STD_FLOOR;
            for (col, &value) in series.iter().enumerate() {
                y[(row, col)] = (value - mean) / std;
            }
        }

        // Lagged cross-covariance blocks R_k, k = 1 .. 2*order-1.
        let lags = 2 * order;
        let mut blocks: Vec<DMatrix<f64>> = Vec::with_capacity(lags);
        blocks.push(DMatrix::zeros(ch, ch)); // R_0 slot, unused by H
        for k in 1..lags {
            let span = len - k;
            let r = (y.columns(k, span) * y.columns(0, span).transpose()) / span as f64;
            blocks.push(r);
        }

        // Block Hankel matrix H[(i,j)] = R_{i+j+1}.
        let dim = order * ch;
        let mut h = DMatrix::zeros(dim, dim);
        for i in 0..order {
            for j in 0..order {
                h.view_mut((i * ch, j * ch), (ch, ch))
                    .copy_from(&blocks[i + j + 1]);
            }
        }

        // Observability matrix from the dominant subspace of H.
        let svd = h
            .try_svd(true, false, f64::EPSILON, SVD_MAX_ITER)
            .ok_or(EstimationError::SvdFailed)?;
        let u = svd.u.ok_or(EstimationError::SvdFailed)?;
        let sqrt_s = svd.singular_values.rows(0, order).map(|s| s.sqrt());
        let obs = u.columns(0, order) * DMatrix::from_diagonal(&sqrt_s);

        // Shift-invariance least squares: Obs[:-ch] * A = Obs[ch:].
        let past = obs.rows(0, dim - ch).clone_owned();
        let future = obs.rows(ch, dim - ch).clone_owned();
        let a = past
            .try_svd(true, true, f64::EPSILON, SVD_MAX_ITER)
            .ok_or(EstimationError::SvdFailed)?
            .solve(&future, 1e-12)
            .map_err(EstimationError::LeastSquares)?;

        // Discrete eigenvalues -> continuous poles -> (frequency, damping).
        let schur = Schur::try_new(a, f64::EPSILON, SCHUR_MAX_ITER)
            .ok_or(EstimationError::EigFailed)?;
        let dt = 1.0 / self.sample_rate;
        let mut candidates = Vec::new();
        for lambda in schur.complex_eigenvalues().iter() {
            if lambda.norm() <= 0.0 {
                continue;
            }
            let s = lambda.ln() / dt;
            let magnitude = s.norm();
            if magnitude <= 0.0 {
                continue;
            }
            let frequency = s.im.abs() / (2.0 * PI);
            let damping = -100.0 * s.re / magnitude;
            if !frequency.is_finite() || !damping.is_finite() {
                continue;
            }
            if frequency >= self.freq_min && frequency <= self.freq_max {
                candidates.push(ModeCandidate { frequency, damping });
            }
        }
        Ok(candidates)
    }
}
