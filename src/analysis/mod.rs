//! Modal analysis of synchronized measurement windows
//!
//! The analysis chain runs synchronously inside the coordinator:
//!
//! 1. [`RollingWindow`] accumulates aligned frames per source and hands out
//!    gap-repaired channel slices.
//! 2. [`BandpassFilter`] applies a zero-phase band-pass to each slice.
//! 3. [`ModalEstimator`] performs covariance-driven stochastic subspace
//!    identification, producing (frequency, damping) candidates.
//! 4. [`ModeSelector`] clusters candidates per frequency band and votes.
//! 5. [`AdaptiveScalarFilter`] smooths the winning damping estimate.

pub mod bandpass;
pub mod filter;
pub mod selector;
pub mod ssi;
pub mod window;

pub use bandpass::BandpassFilter;
pub use filter::AdaptiveScalarFilter;
pub use selector::{ModeEstimate, ModeSelector};
pub use ssi::{EstimationError, ModalEstimator, ModeCandidate};
pub use window::RollingWindow;
