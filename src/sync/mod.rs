//! Multi-source time synchronization
//!
//! Raw samples arrive per source with independent clocks and latencies.
//! This module buffers them per source ([`StreamBuffer`]) and matches the
//! oldest unconsumed sample across all healthy sources onto a common time
//! base ([`Synchronizer`]), discarding stragglers when drift exceeds the
//! configured tolerance.

pub mod aligner;
pub mod buffer;

pub use aligner::Synchronizer;
pub use buffer::StreamBuffer;
