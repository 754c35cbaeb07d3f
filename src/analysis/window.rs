//! Rolling analysis window
//!
//! A continuously sliding, fixed-capacity ring of the analysis channel for
//! every configured source. Frames missing a source are recorded as gaps;
//! at read time a series is either repaired by linear interpolation (small
//! gaps) or excluded from the cycle (gap ratio above the configured bound).

use crate::types::AlignedFrame;
use std::collections::VecDeque;

/// Per-source sliding ring of analysis-channel values
#[derive(Debug)]
pub struct RollingWindow {
    source_order: Vec<String>,
    series: Vec<VecDeque<f64>>,
    timestamps: VecDeque<f64>,
    capacity: usize,
    channel_index: usize,
}

impl RollingWindow {
    /// Create a window over the given sources.
    ///
    /// `capacity` is the largest configured analysis window length;
    /// `channel_index` selects the sample channel fed to the estimator.
    pub fn new(
        source_ids: impl IntoIterator<Item = String>,
        capacity: usize,
        channel_index: usize,
    ) -> Self {
        let source_order: Vec<String> = source_ids.into_iter().collect();
        let series = source_order
            .iter()
            .map(|_| VecDeque::with_capacity(capacity))
            .collect();
        Self {
            source_order,
            series,
            timestamps: VecDeque::with_capacity(capacity),
            capacity,
            channel_index,
        }
    }

    /// Append one aligned frame.
    ///
    /// Sources absent from the frame receive a gap marker so all series stay
    /// in lockstep with the timestamp ring.
    pub fn push_frame(&mut self, frame: &AlignedFrame) {
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
            for series in &mut self.series {
                series.pop_front();
            }
        }
        self.timestamps.push_back(frame.timestamp);
        for (id, series) in self.source_order.iter().zip(self.series.iter_mut()) {
            let value = frame
                .sample_for(id)
                .and_then(|s| s.channel(self.channel_index))
                .unwrap_or(f64::NAN);
            series.push_back(value);
        }
    }

    /// Number of frames currently held
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no frames
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Whether the window has reached its capacity
    pub fn is_full(&self) -> bool {
        self.timestamps.len() == self.capacity
    }

    /// Timestamp of the most recent frame, if any
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.timestamps.back().copied()
    }

    /// Extract the usable channel series for one analysis cycle.
    ///
    /// Returns `(source_id, series)` pairs in configured order. A series
    /// whose gap fraction exceeds `max_gap_ratio` is excluded; remaining
    /// gaps are filled by linear interpolation with clamped edges.
    pub fn usable_channels(&self, max_gap_ratio: f64) -> Vec<(String, Vec<f64>)> {
        let mut out = Vec::new();
        for (id, series) in self.source_order.iter().zip(self.series.iter()) {
            let mut values: Vec<f64> = series.iter().copied().collect();
            let gaps = values.iter().filter(|v| v.is_nan()).count();
            if values.is_empty() || gaps as f64 > values.len() as f64 * max_gap_ratio {
                tracing::debug!(
                    "Excluding source '{}' from analysis cycle ({} of {} samples missing)",
                    id,
                    gaps,
                    values.len()
                );
                continue;
            }
            if gaps > 0 {
                if !interpolate_gaps(&mut values) {
                    continue;
                }
            }
            out.push((id.clone(), values));
        }
        out
    }
}

/// Fill NaN entries by linear interpolation between neighboring valid
/// points; leading/trailing gaps take the nearest valid value.
///
/// Returns false when the series has no valid point at all.
fn interpolate_gaps(values: &mut [f64]) -> bool {
    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    if valid.is_empty() {
        return false;
    }

    for i in 0..values.len() {
        if !values[i].is_nan() {
            continue;
        }
        let next = valid.partition_point(|&j| j < i);
        let (lo, hi) = match (next.checked_sub(1).map(|k| valid[k]), valid.get(next)) {
            (Some(lo), Some(&hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo),
            (None, Some(&hi)) => (hi, hi),
            (None, None) => unreachable!(),
        };
        values[i] = if lo == hi {
            values[lo]
        } else {
            let t = (i - lo) as f64 / (hi - lo) as f64;
            values[lo] + t * (values[hi] - values[lo])
        };
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    fn frame(ts: f64, values: &[(&str, f64)]) -> AlignedFrame {
        AlignedFrame {
            timestamp: ts,
            samples: values
                .iter()
                .map(|(id, v)| Sample::new(*id, ts, vec![*v]))
                .collect(),
        }
    }

    fn window() -> RollingWindow {
        RollingWindow::new(["A".to_string(), "B".to_string()], 4, 0)
    }

    #[test]
    fn test_sliding_capacity() {
        let mut w = window();
        for k in 0..6 {
            w.push_frame(&frame(k as f64, &[("A", k as f64), ("B", -(k as f64))]));
        }
        assert!(w.is_full());
        assert_eq!(w.len(), 4);
        assert_eq!(w.latest_timestamp(), Some(5.0));
        let channels = w.usable_channels(0.0);
        assert_eq!(channels[0].1, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_missing_source_becomes_gap() {
        let mut w = window();
        w.push_frame(&frame(0.0, &[("A", 1.0), ("B", 5.0)]));
        w.push_frame(&frame(1.0, &[("A", 2.0)]));
        w.push_frame(&frame(2.0, &[("A", 3.0), ("B", 7.0)]));

        // With no gap budget, B is excluded.
        let strict = w.usable_channels(0.0);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].0, "A");

        // With a gap budget, B is repaired by interpolation.
        let relaxed = w.usable_channels(0.5);
        assert_eq!(relaxed.len(), 2);
        assert_eq!(relaxed[1].1, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_edge_gaps_clamped() {
        let mut values = vec![f64::NAN, 2.0, f64::NAN, f64::NAN, 5.0, f64::NAN];
        assert!(interpolate_gaps(&mut values));
        assert_eq!(values, vec![2.0, 2.0, 3.0, 4.0, 5.0, 5.0]);
    }

    #[test]
    fn test_all_gaps_rejected() {
        let mut values = vec![f64::NAN, f64::NAN];
        assert!(!interpolate_gaps(&mut values));
    }
}
