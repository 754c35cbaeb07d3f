//! Bounded per-source sample buffer
//!
//! Each source gets one [`StreamBuffer`]: a FIFO ring that holds raw samples
//! awaiting alignment. The buffer never blocks and never fails; when full it
//! evicts the oldest entry, preferring fresh telemetry over complete history.

use crate::types::Sample;
use std::collections::VecDeque;

/// Bounded FIFO of samples for one source, evict-oldest on overflow
#[derive(Debug)]
pub struct StreamBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    evicted: u64,
}

impl StreamBuffer {
    /// Create a buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append a sample, evicting the oldest entry if the buffer is full
    pub fn add(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
        self.samples.push_back(sample);
    }

    /// Oldest unconsumed sample, if any
    pub fn peek_oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Remove and return the oldest sample
    pub fn pop_oldest(&mut self) -> Option<Sample> {
        self.samples.pop_front()
    }

    /// Discard leading samples with timestamps strictly before `cutoff`.
    ///
    /// Returns the number of samples discarded. Used by the synchronizer's
    /// resync path to realign a lagging source.
    pub fn discard_before(&mut self, cutoff: f64) -> u64 {
        let mut discarded = 0;
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
                discarded += 1;
            } else {
                break;
            }
        }
        discarded
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total samples evicted due to overflow since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(ts: f64) -> Sample {
        Sample::new("PMU 1", ts, vec![50.0])
    }

    #[test]
    fn test_fifo_order() {
        let mut buf = StreamBuffer::new(4);
        for i in 0..3 {
            buf.add(sample(100.0 + i as f64));
        }
        assert_eq!(buf.pop_oldest().unwrap().timestamp, 100.0);
        assert_eq!(buf.pop_oldest().unwrap().timestamp, 101.0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut buf = StreamBuffer::new(2);
        buf.add(sample(1.0));
        buf.add(sample(2.0));
        buf.add(sample(3.0));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.evicted(), 1);
        assert_eq!(buf.peek_oldest().unwrap().timestamp, 2.0);
    }

    #[test]
    fn test_discard_before() {
        let mut buf = StreamBuffer::new(8);
        for ts in [1.0, 2.0, 3.0, 4.0] {
            buf.add(sample(ts));
        }
        let discarded = buf.discard_before(3.0);
        assert_eq!(discarded, 2);
        // Cutoff is exclusive: the 3.0 entry survives.
        assert_eq!(buf.peek_oldest().unwrap().timestamp, 3.0);
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_capacity(
            capacity in 1usize..32,
            timestamps in proptest::collection::vec(0.0f64..1e6, 0..200),
        ) {
            let mut buf = StreamBuffer::new(capacity);
            for ts in timestamps {
                buf.add(sample(ts));
                prop_assert!(buf.len() <= capacity);
            }
        }

        #[test]
        fn prop_oldest_evicted_first(count in 1usize..100) {
            let capacity = 10usize;
            let mut buf = StreamBuffer::new(capacity);
            for i in 0..count {
                buf.add(sample(i as f64));
            }
            // Whatever was dropped, the survivors are the most recent ones
            // and still come out in insertion order.
            let first_kept = count.saturating_sub(capacity);
            let mut expected = first_kept as f64;
            while let Some(s) = buf.pop_oldest() {
                prop_assert_eq!(s.timestamp, expected);
                expected += 1.0;
            }
            prop_assert_eq!(expected as usize, count);
        }
    }
}
