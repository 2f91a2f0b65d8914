//! Lock-free histogram of insert attempts per create call.
//!
//! Buckets are small integers because the retry loop is bounded; anything
//! above the last bucket still lands in `+Inf`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bounds (inclusive) of the attempt buckets.
pub const ATTEMPT_BUCKETS: [u64; 6] = [1, 2, 3, 5, 8, 16];

/// Cumulative histogram, safe for concurrent observation.
///
/// ```
/// use idsmith::metrics::AttemptHistogram;
///
/// let histogram = AttemptHistogram::new();
/// histogram.observe(1);
/// histogram.observe(3);
///
/// let (sum, count, buckets) = histogram.snapshot();
/// assert_eq!((sum, count), (4, 2));
/// assert_eq!(buckets[0], 1);
/// ```
pub struct AttemptHistogram {
    sum: AtomicU64,
    count: AtomicU64,
    buckets: [AtomicU64; ATTEMPT_BUCKETS.len()],
}

impl Default for AttemptHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptHistogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn observe(&self, attempts: u64) {
        self.sum.fetch_add(attempts, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (bucket, &bound) in self.buckets.iter().zip(ATTEMPT_BUCKETS.iter()) {
            if attempts <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns `(sum, count, cumulative bucket counts)`.
    pub fn snapshot(&self) -> (u64, u64, [u64; ATTEMPT_BUCKETS.len()]) {
        let buckets = std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed));
        (
            self.sum.load(Ordering::Relaxed),
            self.count.load(Ordering::Relaxed),
            buckets,
        )
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let (sum, count, buckets) = self.snapshot();
        let mut output = String::with_capacity(512);

        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (bound, value) in ATTEMPT_BUCKETS.iter().zip(buckets.iter()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, bound, value);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(output, "{}_sum {}", name, sum);
        let _ = writeln!(output, "{}_count {}", name, count);

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_cumulative() {
        let h = AttemptHistogram::new();
        h.observe(1);
        h.observe(2);
        h.observe(5);
        h.observe(40);

        let (sum, count, buckets) = h.snapshot();
        assert_eq!(sum, 48);
        assert_eq!(count, 4);
        assert_eq!(buckets, [1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn prometheus_format_has_inf_bucket() {
        let h = AttemptHistogram::new();
        h.observe(1);
        h.observe(2);

        let output = h.format_prometheus("idsmith_attempts", "Attempts per create");
        assert!(output.contains("# TYPE idsmith_attempts histogram"));
        assert!(output.contains("idsmith_attempts_bucket{le=\"1\"} 1"));
        assert!(output.contains("idsmith_attempts_bucket{le=\"+Inf\"} 2"));
        assert!(output.contains("idsmith_attempts_sum 3"));
    }
}
