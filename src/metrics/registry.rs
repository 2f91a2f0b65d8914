//! Counters describing identifier generation outcomes.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use super::AttemptHistogram;

/// Metrics recorded by the uniqueness guard.
#[derive(Default)]
pub struct IdentifierMetrics {
    /// Records created with a generated identifier
    pub created_total: AtomicU64,
    /// Records created with a caller-supplied identifier
    pub explicit_total: AtomicU64,
    /// Sequence numbers taken from the allocator
    pub sequences_allocated_total: AtomicU64,
    /// Inserts rejected by the uniqueness constraint
    pub conflicts_total: AtomicU64,
    /// Create calls that ran out of attempts
    pub exhausted_total: AtomicU64,
    /// Attempts needed per successful generated create
    pub attempts: AttemptHistogram,
}

impl IdentifierMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_created(&self, attempts: u32) {
        self.created_total.fetch_add(1, Ordering::Relaxed);
        self.attempts.observe(u64::from(attempts));
    }

    #[inline]
    pub fn record_explicit(&self) {
        self.explicit_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sequence_allocated(&self) {
        self.sequences_allocated_total
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_conflict(&self) {
        self.conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exhausted(&self) {
        self.exhausted_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Formats all metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        let counters: [(&str, &str, &AtomicU64); 5] = [
            (
                "idsmith_created_total",
                "Records created with a generated identifier",
                &self.created_total,
            ),
            (
                "idsmith_explicit_total",
                "Records created with a caller-supplied identifier",
                &self.explicit_total,
            ),
            (
                "idsmith_sequences_allocated_total",
                "Sequence numbers allocated",
                &self.sequences_allocated_total,
            ),
            (
                "idsmith_conflicts_total",
                "Inserts rejected by the uniqueness constraint",
                &self.conflicts_total,
            ),
            (
                "idsmith_exhausted_total",
                "Create calls that exhausted all attempts",
                &self.exhausted_total,
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
        }

        output.push_str(
            &self
                .attempts
                .format_prometheus("idsmith_create_attempts", "Insert attempts per generated create"),
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_formats() {
        let metrics = IdentifierMetrics::new();
        metrics.record_sequence_allocated();
        metrics.record_sequence_allocated();
        metrics.record_conflict();
        metrics.record_created(2);
        metrics.record_explicit();

        let output = metrics.format_prometheus();
        assert!(output.contains("idsmith_created_total 1"));
        assert!(output.contains("idsmith_explicit_total 1"));
        assert!(output.contains("idsmith_sequences_allocated_total 2"));
        assert!(output.contains("idsmith_conflicts_total 1"));
        assert!(output.contains("idsmith_exhausted_total 0"));
        assert!(output.contains("idsmith_create_attempts_count 1"));
    }
}
