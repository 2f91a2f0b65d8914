//! Observability metrics for identifier generation.
//!
//! All metrics are lock-free atomics so recording them never contends with
//! the create path.

pub mod histogram;
pub mod registry;

pub use histogram::AttemptHistogram;
pub use registry::IdentifierMetrics;
