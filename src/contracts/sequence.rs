use crate::contracts::error::SequenceError;

/// Prefix for counter scope keys derived from a collection id.
pub const SCOPE_PREFIX: &str = "inv";

/// Builds the counter scope key for a collection.
#[inline]
pub fn scope_key(collection_id: &str) -> String {
    format!("{}:{}", SCOPE_PREFIX, collection_id)
}

/// Allocates per-scope monotonically increasing sequence numbers.
///
/// # Invariants
/// - For a given scope key, every returned value is greater than all values
///   returned before it, and each value is returned to exactly one caller.
/// - The first allocation for an unseen key returns 1.
/// - Increment-and-read is one atomic operation at the storage layer.
/// - A failed call consumes no value.
pub trait SequenceAllocator: Send + Sync {
    /// Increments the counter for `scope_key` and returns the new value.
    fn next_sequence(&self, scope_key: &str) -> Result<u64, SequenceError>;

    /// Returns the last value handed out for `scope_key` (0 if none).
    fn current_sequence(&self, scope_key: &str) -> Result<u64, SequenceError>;
}
