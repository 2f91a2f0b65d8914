use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::error::StorageError;

/// Record storage with a uniqueness constraint on `(collection_id, custom_id)`.
///
/// # Invariants
/// - At most one record per `(collection_id, custom_id)` pair.
/// - A rejected insert leaves no record and no index entry behind.
/// - Records of one collection never appear in another collection's reads.
pub trait RecordStore: Send + Sync {
    /// Inserts a record.
    /// Fails with `StorageError::UniqueViolation` if the identifier is taken.
    fn insert(&self, record: NewRecord) -> Result<StoredRecord, StorageError>;

    /// Looks up a record by its custom identifier.
    fn get_by_custom_id(
        &self,
        collection_id: &str,
        custom_id: &str,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Lists records of a collection in creation order.
    fn list(
        &self,
        collection_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StorageError>;

    /// Counts the records of a collection.
    fn count(&self, collection_id: &str) -> Result<usize, StorageError>;
}

/// A record ready for insertion, identifier already decided.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub collection_id: String,
    pub custom_id: String,
    pub fields: serde_json::Value,
    pub created_by: Option<String>,
}

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub collection_id: String,
    pub custom_id: String,
    pub fields: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at_ms: i64,
}

impl StoredRecord {
    /// Materializes a new record with a fresh time-ordered id.
    pub fn from_new(record: NewRecord) -> Self {
        Self {
            id: Uuid::now_v7(),
            collection_id: record.collection_id,
            custom_id: record.custom_id,
            fields: record.fields,
            created_by: record.created_by,
            created_at_ms: current_timestamp_ms(),
        }
    }
}

/// Persisted state of one sequence counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub key: String,
    pub seq: u64,
    pub updated_at_ms: i64,
}

impl CounterRecord {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            seq: 0,
            updated_at_ms: current_timestamp_ms(),
        }
    }
}

/// Rejects collection ids that would break key layouts.
pub fn validate_collection_id(collection_id: &str) -> Result<(), StorageError> {
    if collection_id.is_empty() {
        return Err(StorageError::InvalidInput(
            "collection id must not be empty".into(),
        ));
    }
    if collection_id.contains(':') {
        return Err(StorageError::InvalidInput(format!(
            "collection id must not contain ':' (got {:?})",
            collection_id
        )));
    }
    Ok(())
}

/// Milliseconds since the Unix epoch.
#[inline]
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
