use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::contracts::{
    current_timestamp_ms, validate_collection_id, CounterRecord, NewRecord, RecordStore,
    SequenceAllocator, SequenceError, StorageError, StoredRecord,
};

/// In-process storage backed by concurrent maps.
///
/// Counter increments run under the map's per-shard entry lock, which makes
/// the upsert-and-increment a single atomic step. Record uniqueness relies
/// on the same entry API.
#[derive(Default)]
pub struct MemoryStorage {
    counters: DashMap<String, CounterRecord>,
    /// Keyed by (collection_id, custom_id).
    records: DashMap<(String, String), StoredRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of a counter document, if it exists.
    pub fn counter(&self, scope_key: &str) -> Option<CounterRecord> {
        self.counters.get(scope_key).map(|c| c.value().clone())
    }
}

impl SequenceAllocator for MemoryStorage {
    fn next_sequence(&self, scope_key: &str) -> Result<u64, SequenceError> {
        let mut counter = self
            .counters
            .entry(scope_key.to_string())
            .or_insert_with(|| CounterRecord::new(scope_key));

        let next = counter
            .seq
            .checked_add(1)
            .ok_or_else(|| SequenceError::Overflow(scope_key.to_string()))?;
        counter.seq = next;
        counter.updated_at_ms = current_timestamp_ms();
        Ok(next)
    }

    fn current_sequence(&self, scope_key: &str) -> Result<u64, SequenceError> {
        Ok(self.counters.get(scope_key).map(|c| c.seq).unwrap_or(0))
    }
}

impl RecordStore for MemoryStorage {
    fn insert(&self, record: NewRecord) -> Result<StoredRecord, StorageError> {
        validate_collection_id(&record.collection_id)?;

        let key = (record.collection_id.clone(), record.custom_id.clone());
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(StorageError::UniqueViolation {
                collection: record.collection_id,
                custom_id: record.custom_id,
            }),
            Entry::Vacant(slot) => {
                let stored = StoredRecord::from_new(record);
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    fn get_by_custom_id(
        &self,
        collection_id: &str,
        custom_id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let key = (collection_id.to_string(), custom_id.to_string());
        Ok(self.records.get(&key).map(|r| r.value().clone()))
    }

    fn list(
        &self,
        collection_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        let mut records: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|r| r.key().0 == collection_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&self, collection_id: &str) -> Result<usize, StorageError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.key().0 == collection_id)
            .count())
    }
}
