use std::path::Path;

use rocksdb::{
    Direction, IteratorMode, Options, ReadOptions, TransactionDB, TransactionDBOptions,
};

use crate::contracts::{
    current_timestamp_ms, validate_collection_id, CounterRecord, NewRecord, RecordStore,
    SequenceAllocator, SequenceError, StorageError, StoredRecord,
};

/// Key prefix for counter documents
const COUNTER_PREFIX: &str = "ctr";
/// Key prefix for the (collection, custom_id) uniqueness index
const IDENTIFIER_PREFIX: &str = "cid";
/// Key prefix for record documents
const RECORD_PREFIX: &str = "rec";

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// How long a transaction waits for a contended key lock, in ms.
    pub lock_timeout_ms: i64,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1_000,
            write_buffer_size: 16 * 1024 * 1024,
        }
    }
}

impl RocksDbConfig {
    /// Creates a RocksDbConfig from environment variables.
    ///
    /// Environment variables:
    /// - `IDSMITH_LOCK_TIMEOUT_MS`: Key lock wait in ms (default: 1000)
    /// - `IDSMITH_WRITE_BUFFER_MB`: Memtable size in MiB (default: 16)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            lock_timeout_ms: std::env::var("IDSMITH_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms: &i64| *ms > 0)
                .unwrap_or(default.lock_timeout_ms),
            write_buffer_size: std::env::var("IDSMITH_WRITE_BUFFER_MB")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|mb| *mb > 0)
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(default.write_buffer_size),
        }
    }
}

/// RocksDB-backed storage for counters and records.
///
/// Uses a pessimistic `TransactionDB`: every counter increment and every
/// record insert is one transaction that locks the contended key with
/// `get_for_update` before writing. Concurrent callers on the same key are
/// serialized by RocksDB; callers on different keys never wait on each other.
pub struct RocksDbStorage {
    db: TransactionDB,
}

impl RocksDbStorage {
    /// Opens or creates storage at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_config(path, &RocksDbConfig::default())
    }

    /// Opens or creates storage at the given path.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: &RocksDbConfig,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(config.write_buffer_size);

        let parallelism = std::thread::available_parallelism()
            .map(|p| p.get() as i32)
            .unwrap_or(4);
        opts.increase_parallelism(parallelism);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(config.lock_timeout_ms);

        let db = TransactionDB::open(&opts, &txn_opts, path)
            .map_err(|e| StorageError::RocksDb(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            lock_timeout_ms = config.lock_timeout_ms,
            "Opened RocksDB storage"
        );

        Ok(Self { db })
    }

    /// Creates a counter key.
    fn counter_key(scope_key: &str) -> String {
        format!("{}:{}", COUNTER_PREFIX, scope_key)
    }

    /// Creates a uniqueness index key.
    fn identifier_key(collection_id: &str, custom_id: &str) -> String {
        format!("{}:{}:{}", IDENTIFIER_PREFIX, collection_id, custom_id)
    }

    /// Creates a record key. v7 UUIDs keep keys in creation order.
    fn record_key(collection_id: &str, record: &StoredRecord) -> String {
        format!(
            "{}:{}:{}",
            RECORD_PREFIX,
            collection_id,
            record.id.as_simple()
        )
    }

    fn record_prefix(collection_id: &str) -> String {
        format!("{}:{}:", RECORD_PREFIX, collection_id)
    }

    /// Exclusive upper bound for a collection's record keys (':' + 1 == ';').
    fn record_upper_bound(collection_id: &str) -> Vec<u8> {
        format!("{}:{};", RECORD_PREFIX, collection_id).into_bytes()
    }

    fn serialize_counter(counter: &CounterRecord) -> Result<Vec<u8>, SequenceError> {
        bincode::serialize(counter).map_err(|e| SequenceError::StorageUnavailable(e.to_string()))
    }

    fn deserialize_counter(bytes: &[u8]) -> Result<CounterRecord, SequenceError> {
        bincode::deserialize(bytes).map_err(|e| SequenceError::StorageUnavailable(e.to_string()))
    }

    fn serialize_record(record: &StoredRecord) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize_record(bytes: &[u8]) -> Result<StoredRecord, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Returns a snapshot of a counter document, if it exists.
    pub fn counter(&self, scope_key: &str) -> Result<Option<CounterRecord>, SequenceError> {
        let key = Self::counter_key(scope_key);
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_counter(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(SequenceError::StorageUnavailable(e.to_string())),
        }
    }

    /// Iterates the records of one collection in key (creation) order.
    fn scan_records(
        &self,
        collection_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        let prefix = Self::record_prefix(collection_id);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_upper_bound(Self::record_upper_bound(collection_id));

        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
            read_opts,
        );

        let mut records = Vec::new();
        for item in iter.skip(offset) {
            if records.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            records.push(Self::deserialize_record(&value)?);
        }
        Ok(records)
    }
}

impl SequenceAllocator for RocksDbStorage {
    fn next_sequence(&self, scope_key: &str) -> Result<u64, SequenceError> {
        let key = Self::counter_key(scope_key);
        let unavailable = |e: rocksdb::Error| SequenceError::StorageUnavailable(e.to_string());

        // The transaction holds the key lock from get_for_update until commit,
        // so no other caller can read the same base value. Dropping it on any
        // early return rolls back and releases the lock.
        let txn = self.db.transaction();
        let current = match txn.get_for_update(key.as_bytes(), true).map_err(unavailable)? {
            Some(bytes) => Self::deserialize_counter(&bytes)?.seq,
            None => 0,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| SequenceError::Overflow(scope_key.to_string()))?;

        let counter = CounterRecord {
            key: scope_key.to_string(),
            seq: next,
            updated_at_ms: current_timestamp_ms(),
        };
        txn.put(key.as_bytes(), Self::serialize_counter(&counter)?)
            .map_err(unavailable)?;
        txn.commit().map_err(unavailable)?;

        Ok(next)
    }

    fn current_sequence(&self, scope_key: &str) -> Result<u64, SequenceError> {
        Ok(self.counter(scope_key)?.map(|c| c.seq).unwrap_or(0))
    }
}

impl RecordStore for RocksDbStorage {
    fn insert(&self, record: NewRecord) -> Result<StoredRecord, StorageError> {
        validate_collection_id(&record.collection_id)?;
        let rocks = |e: rocksdb::Error| StorageError::RocksDb(e.to_string());

        let index_key = Self::identifier_key(&record.collection_id, &record.custom_id);
        let txn = self.db.transaction();
        if txn
            .get_for_update(index_key.as_bytes(), true)
            .map_err(rocks)?
            .is_some()
        {
            return Err(StorageError::UniqueViolation {
                collection: record.collection_id,
                custom_id: record.custom_id,
            });
        }

        let stored = StoredRecord::from_new(record);
        let record_key = Self::record_key(&stored.collection_id, &stored);
        txn.put(index_key.as_bytes(), record_key.as_bytes())
            .map_err(rocks)?;
        txn.put(record_key.as_bytes(), Self::serialize_record(&stored)?)
            .map_err(rocks)?;
        txn.commit().map_err(rocks)?;

        Ok(stored)
    }

    fn get_by_custom_id(
        &self,
        collection_id: &str,
        custom_id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let rocks = |e: rocksdb::Error| StorageError::RocksDb(e.to_string());
        let index_key = Self::identifier_key(collection_id, custom_id);

        let Some(record_key) = self.db.get(index_key.as_bytes()).map_err(rocks)? else {
            return Ok(None);
        };
        match self.db.get(&record_key).map_err(rocks)? {
            Some(bytes) => Ok(Some(Self::deserialize_record(&bytes)?)),
            None => Err(StorageError::RocksDb(format!(
                "index entry {} points at a missing record",
                index_key
            ))),
        }
    }

    fn list(
        &self,
        collection_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        self.scan_records(collection_id, offset, limit)
    }

    fn count(&self, collection_id: &str) -> Result<usize, StorageError> {
        let prefix = Self::record_prefix(collection_id);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_upper_bound(Self::record_upper_bound(collection_id));

        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
            read_opts,
        );
        let mut count = 0;
        for item in iter {
            let (key, _) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (RocksDbStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        (storage, dir)
    }

    fn new_record(collection: &str, custom_id: &str) -> NewRecord {
        NewRecord {
            collection_id: collection.into(),
            custom_id: custom_id.into(),
            fields: serde_json::json!({ "title": "Widget", "qty": 3 }),
            created_by: Some("user-1".into()),
        }
    }

    #[test]
    fn first_allocation_returns_one() {
        let (storage, _dir) = create_test_storage();
        assert_eq!(storage.current_sequence("inv:a").unwrap(), 0);
        assert_eq!(storage.next_sequence("inv:a").unwrap(), 1);
        assert_eq!(storage.next_sequence("inv:a").unwrap(), 2);
        assert_eq!(storage.current_sequence("inv:a").unwrap(), 2);
    }

    #[test]
    fn counter_document_is_upserted() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.counter("inv:x").unwrap().is_none());

        storage.next_sequence("inv:x").unwrap();
        let counter = storage.counter("inv:x").unwrap().unwrap();
        assert_eq!(counter.key, "inv:x");
        assert_eq!(counter.seq, 1);
        assert!(counter.updated_at_ms > 0);
    }

    #[test]
    fn counters_are_isolated_per_key() {
        let (storage, _dir) = create_test_storage();
        for _ in 0..3 {
            storage.next_sequence("inv:a").unwrap();
        }
        assert_eq!(storage.next_sequence("inv:b").unwrap(), 1);
        assert_eq!(storage.next_sequence("inv:a").unwrap(), 4);
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.insert(new_record("c1", "INV-0001")).unwrap();

        let fetched = storage.get_by_custom_id("c1", "INV-0001").unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.fields["qty"], 3);
        assert!(storage.get_by_custom_id("c1", "INV-0002").unwrap().is_none());
        assert!(storage.get_by_custom_id("c2", "INV-0001").unwrap().is_none());
    }

    #[test]
    fn duplicate_identifier_is_rejected_and_leaves_no_trace() {
        let (storage, _dir) = create_test_storage();
        let first = storage.insert(new_record("c1", "A-1")).unwrap();

        let err = storage.insert(new_record("c1", "A-1")).unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(storage.count("c1").unwrap(), 1);
        assert_eq!(
            storage.get_by_custom_id("c1", "A-1").unwrap().unwrap().id,
            first.id
        );
    }

    #[test]
    fn identifiers_are_scoped_per_collection() {
        let (storage, _dir) = create_test_storage();
        storage.insert(new_record("c1", "A-1")).unwrap();
        storage.insert(new_record("c2", "A-1")).unwrap();
        // "c1" must not see records of a collection whose id extends it.
        storage.insert(new_record("c10", "A-1")).unwrap();

        assert_eq!(storage.count("c1").unwrap(), 1);
        assert_eq!(storage.count("c10").unwrap(), 1);
        assert_eq!(storage.list("c1", 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn list_pages_in_creation_order() {
        let (storage, _dir) = create_test_storage();
        for i in 0..10 {
            storage
                .insert(new_record("c1", &format!("ID-{:02}", i)))
                .unwrap();
        }

        let page: Vec<String> = storage
            .list("c1", 4, 3)
            .unwrap()
            .into_iter()
            .map(|r| r.custom_id)
            .collect();
        assert_eq!(page, vec!["ID-04", "ID-05", "ID-06"]);
        assert!(storage.list("c1", 10, 5).unwrap().is_empty());
    }

    #[test]
    fn custom_ids_may_contain_separators() {
        let (storage, _dir) = create_test_storage();
        storage.insert(new_record("c1", "a:b:c")).unwrap();
        assert!(storage.get_by_custom_id("c1", "a:b:c").unwrap().is_some());
        assert!(storage
            .insert(new_record("c1", "a:b:c"))
            .unwrap_err()
            .is_unique_violation());
    }

    #[test]
    fn rejects_collection_ids_with_separator() {
        let (storage, _dir) = create_test_storage();
        assert!(matches!(
            storage.insert(new_record("c:1", "x")),
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[test]
    fn config_from_env_ignores_invalid_values() {
        std::env::set_var("IDSMITH_LOCK_TIMEOUT_MS", "-5");
        std::env::set_var("IDSMITH_WRITE_BUFFER_MB", "lots");

        let config = RocksDbConfig::from_env();
        assert_eq!(config.lock_timeout_ms, 1_000);
        assert_eq!(config.write_buffer_size, 16 * 1024 * 1024);

        std::env::remove_var("IDSMITH_LOCK_TIMEOUT_MS");
        std::env::remove_var("IDSMITH_WRITE_BUFFER_MB");
    }
}
