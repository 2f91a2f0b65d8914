pub mod error;
pub mod sequence;
pub mod storage;

pub use error::{ComposeError, ErrorKind, IdError, LockResultExt, SequenceError, StorageError};
pub use sequence::{scope_key, SequenceAllocator};
pub use storage::{
    current_timestamp_ms, validate_collection_id, CounterRecord, NewRecord, RecordStore,
    StoredRecord,
};
