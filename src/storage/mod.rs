mod memory;
mod rocksdb;

pub use memory::MemoryStorage;
pub use self::rocksdb::{RocksDbConfig, RocksDbStorage};
