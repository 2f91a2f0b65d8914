pub mod contracts;
pub mod guard;
pub mod metrics;
pub mod storage;
pub mod template;
