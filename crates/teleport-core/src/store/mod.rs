pub mod channel_cache;
pub mod storage;
pub mod working_set;

pub use channel_cache::ChannelCache;
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
pub use working_set::{InsertOutcome, WorkingSet};
