pub mod silent;
pub mod storage;

pub use silent::{Fetcher, RefreshOutcome, SilentCache, SilentCacheOptions, Snapshot};
pub use storage::{FileStorage, MemoryStorage, Storage};
