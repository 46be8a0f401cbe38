//! In-memory search cache and cleanup of served files

pub mod cache;
pub mod cleanup;

pub use cache::{CacheStats, SearchCache};
pub use cleanup::{FileLease, FileReaper};
