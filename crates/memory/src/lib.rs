//! Memory system implementations for blockmind.
//!
//! - [`ShortTermMemory`]: bounded volatile buffer of recent events
//! - [`TieredMemory`]: per-agent façade over the buffer and a long-term store
//! - Long-term stores: SQLite, in-memory, and no-op

pub mod in_memory;
pub mod noop;
pub mod short_term;
pub mod tiered;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use noop::NoopStore;
pub use short_term::ShortTermMemory;
pub use tiered::{MemorySummary, TieredMemory};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use blockmind_core::LongTermStore;
use blockmind_core::error::MemoryError;
use std::path::Path;
use std::sync::Arc;

/// Open the long-term store named by `backend` ("sqlite", "in_memory", "none").
pub async fn open_store(backend: &str, path: &Path) -> Result<Arc<dyn LongTermStore>, MemoryError> {
    match backend {
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::open_file(path).await?)),
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        "none" => Ok(Arc::new(NoopStore)),
        other => Err(MemoryError::Storage(format!(
            "Unknown memory backend '{other}' (path {})",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_store_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.db");
        assert_eq!(open_store("in_memory", &path).await.unwrap().name(), "in_memory");
        assert_eq!(open_store("none", &path).await.unwrap().name(), "none");
        assert_eq!(open_store("sqlite", &path).await.unwrap().name(), "sqlite");
        assert!(open_store("redis", &path).await.is_err());
    }
}
