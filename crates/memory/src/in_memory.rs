//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use blockmind_core::error::MemoryError;
use blockmind_core::{ActionToken, ExperienceRecord, InteractionRecord, LocationRecord, LongTermStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    experiences: Vec<ExperienceRecord>,
    interactions: Vec<InteractionRecord>,
    locations: Vec<LocationRecord>,
}

/// A long-term store that keeps every record in process memory.
/// Rows are returned newest first; ties keep reverse insertion order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all tables.
    pub async fn len(&self) -> usize {
        let t = self.tables.read().await;
        t.experiences.len() + t.interactions.len() + t.locations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), MemoryError> {
        if self.is_closed() {
            Err(MemoryError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Newest-first selection of at most `limit` rows matching `keep`.
fn newest<T: Clone>(
    rows: &[T],
    limit: usize,
    timestamp: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut selected: Vec<(usize, &T)> = rows.iter().enumerate().filter(|(_, r)| keep(*r)).collect();
    selected.sort_by(|(ia, a), (ib, b)| timestamp(*b).cmp(&timestamp(*a)).then(ib.cmp(ia)));
    selected.into_iter().take(limit).map(|(_, r)| r.clone()).collect()
}

#[async_trait]
impl LongTermStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_experience(&self, record: ExperienceRecord) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.tables.write().await.experiences.push(record);
        Ok(())
    }

    async fn append_interaction(&self, record: InteractionRecord) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.tables.write().await.interactions.push(record);
        Ok(())
    }

    async fn append_location(&self, record: LocationRecord) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.tables.write().await.locations.push(record);
        Ok(())
    }

    async fn successful_experiences(
        &self,
        agent: &str,
        action: ActionToken,
        limit: usize,
    ) -> Result<Vec<ExperienceRecord>, MemoryError> {
        self.ensure_open()?;
        let t = self.tables.read().await;
        Ok(newest(&t.experiences, limit, |r| r.timestamp, |r| {
            r.agent_name == agent && r.action == action && r.success
        }))
    }

    async fn interactions_with(
        &self,
        agent: &str,
        peer: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>, MemoryError> {
        self.ensure_open()?;
        let t = self.tables.read().await;
        Ok(newest(&t.interactions, limit, |r| r.timestamp, |r| {
            r.agent_name == agent && r.peer == peer
        }))
    }

    async fn locations(&self, agent: &str, limit: usize) -> Result<Vec<LocationRecord>, MemoryError> {
        self.ensure_open()?;
        let t = self.tables.read().await;
        Ok(newest(&t.locations, limit, |r| r.timestamp, |r| r.agent_name == agent))
    }

    async fn close(&self) -> Result<(), MemoryError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
