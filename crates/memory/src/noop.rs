//! No-op store: disables long-term memory entirely.

use async_trait::async_trait;
use blockmind_core::error::MemoryError;
use blockmind_core::{ActionToken, ExperienceRecord, InteractionRecord, LocationRecord, LongTermStore};

/// A long-term store that keeps nothing and always answers empty.
pub struct NoopStore;

#[async_trait]
impl LongTermStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn append_experience(&self, _record: ExperienceRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn append_interaction(&self, _record: InteractionRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn append_location(&self, _record: LocationRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn successful_experiences(
        &self,
        _agent: &str,
        _action: ActionToken,
        _limit: usize,
    ) -> Result<Vec<ExperienceRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn interactions_with(
        &self,
        _agent: &str,
        _peer: &str,
        _limit: usize,
    ) -> Result<Vec<InteractionRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn locations(&self, _agent: &str, _limit: usize) -> Result<Vec<LocationRecord>, MemoryError> {
        Ok(Vec::new())
    }
}
