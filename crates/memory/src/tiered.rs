//! Tiered memory façade: one per agent.
//!
//! Combines the volatile short-term buffer with a handle to the shared
//! long-term store. Short-term appends are serialized by a mutex because both
//! the decision loop and the event reactor write to it. Long-term writes go
//! through a single-writer queue: callers never wait on the store, and
//! [`TieredMemory::close`] drains the queue before returning.

use blockmind_core::error::MemoryError;
use blockmind_core::{
    ActionToken, ExperienceRecord, InteractionRecord, LocationRecord, LongTermStore,
    PerceptionSnapshot, Position, ShortTermEvent, ShortTermKind,
};
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::short_term::ShortTermMemory;

enum WriteOp {
    Experience(ExperienceRecord),
    Interaction(InteractionRecord),
    Location(LocationRecord),
    Flush(oneshot::Sender<()>),
}

/// Short-term buffer plus long-term log for one agent.
pub struct TieredMemory {
    agent_name: String,
    short_term: Mutex<ShortTermMemory>,
    store: Arc<dyn LongTermStore>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteOp>>>,
    writer_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TieredMemory {
    /// Create the memory for `agent_name`, spawning its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(agent_name: impl Into<String>, store: Arc<dyn LongTermStore>) -> Self {
        Self::with_capacity(agent_name, store, crate::short_term::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        agent_name: impl Into<String>,
        store: Arc<dyn LongTermStore>,
        capacity: usize,
    ) -> Self {
        let agent_name = agent_name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(agent_name.clone(), Arc::clone(&store), rx));

        Self {
            agent_name,
            short_term: Mutex::new(ShortTermMemory::new(capacity)),
            store,
            writer: Mutex::new(Some(tx)),
            writer_task: tokio::sync::Mutex::new(Some(task)),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// The shared long-term store behind this memory.
    pub fn store(&self) -> &Arc<dyn LongTermStore> {
        &self.store
    }

    fn buffer(&self) -> MutexGuard<'_, ShortTermMemory> {
        // A panic while holding the lock cannot leave the deque half-written.
        self.short_term
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Short-term ---

    /// Append a short-term event stamped now, evicting the oldest if full.
    pub fn add_event(&self, kind: ShortTermKind, payload: serde_json::Value) {
        let evicted = self.buffer().push(ShortTermEvent::now(kind, payload));
        if let Some(old) = evicted {
            debug!(agent = %self.agent_name, evicted = %old.kind, "Short-term buffer full");
        }
    }

    /// The last `n` events, newest last.
    pub fn recent_events(&self, n: usize) -> Vec<ShortTermEvent> {
        self.buffer().recent(n)
    }

    pub fn short_term_len(&self) -> usize {
        self.buffer().len()
    }

    // --- Long-term writes (fire-and-forget) ---

    fn enqueue(&self, op: WriteOp) {
        let sender = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let delivered = sender.as_ref().is_some_and(|tx| tx.send(op).is_ok());
        if !delivered {
            warn!(agent = %self.agent_name, error = %MemoryError::Closed, "Dropping long-term write");
        }
    }

    /// Append one experience row for a completed dispatch.
    pub fn record_experience(
        &self,
        action: ActionToken,
        snapshot: &PerceptionSnapshot,
        result: &str,
        success: bool,
    ) {
        let snapshot = serde_json::to_string(snapshot).unwrap_or_else(|e| {
            warn!(agent = %self.agent_name, error = %e, "Snapshot serialization failed");
            "{}".into()
        });
        let result = serde_json::Value::String(result.to_string()).to_string();

        self.enqueue(WriteOp::Experience(ExperienceRecord {
            agent_name: self.agent_name.clone(),
            timestamp: Utc::now(),
            action,
            snapshot,
            result,
            success,
        }));
    }

    /// Append one interaction row for an answered chat message.
    pub fn record_interaction(&self, peer: &str, message: &str, reply: &str) {
        self.enqueue(WriteOp::Interaction(InteractionRecord {
            agent_name: self.agent_name.clone(),
            timestamp: Utc::now(),
            peer: peer.to_string(),
            message: message.to_string(),
            reply: reply.to_string(),
        }));
    }

    /// Append one visited location.
    pub fn record_location(&self, position: Position, biome: &str, notable_blocks: Vec<String>) {
        self.enqueue(WriteOp::Location(LocationRecord {
            agent_name: self.agent_name.clone(),
            timestamp: Utc::now(),
            position,
            biome: biome.to_string(),
            notable_blocks,
        }));
    }

    // --- Long-term queries ---

    /// Most recent successful experiences for `action`, newest first.
    pub async fn query_outcomes(
        &self,
        action: ActionToken,
        limit: usize,
    ) -> Result<Vec<ExperienceRecord>, MemoryError> {
        self.store
            .successful_experiences(&self.agent_name, action, limit)
            .await
    }

    /// Most recent interactions with `peer`, newest first.
    pub async fn query_interactions(
        &self,
        peer: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>, MemoryError> {
        self.store.interactions_with(&self.agent_name, peer, limit).await
    }

    /// Most recent visited locations, newest first.
    pub async fn query_locations(&self, limit: usize) -> Result<Vec<LocationRecord>, MemoryError> {
        self.store.locations(&self.agent_name, limit).await
    }

    // --- Lifecycle ---

    /// Wait until every write queued so far has reached the store.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(WriteOp::Flush(ack_tx));
        // A closed queue drops the ack sender; nothing is pending then.
        let _ = ack_rx.await;
    }

    /// Stop accepting writes and wait for the queue to drain.
    ///
    /// Does not close the underlying store, which may be shared.
    pub async fn close(&self) {
        let sender = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);

        if let Some(task) = self.writer_task.lock().await.take()
            && let Err(e) = task.await
        {
            warn!(agent = %self.agent_name, error = %e, "Memory writer task failed");
        }
        debug!(agent = %self.agent_name, "Memory closed");
    }

    pub fn is_closed(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// A compact description of the short-term state.
    pub fn summary(&self) -> MemorySummary {
        let buffer = self.buffer();
        MemorySummary {
            agent_name: self.agent_name.clone(),
            short_term_count: buffer.len(),
            recent_kinds: buffer.recent(3).into_iter().map(|e| e.kind).collect(),
            store: self.store.name().to_string(),
        }
    }
}

async fn run_writer(
    agent_name: String,
    store: Arc<dyn LongTermStore>,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
) {
    while let Some(op) = rx.recv().await {
        let (kind, result) = match op {
            WriteOp::Experience(record) => ("experience", store.append_experience(record).await),
            WriteOp::Interaction(record) => {
                ("interaction", store.append_interaction(record).await)
            }
            WriteOp::Location(record) => ("location", store.append_location(record).await),
            WriteOp::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };
        if let Err(e) = result {
            warn!(agent = %agent_name, kind, error = %e, "Long-term write failed");
        }
    }
    debug!(agent = %agent_name, "Memory writer drained");
}

/// Snapshot of a memory's short-term state.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySummary {
    pub agent_name: String,
    pub short_term_count: usize,
    /// Kinds of the last three events, oldest first.
    pub recent_kinds: Vec<ShortTermKind>,
    pub store: String,
}

impl fmt::Display for MemorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.recent_kinds.iter().map(|k| k.as_str()).collect();
        write!(
            f,
            "{}: {} short-term events (recent: {}), store: {}",
            self.agent_name,
            self.short_term_count,
            if kinds.is_empty() {
                "none".to_string()
            } else {
                kinds.join(", ")
            },
            self.store
        )
    }
}
