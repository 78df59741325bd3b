//! Response tracker
//!
//! Guarantees at-most-once dispatch per (agent, message), within a process
//! lifetime and across restarts. The durable truth is one cursor per agent
//! (the last committed message by timestamp and id), so storage stays
//! bounded no matter how long the history grows. A small LRU of recently
//! approved (agent, message) pairs short-circuits same-process retries
//! without a durability round-trip; it is never the source of truth.
//!
//! Ordering contract: `should_dispatch` reserves, `mark_dispatched` commits
//! the cursor durably, and only then may the caller produce any externally
//! visible effect. Write-then-act trades a small under-delivery window on
//! crash for never sending a duplicate reply.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use anyhow::{Context, Result};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::persistence::Store;
use crate::types::{AgentCursor, ChatMessage};

const RECENT_CACHE_SIZE: usize = 4096;

/// Dedup guard over per-agent durable cursors
pub struct ResponseTracker {
    inner: Mutex<TrackerInner>,
    store: Store,
}

struct TrackerInner {
    cursors: HashMap<String, AgentCursor>,
    /// Recently approved (agent, message_id) pairs, process-local fast path
    recent: LruCache<(String, String), ()>,
}

impl ResponseTracker {
    /// Build the tracker from persisted cursors so processing resumes
    /// strictly after each agent's last committed message
    pub async fn load(store: Store) -> Result<Self> {
        let persisted = store.load_cursors().await?;
        let mut cursors = HashMap::new();
        for cursor in persisted {
            cursors.insert(cursor.agent_name.clone(), cursor);
        }
        info!("ResponseTracker: loaded {} agent cursors", cursors.len());
        Ok(Self {
            inner: Mutex::new(TrackerInner {
                cursors,
                recent: LruCache::new(
                    NonZeroUsize::new(RECENT_CACHE_SIZE).expect("cache size is non-zero"),
                ),
            }),
            store,
        })
    }

    /// Whether this agent should handle this message. Returns true at most
    /// once per (agent, message) pair: the pair is reserved in the recent
    /// cache under the same lock, so a concurrent redelivery of the same
    /// message id cannot also get true.
    pub async fn should_dispatch(&self, agent: &str, message: &ChatMessage) -> bool {
        let mut inner = self.inner.lock().await;

        if let Some(cursor) = inner.cursors.get(agent) {
            if message.timestamp < cursor.message_ts {
                debug!(
                    "Skip {}: message {} predates cursor {}",
                    agent, message.id, cursor.message_id
                );
                return false;
            }
            if message.timestamp == cursor.message_ts && message.id == cursor.message_id {
                debug!("Skip {}: message {} is the cursor itself", agent, message.id);
                return false;
            }
        }

        let key = (agent.to_string(), message.id.clone());
        if inner.recent.contains(&key) {
            debug!("Skip {}: message {} already reserved", agent, message.id);
            return false;
        }
        inner.recent.put(key, ());
        true
    }

    /// Durably commit that dispatch of this message was attempted. Must
    /// complete before the reply becomes externally visible. The cursor
    /// only moves forward; a commit for an older message is a no-op in
    /// storage terms but still succeeds.
    pub async fn mark_dispatched(&self, agent: &str, message: &ChatMessage) -> Result<()> {
        let cursor = {
            let mut inner = self.inner.lock().await;
            let advances = match inner.cursors.get(agent) {
                Some(current) => message.timestamp >= current.message_ts,
                None => true,
            };
            if !advances {
                return Ok(());
            }
            let cursor = AgentCursor {
                agent_name: agent.to_string(),
                message_id: message.id.clone(),
                message_ts: message.timestamp,
            };
            inner.cursors.insert(agent.to_string(), cursor.clone());
            cursor
        };

        self.store
            .save_cursor(cursor)
            .await
            .with_context(|| format!("Failed to commit cursor for {}", agent))
    }

    /// Current cursor for an agent, if any (diagnostics and tests)
    pub async fn cursor(&self, agent: &str) -> Option<AgentCursor> {
        self.inner.lock().await.cursors.get(agent).cloned()
    }
}
