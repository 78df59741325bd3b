//! Thread participation registry
//!
//! Tracks which agents have appeared in each thread and when the thread
//! was last active. Participation order is first appearance; entries are
//! never removed, matching the transcript the state could be rebuilt from.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{ChatMessage, ThreadState};

/// Owner of per-thread participation state
#[derive(Default)]
pub struct ThreadRegistry {
    threads: RwLock<HashMap<String, ThreadState>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a message arrived in its thread (no-op for top-level
    /// room messages)
    pub async fn note_message(&self, message: &ChatMessage) {
        let Some(thread_id) = &message.thread_id else {
            return;
        };
        let mut threads = self.threads.write().await;
        let state = threads
            .entry(thread_id.clone())
            .or_insert_with(|| ThreadState {
                thread_id: thread_id.clone(),
                room_id: message.room_id.clone(),
                participating_agents: Vec::new(),
                last_activity_at: message.timestamp,
            });
        state.last_activity_at = message.timestamp;
    }

    /// Record an agent's first appearance in a thread. Appending keeps
    /// first-appearance order; repeats are ignored.
    pub async fn note_participant(&self, thread_id: &str, room_id: &str, agent: &str) {
        let mut threads = self.threads.write().await;
        let state = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| ThreadState {
                thread_id: thread_id.to_string(),
                room_id: room_id.to_string(),
                participating_agents: Vec::new(),
                last_activity_at: Utc::now(),
            });
        if !state.participating_agents.iter().any(|a| a == agent) {
            debug!("Thread {}: agent {} joined participants", thread_id, agent);
            state.participating_agents.push(agent.to_string());
        }
    }

    /// Copied snapshot of a thread's participants in first-appearance order
    pub async fn participants(&self, thread_id: &str) -> Vec<String> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .map(|s| s.participating_agents.clone())
            .unwrap_or_default()
    }

    /// Copied snapshot of the full thread state
    pub async fn state(&self, thread_id: &str) -> Option<ThreadState> {
        self.threads.read().await.get(thread_id).cloned()
    }
}
