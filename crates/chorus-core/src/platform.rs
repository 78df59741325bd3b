//! Collaborator traits for the chat platform and agent execution
//!
//! The core never talks to a chat service or a model directly; it sees
//! these traits only. Adapters live outside the core (the CLI ships a
//! console adapter for local runs).

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ChatMessage, Decision};

/// The chat service the core runs against
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a reply into a room, or into a thread when `thread_id` is set
    async fn send_reply(
        &self,
        room_id: &str,
        thread_id: Option<&str>,
        text: &str,
    ) -> Result<()>;

    /// Ordered history of a thread, oldest first
    async fn thread_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>>;

    /// Revoke an agent's low-level room access. Call-through only; whether
    /// the platform honors it is its own concern.
    async fn remove_agent_from_room(&self, agent: &str, room_id: &str) -> Result<()>;
}

/// The out-of-scope collaborator that actually produces an agent's reply
/// (model invocation, prompting, tools all live behind this seam)
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn respond(
        &self,
        agent: &str,
        message: &ChatMessage,
        decision: &Decision,
    ) -> Result<String>;
}
