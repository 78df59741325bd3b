//! Routing suggester collaborator
//!
//! Consulted only when a thread has no participants yet. Treated as
//! unreliable by contract: the decision engine wraps every call in a
//! timeout and maps errors to "nobody responds", so implementations here
//! can fail freely.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::ChatMessage;

/// External routing collaborator: given a message in a fresh thread and the
/// candidate agents, name the single best responder, or nobody.
#[async_trait]
pub trait RoutingSuggester: Send + Sync {
    async fn suggest(
        &self,
        message: &ChatMessage,
        candidates: &[String],
        thread_context: &[ChatMessage],
    ) -> Result<Option<String>>;
}

/// Fixed-answer suggester, used as the default when no routing service is
/// configured and as a stub in tests
pub struct StaticRoutingSuggester {
    agent: Option<String>,
}

impl StaticRoutingSuggester {
    pub fn new(agent: Option<String>) -> Self {
        Self { agent }
    }

    /// A suggester that always declines to pick anyone
    pub fn none() -> Self {
        Self { agent: None }
    }
}

#[async_trait]
impl RoutingSuggester for StaticRoutingSuggester {
    async fn suggest(
        &self,
        _message: &ChatMessage,
        candidates: &[String],
        _thread_context: &[ChatMessage],
    ) -> Result<Option<String>> {
        Ok(self
            .agent
            .as_ref()
            .filter(|a| candidates.contains(a))
            .cloned())
    }
}

#[derive(Serialize)]
struct SuggestRequest<'a> {
    message: &'a str,
    sender: &'a str,
    room_id: &'a str,
    thread_id: Option<&'a str>,
    candidates: &'a [String],
    context: Vec<ContextLine<'a>>,
}

#[derive(Serialize)]
struct ContextLine<'a> {
    sender: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SuggestResponse {
    agent: Option<String>,
}

/// HTTP-backed suggester: POSTs the message plus thread context to a
/// routing service and reads back `{"agent": "..."}` (or null)
pub struct HttpRoutingSuggester {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRoutingSuggester {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chorus/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build routing HTTP client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RoutingSuggester for HttpRoutingSuggester {
    async fn suggest(
        &self,
        message: &ChatMessage,
        candidates: &[String],
        thread_context: &[ChatMessage],
    ) -> Result<Option<String>> {
        let request = SuggestRequest {
            message: &message.body,
            sender: &message.sender,
            room_id: &message.room_id,
            thread_id: message.thread_id.as_deref(),
            candidates,
            context: thread_context
                .iter()
                .map(|m| ContextLine {
                    sender: &m.sender,
                    body: &m.body,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Routing suggester request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Routing suggester returned status {}", response.status());
        }

        let body: SuggestResponse = response
            .json()
            .await
            .context("Routing suggester returned invalid JSON")?;

        debug!("Routing suggester proposed {:?}", body.agent);
        Ok(body.agent)
    }
}
