//! Console chat adapter for local runs
//!
//! Lets you exercise the full decision pipeline from a terminal: stdin
//! lines become chat messages, replies print to stdout. Lines go to the
//! thread named `main` in the room `console`; prefix a line with `!` to
//! send it as a top-level room message instead. This is a development
//! adapter, not a real platform integration.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chorus_core::{AgentExecutor, ChatMessage, ChatPlatform, Decision};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CONSOLE_ROOM: &str = "console";
pub const CONSOLE_THREAD: &str = "main";

/// Stdout-backed chat platform keeping per-thread history in memory
pub struct ConsolePlatform {
    history: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Record an inbound message so `thread_history` reflects it
    pub async fn record(&self, message: &ChatMessage) {
        if let Some(thread_id) = &message.thread_id {
            self.history
                .lock()
                .await
                .entry(thread_id.clone())
                .or_default()
                .push(message.clone());
        }
    }
}

impl Default for ConsolePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    async fn send_reply(
        &self,
        room_id: &str,
        thread_id: Option<&str>,
        text: &str,
    ) -> Result<()> {
        match thread_id {
            Some(thread) => println!("[{}/{}] {}", room_id, thread, text),
            None => println!("[{}] {}", room_id, text),
        }
        Ok(())
    }

    async fn thread_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .history
            .lock()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_agent_from_room(&self, agent: &str, room_id: &str) -> Result<()> {
        info!("Console: pretending to remove {} from room {}", agent, room_id);
        Ok(())
    }
}

/// Placeholder executor: acknowledges instead of thinking. Real model
/// execution plugs in behind the same trait.
pub struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn respond(
        &self,
        agent: &str,
        message: &ChatMessage,
        decision: &Decision,
    ) -> Result<String> {
        let mode = match decision {
            Decision::Single { .. } => "solo",
            Decision::Team { mode, .. } => match mode {
                chorus_core::TeamMode::Coordinate => "coordinating",
                chorus_core::TeamMode::Collaborate => "collaborating",
            },
            Decision::None => "idle",
        };
        Ok(format!(
            "{} ({}): noted, \"{}\"",
            agent, mode, message.body
        ))
    }
}

/// Read stdin lines and feed them into the runtime inbox until EOF or
/// cancellation
pub async fn read_stdin(
    inbox: mpsc::Sender<ChatMessage>,
    platform: Arc<ConsolePlatform>,
    shutdown: CancellationToken,
) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    println!(
        "chorus console: talking in {}/{} (prefix with '!' for a top-level room message, /help for commands)",
        CONSOLE_ROOM, CONSOLE_THREAD
    );

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Console input closed");
                    break;
                }
                Err(e) => {
                    warn!("Console read error: {}", e);
                    break;
                }
            },
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message = match trimmed.strip_prefix('!') {
            Some(rest) => ChatMessage::new(CONSOLE_ROOM, None, "user", rest.trim()),
            None => ChatMessage::new(
                CONSOLE_ROOM,
                Some(CONSOLE_THREAD.to_string()),
                "user",
                trimmed,
            ),
        };

        platform.record(&message).await;
        debug!("Console message {} queued", message.id);
        if inbox.send(message).await.is_err() {
            warn!("Runtime inbox closed, stopping console reader");
            break;
        }
    }
}
