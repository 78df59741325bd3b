//! Message-handling runtime
//!
//! Wires the classifier, invitation registry, decision engine, response
//! tracker, and collaborator traits into the live pipeline. One worker
//! task per agent, each with its own queue, keeps an agent's messages in
//! arrival order while different agents and threads interleave freely.
//! The runtime copies everything it needs out of the shared registries
//! before awaiting any collaborator, so no lock is ever held across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::{self, Classification, Command};
use crate::decision::{DecisionConfig, DecisionEngine, merge_participants};
use crate::error::InviteError;
use crate::platform::{AgentExecutor, ChatPlatform};
use crate::registry::InvitationRegistry;
use crate::routing::RoutingSuggester;
use crate::threads::ThreadRegistry;
use crate::tracker::ResponseTracker;
use crate::types::{ChatMessage, Decision, Invitation};

const HELP_TEXT: &str = "Commands:\n\
    /invite <agent> [for <N> hours]  grant an agent access to this thread\n\
    /uninvite <agent>                revoke an agent's access\n\
    /list_invites                    show invites for this thread\n\
    /help                            this message";

/// Runtime tuning
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Inbound message buffer shared by all platform adapters
    pub inbox_depth: usize,
    /// Per-agent dispatch queue depth
    pub queue_depth: usize,
    /// Also revoke platform room access on /uninvite (call-through only)
    pub revoke_room_on_uninvite: bool,
    pub decision: DecisionConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inbox_depth: 256,
            queue_depth: 64,
            revoke_room_on_uninvite: false,
            decision: DecisionConfig::default(),
        }
    }
}

/// A message queued for one agent's worker, with the decision that
/// selected it
#[derive(Debug, Clone)]
struct DispatchJob {
    message: ChatMessage,
    decision: Decision,
}

/// Handle to a running pipeline
pub struct RuntimeHandle {
    /// Feed inbound platform messages here
    pub inbox: mpsc::Sender<ChatMessage>,
    join: JoinHandle<()>,
}

impl RuntimeHandle {
    /// Wait for the main loop to finish (after cancellation)
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!("Runtime main loop panicked: {}", e);
        }
    }
}

/// The assembled message pipeline
pub struct Runtime {
    agents: Vec<String>,
    registry: Arc<InvitationRegistry>,
    tracker: Arc<ResponseTracker>,
    threads: Arc<ThreadRegistry>,
    platform: Arc<dyn ChatPlatform>,
    executor: Arc<dyn AgentExecutor>,
    suggester: Arc<dyn RoutingSuggester>,
    engine: DecisionEngine,
    config: RuntimeConfig,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Vec<String>,
        registry: Arc<InvitationRegistry>,
        tracker: Arc<ResponseTracker>,
        threads: Arc<ThreadRegistry>,
        platform: Arc<dyn ChatPlatform>,
        executor: Arc<dyn AgentExecutor>,
        suggester: Arc<dyn RoutingSuggester>,
        config: RuntimeConfig,
    ) -> Self {
        let engine = DecisionEngine::new(config.decision.clone());
        Self {
            agents,
            registry,
            tracker,
            threads,
            platform,
            executor,
            suggester,
            engine,
            config,
        }
    }

    /// Spawn the worker tasks and the main loop; returns the inbox handle.
    /// Everything winds down when `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> RuntimeHandle {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<ChatMessage>(self.config.inbox_depth);

        let mut workers: HashMap<String, mpsc::Sender<DispatchJob>> = HashMap::new();
        for agent in &self.agents {
            let (tx, rx) = mpsc::channel::<DispatchJob>(self.config.queue_depth);
            workers.insert(agent.clone(), tx);
            tokio::spawn(agent_worker(
                agent.clone(),
                rx,
                Arc::clone(&self.tracker),
                Arc::clone(&self.executor),
                Arc::clone(&self.platform),
                Arc::clone(&self.threads),
                Arc::clone(&self.registry),
                shutdown.clone(),
            ));
        }
        info!("Runtime: started {} agent workers", workers.len());

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Runtime main loop shutting down");
                        break;
                    }
                    msg = inbox_rx.recv() => {
                        match msg {
                            Some(msg) => self.process(msg, &workers).await,
                            None => {
                                info!("Runtime inbox closed, shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        });

        RuntimeHandle {
            inbox: inbox_tx,
            join,
        }
    }

    /// Handle one inbound message end to end (minus the per-agent work,
    /// which is queued to the workers)
    async fn process(&self, message: ChatMessage, workers: &HashMap<String, mpsc::Sender<DispatchJob>>) {
        debug!(
            "Processing message {} from {} (thread: {:?})",
            message.id, message.sender, message.thread_id
        );

        let parsed_mentions = match classifier::classify(&message.body, &self.agents) {
            Ok(Classification::Command(command)) => {
                self.handle_command(&message, command).await;
                return;
            }
            Err(parse_error) => {
                // Command-shaped but malformed: the hint goes back to the
                // user and nothing else happens
                self.reply(&message, &parse_error.to_string()).await;
                return;
            }
            Ok(Classification::Mentions(mentions)) => mentions,
        };

        let mut message = message;
        if message.mentioned_agents.is_empty() {
            message.mentioned_agents = parsed_mentions;
        }

        self.threads.note_message(&message).await;
        let Some(thread_id) = message.thread_id.clone() else {
            // Top-level room traffic is never responded to
            return;
        };

        // A known agent speaking in the thread becomes a participant and
        // keeps its invitation (if any) fresh
        if let Some(sender) = self.canonical_agent(&message.sender) {
            self.threads
                .note_participant(&thread_id, &message.room_id, &sender)
                .await;
            self.registry.touch_activity(&sender, &thread_id).await;
        }

        // Copy the eligibility inputs out under their locks, then release
        // everything before consulting any collaborator
        let participating = self.threads.participants(&thread_id).await;
        let invited: Vec<String> = self
            .registry
            .active_invites_at(&thread_id, Utc::now())
            .await
            .into_iter()
            .map(|inv| inv.agent_name)
            .collect();
        let participants = merge_participants(&participating, &invited);

        // History is only needed when rule 4 can fire
        let thread_context = if participants.is_empty() && message.mentioned_agents.is_empty() {
            match self.platform.thread_history(&thread_id).await {
                Ok(history) => history,
                Err(e) => {
                    warn!("Failed to fetch history for thread {}: {}", thread_id, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let decision = self
            .engine
            .decide(
                &message,
                &participants,
                &self.agents,
                &thread_context,
                self.suggester.as_ref(),
            )
            .await;

        if decision.is_none() {
            debug!("Message {}: nobody responds", message.id);
            return;
        }

        for agent in decision.responders() {
            // An agent never answers its own message
            if agent.eq_ignore_ascii_case(&message.sender) {
                debug!("Message {}: skipping self-reply for {}", message.id, agent);
                continue;
            }
            match workers.get(&agent) {
                Some(tx) => {
                    let job = DispatchJob {
                        message: message.clone(),
                        decision: decision.clone(),
                    };
                    if tx.send(job).await.is_err() {
                        warn!("Worker for {} is gone, dropping dispatch", agent);
                    }
                }
                None => warn!("Decision named unknown agent {}, skipping", agent),
            }
        }
    }

    /// Command surface: every branch replies with plain text and mutates
    /// nothing but the invitation registry
    async fn handle_command(&self, message: &ChatMessage, command: Command) {
        let reply = match command {
            Command::Invite { agent, hours } => match &message.thread_id {
                None => "Invites only work inside a thread.".to_string(),
                Some(thread_id) => {
                    let duration = hours.map(ChronoDuration::hours);
                    match self
                        .registry
                        .invite(&agent, thread_id, &message.room_id, &message.sender, duration)
                        .await
                    {
                        Ok(invitation) => invite_confirmation(&invitation),
                        Err(e @ (InviteError::UnknownAgent(_) | InviteError::InvalidDuration)) => {
                            e.to_string()
                        }
                        Err(InviteError::Storage(e)) => {
                            error!("Failed to persist invite: {}", e);
                            "Something went wrong saving that invite, try again.".to_string()
                        }
                    }
                }
            },
            Command::Uninvite { agent } => match &message.thread_id {
                None => "Invites only work inside a thread.".to_string(),
                Some(thread_id) => {
                    if self.registry.uninvite(&agent, thread_id).await {
                        if self.config.revoke_room_on_uninvite {
                            if let Err(e) = self
                                .platform
                                .remove_agent_from_room(&agent, &message.room_id)
                                .await
                            {
                                warn!("Room access revocation for {} failed: {}", agent, e);
                            }
                        }
                        format!("{} is no longer invited to this thread.", agent)
                    } else {
                        format!("{} was not invited to this thread.", agent)
                    }
                }
            },
            Command::ListInvites => match &message.thread_id {
                None => "No invites here: this is not a thread.".to_string(),
                Some(thread_id) => {
                    format_invite_list(&self.registry.list_invites(thread_id).await)
                }
            },
            Command::Help => HELP_TEXT.to_string(),
        };

        self.reply(message, &reply).await;
    }

    async fn reply(&self, message: &ChatMessage, text: &str) {
        if let Err(e) = self
            .platform
            .send_reply(&message.room_id, message.thread_id.as_deref(), text)
            .await
        {
            warn!("Failed to send reply in room {}: {}", message.room_id, e);
        }
    }

    fn canonical_agent(&self, name: &str) -> Option<String> {
        self.agents
            .iter()
            .find(|a| a.eq_ignore_ascii_case(name))
            .cloned()
    }
}

fn invite_confirmation(invitation: &Invitation) -> String {
    match invitation.expires_at {
        Some(expires) => format!(
            "Invited {} to this thread until {}.",
            invitation.agent_name,
            expires.format("%Y-%m-%d %H:%M UTC")
        ),
        None => format!(
            "Invited {} to this thread until revoked.",
            invitation.agent_name
        ),
    }
}

fn format_invite_list(invitations: &[Invitation]) -> String {
    let now = Utc::now();
    let lines: Vec<String> = invitations
        .iter()
        .map(|inv| {
            let status = match inv.expires_at {
                Some(expires) if expires <= now => "expired".to_string(),
                Some(expires) => {
                    let left = expires - now;
                    if left.num_hours() >= 1 {
                        format!("{}h {}m left", left.num_hours(), left.num_minutes() % 60)
                    } else {
                        format!("{}m left", left.num_minutes().max(1))
                    }
                }
                None => "no expiry".to_string(),
            };
            format!("- {} (invited by {}, {})", inv.agent_name, inv.invited_by, status)
        })
        .collect();

    if lines.is_empty() {
        "No active invites in this thread.".to_string()
    } else {
        format!("Invites in this thread:\n{}", lines.join("\n"))
    }
}

/// One agent's dispatch loop. The tracker gate runs here, after the queue,
/// so retried deliveries and restart replays collapse to no-ops in one
/// place. Commit precedes the externally-visible reply: if the cursor
/// write fails, the agent stays silent for this message.
#[allow(clippy::too_many_arguments)]
async fn agent_worker(
    agent: String,
    mut rx: mpsc::Receiver<DispatchJob>,
    tracker: Arc<ResponseTracker>,
    executor: Arc<dyn AgentExecutor>,
    platform: Arc<dyn ChatPlatform>,
    threads: Arc<ThreadRegistry>,
    registry: Arc<InvitationRegistry>,
    shutdown: CancellationToken,
) {
    debug!("Worker for {} started", agent);

    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Worker for {} shutting down", agent);
                break;
            }
            job = rx.recv() => match job {
                Some(job) => job,
                None => {
                    debug!("Worker queue for {} closed", agent);
                    break;
                }
            },
        };

        if !tracker.should_dispatch(&agent, &job.message).await {
            debug!(
                "Worker {}: duplicate of message {}, absorbed",
                agent, job.message.id
            );
            continue;
        }

        if let Err(e) = tracker.mark_dispatched(&agent, &job.message).await {
            error!(
                "Worker {}: could not commit cursor for {}, withholding reply: {}",
                agent, job.message.id, e
            );
            continue;
        }

        match executor.respond(&agent, &job.message, &job.decision).await {
            Ok(text) => {
                if let Err(e) = platform
                    .send_reply(&job.message.room_id, job.message.thread_id.as_deref(), &text)
                    .await
                {
                    warn!("Worker {}: reply send failed: {}", agent, e);
                }
                if let Some(thread_id) = &job.message.thread_id {
                    threads
                        .note_participant(thread_id, &job.message.room_id, &agent)
                        .await;
                    registry.touch_activity(&agent, thread_id).await;
                }
            }
            Err(e) => {
                // Cursor already advanced: at-most-once means a failed
                // attempt is not retried
                warn!(
                    "Worker {}: executor failed for message {}: {}",
                    agent, job.message.id, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Store;
    use crate::routing::StaticRoutingSuggester;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct RecordingPlatform {
        replies: Mutex<Vec<(String, Option<String>, String)>>,
    }

    impl RecordingPlatform {
        fn new() -> Self {
            Self {
                replies: Mutex::new(Vec::new()),
            }
        }

        async fn replies(&self) -> Vec<(String, Option<String>, String)> {
            self.replies.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatPlatform for RecordingPlatform {
        async fn send_reply(
            &self,
            room_id: &str,
            thread_id: Option<&str>,
            text: &str,
        ) -> Result<()> {
            self.replies.lock().await.push((
                room_id.to_string(),
                thread_id.map(|s| s.to_string()),
                text.to_string(),
            ));
            Ok(())
        }

        async fn thread_history(&self, _thread_id: &str) -> Result<Vec<ChatMessage>> {
            Ok(Vec::new())
        }

        async fn remove_agent_from_room(&self, _agent: &str, _room_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct CountingExecutor {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl CountingExecutor {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl AgentExecutor for CountingExecutor {
        async fn respond(
            &self,
            agent: &str,
            message: &ChatMessage,
            _decision: &Decision,
        ) -> Result<String> {
            self.calls
                .lock()
                .await
                .push((agent.to_string(), message.id.clone()));
            Ok(format!("{} says hi", agent))
        }
    }

    struct Fixture {
        handle: RuntimeHandle,
        shutdown: CancellationToken,
        platform: Arc<RecordingPlatform>,
        executor: Arc<CountingExecutor>,
        registry: Arc<InvitationRegistry>,
    }

    async fn fixture(agents: &[&str]) -> Fixture {
        let store = Store::open_in_memory().unwrap();
        let agent_names: Vec<String> = agents.iter().map(|s| s.to_string()).collect();
        let registry = Arc::new(
            InvitationRegistry::load(store.clone(), agent_names.clone())
                .await
                .unwrap(),
        );
        let tracker = Arc::new(ResponseTracker::load(store).await.unwrap());
        let threads = Arc::new(ThreadRegistry::new());
        let platform = Arc::new(RecordingPlatform::new());
        let executor = Arc::new(CountingExecutor::new());

        let runtime = Runtime::new(
            agent_names,
            Arc::clone(&registry),
            tracker,
            threads,
            Arc::clone(&platform) as Arc<dyn ChatPlatform>,
            Arc::clone(&executor) as Arc<dyn AgentExecutor>,
            Arc::new(StaticRoutingSuggester::none()),
            RuntimeConfig::default(),
        );

        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(shutdown.clone());

        Fixture {
            handle,
            shutdown,
            platform,
            executor,
            registry,
        }
    }

    fn threaded(sender: &str, body: &str) -> ChatMessage {
        ChatMessage::new("room-1", Some("t-1".to_string()), sender, body)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn test_invite_outside_thread_is_error_and_no_state() {
        let fx = fixture(&["alice", "bob"]).await;

        let msg = ChatMessage::new("room-1", None, "user", "/invite alice");
        fx.handle.inbox.send(msg).await.unwrap();
        settle().await;

        let replies = fx.platform.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].2, "Invites only work inside a thread.");
        assert!(fx.registry.list_invites("t-1").await.is_empty());
        assert!(fx.registry.all_invites().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_invite_in_thread_grants_access() {
        let fx = fixture(&["alice", "bob"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "/invite bob for 2 hours"))
            .await
            .unwrap();
        settle().await;

        assert!(fx.registry.is_invited("bob", "t-1").await);
        let replies = fx.platform.replies().await;
        assert!(replies[0].2.starts_with("Invited bob to this thread until 2"));

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_malformed_command_replies_with_hint() {
        let fx = fixture(&["alice"]).await;

        fx.handle.inbox.send(threaded("user", "/invite")).await.unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "/summon alice"))
            .await
            .unwrap();
        settle().await;

        let replies = fx.platform.replies().await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].2, "usage: /invite <agent>");
        assert!(replies[1].2.contains("unknown command '/summon'"));
        // Nothing reached the decision pipeline
        assert!(fx.executor.calls().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_help_and_list_invites() {
        let fx = fixture(&["alice", "bob"]).await;

        fx.handle.inbox.send(threaded("user", "/help")).await.unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "/list_invites"))
            .await
            .unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "/invite bob for 3 hours"))
            .await
            .unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "/list_invites"))
            .await
            .unwrap();
        settle().await;

        let replies = fx.platform.replies().await;
        assert_eq!(replies.len(), 4);
        assert!(replies[0].2.contains("/invite <agent>"));
        assert_eq!(replies[1].2, "No active invites in this thread.");
        assert!(replies[3].2.contains("bob (invited by user,"));
        assert!(replies[3].2.contains("left"));

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_invited_agent_continues_conversation() {
        let fx = fixture(&["alice", "bob"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "/invite alice"))
            .await
            .unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "so what do you think?"))
            .await
            .unwrap();
        settle().await;

        let calls = fx.executor.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "alice");

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_mentions_in_new_thread_coordinate() {
        // Two mentions in a brand-new thread: both respond, in mention
        // order, even though neither has participated
        let fx = fixture(&["alice", "bob", "carol"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "@bob @alice can you two sort this out?"))
            .await
            .unwrap();
        settle().await;

        let mut agents: Vec<String> =
            fx.executor.calls().await.into_iter().map(|c| c.0).collect();
        agents.sort();
        assert_eq!(agents, vec!["alice", "bob"]);

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_duplicate_delivery_dispatches_once() {
        let fx = fixture(&["alice"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "/invite alice"))
            .await
            .unwrap();
        settle().await;

        let msg = threaded("user", "are you there?");
        // Platform redelivers the same message three times
        for _ in 0..3 {
            fx.handle.inbox.send(msg.clone()).await.unwrap();
        }
        settle().await;

        assert_eq!(fx.executor.calls().await.len(), 1);

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_agent_never_answers_itself() {
        let fx = fixture(&["alice"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "/invite alice"))
            .await
            .unwrap();
        // alice is the sole participant; her own message must not bounce
        // back to her
        fx.handle
            .inbox
            .send(threaded("alice", "here is my take"))
            .await
            .unwrap();
        settle().await;

        assert!(fx.executor.calls().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_top_level_chatter_gets_no_response() {
        let fx = fixture(&["alice", "bob"]).await;

        fx.handle
            .inbox
            .send(ChatMessage::new("room-1", None, "user", "hello everyone"))
            .await
            .unwrap();
        settle().await;

        assert!(fx.executor.calls().await.is_empty());
        assert!(fx.platform.replies().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_empty_thread_with_declining_suggester_is_silent() {
        let fx = fixture(&["alice", "bob"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "anyone around?"))
            .await
            .unwrap();
        settle().await;

        assert!(fx.executor.calls().await.is_empty());
        assert!(fx.platform.replies().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[tokio::test]
    async fn test_uninvite_silences_agent() {
        let fx = fixture(&["alice"]).await;

        fx.handle
            .inbox
            .send(threaded("user", "/invite alice"))
            .await
            .unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "/uninvite alice"))
            .await
            .unwrap();
        fx.handle
            .inbox
            .send(threaded("user", "still there?"))
            .await
            .unwrap();
        settle().await;

        assert!(!fx.registry.is_invited("alice", "t-1").await);
        assert!(fx.executor.calls().await.is_empty());

        fx.shutdown.cancel();
        fx.handle.join().await;
    }

    #[test]
    fn test_invite_confirmation_wording() {
        let now = Utc::now();
        let open_ended = Invitation {
            agent_name: "bob".to_string(),
            thread_id: "t-1".to_string(),
            room_id: "room-1".to_string(),
            invited_by: "user".to_string(),
            created_at: now,
            expires_at: None,
            last_activity_at: now,
        };
        assert_eq!(
            invite_confirmation(&open_ended),
            "Invited bob to this thread until revoked."
        );
    }

    #[test]
    fn test_format_invite_list_statuses() {
        let now = Utc::now();
        let base = Invitation {
            agent_name: "bob".to_string(),
            thread_id: "t-1".to_string(),
            room_id: "room-1".to_string(),
            invited_by: "user".to_string(),
            created_at: now,
            expires_at: None,
            last_activity_at: now,
        };

        let mut expired = base.clone();
        expired.expires_at = Some(now - ChronoDuration::minutes(5));
        let mut fresh = base.clone();
        fresh.agent_name = "alice".to_string();
        fresh.expires_at = Some(now + ChronoDuration::hours(2));

        let text = format_invite_list(&[base, expired, fresh]);
        assert!(text.contains("bob (invited by user, no expiry)"));
        assert!(text.contains("expired"));
        assert!(text.contains("alice (invited by user, 1h 59m left)") || text.contains("alice (invited by user, 2h 0m left)"));
        assert_eq!(format_invite_list(&[]), "No active invites in this thread.");
    }
}
