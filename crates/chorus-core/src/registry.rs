//! Invitation registry
//!
//! Single owner of temporary agent-to-thread access grants. All mutation
//! goes through this type: the in-memory map is updated under its lock,
//! the lock is released, and only then is the change written through to
//! the store. Expiry is checked at read time against the caller's clock,
//! so an expired-but-not-yet-swept record is already treated as absent.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::InviteError;
use crate::persistence::Store;
use crate::types::Invitation;

/// Registry of active invitations, keyed by `(thread_id, agent_name)`
pub struct InvitationRegistry {
    invites: RwLock<HashMap<(String, String), Invitation>>,
    known_agents: Vec<String>,
    store: Store,
}

impl InvitationRegistry {
    /// Build the registry from persisted state so invitations survive restart
    pub async fn load(store: Store, known_agents: Vec<String>) -> anyhow::Result<Self> {
        let persisted = store.load_invitations().await?;
        let mut invites = HashMap::new();
        for inv in persisted {
            invites.insert((inv.thread_id.clone(), inv.agent_name.clone()), inv);
        }
        info!(
            "InvitationRegistry: loaded {} invitations for {} known agents",
            invites.len(),
            known_agents.len()
        );
        Ok(Self {
            invites: RwLock::new(invites),
            known_agents,
            store,
        })
    }

    /// Names of all agents the registry will accept invites for
    pub fn known_agents(&self) -> &[String] {
        &self.known_agents
    }

    /// Grant (or refresh) an agent's access to a thread.
    ///
    /// Re-inviting an already-invited agent resets `created_at` and
    /// `expires_at`. Fails on unknown agents; thread-context validation
    /// happens in the command handler, which is the only caller that can
    /// tell a thread from a top-level room.
    pub async fn invite(
        &self,
        agent: &str,
        thread_id: &str,
        room_id: &str,
        invited_by: &str,
        duration: Option<Duration>,
    ) -> Result<Invitation, InviteError> {
        let canonical = self
            .canonical_agent(agent)
            .ok_or_else(|| InviteError::UnknownAgent(agent.to_string()))?;
        if duration.is_some_and(|d| d <= Duration::zero()) {
            return Err(InviteError::InvalidDuration);
        }

        let now = Utc::now();
        let invitation = Invitation {
            agent_name: canonical.clone(),
            thread_id: thread_id.to_string(),
            room_id: room_id.to_string(),
            invited_by: invited_by.to_string(),
            created_at: now,
            expires_at: duration.map(|d| now + d),
            last_activity_at: now,
        };

        {
            let mut invites = self.invites.write().await;
            invites.insert(
                (thread_id.to_string(), canonical.clone()),
                invitation.clone(),
            );
        }

        self.store.save_invitation(invitation.clone()).await?;
        info!(
            "Invited {} to thread {} (expires: {:?})",
            canonical, thread_id, invitation.expires_at
        );
        Ok(invitation)
    }

    /// Revoke an agent's access to a thread. Returns whether a record was
    /// removed; absent records are a no-op, never an error.
    pub async fn uninvite(&self, agent: &str, thread_id: &str) -> bool {
        let canonical = self
            .canonical_agent(agent)
            .unwrap_or_else(|| agent.to_string());

        let removed = {
            let mut invites = self.invites.write().await;
            invites
                .remove(&(thread_id.to_string(), canonical.clone()))
                .is_some()
        };

        if removed {
            if let Err(e) = self.store.delete_invitation(thread_id, &canonical).await {
                warn!(
                    "Failed to delete persisted invitation {}/{}: {}",
                    thread_id, canonical, e
                );
            }
            info!("Uninvited {} from thread {}", canonical, thread_id);
        } else {
            debug!(
                "Uninvite no-op: {} was not invited to thread {}",
                canonical, thread_id
            );
        }
        removed
    }

    /// Snapshot of every invitation for a thread, including expired records
    /// the sweeper has not reached yet, ordered by creation time
    pub async fn list_invites(&self, thread_id: &str) -> Vec<Invitation> {
        let invites = self.invites.read().await;
        let mut result: Vec<Invitation> = invites
            .values()
            .filter(|inv| inv.thread_id == thread_id)
            .cloned()
            .collect();
        result.sort_by_key(|inv| inv.created_at);
        result
    }

    /// Whether the agent currently holds a non-expired invitation.
    /// Fail-closed: expiry is evaluated here, independent of sweep timing.
    pub async fn is_invited(&self, agent: &str, thread_id: &str) -> bool {
        self.is_invited_at(agent, thread_id, Utc::now()).await
    }

    /// Clock-injectable variant of [`is_invited`](Self::is_invited)
    pub async fn is_invited_at(
        &self,
        agent: &str,
        thread_id: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(canonical) = self.canonical_agent(agent) else {
            return false;
        };
        let invites = self.invites.read().await;
        invites
            .get(&(thread_id.to_string(), canonical))
            .is_some_and(|inv| !inv.is_expired_at(now))
    }

    /// Active (non-expired) invitations for a thread at the given instant,
    /// in creation order. Feeds the merged-participants computation.
    pub async fn active_invites_at(
        &self,
        thread_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<Invitation> {
        let invites = self.invites.read().await;
        let mut result: Vec<Invitation> = invites
            .values()
            .filter(|inv| inv.thread_id == thread_id && !inv.is_expired_at(now))
            .cloned()
            .collect();
        result.sort_by_key(|inv| inv.created_at);
        result
    }

    /// Snapshot of every invitation across all threads (sweeper input)
    pub async fn all_invites(&self) -> Vec<Invitation> {
        self.invites.read().await.values().cloned().collect()
    }

    /// Record activity for an invited agent. Best-effort: memory is updated
    /// immediately, the durable write happens in a background task so
    /// message handling never blocks on it.
    pub async fn touch_activity(&self, agent: &str, thread_id: &str) {
        let Some(canonical) = self.canonical_agent(agent) else {
            return;
        };
        let now = Utc::now();

        let touched = {
            let mut invites = self.invites.write().await;
            match invites.get_mut(&(thread_id.to_string(), canonical.clone())) {
                Some(inv) => {
                    inv.last_activity_at = now;
                    true
                }
                None => false,
            }
        };

        if touched {
            let store = self.store.clone();
            let thread_id = thread_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = store.touch_invitation(&thread_id, &canonical, now).await {
                    warn!(
                        "Failed to persist activity touch for {}/{}: {}",
                        thread_id, canonical, e
                    );
                }
            });
        }
    }

    fn canonical_agent(&self, name: &str) -> Option<String> {
        self.known_agents
            .iter()
            .find(|a| a.eq_ignore_ascii_case(name))
            .cloned()
    }
}
