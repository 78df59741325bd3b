//! Shared types for chorus-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming chat message from any platform adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    /// Absent for top-level room messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub sender: String,
    pub body: String,
    /// Recognized agent mentions in first-appearance order, deduplicated.
    /// Platform adapters with structural mention data fill this in; otherwise
    /// the classifier derives it from the body.
    #[serde(default)]
    pub mentioned_agents: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message with a fresh id and the current timestamp
    pub fn new(
        room_id: impl Into<String>,
        thread_id: Option<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            thread_id,
            sender: sender.into(),
            body: body.into(),
            mentioned_agents: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-thread participation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,
    pub room_id: String,
    /// First-appearance order, native and invited agents merged
    pub participating_agents: Vec<String>,
    pub last_activity_at: DateTime<Utc>,
}

/// Temporary access grant letting an agent participate in one thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub agent_name: String,
    pub thread_id: String,
    pub room_id: String,
    pub invited_by: String,
    pub created_at: DateTime<Utc>,
    /// None means the invite lasts until explicitly revoked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

impl Invitation {
    /// Whether this invitation is expired at the given instant.
    /// Open-ended invitations never expire by time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}

/// How a team of agents contributes to one response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeamMode {
    /// Sequential, delegated contribution in member order
    Coordinate,
    /// Parallel contribution merged into one reply
    Collaborate,
}

impl std::fmt::Display for TeamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coordinate => write!(f, "coordinate"),
            Self::Collaborate => write!(f, "collaborate"),
        }
    }
}

/// Outcome of the response decision engine for one message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Decision {
    /// Nobody responds
    None,
    /// A single agent responds
    Single { agent: String },
    /// Two or more agents respond jointly
    Team {
        members: Vec<String>,
        #[serde(rename = "team_mode")]
        mode: TeamMode,
    },
}

impl Decision {
    /// Responders in dispatch order (empty for `None`)
    pub fn responders(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Single { agent } => vec![agent.clone()],
            Self::Team { members, .. } => members.clone(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Team mode, if this is a team decision
    pub fn team_mode(&self) -> Option<TeamMode> {
        match self {
            Self::Team { mode, .. } => Some(*mode),
            _ => None,
        }
    }
}

/// Durable per-agent dedup cursor: the last message this agent's worker
/// committed a dispatch for. Messages at or before the cursor are never
/// re-evaluated after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCursor {
    pub agent_name: String,
    pub message_id: String,
    pub message_ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_new_fills_id_and_timestamp() {
        let msg = ChatMessage::new("room-1", Some("t-1".to_string()), "alice", "hello");
        assert!(!msg.id.is_empty());
        assert_eq!(msg.room_id, "room-1");
        assert_eq!(msg.thread_id.as_deref(), Some("t-1"));
        assert!(msg.mentioned_agents.is_empty());
    }

    #[test]
    fn test_invitation_expiry() {
        let now = Utc::now();
        let inv = Invitation {
            agent_name: "helper".to_string(),
            thread_id: "t-1".to_string(),
            room_id: "room-1".to_string(),
            invited_by: "alice".to_string(),
            created_at: now,
            expires_at: Some(now + chrono::Duration::hours(1)),
            last_activity_at: now,
        };
        assert!(!inv.is_expired_at(now + chrono::Duration::minutes(30)));
        assert!(inv.is_expired_at(now + chrono::Duration::minutes(61)));
        // Boundary: expires_at itself counts as expired
        assert!(inv.is_expired_at(now + chrono::Duration::hours(1)));
    }

    #[test]
    fn test_open_ended_invitation_never_expires() {
        let now = Utc::now();
        let inv = Invitation {
            agent_name: "helper".to_string(),
            thread_id: "t-1".to_string(),
            room_id: "room-1".to_string(),
            invited_by: "alice".to_string(),
            created_at: now,
            expires_at: None,
            last_activity_at: now,
        };
        assert!(!inv.is_expired_at(now + chrono::Duration::days(365)));
    }

    #[test]
    fn test_decision_responders() {
        assert!(Decision::None.responders().is_empty());
        assert!(Decision::None.is_none());

        let single = Decision::Single {
            agent: "a".to_string(),
        };
        assert_eq!(single.responders(), vec!["a"]);
        assert_eq!(single.team_mode(), None);

        let team = Decision::Team {
            members: vec!["a".to_string(), "b".to_string()],
            mode: TeamMode::Collaborate,
        };
        assert_eq!(team.responders(), vec!["a", "b"]);
        assert_eq!(team.team_mode(), Some(TeamMode::Collaborate));
    }

    #[test]
    fn test_decision_serde_shape() {
        let team = Decision::Team {
            members: vec!["a".to_string()],
            mode: TeamMode::Coordinate,
        };
        let json = serde_json::to_string(&team).unwrap();
        assert!(json.contains("\"mode\":\"team\""));
        assert!(json.contains("\"team_mode\":\"coordinate\""));
    }
}
