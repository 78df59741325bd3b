//! chorus-core - response decision engine for a multi-agent chat space
//!
//! This crate provides:
//! - Mention and command classifier for inbound message bodies
//! - Invitation registry for time-limited thread access grants
//! - Response decision engine and team formation resolver
//! - Response tracker with restart-safe per-agent dedup cursors
//! - SQLite persistence for invitations and cursors
//! - The message runtime tying it all together over collaborator traits

pub mod classifier;
pub mod decision;
pub mod error;
pub mod persistence;
pub mod platform;
pub mod registry;
pub mod routing;
pub mod runtime;
pub mod team;
pub mod threads;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use classifier::{Classification, Command, classify};
pub use decision::{DecisionConfig, DecisionEngine, merge_participants};
pub use error::{InviteError, ParseError};
pub use persistence::Store;
pub use platform::{AgentExecutor, ChatPlatform};
pub use registry::InvitationRegistry;
pub use routing::{HttpRoutingSuggester, RoutingSuggester, StaticRoutingSuggester};
pub use runtime::{Runtime, RuntimeConfig, RuntimeHandle};
pub use threads::ThreadRegistry;
pub use tracker::ResponseTracker;
pub use types::{AgentCursor, ChatMessage, Decision, Invitation, TeamMode, ThreadState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Just verify that the main types are exported
        let _ = std::mem::size_of::<ChatMessage>();
        let _ = std::mem::size_of::<Decision>();
        let _ = std::mem::size_of::<Invitation>();
        let _ = std::mem::size_of::<Store>();
        let _ = std::mem::size_of::<RuntimeConfig>();
    }
}
