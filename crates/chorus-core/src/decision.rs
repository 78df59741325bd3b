//! Response decision engine
//!
//! Applies the ordered response rules to one message at a time. The engine
//! holds no state of its own: participation comes in as the merged set of
//! thread participants and active invitees, computed by the caller under
//! the relevant locks and copied out before any await. Invited agents are
//! indistinguishable from native ones here; nothing in the rules looks at
//! how a participant arrived.

use std::time::Duration;

use tracing::{debug, warn};

use crate::routing::RoutingSuggester;
use crate::team::{self, TeamTrigger};
use crate::types::{ChatMessage, Decision};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    /// Hard cap on one routing suggester consultation
    pub suggest_timeout: Duration,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            suggest_timeout: Duration::from_secs(10),
        }
    }
}

/// Stateless rule evaluator for inbound messages
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Decide who responds to a message.
    ///
    /// `participants` is the merged participant set for the message's
    /// thread (see [`merge_participants`]); `candidates` is every agent
    /// the routing suggester may pick from; `thread_context` is the
    /// thread history handed to the suggester when rule 4 fires.
    ///
    /// Rules in order, first match wins:
    /// 1. explicit mentions respond (one: single, several: coordinate)
    /// 2. a sole participant continues the conversation
    /// 3. several participants collaborate
    /// 4. an empty thread asks the routing suggester, falling back to none
    pub async fn decide(
        &self,
        message: &ChatMessage,
        participants: &[String],
        candidates: &[String],
        thread_context: &[ChatMessage],
        suggester: &dyn RoutingSuggester,
    ) -> Decision {
        // Top-level room messages never get a response; commands were
        // already peeled off by the caller
        if message.thread_id.is_none() {
            return Decision::None;
        }

        if !message.mentioned_agents.is_empty() {
            let decision = if message.mentioned_agents.len() == 1 {
                Decision::Single {
                    agent: message.mentioned_agents[0].clone(),
                }
            } else {
                let (members, mode) = team::resolve(
                    TeamTrigger::ExplicitMention,
                    &message.mentioned_agents,
                    participants,
                );
                Decision::Team { members, mode }
            };
            debug!("Message {}: mention rule fired: {:?}", message.id, decision);
            return decision;
        }

        match participants.len() {
            1 => {
                debug!(
                    "Message {}: sole participant {} continues",
                    message.id, participants[0]
                );
                Decision::Single {
                    agent: participants[0].clone(),
                }
            }
            n if n >= 2 => {
                let (members, mode) =
                    team::resolve(TeamTrigger::Collaboration, &[], participants);
                debug!(
                    "Message {}: {} participants collaborate",
                    message.id,
                    members.len()
                );
                Decision::Team { members, mode }
            }
            _ => {
                self.consult_suggester(message, candidates, thread_context, suggester)
                    .await
            }
        }
    }

    /// Rule 4: ask the external suggester under a timeout. Every failure
    /// mode (error, timeout, unknown agent) collapses to `Decision::None`
    /// here and never reaches the caller.
    async fn consult_suggester(
        &self,
        message: &ChatMessage,
        candidates: &[String],
        thread_context: &[ChatMessage],
        suggester: &dyn RoutingSuggester,
    ) -> Decision {
        let outcome = tokio::time::timeout(
            self.config.suggest_timeout,
            suggester.suggest(message, candidates, thread_context),
        )
        .await;

        match outcome {
            Ok(Ok(Some(agent))) => {
                if candidates.iter().any(|c| c == &agent) {
                    debug!("Message {}: suggester picked {}", message.id, agent);
                    Decision::Single { agent }
                } else {
                    warn!(
                        "Message {}: suggester picked unknown agent {:?}, ignoring",
                        message.id, agent
                    );
                    Decision::None
                }
            }
            Ok(Ok(None)) => {
                debug!("Message {}: suggester declined", message.id);
                Decision::None
            }
            Ok(Err(e)) => {
                warn!("Message {}: suggester failed: {}", message.id, e);
                Decision::None
            }
            Err(_) => {
                warn!(
                    "Message {}: suggester timed out after {:?}",
                    message.id, self.config.suggest_timeout
                );
                Decision::None
            }
        }
    }
}

/// Merge thread participants with the currently invited agents into one
/// eligibility set: thread first-appearance order, then invitees not
/// already present in invitation creation order. Downstream code sees only
/// this union, which is what makes invited agents behave identically to
/// native ones.
pub fn merge_participants(participating: &[String], invited: &[String]) -> Vec<String> {
    let mut merged = participating.to_vec();
    for agent in invited {
        if !merged.iter().any(|a| a == agent) {
            merged.push(agent.clone());
        }
    }
    merged
}
