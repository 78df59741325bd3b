//! Cleanup sweeper for expired invitations
//!
//! One periodic pass over the whole registry instead of a timer per
//! invitation: cost per tick is O(invites), restart recovery needs no
//! reconstructed timer state, and the next tick after a restart simply
//! re-evaluates every persisted expiry against the current clock.
//!
//! Expiry enforcement does not depend on this task at all: the registry's
//! `is_invited` checks fail closed at read time. The sweeper only reclaims
//! the storage.

use std::sync::Arc;
use std::time::Duration;

use chorus_core::InvitationRegistry;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sweeper tuning
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweep passes
    pub interval: Duration,
    /// Remove open-ended invitations with no activity for this long.
    /// None disables the stale-inactivity policy.
    pub stale_after: Option<chrono::Duration>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: None,
        }
    }
}

/// Background task that expires invitations through the registry
pub struct CleanupSweeper {
    registry: Arc<InvitationRegistry>,
    config: SweeperConfig,
}

impl CleanupSweeper {
    pub fn new(registry: Arc<InvitationRegistry>, config: SweeperConfig) -> Self {
        Self { registry, config }
    }

    /// Spawn the sweep loop. Individual tick failures are logged and
    /// skipped; only cancellation stops the loop.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of tokio's interval fires immediately, which
            // doubles as restart catch-up for already-expired invitations
            info!(
                "Cleanup sweeper started (interval {:?}, stale_after {:?})",
                self.config.interval, self.config.stale_after
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Cleanup sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = sweep_once(
                            &self.registry,
                            self.config.stale_after,
                            Utc::now(),
                        )
                        .await;
                        if removed > 0 {
                            info!("Cleanup sweep removed {} invitations", removed);
                        }
                    }
                }
            }
        })
    }
}

/// One sweep pass at the given instant; returns how many invitations were
/// removed. Works on a snapshot so the registry lock is never held while
/// individual removals run.
pub async fn sweep_once(
    registry: &InvitationRegistry,
    stale_after: Option<chrono::Duration>,
    now: DateTime<Utc>,
) -> usize {
    let snapshot = registry.all_invites().await;
    debug!("Sweep pass over {} invitations", snapshot.len());

    let mut removed = 0;
    for invitation in snapshot {
        let expired = invitation.is_expired_at(now);
        let stale = invitation.expires_at.is_none()
            && stale_after
                .is_some_and(|window| invitation.last_activity_at + window <= now);
        if !expired && !stale {
            continue;
        }

        let reason = if expired { "expired" } else { "stale" };
        if registry
            .uninvite(&invitation.agent_name, &invitation.thread_id)
            .await
        {
            debug!(
                "Swept {} invitation: {} in thread {}",
                reason, invitation.agent_name, invitation.thread_id
            );
            removed += 1;
        } else {
            // Someone uninvited concurrently; nothing to do
            warn!(
                "Invitation {}/{} vanished mid-sweep",
                invitation.thread_id, invitation.agent_name
            );
        }
    }
    removed
}
