//! SQLite persistence for invitations and dispatch cursors
//!
//! Both the invitation registry and the response tracker survive process
//! restart through this store. The connection is wrapped in an
//! `Arc<Mutex<Connection>>` and every call goes through `spawn_blocking`
//! so database work never stalls the async runtime.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::types::{AgentCursor, Invitation};

/// Durable store shared by the invitation registry and the response tracker
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file and initialize the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("Failed to open database at {}", path.as_ref().display())
        })?;
        init_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests and ephemeral runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        init_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or refresh an invitation record
    pub async fn save_invitation(&self, invitation: Invitation) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            conn.execute(
                "INSERT INTO invitations
                    (thread_id, agent_name, room_id, invited_by, created_at, expires_at, last_activity_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(thread_id, agent_name) DO UPDATE SET
                    room_id = excluded.room_id,
                    invited_by = excluded.invited_by,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at,
                    last_activity_at = excluded.last_activity_at",
                params![
                    &invitation.thread_id,
                    &invitation.agent_name,
                    &invitation.room_id,
                    &invitation.invited_by,
                    invitation.created_at.to_rfc3339(),
                    invitation.expires_at.map(|t| t.to_rfc3339()),
                    invitation.last_activity_at.to_rfc3339(),
                ],
            )
            .context("Failed to save invitation")?;

            debug!(
                "Saved invitation: {} in thread {}",
                invitation.agent_name, invitation.thread_id
            );
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Remove an invitation record; returns whether a row was deleted
    pub async fn delete_invitation(&self, thread_id: &str, agent_name: &str) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        let thread_id = thread_id.to_owned();
        let agent_name = agent_name.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            let rows = conn
                .execute(
                    "DELETE FROM invitations WHERE thread_id = ?1 AND agent_name = ?2",
                    params![&thread_id, &agent_name],
                )
                .context("Failed to delete invitation")?;
            Ok(rows > 0)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Load every persisted invitation (registry warm-up on startup)
    pub async fn load_invitations(&self) -> Result<Vec<Invitation>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            let mut stmt = conn
                .prepare(
                    "SELECT thread_id, agent_name, room_id, invited_by, created_at, expires_at, last_activity_at
                     FROM invitations",
                )
                .context("Failed to prepare invitation query")?;

            let invitations: Vec<Invitation> = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .context("Failed to query invitations")?
                .filter_map(|result| match result {
                    Ok((thread_id, agent_name, room_id, invited_by, created, expires, activity)) => {
                        let created_at = match parse_ts(&created) {
                            Some(t) => t,
                            None => {
                                warn!(
                                    "Skipping invitation {}/{}: bad created_at {:?}",
                                    thread_id, agent_name, created
                                );
                                return None;
                            }
                        };
                        // A malformed expiry is treated as already expired
                        // rather than open-ended (fail-closed)
                        let expires_at = match expires {
                            Some(raw) => match parse_ts(&raw) {
                                Some(t) => Some(t),
                                None => {
                                    warn!(
                                        "Skipping invitation {}/{}: bad expires_at {:?}",
                                        thread_id, agent_name, raw
                                    );
                                    return None;
                                }
                            },
                            None => None,
                        };
                        let last_activity_at = parse_ts(&activity).unwrap_or(created_at);

                        Some(Invitation {
                            agent_name,
                            thread_id,
                            room_id,
                            invited_by,
                            created_at,
                            expires_at,
                            last_activity_at,
                        })
                    }
                    Err(e) => {
                        warn!("Failed to read invitation row: {}", e);
                        None
                    }
                })
                .collect();

            debug!("Loaded {} invitations", invitations.len());
            Ok(invitations)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Update an invitation's last activity timestamp
    pub async fn touch_invitation(
        &self,
        thread_id: &str,
        agent_name: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let thread_id = thread_id.to_owned();
        let agent_name = agent_name.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            conn.execute(
                "UPDATE invitations SET last_activity_at = ?3
                 WHERE thread_id = ?1 AND agent_name = ?2",
                params![&thread_id, &agent_name, at.to_rfc3339()],
            )
            .context("Failed to touch invitation")?;
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Durably advance an agent's dispatch cursor
    pub async fn save_cursor(&self, cursor: AgentCursor) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            conn.execute(
                "INSERT INTO agent_cursors (agent_name, message_id, message_ts)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(agent_name) DO UPDATE SET
                    message_id = excluded.message_id,
                    message_ts = excluded.message_ts",
                params![
                    &cursor.agent_name,
                    &cursor.message_id,
                    cursor.message_ts.to_rfc3339(),
                ],
            )
            .context("Failed to save cursor")?;

            debug!(
                "Advanced cursor for {} to message {}",
                cursor.agent_name, cursor.message_id
            );
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Load the cursor for one agent
    pub async fn load_cursor(&self, agent_name: &str) -> Result<Option<AgentCursor>> {
        let conn = Arc::clone(&self.conn);
        let agent_name = agent_name.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            let result = conn
                .query_row(
                    "SELECT agent_name, message_id, message_ts
                     FROM agent_cursors WHERE agent_name = ?1",
                    params![&agent_name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .context("Failed to query cursor")?;

            match result {
                Some((agent_name, message_id, ts)) => {
                    let message_ts = parse_ts(&ts)
                        .with_context(|| format!("Bad cursor timestamp {:?}", ts))?;
                    Ok(Some(AgentCursor {
                        agent_name,
                        message_id,
                        message_ts,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Load every persisted cursor (tracker warm-up on startup)
    pub async fn load_cursors(&self) -> Result<Vec<AgentCursor>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn);
            let mut stmt = conn
                .prepare("SELECT agent_name, message_id, message_ts FROM agent_cursors")
                .context("Failed to prepare cursor query")?;

            let cursors: Vec<AgentCursor> = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .context("Failed to query cursors")?
                .filter_map(|result| match result {
                    Ok((agent_name, message_id, ts)) => match parse_ts(&ts) {
                        Some(message_ts) => Some(AgentCursor {
                            agent_name,
                            message_id,
                            message_ts,
                        }),
                        None => {
                            warn!("Skipping cursor for {}: bad timestamp {:?}", agent_name, ts);
                            None
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read cursor row: {}", e);
                        None
                    }
                })
                .collect();

            debug!("Loaded {} cursors", cursors.len());
            Ok(cursors)
        })
        .await
        .context("spawn_blocking task panicked")?
    }
}

fn init_tables(conn: &Connection) -> Result<()> {
    debug!("Initializing chorus tables");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS invitations (
            thread_id TEXT NOT NULL,
            agent_name TEXT NOT NULL,
            room_id TEXT NOT NULL,
            invited_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT,
            last_activity_at TEXT NOT NULL,
            PRIMARY KEY (thread_id, agent_name)
        )",
        [],
    )
    .context("Failed to create invitations table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invitations_expires ON invitations(expires_at)",
        [],
    )
    .context("Failed to create invitations expiry index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS agent_cursors (
            agent_name TEXT PRIMARY KEY,
            message_id TEXT NOT NULL,
            message_ts TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create agent_cursors table")?;

    info!("Chorus tables initialized");
    Ok(())
}

fn lock_conn(conn: &Arc<Mutex<Connection>>) -> std::sync::MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("Database mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(agent: &str, thread: &str, expires: Option<chrono::Duration>) -> Invitation {
        let now = Utc::now();
        Invitation {
            agent_name: agent.to_string(),
            thread_id: thread.to_string(),
            room_id: "room-1".to_string(),
            invited_by: "alice".to_string(),
            created_at: now,
            expires_at: expires.map(|d| now + d),
            last_activity_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_invitation() {
        let store = Store::open_in_memory().unwrap();
        let inv = invitation("helper", "t-1", Some(chrono::Duration::hours(1)));
        store.save_invitation(inv.clone()).await.unwrap();

        let loaded = store.load_invitations().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].agent_name, "helper");
        assert_eq!(loaded[0].thread_id, "t-1");
        assert!(loaded[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn test_save_invitation_upserts() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_invitation(invitation("helper", "t-1", None))
            .await
            .unwrap();
        store
            .save_invitation(invitation("helper", "t-1", Some(chrono::Duration::hours(2))))
            .await
            .unwrap();

        let loaded = store.load_invitations().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_invitation() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_invitation(invitation("helper", "t-1", None))
            .await
            .unwrap();

        assert!(store.delete_invitation("t-1", "helper").await.unwrap());
        assert!(!store.delete_invitation("t-1", "helper").await.unwrap());
        assert!(store.load_invitations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch_invitation() {
        let store = Store::open_in_memory().unwrap();
        let inv = invitation("helper", "t-1", None);
        let original_activity = inv.last_activity_at;
        store.save_invitation(inv).await.unwrap();

        let later = original_activity + chrono::Duration::minutes(10);
        store.touch_invitation("t-1", "helper", later).await.unwrap();

        let loaded = store.load_invitations().await.unwrap();
        assert!(loaded[0].last_activity_at > original_activity);
    }

    #[tokio::test]
    async fn test_save_and_load_cursor() {
        let store = Store::open_in_memory().unwrap();
        let cursor = AgentCursor {
            agent_name: "alice".to_string(),
            message_id: "m-5".to_string(),
            message_ts: Utc::now(),
        };
        store.save_cursor(cursor.clone()).await.unwrap();

        let loaded = store.load_cursor("alice").await.unwrap().unwrap();
        assert_eq!(loaded.message_id, "m-5");

        assert!(store.load_cursor("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_upsert_overwrites() {
        let store = Store::open_in_memory().unwrap();
        let ts = Utc::now();
        store
            .save_cursor(AgentCursor {
                agent_name: "alice".to_string(),
                message_id: "m-1".to_string(),
                message_ts: ts,
            })
            .await
            .unwrap();
        store
            .save_cursor(AgentCursor {
                agent_name: "alice".to_string(),
                message_id: "m-2".to_string(),
                message_ts: ts + chrono::Duration::seconds(1),
            })
            .await
            .unwrap();

        let cursors = store.load_cursors().await.unwrap();
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].message_id, "m-2");
    }

    #[tokio::test]
    async fn test_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chorus.db");

        {
            let store = Store::open(&path).unwrap();
            store
                .save_invitation(invitation("helper", "t-1", None))
                .await
                .unwrap();
            store
                .save_cursor(AgentCursor {
                    agent_name: "alice".to_string(),
                    message_id: "m-9".to_string(),
                    message_ts: Utc::now(),
                })
                .await
                .unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.load_invitations().await.unwrap().len(), 1);
        assert_eq!(
            store.load_cursor("alice").await.unwrap().unwrap().message_id,
            "m-9"
        );
    }

    #[test]
    fn test_init_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_tables(&conn).unwrap();
        init_tables(&conn).unwrap();
    }
}
