use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChorusConfig {
    pub agents: Vec<AgentEntry>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub decision: DecisionCliConfig,
    #[serde(default)]
    pub runtime: RuntimeCliConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Database file; defaults to chorus.db under the config directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Remove open-ended invitations after this many hours without
    /// activity; unset disables the policy
    #[serde(default)]
    pub stale_after_hours: Option<i64>,
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval_secs(),
            stale_after_hours: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCliConfig {
    #[serde(default = "default_suggest_timeout_secs")]
    pub suggest_timeout_secs: u64,
    /// Routing service endpoint; unset means no routing suggestions
    #[serde(default)]
    pub suggester_url: Option<String>,
}

fn default_suggest_timeout_secs() -> u64 {
    10
}

impl Default for DecisionCliConfig {
    fn default() -> Self {
        Self {
            suggest_timeout_secs: default_suggest_timeout_secs(),
            suggester_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeCliConfig {
    #[serde(default = "default_inbox_depth")]
    pub inbox_depth: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default)]
    pub revoke_room_on_uninvite: bool,
}

fn default_inbox_depth() -> usize {
    256
}

fn default_queue_depth() -> usize {
    64
}

impl Default for RuntimeCliConfig {
    fn default() -> Self {
        Self {
            inbox_depth: default_inbox_depth(),
            queue_depth: default_queue_depth(),
            revoke_room_on_uninvite: false,
        }
    }
}

/// Directory holding config.toml and the default database
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            warn!("No platform config directory, falling back to cwd");
            PathBuf::from(".")
        })
        .join("chorus")
}

/// Load config from an explicit path or the default location
pub fn load(path: Option<&PathBuf>) -> Result<ChorusConfig> {
    let path = match path {
        Some(p) => p.clone(),
        None => config_dir().join("config.toml"),
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config: ChorusConfig =
        toml::from_str(&raw).with_context(|| format!("Invalid config at {}", path.display()))?;

    if config.agents.is_empty() {
        anyhow::bail!("Config must list at least one [[agents]] entry");
    }
    Ok(config)
}

impl ChorusConfig {
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| config_dir().join("chorus.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: ChorusConfig = toml::from_str(
            r#"
            [[agents]]
            name = "alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.agent_names(), vec!["alice"]);
        assert_eq!(config.cleanup.interval_secs, 60);
        assert!(config.cleanup.stale_after_hours.is_none());
        assert_eq!(config.decision.suggest_timeout_secs, 10);
        assert!(config.decision.suggester_url.is_none());
        assert_eq!(config.runtime.inbox_depth, 256);
        assert!(!config.runtime.revoke_room_on_uninvite);
    }

    #[test]
    fn test_full_config_roundtrip() {
        let config: ChorusConfig = toml::from_str(
            r#"
            [[agents]]
            name = "alice"

            [[agents]]
            name = "bob"

            [storage]
            db_path = "/tmp/chorus-test.db"

            [cleanup]
            interval_secs = 30
            stale_after_hours = 24

            [decision]
            suggest_timeout_secs = 5
            suggester_url = "http://localhost:8090/suggest"

            [runtime]
            queue_depth = 16
            revoke_room_on_uninvite = true
            "#,
        )
        .unwrap();

        assert_eq!(config.agent_names(), vec!["alice", "bob"]);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/chorus-test.db"));
        assert_eq!(config.cleanup.interval_secs, 30);
        assert_eq!(config.cleanup.stale_after_hours, Some(24));
        assert_eq!(
            config.decision.suggester_url.as_deref(),
            Some("http://localhost:8090/suggest")
        );
        assert_eq!(config.runtime.queue_depth, 16);
        assert!(config.runtime.revoke_room_on_uninvite);
    }

    #[test]
    fn test_load_rejects_empty_agents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "agents = []\n").unwrap();

        let result = load(Some(&path));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let path = PathBuf::from("/nonexistent/chorus/config.toml");
        assert!(load(Some(&path)).is_err());
    }
}
