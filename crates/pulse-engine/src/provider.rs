//! Telemetry provider: the external command that lists agents and sessions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::ProviderError;
use pulse_settings::ProviderSettings;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::catalog::AgentDescriptor;

/// Document printed by the provider.
///
/// ```json
/// { "agents":   { "agents": [{ "id": "main", "sessionsPath": "/…/sessions" }] },
///   "sessions": { "recent": [{ "sessionId": "s1", "agentId": "main",
///                              "key": "agent:main:main", "model": "m",
///                              "updatedAt": 1700000000000 }] } }
/// ```
///
/// Unknown fields are ignored and missing sections default to empty.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSnapshot {
    /// Known agents.
    pub agents: AgentsSection,
    /// Recently active sessions.
    pub sessions: SessionsSection,
}

/// `agents` section of the provider document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    /// Agent entries.
    pub agents: Vec<AgentEntry>,
}

/// One agent as reported by the provider.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentEntry {
    /// Agent id.
    pub id: String,
    /// Directory holding the agent's session logs.
    pub sessions_path: Option<PathBuf>,
}

/// `sessions` section of the provider document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Recently active sessions.
    pub recent: Vec<SessionEntry>,
}

/// One session as reported by the provider.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionEntry {
    /// Session id (also the log file stem).
    pub session_id: String,
    /// Owning agent id.
    pub agent_id: String,
    /// Composite session key.
    pub key: String,
    /// Model the session runs on.
    pub model: String,
    /// Last activity, epoch milliseconds.
    pub updated_at: i64,
}

impl ProviderSnapshot {
    /// Index agents that have a log directory by id.
    pub fn agent_map(&self) -> HashMap<String, AgentDescriptor> {
        self.agents
            .agents
            .iter()
            .filter(|a| !a.id.is_empty())
            .filter_map(|a| {
                let dir = a.sessions_path.clone()?;
                Some((
                    a.id.clone(),
                    AgentDescriptor {
                        id: a.id.clone(),
                        log_directory: dir,
                    },
                ))
            })
            .collect()
    }
}

/// Source of provider snapshots.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Fetch one snapshot.
    async fn fetch(&self) -> Result<ProviderSnapshot, ProviderError>;
}

/// Provider backed by an external command printing JSON on stdout.
#[derive(Clone, Debug)]
pub struct CommandProvider {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    /// Create a provider running `command` (program then arguments).
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    /// Create a provider from settings.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.command.clone(), settings.timeout())
    }
}

#[async_trait]
impl TelemetryProvider for CommandProvider {
    #[instrument(skip(self), fields(program = ?self.command.first()))]
    async fn fetch(&self) -> Result<ProviderSnapshot, ProviderError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(ProviderError::Spawn {
                program: String::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "empty provider command",
                ),
            });
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(|source| ProviderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProviderError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let snapshot: ProviderSnapshot = serde_json::from_slice(&output.stdout)?;
        debug!(
            agents = snapshot.agents.agents.len(),
            sessions = snapshot.sessions.recent.len(),
            "provider snapshot fetched"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sh(script: &str, timeout_ms: u64) -> CommandProvider {
        CommandProvider::new(
            vec!["sh".into(), "-c".into(), script.into()],
            Duration::from_millis(timeout_ms),
        )
    }

    // ── document ────────────────────────────────────────────────────

    #[test]
    fn missing_sections_default_to_empty() {
        let snap: ProviderSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snap.agents.agents.is_empty());
        assert!(snap.sessions.recent.is_empty());
    }

    #[test]
    fn unknown_fields_ignored() {
        let snap: ProviderSnapshot = serde_json::from_str(
            r#"{"gateway":{"up":true},"sessions":{"count":1,"recent":[
                {"sessionId":"s1","agentId":"main","key":"agent:main:main",
                 "model":"m","updatedAt":5,"tokens":99}]}}"#,
        )
        .unwrap();
        assert_eq!(snap.sessions.recent.len(), 1);
        assert_eq!(snap.sessions.recent[0].updated_at, 5);
    }

    #[test]
    fn agent_map_skips_agents_without_directory() {
        let snap: ProviderSnapshot = serde_json::from_str(
            r#"{"agents":{"agents":[{"id":"main","sessionsPath":"/logs/main"},{"id":"coder"}]}}"#,
        )
        .unwrap();
        let map = snap.agent_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["main"].log_directory, PathBuf::from("/logs/main"));
    }

    // ── command provider ────────────────────────────────────────────

    #[tokio::test]
    async fn decodes_stdout() {
        let provider = sh(
            r#"echo '{"agents":{"agents":[{"id":"main","sessionsPath":"/tmp"}]}}'"#,
            5_000,
        );
        let snap = provider.fetch().await.unwrap();
        assert_eq!(snap.agents.agents[0].id, "main");
    }

    #[tokio::test]
    async fn non_zero_exit_is_error() {
        let provider = sh("echo boom >&2; exit 3", 5_000);
        let err = provider.fetch().await.unwrap_err();
        assert_matches!(&err, ProviderError::Exit { stderr, .. } if stderr == "boom");
        assert_eq!(err.error_kind(), "exit_status");
    }

    #[tokio::test]
    async fn bad_json_is_decode_error() {
        let provider = sh("echo not-json", 5_000);
        assert_matches!(provider.fetch().await, Err(ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = sh("sleep 5", 100);
        assert_matches!(provider.fetch().await, Err(ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let provider = CommandProvider::new(
            vec!["/nonexistent/pulse-provider".into()],
            Duration::from_secs(1),
        );
        assert_matches!(provider.fetch().await, Err(ProviderError::Spawn { .. }));
    }

    #[tokio::test]
    async fn empty_command_is_spawn_error() {
        let provider = CommandProvider::new(Vec::new(), Duration::from_secs(1));
        assert_matches!(provider.fetch().await, Err(ProviderError::Spawn { .. }));
    }
}
