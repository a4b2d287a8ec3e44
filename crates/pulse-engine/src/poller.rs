//! Poll loop: provider → catalog → build pass → store.

use std::sync::Arc;

use pulse_core::{ProviderError, TelemetrySnapshot, now_ms};
use pulse_settings::EngineSettings;
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::select_live_sessions;
use crate::provider::TelemetryProvider;
use crate::store::SnapshotStore;
use crate::trail::run_build_pass;

/// Result of one [`Poller::poll_once`] call.
#[derive(Debug)]
pub enum PollOutcome {
    /// Another cycle was still running.
    Skipped,
    /// The cycle failed; the store now holds the error snapshot.
    Failed(ProviderError),
    /// The polled snapshot was committed.
    Committed {
        /// Number of trails in the polled snapshot.
        trails: usize,
    },
}

/// Runs poll cycles against a provider, one at a time.
pub struct Poller {
    provider: Arc<dyn TelemetryProvider>,
    store: Arc<SnapshotStore>,
    engine: EngineSettings,
    in_flight: Mutex<()>,
}

impl Poller {
    /// Create a poller writing into `store`.
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        store: Arc<SnapshotStore>,
        engine: EngineSettings,
    ) -> Self {
        Self {
            provider,
            store,
            engine,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one cycle unless one is already in flight.
    pub async fn poll_once(&self) -> PollOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("poll cycle still running, skipping tick");
            return PollOutcome::Skipped;
        };

        self.store.begin_poll();
        let deadline = self.engine.cycle_timeout();
        let result = match tokio::time::timeout(deadline, self.cycle()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(deadline)),
        };

        match result {
            Ok(snapshot) => {
                let trails = snapshot.trails.len();
                self.store.commit_poll(snapshot);
                debug!(trails, "poll cycle committed");
                PollOutcome::Committed { trails }
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "poll cycle failed");
                self.store.fail_poll(e.to_string());
                PollOutcome::Failed(e)
            }
        }
    }

    async fn cycle(&self) -> Result<TelemetrySnapshot, ProviderError> {
        let document = self.provider.fetch().await?;
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || {
            let now = now_ms();
            let agents = document.agent_map();
            let sessions = select_live_sessions(&document, &agents, now, engine.recency_window_ms);
            run_build_pass(&sessions, &engine, now)
        })
        .await
        .map_err(|e| ProviderError::Cycle(e.to_string()))
    }

    /// Tick every poll interval until `cancel` fires. Each tick spawns a
    /// cycle; ticks landing on a running cycle are skipped.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.engine.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.engine.poll_interval_ms, "poller started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let poller = Arc::clone(&self);
                    let _ = tokio::spawn(async move {
                        let _ = poller.poll_once().await;
                    });
                }
            }
        }
        info!("poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderSnapshot;
    use assert_matches::assert_matches;
    use pulse_core::logging::capture_logs;
    use async_trait::async_trait;
    use pulse_core::{PushEvent, PushKind, SnapshotStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Provider returning a fixed document, optionally held until released.
    struct ScriptedProvider {
        document: serde_json::Value,
        fail: bool,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn returning(document: serde_json::Value) -> Self {
            Self {
                document,
                fail: false,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::returning(serde_json::json!({}))
            }
        }

        /// Returns `(entered, release)`.
        fn gated(mut self) -> (Self, Arc<Notify>, Arc<Notify>) {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            self.gate = Some((Arc::clone(&entered), Arc::clone(&release)));
            (self, entered, release)
        }
    }

    #[async_trait]
    impl TelemetryProvider for ScriptedProvider {
        async fn fetch(&self) -> Result<ProviderSnapshot, ProviderError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail {
                return Err(ProviderError::Exit {
                    status: "exit status: 1".into(),
                    stderr: "gateway offline".into(),
                });
            }
            Ok(serde_json::from_value(self.document.clone()).unwrap())
        }
    }

    fn engine() -> EngineSettings {
        EngineSettings {
            cycle_timeout_ms: 2_000,
            ..EngineSettings::default()
        }
    }

    fn setup(provider: ScriptedProvider, engine: EngineSettings) -> (Arc<Poller>, Arc<SnapshotStore>) {
        let store = Arc::new(SnapshotStore::new("main"));
        let poller = Arc::new(Poller::new(Arc::new(provider), Arc::clone(&store), engine));
        (poller, store)
    }

    fn live_document(dir: &std::path::Path) -> serde_json::Value {
        std::fs::write(
            dir.join("s1.jsonl"),
            "{\"message\":{\"role\":\"user\",\"content\":\"Build it\"}}\n{\"type\":\"thought\",\"content\":\"A\"}\n",
        )
        .unwrap();
        serde_json::json!({
            "agents": {"agents": [{"id": "main", "sessionsPath": dir}]},
            "sessions": {"recent": [
                {"sessionId": "s1", "agentId": "main", "key": "agent:main:main", "model": "m1", "updatedAt": now_ms()}
            ]},
        })
    }

    // ── outcomes ────────────────────────────────────────────────────

    #[tokio::test]
    async fn commits_polled_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (poller, store) = setup(ScriptedProvider::returning(live_document(dir.path())), engine());

        assert_matches!(poller.poll_once().await, PollOutcome::Committed { trails: 1 });
        let snap = store.current();
        assert_eq!(snap.status, SnapshotStatus::Working);
        assert_eq!(snap.trigger_prompt.as_deref(), Some("Build it"));
        assert_eq!(snap.active_model.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn provider_failure_yields_error_snapshot() {
        let (poller, store) = setup(ScriptedProvider::failing(), engine());
        let (logs, _guard) = capture_logs();

        assert_matches!(poller.poll_once().await, PollOutcome::Failed(ProviderError::Exit { .. }));
        assert!(logs.has_event(tracing::Level::WARN, "poll cycle failed"));
        assert!(logs.has_field("kind", "exit_status"));
        let snap = store.current();
        assert!(snap.is_error());
        assert!(snap.trails.is_empty());
        assert!(snap.message.unwrap().contains("gateway offline"));
    }

    #[tokio::test]
    async fn slow_cycle_times_out() {
        let (provider, _entered, _release) = ScriptedProvider::returning(serde_json::json!({})).gated();
        let engine = EngineSettings {
            cycle_timeout_ms: 50,
            ..EngineSettings::default()
        };
        let (poller, store) = setup(provider, engine);

        assert_matches!(poller.poll_once().await, PollOutcome::Failed(ProviderError::Timeout(_)));
        assert!(store.current().is_error());
    }

    // ── single in-flight guard ──────────────────────────────────────

    #[tokio::test]
    async fn overlapping_poll_is_skipped() {
        let (provider, entered, release) = ScriptedProvider::returning(serde_json::json!({})).gated();
        let (poller, _store) = setup(provider, engine());

        let first = tokio::spawn({
            let poller = Arc::clone(&poller);
            async move { poller.poll_once().await }
        });
        entered.notified().await;

        assert_matches!(poller.poll_once().await, PollOutcome::Skipped);
        release.notify_one();
        assert_matches!(first.await.unwrap(), PollOutcome::Committed { trails: 0 });
    }

    #[tokio::test]
    async fn event_during_poll_survives_commit() {
        let (provider, entered, release) = ScriptedProvider::returning(serde_json::json!({})).gated();
        let (poller, store) = setup(provider, engine());

        let cycle = tokio::spawn({
            let poller = Arc::clone(&poller);
            async move { poller.poll_once().await }
        });
        entered.notified().await;
        let _ = store.apply_event(PushEvent {
            kind: PushKind::Thought,
            session_id: "pushed".into(),
            agent_id: "coder".into(),
            content: Some("mid-poll".into()),
            tool: None,
            received_at: now_ms(),
        });
        release.notify_one();
        assert_matches!(cycle.await.unwrap(), PollOutcome::Committed { .. });

        let snap = store.current();
        assert_eq!(snap.trail("pushed").unwrap().thought_texts(), ["mid-poll"]);
        assert_eq!(snap.status, SnapshotStatus::Working);
    }

    // ── run loop ────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_polls_until_cancelled() {
        let provider = Arc::new(ScriptedProvider::returning(serde_json::json!({})));
        let store = Arc::new(SnapshotStore::new("main"));
        let engine = EngineSettings {
            poll_interval_ms: 10,
            ..engine()
        };
        let poller = Arc::new(Poller::new(
            Arc::clone(&provider) as Arc<dyn TelemetryProvider>,
            Arc::clone(&store),
            engine,
        ));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&poller).run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        task.await.unwrap();
        assert!(provider.calls.load(Ordering::SeqCst) >= 2);
        assert!(store.version() >= 1);
    }
}
