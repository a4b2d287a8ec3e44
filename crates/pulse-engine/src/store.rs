//! Snapshot store: the one place both producers write through.
//!
//! The poll path replaces the snapshot wholesale; the push path patches it.
//! Events applied while a poll is in flight are journaled and replayed on
//! top of the polled snapshot, so a slow poll never regresses state the
//! reducer has already advanced.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use pulse_core::{GatewayEvent, PushEvent, TelemetrySnapshot, Trail, now_ms};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reducer;

/// Maximum number of journaled events between `begin_poll` and `commit_poll`.
pub const JOURNAL_CAPACITY: usize = 256;

/// How far apart a logged thought and a pushed thought with the same text
/// may be and still count as one thought.
pub const REPLAY_MATCH_WINDOW_MS: u64 = 10_000;

struct StoreInner {
    snapshot: TelemetrySnapshot,
    version: u64,
    journal: VecDeque<PushEvent>,
}

/// Shared, versioned holder of the current snapshot.
pub struct SnapshotStore {
    inner: RwLock<StoreInner>,
    main_agent_id: String,
}

impl SnapshotStore {
    /// Empty idle snapshot at version 0.
    pub fn new(main_agent_id: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                snapshot: TelemetrySnapshot {
                    generated_at: now_ms(),
                    ..TelemetrySnapshot::default()
                },
                version: 0,
                journal: VecDeque::with_capacity(JOURNAL_CAPACITY),
            }),
            main_agent_id: main_agent_id.into(),
        }
    }

    /// Copy of the current snapshot.
    pub fn current(&self) -> TelemetrySnapshot {
        self.inner.read().snapshot.clone()
    }

    /// Incremented on every change.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Run the reducer for one push event and journal it.
    pub fn apply_event(&self, event: PushEvent) -> bool {
        let mut inner = self.inner.write();
        let changed = reducer::apply(&mut inner.snapshot, &event, &self.main_agent_id);
        if changed {
            inner.version += 1;
        }
        if inner.journal.len() == JOURNAL_CAPACITY {
            let _ = inner.journal.pop_front();
        }
        inner.journal.push_back(event);
        changed
    }

    /// Mark the start of a poll cycle. Events from here on are replayed on
    /// commit.
    pub fn begin_poll(&self) {
        self.inner.write().journal.clear();
    }

    /// Replace the snapshot with a polled one, then replay journaled events
    /// the poll could not have seen. The main headline only ever comes from
    /// push events, so it carries over unless a replayed event replaces it.
    pub fn commit_poll(&self, snapshot: TelemetrySnapshot) {
        let mut inner = self.inner.write();
        let journal = std::mem::take(&mut inner.journal);
        let pending = unseen_events(&snapshot, &journal);

        let mut next = snapshot;
        if next.main_headline.is_none() {
            next.main_headline = inner.snapshot.main_headline.take();
        }
        let replayed = pending
            .into_iter()
            .filter(|event| reducer::apply(&mut next, event, &self.main_agent_id))
            .count();
        if replayed > 0 {
            debug!(replayed, "replayed push events over polled snapshot");
        }
        inner.snapshot = next;
        inner.version += 1;
    }

    /// Replace the snapshot with the error snapshot.
    pub fn fail_poll(&self, message: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.journal.clear();
        inner.snapshot = TelemetrySnapshot::error(message, now_ms());
        inner.version += 1;
    }
}

/// Journaled events the polled snapshot does not already reflect, in arrival
/// order.
///
/// An event is unseen when its session is absent from the poll, or when it
/// arrived after the polled `updated_at` and no polled thought accounts for
/// it. Each polled thought accounts for at most one event.
fn unseen_events<'a>(polled: &TelemetrySnapshot, journal: &'a VecDeque<PushEvent>) -> Vec<&'a PushEvent> {
    let mut claimed: HashSet<(&str, usize)> = HashSet::new();
    journal
        .iter()
        .filter(|event| {
            let Some(trail) = polled.trail(&event.session_id) else {
                return true;
            };
            if event.received_at <= trail.updated_at {
                return false;
            }
            match polled_thought(trail, event, &claimed) {
                Some(index) => {
                    let _ = claimed.insert((trail.id.as_str(), index));
                    false
                }
                None => true,
            }
        })
        .collect()
}

/// Index of an unclaimed polled thought that is `event` read back from the
/// log: same text, logged within [`REPLAY_MATCH_WINDOW_MS`] of receipt.
fn polled_thought(trail: &Trail, event: &PushEvent, claimed: &HashSet<(&str, usize)>) -> Option<usize> {
    let text = event.thought_text()?;
    trail
        .thoughts
        .iter()
        .enumerate()
        .find(|(index, thought)| {
            thought.text == text
                && thought.timestamp.abs_diff(event.received_at) <= REPLAY_MATCH_WINDOW_MS
                && !claimed.contains(&(trail.id.as_str(), *index))
        })
        .map(|(index, _)| index)
}

/// Drain gateway events into the store until the channel closes or
/// `cancel` fires.
pub async fn run_event_sink(
    store: Arc<SnapshotStore>,
    mut events: mpsc::Receiver<GatewayEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            next = events.recv() => {
                let Some(raw) = next else {
                    warn!("gateway event channel closed");
                    break;
                };
                match PushEvent::from_gateway(&raw, now_ms()) {
                    Some(event) => {
                        let _ = store.apply_event(event);
                    }
                    None => debug!(event = %raw.name, "ignoring push event"),
                }
            }
        }
    }
    info!("event sink stopped");
}
