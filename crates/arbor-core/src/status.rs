//! Indexing status tracker with subscriber fan-out

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use serde::{Deserialize, Serialize};

/// Buffered updates each subscriber can hold before newer snapshots are
/// dropped.
const SUBSCRIBER_CAPACITY: usize = 10;

/// Top-level index lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Uninitialized,
    Indexing,
    Ready,
    Failed,
}

/// Phase within `Indexing`. Each of the three working phases spans a third
/// of overall progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Parsing,
    ModuleRegistry,
    CallGraph,
    Complete,
}

impl Phase {
    fn base_progress(&self) -> f32 {
        match self {
            Phase::Parsing => 0.0,
            Phase::ModuleRegistry => 0.33,
            Phase::CallGraph => 0.66,
            Phase::Complete => 1.0,
        }
    }
}

/// Point-in-time view of the tracker, as serialized for the `status` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: IndexState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub phase_progress: f32,
    pub overall_progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Inner {
    state: IndexState,
    phase: Option<Phase>,
    phase_progress: f32,
    error: Option<String>,
    subscribers: HashMap<u64, SyncSender<StatusSnapshot>>,
    next_subscriber: u64,
}

/// State machine `Uninitialized → Indexing → {Ready | Failed}` with
/// best-effort fan-out to bounded subscriber channels.
///
/// Writers hold the exclusive lock across each mutation; readers share it.
pub struct StatusTracker {
    inner: RwLock<Inner>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        StatusTracker {
            inner: RwLock::new(Inner {
                state: IndexState::Uninitialized,
                phase: None,
                phase_progress: 0.0,
                error: None,
                subscribers: HashMap::new(),
                next_subscriber: 0,
            }),
        }
    }

    pub fn start_indexing(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.state = IndexState::Indexing;
        inner.phase = Some(Phase::Parsing);
        inner.phase_progress = 0.0;
        inner.error = None;
        Self::publish(&mut inner);
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.phase = Some(phase);
        inner.phase_progress = 0.0;
        Self::publish(&mut inner);
    }

    /// Update progress within the current phase; clamped to [0, 1].
    pub fn update_progress(&self, progress: f32) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.phase_progress = progress.clamp(0.0, 1.0);
        Self::publish(&mut inner);
    }

    pub fn complete_indexing(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.state = IndexState::Ready;
        inner.phase = Some(Phase::Complete);
        inner.phase_progress = 1.0;
        Self::publish(&mut inner);
    }

    pub fn fail_indexing(&self, message: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.state = IndexState::Failed;
        inner.error = Some(message.into());
        Self::publish(&mut inner);
    }

    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .state
            == IndexState::Ready
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Self::snapshot_of(&inner)
    }

    /// Register a subscriber. Returns its id (for `unsubscribe`) and the
    /// receiving end of a bounded channel. When the buffer is full, newer
    /// snapshots are dropped rather than blocking the tracker.
    pub fn subscribe(&self) -> (u64, Receiver<StatusSnapshot>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let (tx, rx) = sync_channel(SUBSCRIBER_CAPACITY);
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber, closing its channel.
    pub fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.remove(&id);
    }

    fn snapshot_of(inner: &Inner) -> StatusSnapshot {
        let overall = match inner.state {
            IndexState::Uninitialized => 0.0,
            IndexState::Ready => 1.0,
            IndexState::Failed => inner
                .phase
                .map(|p| p.base_progress() + inner.phase_progress * 0.33)
                .unwrap_or(0.0),
            IndexState::Indexing => match inner.phase {
                Some(Phase::Complete) => 1.0,
                Some(p) => (p.base_progress() + inner.phase_progress * 0.33).min(1.0),
                None => 0.0,
            },
        };
        StatusSnapshot {
            state: inner.state,
            phase: inner.phase,
            phase_progress: inner.phase_progress,
            overall_progress: overall,
            error: inner.error.clone(),
        }
    }

    fn publish(inner: &mut Inner) {
        let snapshot = Self::snapshot_of(inner);
        inner.subscribers.retain(|_, tx| {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => true,
                // Buffer full: drop this update, keep the subscriber.
                Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_progression() {
        let tracker = StatusTracker::new();
        assert_eq!(tracker.snapshot().state, IndexState::Uninitialized);

        tracker.start_indexing();
        assert_eq!(tracker.snapshot().state, IndexState::Indexing);
        assert!(!tracker.is_ready());

        tracker.set_phase(Phase::ModuleRegistry);
        tracker.update_progress(0.5);
        let snap = tracker.snapshot();
        assert!((snap.overall_progress - 0.495).abs() < 1e-4);

        tracker.complete_indexing();
        assert!(tracker.is_ready());
        assert_eq!(tracker.snapshot().overall_progress, 1.0);
    }

    #[test]
    fn failure_records_message() {
        let tracker = StatusTracker::new();
        tracker.start_indexing();
        tracker.fail_indexing("parse exploded");
        let snap = tracker.snapshot();
        assert_eq!(snap.state, IndexState::Failed);
        assert_eq!(snap.error.as_deref(), Some("parse exploded"));
        assert!(!tracker.is_ready());
    }

    #[test]
    fn subscribers_receive_updates_in_order() {
        let tracker = StatusTracker::new();
        let (_id, rx) = tracker.subscribe();
        tracker.start_indexing();
        tracker.set_phase(Phase::CallGraph);
        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        assert_eq!(first.phase, Some(Phase::Parsing));
        assert_eq!(second.phase, Some(Phase::CallGraph));
    }

    #[test]
    fn full_buffer_drops_newest_without_blocking() {
        let tracker = StatusTracker::new();
        let (_id, rx) = tracker.subscribe();
        for _ in 0..SUBSCRIBER_CAPACITY + 5 {
            tracker.update_progress(0.1);
        }
        // The tracker never blocked; the buffer holds at most capacity.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn unsubscribe_closes_channel() {
        let tracker = StatusTracker::new();
        let (id, rx) = tracker.subscribe();
        tracker.unsubscribe(id);
        tracker.start_indexing();
        assert!(rx.try_recv().is_err());
    }
}
