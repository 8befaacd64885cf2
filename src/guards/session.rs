//! Per-session guard state.
//!
//! Every session owns its own counters behind its own async mutex. The store
//! maps session ids to those cells and exposes only narrow operations:
//! get-or-create, snapshot, close and idle pruning.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::guards::decision::GuardKind;
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};

/// Identifier of one agent run's session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random (UUID v4) session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counters kept by the tool-call guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCallCounters {
    pub(crate) per_tool_calls: HashMap<String, u32>,
    pub(crate) per_tool_retries: HashMap<String, u32>,
    pub(crate) total_calls: u32,
}

impl ToolCallCounters {
    pub fn calls_for(&self, tool: &str) -> u32 {
        self.per_tool_calls.get(tool).copied().unwrap_or(0)
    }

    pub fn retries_for(&self, tool: &str) -> u32 {
        self.per_tool_retries.get(tool).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls
    }
}

/// Counters kept by the model-invocation guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvocationCounters {
    pub(crate) invocations: u32,
    pub(crate) warned: bool,
}

impl InvocationCounters {
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    pub fn warned(&self) -> bool {
        self.warned
    }
}

/// Counters kept by the token-budget guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenCounters {
    pub(crate) cumulative: u64,
    pub(crate) warned: bool,
}

impl TokenCounters {
    pub fn cumulative(&self) -> u64 {
        self.cumulative
    }

    pub fn warned(&self) -> bool {
        self.warned
    }
}

/// All guard counters of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardCounters {
    pub tool_calls: ToolCallCounters,
    pub invocations: InvocationCounters,
    pub tokens: TokenCounters,
}

/// Why and when a session was stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopRecord {
    pub guard: GuardKind,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Guard state of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    id: SessionId,
    created_at: DateTime<Utc>,
    last_event_at: DateTime<Utc>,
    counters: GuardCounters,
    stop: Option<StopRecord>,
}

impl SessionState {
    fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_event_at: now,
            counters: GuardCounters::default(),
            stop: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_event_at(&self) -> DateTime<Utc> {
        self.last_event_at
    }

    pub fn counters(&self) -> &GuardCounters {
        &self.counters
    }

    pub fn stop_record(&self) -> Option<&StopRecord> {
        self.stop.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    /// Counters for a guard to update. Marks the session as active.
    pub(crate) fn counters_mut(&mut self) -> &mut GuardCounters {
        self.last_event_at = Utc::now();
        &mut self.counters
    }

    /// Record the first Stop. Later stops keep the original record.
    pub(crate) fn record_stop(&mut self, guard: GuardKind, reason: impl Into<String>) {
        if self.stop.is_none() {
            self.stop = Some(StopRecord {
                guard,
                reason: reason.into(),
                at: Utc::now(),
            });
        }
    }
}

/// Shared handle to one session's state.
pub type SessionCell = Arc<Mutex<SessionState>>;

/// Map of session id to isolated guard state.
pub struct GuardStateStore {
    sessions: RwLock<HashMap<SessionId, SessionCell>>,
    observer: Arc<dyn Observer>,
}

impl GuardStateStore {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            observer,
        }
    }

    /// The state cell for `id`, if the session exists.
    pub async fn get(&self, id: &SessionId) -> Option<SessionCell> {
        self.sessions.read().await.get(id).map(Arc::clone)
    }

    /// Get the state cell for `id`, creating fresh state on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> SessionCell {
        // Fast path: check if session exists
        {
            let sessions = self.sessions.read().await;
            if let Some(cell) = sessions.get(id) {
                return Arc::clone(cell);
            }
        }

        // Slow path: create new session
        let mut sessions = self.sessions.write().await;
        // Double-check after acquiring write lock
        if let Some(cell) = sessions.get(id) {
            return Arc::clone(cell);
        }

        let cell = Arc::new(Mutex::new(SessionState::new(id.clone())));
        sessions.insert(id.clone(), Arc::clone(&cell));
        let active = sessions.len() as u64;
        drop(sessions);

        tracing::info!(session_id = %id, "Guard session started");
        self.observer.record_event(&ObserverEvent::SessionStarted {
            session_id: id.to_string(),
        });
        self.observer
            .record_metric(&ObserverMetric::ActiveSessions(active));
        cell
    }

    /// A copy of the session's current state, if it exists.
    pub async fn snapshot(&self, id: &SessionId) -> Option<SessionState> {
        let cell = self.get(id).await?;
        let state = cell.lock().await;
        Some(state.clone())
    }

    /// Discard a session's state. Returns `true` if it existed.
    ///
    /// A later event for the same id starts again from zeroed counters.
    pub async fn close(&self, id: &SessionId) -> bool {
        let (removed, active) = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(id).is_some();
            (removed, sessions.len() as u64)
        };

        if removed {
            tracing::info!(session_id = %id, "Guard session closed");
            self.observer.record_event(&ObserverEvent::SessionClosed {
                session_id: id.to_string(),
                reason: "closed".into(),
            });
            self.observer
                .record_metric(&ObserverMetric::ActiveSessions(active));
        }
        removed
    }

    /// Remove sessions whose last event is at least `max_idle` old.
    ///
    /// Sessions whose lock is currently held are in use and are skipped.
    /// A `max_idle` too large to subtract from now prunes nothing.
    /// Returns the number of sessions pruned.
    pub async fn prune_idle(&self, max_idle: std::time::Duration) -> usize {
        let Some(cutoff) = chrono::TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            tracing::debug!(?max_idle, "Idle timeout out of range, nothing to prune");
            return 0;
        };

        let (stale, active) = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<SessionId> = sessions
                .iter()
                .filter_map(|(id, cell)| {
                    // Try to lock; skip if contended (someone is actively using it)
                    let state = cell.try_lock().ok()?;
                    (state.last_event_at <= cutoff).then(|| id.clone())
                })
                .collect();
            for id in &stale {
                sessions.remove(id);
            }
            (stale, sessions.len() as u64)
        };

        if stale.is_empty() {
            return 0;
        }

        for id in &stale {
            tracing::info!(session_id = %id, "Pruned idle guard session");
            self.observer.record_event(&ObserverEvent::SessionClosed {
                session_id: id.to_string(),
                reason: "pruned".into(),
            });
        }
        self.observer
            .record_metric(&ObserverMetric::ActiveSessions(active));
        stale.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for GuardStateStore {
    fn default() -> Self {
        Self::new()
    }
}
