use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

/// A recovery episode is keyed by the tenant and the logical operation that
/// failed; repeated failures of the same operation accumulate toward the
/// attempt/timeout ceilings rather than resetting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub client_id: String,
    pub operation: String,
}

impl EpisodeKey {
    pub fn new(client_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            operation: operation.into(),
        }
    }
}

impl std::fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.client_id, self.operation)
    }
}

/// Live state of one recovery episode. Externally visible and injectable so
/// transitions can be asserted deterministically.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub attempts: u32,
    /// Ordered, deduplicated by the orchestrator's skip check.
    pub strategies_attempted: Vec<String>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AttemptState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            strategies_attempted: Vec::new(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// State whose clock started `elapsed_ms` in the past. Test seam for the
    /// episode-timeout ceiling.
    pub fn started_ago(elapsed_ms: u64) -> Self {
        let mut state = Self::new();
        state.start_time = Instant::now() - std::time::Duration::from_millis(elapsed_ms);
        state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of an episode's state, for inspection payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStateSnapshot {
    pub key: EpisodeKey,
    pub attempts: u32,
    pub strategies_attempted: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Keyed map of in-flight episode state.
///
/// Sections are short and never held across an await; distinct keys only
/// contend for the map lock itself.
pub struct AttemptStateStore {
    states: RwLock<HashMap<EpisodeKey, AttemptState>>,
}

impl AttemptStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Load a copy of the current state for a key, creating it on first use.
    pub fn load_or_create(&self, key: &EpisodeKey) -> AttemptState {
        let mut states = self.write_lock();
        states.entry(key.clone()).or_default().clone()
    }

    pub fn get(&self, key: &EpisodeKey) -> Option<AttemptState> {
        self.read_lock().get(key).cloned()
    }

    /// Persist the mutated state back for a key.
    pub fn store(&self, key: &EpisodeKey, state: AttemptState) {
        self.write_lock().insert(key.clone(), state);
    }

    /// Inject a prior state, e.g. from a test fixture.
    pub fn inject(&self, key: EpisodeKey, state: AttemptState) {
        self.write_lock().insert(key, state);
    }

    /// Clear one episode's state. Called on success and available to
    /// integrators reclaiming abandoned keys.
    pub fn clear(&self, key: &EpisodeKey) -> bool {
        self.write_lock().remove(key).is_some()
    }

    /// Bulk clear of every episode belonging to a client.
    pub fn clear_client(&self, client_id: &str) -> usize {
        let mut states = self.write_lock();
        let before = states.len();
        states.retain(|key, _| key.client_id != client_id);
        before - states.len()
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    pub fn snapshots(&self) -> Vec<AttemptStateSnapshot> {
        self.read_lock()
            .iter()
            .map(|(key, state)| AttemptStateSnapshot {
                key: key.clone(),
                attempts: state.attempts,
                strategies_attempted: state.strategies_attempted.clone(),
                started_at: state.started_at,
                elapsed_ms: state.elapsed_ms(),
            })
            .collect()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EpisodeKey, AttemptState>> {
        match self.states.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EpisodeKey, AttemptState>> {
        match self.states.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for AttemptStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_create_starts_fresh() {
        let store = AttemptStateStore::new();
        let key = EpisodeKey::new("client-1", "update_menu");
        let state = store.load_or_create(&key);
        assert_eq!(state.attempts, 0);
        assert!(state.strategies_attempted.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_and_clear_round_trip() {
        let store = AttemptStateStore::new();
        let key = EpisodeKey::new("client-1", "update_menu");
        let mut state = store.load_or_create(&key);
        state.attempts = 3;
        state.strategies_attempted.push("wait_and_retry".to_string());
        store.store(&key, state);

        let loaded = store.get(&key).unwrap();
        assert_eq!(loaded.attempts, 3);

        assert!(store.clear(&key));
        assert!(store.get(&key).is_none());
        assert!(!store.clear(&key));
    }

    #[test]
    fn clear_client_is_scoped() {
        let store = AttemptStateStore::new();
        store.load_or_create(&EpisodeKey::new("client-1", "op_a"));
        store.load_or_create(&EpisodeKey::new("client-1", "op_b"));
        store.load_or_create(&EpisodeKey::new("client-2", "op_a"));

        assert_eq!(store.clear_client("client-1"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(&EpisodeKey::new("client-2", "op_a")).is_some());
    }

    #[test]
    fn injected_state_keeps_its_clock() {
        let store = AttemptStateStore::new();
        let key = EpisodeKey::new("client-1", "op");
        store.inject(key.clone(), AttemptState::started_ago(70_000));
        let state = store.get(&key).unwrap();
        assert!(state.elapsed_ms() >= 70_000);
    }
}
