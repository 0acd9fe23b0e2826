//! Durable per-pin notification policy.
//!
//! The whole collection lives in memory and is written back as one JSON
//! object under [`PREFERENCES_KEY`] after every mutation. Reads never touch
//! storage.
//!
//! # Failure handling
//!
//! This is local convenience state. A failed or corrupt load starts from an
//! empty collection (every pin is treated as never seen) and a failed write
//! is logged and dropped. Neither is reported to the caller.
//!
//! # Concurrency
//!
//! Writes are serialized through an async gate so a mutation and its
//! persistence are never interleaved with another write from this process.
//! Multiple processes sharing one backing store are not supported.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::model::PinPreference;
use crate::clock::{duration_to_ms, Clock};
use crate::kv::KeyValueStore;
use crate::pin::PinId;

/// Storage key holding the serialized collection.
pub const PREFERENCES_KEY: &str = "pin_preferences";

/// Default re-notification cooldown after rating a pin "Good" (7 days).
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

type Preferences = BTreeMap<PinId, PinPreference>;

/// Per-pin notification preferences backed by a key-value store.
pub struct PreferenceStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    entries: RwLock<Preferences>,
    write_gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("cooldown", &self.cooldown)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl PreferenceStore {
    /// Create an empty store. Call [`load`](Self::load) to read persisted state.
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            cooldown: DEFAULT_COOLDOWN,
            entries: RwLock::new(Preferences::new()),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Set the "Good" cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// The configured "Good" cooldown.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Load the full collection from storage, replacing what is in memory.
    ///
    /// Returns the number of preferences loaded. Missing, unreadable or
    /// corrupt data yields an empty collection.
    pub async fn load(&self) -> usize {
        let _gate = self.write_gate.lock().await;

        let loaded = match self.kv.get(PREFERENCES_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Preferences>(&json) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored pin preferences are corrupt, starting empty");
                    Preferences::new()
                }
            },
            Ok(None) => Preferences::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load pin preferences, starting empty");
                Preferences::new()
            }
        };

        let count = loaded.len();
        *self.entries.write() = loaded;
        tracing::debug!(count, "Pin preferences loaded");
        count
    }

    /// Rate a pin "Good": silent for the cooldown, then eligible again.
    pub async fn mark_good(&self, id: &PinId) {
        let now = self.clock.now_ms();
        let pref = PinPreference::good(now, duration_to_ms(self.cooldown));
        tracing::info!(pin = %id, next_notify = ?pref.next_notify, "Pin marked good");
        self.put(id, pref).await;
    }

    /// Rate a pin "Bad": never notify again.
    pub async fn mark_bad(&self, id: &PinId) {
        let pref = PinPreference::bad(self.clock.now_ms());
        tracing::info!(pin = %id, "Pin marked bad (muted)");
        self.put(id, pref).await;
    }

    /// Lift a mute; the pin is eligible immediately.
    pub async fn unmute(&self, id: &PinId) {
        let pref = PinPreference::unmuted(self.clock.now_ms());
        tracing::info!(pin = %id, "Pin unmuted");
        self.put(id, pref).await;
    }

    /// Whether a discovery of this pin should notify right now.
    ///
    /// Pins without a preference always notify.
    pub fn should_notify(&self, id: &PinId) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .read()
            .get(id)
            .map_or(true, |pref| pref.allows_notification(now))
    }

    /// Whether the pin is muted.
    pub fn is_muted(&self, id: &PinId) -> bool {
        self.entries.read().get(id).is_some_and(|pref| pref.muted)
    }

    /// The stored preference, if any.
    pub fn get_preference(&self, id: &PinId) -> Option<PinPreference> {
        self.entries.read().get(id).cloned()
    }

    /// Refresh `last_seen` for an existing preference.
    ///
    /// Does nothing for pins the user never rated. Returns whether an entry
    /// was updated.
    pub async fn update_last_seen(&self, id: &PinId) -> bool {
        let now = self.clock.now_ms();
        self.write(|entries| match entries.get_mut(id) {
            Some(pref) => {
                pref.last_seen = now;
                true
            }
            None => false,
        })
        .await
    }

    /// Erase every preference (test/debug).
    pub async fn clear_all(&self) {
        let _gate = self.write_gate.lock().await;
        self.entries.write().clear();
        if let Err(e) = self.kv.remove(PREFERENCES_KEY).await {
            tracing::warn!(error = %e, "Failed to clear persisted pin preferences");
        }
        tracing::info!("All pin preferences cleared");
    }

    /// Number of stored preferences.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no preferences are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the whole collection, ordered by pin id.
    pub fn snapshot(&self) -> Vec<(PinId, PinPreference)> {
        self.entries
            .read()
            .iter()
            .map(|(id, pref)| (id.clone(), pref.clone()))
            .collect()
    }

    async fn put(&self, id: &PinId, pref: PinPreference) {
        debug_assert!(pref.is_consistent());
        self.write(move |entries| {
            entries.insert(id.clone(), pref);
            true
        })
        .await;
    }

    /// Apply a mutation and persist the whole collection if it changed.
    async fn write<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut Preferences) -> bool + Send,
    {
        let _gate = self.write_gate.lock().await;

        let serialized = {
            let mut entries = self.entries.write();
            if !mutate(&mut entries) {
                return false;
            }
            serde_json::to_string(&*entries)
        };

        match serialized {
            Ok(json) => {
                if let Err(e) = self.kv.set(PREFERENCES_KEY, json).await {
                    tracing::warn!(error = %e, "Failed to persist pin preferences");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize pin preferences");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kv::{BoxFuture, KvError, MemoryKeyValueStore};

    const START_MS: i64 = 1_700_000_000_000;

    fn setup() -> (PreferenceStore, Arc<ManualClock>, Arc<MemoryKeyValueStore>) {
        let clock = Arc::new(ManualClock::new(START_MS));
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = PreferenceStore::new(
            Arc::clone(&kv) as Arc<dyn KeyValueStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (store, clock, kv)
    }

    /// Store whose every operation fails.
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<String>, KvError>> {
            Box::pin(async { Err(std::io::Error::other("disk gone").into()) })
        }

        fn set(&self, _key: &str, _value: String) -> BoxFuture<'_, Result<(), KvError>> {
            Box::pin(async { Err(std::io::Error::other("disk gone").into()) })
        }

        fn remove(&self, _key: &str) -> BoxFuture<'_, Result<(), KvError>> {
            Box::pin(async { Err(std::io::Error::other("disk gone").into()) })
        }
    }

    #[tokio::test]
    async fn test_unrated_pin_notifies() {
        let (store, _, _) = setup();
        let id = PinId::from("fresh");
        assert!(store.should_notify(&id));
        assert!(!store.is_muted(&id));
        assert!(store.get_preference(&id).is_none());
    }

    #[tokio::test]
    async fn test_mark_good_cools_down_for_seven_days() {
        let (store, clock, _) = setup();
        let id = PinId::from("good");

        store.mark_good(&id).await;
        assert!(!store.should_notify(&id));

        clock.advance(Duration::from_secs(7 * 24 * 60 * 60 - 1));
        assert!(!store.should_notify(&id));

        clock.advance(Duration::from_secs(2));
        assert!(store.should_notify(&id));

        let pref = store.get_preference(&id).unwrap();
        assert!(!pref.muted);
        assert_eq!(pref.marked_at, START_MS);
        assert_eq!(pref.last_seen, START_MS);
    }

    #[tokio::test]
    async fn test_mark_bad_never_notifies() {
        let (store, clock, _) = setup();
        let id = PinId::from("bad");

        store.mark_bad(&id).await;
        assert!(!store.should_notify(&id));
        assert!(store.is_muted(&id));

        clock.advance(Duration::from_secs(100 * 24 * 60 * 60));
        assert!(!store.should_notify(&id));

        let pref = store.get_preference(&id).unwrap();
        assert!(pref.next_notify.is_none());
    }

    #[tokio::test]
    async fn test_unmute_after_bad() {
        let (store, _, _) = setup();
        let id = PinId::from("p");

        store.mark_bad(&id).await;
        store.unmute(&id).await;

        assert!(store.should_notify(&id));
        assert!(!store.is_muted(&id));
        assert_eq!(store.get_preference(&id).unwrap().next_notify, Some(START_MS));
    }

    #[tokio::test]
    async fn test_mark_overwrites_previous_preference() {
        let (store, clock, _) = setup();
        let id = PinId::from("p");

        store.mark_bad(&id).await;
        clock.advance(Duration::from_secs(60));
        store.mark_good(&id).await;

        let pref = store.get_preference(&id).unwrap();
        assert!(!pref.muted);
        assert_eq!(pref.marked_at, START_MS + 60_000);
        assert!(pref.is_consistent());
    }

    #[tokio::test]
    async fn test_update_last_seen_only_touches_existing() {
        let (store, clock, kv) = setup();
        let rated = PinId::from("rated");
        let unrated = PinId::from("unrated");

        store.mark_good(&rated).await;
        clock.advance(Duration::from_secs(30));

        assert!(store.update_last_seen(&rated).await);
        assert!(!store.update_last_seen(&unrated).await);

        assert_eq!(store.get_preference(&rated).unwrap().last_seen, START_MS + 30_000);
        assert_eq!(store.get_preference(&rated).unwrap().marked_at, START_MS);
        assert!(store.get_preference(&unrated).is_none());
        assert_eq!(store.len(), 1);

        // Persisted copy reflects the touch
        let json = kv.get(PREFERENCES_KEY).await.unwrap().unwrap();
        assert!(json.contains(&(START_MS + 30_000).to_string()));
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let (store, clock, kv) = setup();
        store.mark_good(&PinId::from("a")).await;
        store.mark_bad(&PinId::from("b")).await;

        let reloaded = PreferenceStore::new(
            Arc::clone(&kv) as Arc<dyn KeyValueStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        assert_eq!(reloaded.load().await, 2);
        assert!(!reloaded.should_notify(&PinId::from("a")));
        assert!(reloaded.is_muted(&PinId::from("b")));
    }

    #[tokio::test]
    async fn test_corrupt_state_starts_empty() {
        let (store, _, kv) = setup();
        kv.set(PREFERENCES_KEY, "{not json".to_string()).await.unwrap();

        assert_eq!(store.load().await, 0);
        assert!(store.is_empty());
        assert!(store.should_notify(&PinId::from("anything")));
    }

    #[tokio::test]
    async fn test_failing_storage_degrades_to_memory() {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store = PreferenceStore::new(Arc::new(FailingStore), clock);

        assert_eq!(store.load().await, 0);

        let id = PinId::from("p");
        store.mark_bad(&id).await;
        // Write failed but the in-memory state still applies
        assert!(store.is_muted(&id));

        store.clear_all().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_removes_persisted_state() {
        let (store, _, kv) = setup();
        store.mark_good(&PinId::from("a")).await;
        assert!(kv.get(PREFERENCES_KEY).await.unwrap().is_some());

        store.clear_all().await;
        assert!(store.is_empty());
        assert!(kv.get(PREFERENCES_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custom_cooldown_and_snapshot() {
        let (store, clock, _) = setup();
        let store = store.with_cooldown(Duration::from_secs(60));
        assert_eq!(store.cooldown(), Duration::from_secs(60));

        store.mark_good(&PinId::from("b")).await;
        store.mark_good(&PinId::from("a")).await;

        clock.advance(Duration::from_secs(60));
        assert!(store.should_notify(&PinId::from("a")));

        let ids: Vec<String> = store
            .snapshot()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
