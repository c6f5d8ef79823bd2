//! Conversation sessions and their persistence.
//!
//! Sessions are JSON objects keyed by `id`; every other field (title, messages, timestamps,
//! provider/model choice, anything the caller adds) is kept as-is and in order.
//! [`SessionStore`] keeps the whole collection in one durable slot and never lets a storage
//! failure reach the caller: failures are logged and turned into a fallback value.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::message::Message;
use crate::storage::{SlotStorage, StorageError};

/// Storage key of the persisted session collection.
pub const SESSIONS_KEY: &str = "bubblechat-sessions";

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// A session: id plus arbitrary additional fields. `fields` never holds an `id` key, so a
/// serialized session has exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Session {
    /// New empty conversation with a generated id and creation timestamps.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.into()));
        fields.insert("messages".to_string(), Value::Array(Vec::new()));
        fields.insert("createdAt".to_string(), Value::String(now.clone()));
        fields.insert("updatedAt".to_string(), Value::String(now));
        Self {
            id: format!("sess-{}", uuid::Uuid::new_v4()),
            fields,
        }
    }

    pub fn with_id(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Set one field. `id` is rejected; the session keeps its identity.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key.into(), value.into());
        self
    }

    fn set_field(&mut self, key: String, value: Value) {
        if key == "id" {
            log::warn!("session {}: ignoring attempt to set id through fields", self.id);
            return;
        }
        self.fields.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields other than `id`, in stored order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(|v| v.as_str())
    }

    pub fn provider(&self) -> Option<&str> {
        self.fields.get("provider").and_then(|v| v.as_str())
    }

    pub fn model(&self) -> Option<&str> {
        self.fields.get("model").and_then(|v| v.as_str())
    }

    /// Message history. Entries that are not valid messages are skipped.
    pub fn messages(&self) -> Vec<Message> {
        let Some(Value::Array(items)) = self.fields.get("messages") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|v| match serde_json::from_value::<Message>(v.clone()) {
                Ok(m) => Some(m),
                Err(e) => {
                    log::debug!("session {}: skipping invalid message: {}", self.id, e);
                    None
                }
            })
            .collect()
    }

    /// Updates for [`SessionStore::update_session`] that append `new` to the stored messages
    /// and bump `updatedAt`. Existing raw entries are kept untouched.
    pub fn append_messages_update(&self, new: &[Message]) -> Map<String, Value> {
        let mut items = match self.fields.get("messages") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.extend(
            new.iter()
                .map(|m| json!({"content": m.content, "sender": m.sender.role()})),
        );
        let mut updates = Map::new();
        updates.insert("messages".to_string(), Value::Array(items));
        updates.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        updates
    }

    /// Shallow merge: keys in `updates` overwrite, everything else stays. `id` is not updatable.
    pub fn merged(&self, updates: &Map<String, Value>) -> Session {
        let mut out = self.clone();
        for (k, v) in updates {
            out.set_field(k.clone(), v.clone());
        }
        out
    }
}

/// What [`SessionStore::load`] found in the slot.
#[derive(Debug)]
pub enum LoadOutcome {
    Stored(Vec<Session>),
    /// Slot never written.
    Absent,
    /// Slot could not be read or decoded; treated as empty.
    Unreadable(StorageError),
}

impl LoadOutcome {
    pub fn into_sessions(self) -> Vec<Session> {
        match self {
            LoadOutcome::Stored(s) => s,
            LoadOutcome::Absent | LoadOutcome::Unreadable(_) => Vec::new(),
        }
    }
}

/// Result of [`SessionStore::save_sessions`]. A failed save leaves the caller's memory as is.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved,
    Failed(StorageError),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// Session persistence over one durable slot. Holds no cache: callers pass their current
/// collection on every call and keep the returned one.
pub struct SessionStore<S: SlotStorage> {
    storage: S,
}

impl<S: SlotStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the slot and report what was there.
    pub fn load(&self) -> LoadOutcome {
        let raw = match self.storage.read(SESSIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadOutcome::Absent,
            Err(e) => {
                log::error!("error loading sessions: {}", e);
                return LoadOutcome::Unreadable(e);
            }
        };
        match serde_json::from_str::<Vec<Session>>(&raw) {
            Ok(sessions) => LoadOutcome::Stored(sessions),
            Err(e) => {
                log::error!("error loading sessions: {}", e);
                LoadOutcome::Unreadable(StorageError::Decode(e))
            }
        }
    }

    /// Stored sessions; empty when the slot is absent or unreadable.
    pub fn load_sessions(&self) -> Vec<Session> {
        self.load().into_sessions()
    }

    /// Overwrite the slot with `sessions`.
    pub fn save_sessions(&self, sessions: &[Session]) -> SaveOutcome {
        let result = serde_json::to_string(sessions)
            .map_err(StorageError::Encode)
            .and_then(|blob| self.storage.write(SESSIONS_KEY, &blob));
        match result {
            Ok(()) => SaveOutcome::Saved,
            Err(e) => {
                log::error!("error saving sessions: {}", e);
                SaveOutcome::Failed(e)
            }
        }
    }

    /// Merge `updates` into the first session with `session_id` and persist.
    /// `None` when no session matches (nothing written) or when persisting failed.
    pub fn update_session(
        &self,
        sessions: &[Session],
        session_id: &str,
        updates: &Map<String, Value>,
    ) -> Option<Vec<Session>> {
        let idx = sessions.iter().position(|s| s.id == session_id)?;
        let mut updated = sessions.to_vec();
        updated[idx] = sessions[idx].merged(updates);
        match self.save_sessions(&updated) {
            SaveOutcome::Saved => Some(updated),
            SaveOutcome::Failed(_) => {
                log::warn!("update of session {} not applied", session_id);
                None
            }
        }
    }

    /// Drop every session with `session_id` and persist. When persisting fails, the input
    /// collection is returned unchanged.
    pub fn delete_session(&self, sessions: &[Session], session_id: &str) -> Vec<Session> {
        let remaining: Vec<Session> = sessions
            .iter()
            .filter(|s| s.id != session_id)
            .cloned()
            .collect();
        match self.save_sessions(&remaining) {
            SaveOutcome::Saved => remaining,
            SaveOutcome::Failed(_) => {
                log::warn!("delete of session {} not applied", session_id);
                sessions.to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySlotStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory slots whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemorySlotStorage,
        fail_writes: AtomicBool,
    }

    impl SlotStorage for FlakyStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.write(key, value)
        }
    }

    fn sample() -> Vec<Session> {
        vec![
            Session::with_id("a")
                .with_field("title", "First")
                .with_field("model", "deepseek-chat"),
            Session::with_id("b")
                .with_field("title", "Second")
                .with_field("messages", json!([{"content": "hi", "sender": "user"}])),
        ]
    }

    fn raw_slot<S: SlotStorage>(store: &SessionStore<S>) -> Option<String> {
        store.storage().read(SESSIONS_KEY).unwrap()
    }

    fn updates(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn load_absent_slot_is_empty() {
        let store = SessionStore::new(MemorySlotStorage::new());
        assert!(matches!(store.load(), LoadOutcome::Absent));
        assert!(store.load_sessions().is_empty());
    }

    #[test]
    fn load_corrupt_slot_is_empty() {
        let store = SessionStore::new(MemorySlotStorage::new());
        for raw in ["{not json", "null", "{\"id\":\"a\"}", "[{\"title\":\"no id\"}]"] {
            store.storage().write(SESSIONS_KEY, raw).unwrap();
            assert!(matches!(store.load(), LoadOutcome::Unreadable(_)), "{}", raw);
            assert!(store.load_sessions().is_empty());
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = sample();
        assert!(store.save_sessions(&sessions).is_saved());
        assert_eq!(store.load_sessions(), sessions);
    }

    #[test]
    fn unknown_fields_keep_their_order() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let raw = r#"[{"id":"a","zeta":1,"alpha":{"nested":true},"title":"t"}]"#;
        store.storage().write(SESSIONS_KEY, raw).unwrap();
        let sessions = store.load_sessions();
        store.save_sessions(&sessions);
        assert_eq!(raw_slot(&store).as_deref(), Some(raw));
    }

    #[test]
    fn update_unknown_id_writes_nothing() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = sample();
        store.save_sessions(&sessions);
        let before = raw_slot(&store);
        assert!(store
            .update_session(&sessions, "missing", &updates(json!({"title": "X"})))
            .is_none());
        assert_eq!(raw_slot(&store), before);
    }

    #[test]
    fn update_merges_and_persists() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = sample();
        let updated = store
            .update_session(&sessions, "b", &updates(json!({"title": "X"})))
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0], sessions[0]);
        assert_eq!(updated[1].title(), Some("X"));
        assert_eq!(updated[1].get("messages"), sessions[1].get("messages"));
        assert_eq!(updated[1].fields().len(), sessions[1].fields().len());
        assert_eq!(store.load_sessions(), updated);
    }

    #[test]
    fn update_touches_first_match_only_and_keeps_id() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = vec![
            Session::with_id("dup").with_field("n", 1),
            Session::with_id("dup").with_field("n", 2),
        ];
        let updated = store
            .update_session(&sessions, "dup", &updates(json!({"n": 9, "id": "other"})))
            .unwrap();
        assert_eq!(updated[0].id, "dup");
        assert_eq!(updated[0].get("n"), Some(&json!(9)));
        assert_eq!(updated[1].get("n"), Some(&json!(2)));
    }

    #[test]
    fn id_in_fields_does_not_break_the_slot() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = vec![
            Session::with_id("a").with_field("title", "A"),
            Session::with_id("b").with_field("id", "c").with_field("title", "B"),
        ];
        assert_eq!(sessions[1].id, "b");
        assert!(sessions[1].get("id").is_none());
        assert!(store.save_sessions(&sessions).is_saved());
        assert!(matches!(store.load(), LoadOutcome::Stored(_)));
        assert_eq!(store.load_sessions(), sessions);
    }

    #[test]
    fn update_failure_returns_none_and_keeps_slot() {
        let store = SessionStore::new(FlakyStorage::default());
        let sessions = sample();
        store.save_sessions(&sessions);
        let before = raw_slot(&store);
        store.storage().fail_writes.store(true, Ordering::SeqCst);
        assert!(store
            .update_session(&sessions, "a", &updates(json!({"title": "X"})))
            .is_none());
        assert_eq!(raw_slot(&store), before);
    }

    #[test]
    fn delete_removes_and_persists() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = sample();
        let remaining = store.delete_session(&sessions, "a");
        assert_eq!(remaining.len(), sessions.len() - 1);
        assert!(remaining.iter().all(|s| s.id != "a"));
        assert_eq!(store.load_sessions(), remaining);
    }

    #[test]
    fn delete_unknown_id_keeps_collection() {
        let store = SessionStore::new(MemorySlotStorage::new());
        let sessions = sample();
        assert_eq!(store.delete_session(&sessions, "missing"), sessions);
    }

    #[test]
    fn delete_failure_returns_original() {
        let store = SessionStore::new(FlakyStorage::default());
        store.storage().fail_writes.store(true, Ordering::SeqCst);
        let sessions = sample();
        assert_eq!(store.delete_session(&sessions, "a"), sessions);
        assert!(raw_slot(&store).is_none());
    }

    #[test]
    fn save_failure_is_reported_not_raised() {
        let store = SessionStore::new(FlakyStorage::default());
        store.storage().fail_writes.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.save_sessions(&sample()),
            SaveOutcome::Failed(StorageError::Unavailable(_))
        ));
    }

    #[test]
    fn append_messages_update_extends_history() {
        let session = sample().remove(1);
        let update = session.append_messages_update(&[
            Message::user("how are you"),
            Message::assistant("fine"),
        ]);
        let merged = session.merged(&update);
        let msgs = merged.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0], Message::user("hi"));
        assert_eq!(msgs[2], Message::assistant("fine"));
        assert_eq!(
            update["messages"][1],
            json!({"content": "how are you", "sender": "user"})
        );
        assert!(merged.get("updatedAt").is_some());
    }

    #[test]
    fn new_session_has_generated_id_and_title() {
        let s = Session::new("New Chat");
        assert!(s.id.starts_with("sess-"));
        assert_eq!(s.title(), Some("New Chat"));
        assert!(s.messages().is_empty());
    }
}
