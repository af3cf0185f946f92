//! Ephemeral note-to-self store
//!
//! The ledger cannot carry local-only metadata, so the plugin keeps it in
//! a process-lifetime map keyed by transfer id: written once an outgoing
//! submission is confirmed, read back while reconciling events for the
//! same transfer. No eviction; entries live for the process lifetime and
//! are lost on restart.

use dashmap::DashMap;

use ledgerlink_types::TransferId;

/// Process-lifetime map from transfer id to local metadata.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: DashMap<TransferId, serde_json::Value>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            notes: DashMap::new(),
        }
    }

    /// Record the note for an outgoing transfer. Called only after the
    /// submission is confirmed, so a failed submission leaves no orphan.
    pub fn put(&self, id: TransferId, note: serde_json::Value) {
        self.notes.insert(id, note);
    }

    pub fn get(&self, id: &TransferId) -> Option<serde_json::Value> {
        self.notes.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_notes_by_id() {
        let store = NoteStore::new();
        let id = TransferId::new();
        assert_eq!(store.get(&id), None);

        store.put(id, serde_json::json!({"invoice": 42}));
        assert_eq!(store.get(&id), Some(serde_json::json!({"invoice": 42})));
        assert_eq!(store.get(&TransferId::new()), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rewrites_replace_the_slot_whole() {
        let store = NoteStore::new();
        let id = TransferId::new();
        store.put(id, serde_json::json!({"v": 1}));
        store.put(id, serde_json::json!({"v": 2}));
        assert_eq!(store.get(&id), Some(serde_json::json!({"v": 2})));
        assert_eq!(store.len(), 1);
    }
}
