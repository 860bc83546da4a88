//! In-memory store of received messages

use serde::Serialize;

use crate::substrate::Mid;

/// A received message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    /// Unique within the inbox, never reused
    pub id: String,
    #[serde(rename = "sender_identifier")]
    pub sender: Mid,
    pub text: String,
    /// Unix ms at receipt
    pub received_at: u64,
}

/// Received messages in arrival order
#[derive(Debug, Default)]
pub struct Inbox {
    entries: Vec<InboxEntry>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a message and return its new id
    pub fn append(&mut self, sender: Mid, text: String) -> String {
        let id = self.fresh_id();
        self.entries.push(InboxEntry {
            id: id.clone(),
            sender,
            text,
            received_at: now_ms(),
        });
        id
    }

    /// Snapshot in arrival order
    pub fn list(&self) -> Vec<InboxEntry> {
        self.entries.clone()
    }

    /// Remove the entry with `id`. Returns whether one was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = random_id();
            if !self.entries.iter().any(|e| e.id == id) {
                return id;
            }
        }
    }
}

/// 128 random bits as hex
fn random_id() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn peer(byte: u8) -> Mid {
        Mid::new(vec![byte; 4])
    }

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut inbox = Inbox::new();
        for i in 0..20 {
            inbox.append(peer(i % 3), format!("msg {}", i));
        }

        let entries = inbox.list();
        assert_eq!(entries.len(), 20);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.text, format!("msg {}", i));
        }

        let ids: HashSet<_> = entries.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_duplicate_text_gets_distinct_entries() {
        let mut inbox = Inbox::new();
        let a = inbox.append(peer(1), "same".to_string());
        let b = inbox.append(peer(1), "same".to_string());
        assert_ne!(a, b);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn test_delete_once() {
        let mut inbox = Inbox::new();
        let id1 = inbox.append(peer(1), "one".to_string());
        let id2 = inbox.append(peer(2), "two".to_string());

        assert!(inbox.delete(&id1));
        assert_eq!(inbox.list().len(), 1);
        assert_eq!(inbox.list()[0].id, id2);

        assert!(!inbox.delete(&id1));
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_delete_unknown_id_leaves_inbox_unchanged() {
        let mut inbox = Inbox::new();
        inbox.append(peer(1), "one".to_string());
        assert!(!inbox.delete("nope"));
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let mut inbox = Inbox::new();
        inbox.append(peer(1), "one".to_string());
        let snapshot = inbox.list();
        inbox.append(peer(1), "two".to_string());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn test_entry_json_shape() {
        let mut inbox = Inbox::new();
        let id = inbox.append(Mid::new(b"abc".to_vec()), "Hello World".to_string());
        let json = serde_json::to_value(&inbox.list()[0]).unwrap();
        assert_eq!(json["id"], id);
        assert_eq!(json["sender_identifier"], "YWJj");
        assert_eq!(json["text"], "Hello World");
        assert!(json["received_at"].as_u64().unwrap() > 0);
    }
}
