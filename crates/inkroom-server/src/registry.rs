//! Connection registry: who is connected and which rooms they joined.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Server-assigned connection id.
pub type ConnId = Uuid;

#[derive(Debug)]
struct Connection {
    user_id: String,
    rooms: Vec<String>,
    tx: mpsc::Sender<String>,
}

/// In-memory membership map. Nothing here is persisted.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and the channel its outbound frames go to.
    pub fn register(&self, user_id: impl Into<String>, tx: mpsc::Sender<String>) -> ConnId {
        let conn_id = Uuid::new_v4();
        self.connections.insert(
            conn_id,
            Connection {
                user_id: user_id.into(),
                rooms: Vec::new(),
                tx,
            },
        );
        conn_id
    }

    pub fn unregister(&self, conn_id: ConnId) {
        self.connections.remove(&conn_id);
    }

    /// Add `room_id` to the connection's rooms. Returns false for an unknown
    /// connection.
    pub fn join(&self, conn_id: ConnId, room_id: &str) -> bool {
        let Some(mut conn) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        if !conn.rooms.iter().any(|r| r == room_id) {
            conn.rooms.push(room_id.to_string());
        }
        true
    }

    pub fn leave(&self, conn_id: ConnId, room_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(&conn_id) {
            conn.rooms.retain(|r| r != room_id);
        }
    }

    pub fn is_member(&self, conn_id: ConnId, room_id: &str) -> bool {
        self.connections
            .get(&conn_id)
            .is_some_and(|c| c.rooms.iter().any(|r| r == room_id))
    }

    pub fn user_id(&self, conn_id: ConnId) -> Option<String> {
        self.connections.get(&conn_id).map(|c| c.user_id.clone())
    }

    pub fn rooms(&self, conn_id: ConnId) -> Vec<String> {
        self.connections
            .get(&conn_id)
            .map(|c| c.rooms.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue `text` for every member of `room_id` except `except`.
    ///
    /// Delivery is at-most-once: a peer whose queue is full or closed misses
    /// the frame. Returns how many peers it was queued for.
    pub fn broadcast(&self, room_id: &str, except: ConnId, text: &str) -> usize {
        let mut delivered = 0;
        for entry in self.connections.iter() {
            if *entry.key() == except || !entry.rooms.iter().any(|r| r == room_id) {
                continue;
            }
            match entry.tx.try_send(text.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn_id = %entry.key(), room_id, "outbound queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(conn_id = %entry.key(), room_id, "peer gone, dropping frame");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(registry: &ConnectionRegistry, user: &str) -> (ConnId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(user, tx), rx)
    }

    #[test]
    fn test_join_and_leave() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&registry, "alice");
        assert!(registry.join(a, "r1"));
        assert!(registry.join(a, "r2"));
        assert!(registry.join(a, "r1"));
        assert_eq!(registry.rooms(a), vec!["r1".to_string(), "r2".to_string()]);

        registry.leave(a, "r1");
        assert!(!registry.is_member(a, "r1"));
        assert!(registry.is_member(a, "r2"));
        assert_eq!(registry.user_id(a).as_deref(), Some("alice"));
    }

    #[test]
    fn test_join_unknown_connection() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.join(Uuid::new_v4(), "r1"));
    }

    #[test]
    fn test_broadcast_skips_sender_and_other_rooms() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = connect(&registry, "alice");
        let (b, mut rx_b) = connect(&registry, "bob");
        let (c, mut rx_c) = connect(&registry, "carol");
        registry.join(a, "r1");
        registry.join(b, "r1");
        registry.join(c, "r2");

        assert_eq!(registry.broadcast("r1", a, "hello"), 1);
        assert_eq!(rx_b.try_recv().ok().as_deref(), Some("hello"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_to_full_queue_is_dropped() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = connect(&registry, "alice");
        let (tx, mut rx_b) = mpsc::channel(1);
        let b = registry.register("bob", tx);
        registry.join(a, "r1");
        registry.join(b, "r1");

        assert_eq!(registry.broadcast("r1", a, "one"), 1);
        assert_eq!(registry.broadcast("r1", a, "two"), 0);
        assert_eq!(rx_b.try_recv().ok().as_deref(), Some("one"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_unregister_removes_membership() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&registry, "alice");
        registry.join(a, "r1");
        registry.unregister(a);
        assert!(registry.is_empty());
        assert!(!registry.is_member(a, "r1"));
    }
}
