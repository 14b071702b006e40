//! Inbound frame dispatch.
//!
//! [`handle_text`] is the whole protocol minus the socket: it updates
//! membership, persists mutations and queues broadcasts, then tells the
//! connection loop what to do with the sender.

use crate::AppState;
use crate::registry::ConnId;
use crate::store::StoreError;
use inkroom_core::{ClientMessage, ElementRecord, ServerMessage};
use tracing::{debug, info, warn};

/// What the connection loop should do after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Continue,
    Reply(ServerMessage),
    /// Send an `error` frame with this message, then close.
    Disconnect(String),
}

pub async fn handle_text(state: &AppState, conn_id: ConnId, user_id: &str, text: &str) -> Disposition {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) if is_join(text) => return Disposition::Disconnect(format!("malformed join_room: {e}")),
        Err(e) => {
            warn!(%conn_id, error = %e, "dropping malformed message");
            return Disposition::Continue;
        }
    };

    match message {
        ClientMessage::JoinRoom { room_id } => join(state, conn_id, user_id, room_id).await,
        ClientMessage::LeaveRoom { room_id } => {
            state.registry.leave(conn_id, &room_id);
            info!(%conn_id, room_id = %room_id, "left room");
            Disposition::Continue
        }
        mutation => {
            relay_mutation(state, conn_id, user_id, text, mutation).await;
            Disposition::Continue
        }
    }
}

fn is_join(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "join_room"))
        .unwrap_or(false)
}

async fn join(state: &AppState, conn_id: ConnId, user_id: &str, room_id: String) -> Disposition {
    if room_id.trim().is_empty() {
        return Disposition::Disconnect("join_room needs a room id".to_string());
    }

    // Joining under the room lock means every mutation either lands in the
    // snapshot or is broadcast to this connection after it.
    let _guard = state.sequencer.lock(&room_id).await;
    if !state.registry.join(conn_id, &room_id) {
        return Disposition::Disconnect("connection is not registered".to_string());
    }
    info!(%conn_id, user_id, room_id = %room_id, "joined room");

    match state.store.list_elements(&room_id, state.hydrate_limit).await {
        Ok(elements) => {
            debug!(%conn_id, room_id = %room_id, count = elements.len(), "hydrating");
            Disposition::Reply(ServerMessage::RoomSnapshot { room_id, elements })
        }
        Err(e) => {
            warn!(%conn_id, room_id = %room_id, error = %e, "failed to load room snapshot");
            Disposition::Continue
        }
    }
}

/// Persist a mutation, then forward the original text to the room's other
/// members. Nothing is broadcast unless the store accepted the write.
async fn relay_mutation(state: &AppState, conn_id: ConnId, user_id: &str, text: &str, message: ClientMessage) {
    let room_id = message.room_id().to_string();
    if !state.registry.is_member(conn_id, &room_id) {
        warn!(%conn_id, room_id = %room_id, "mutation for a room the connection has not joined");
        return;
    }

    let validated = match &message {
        ClientMessage::CreateElement { element_type, .. } if element_type.is_ephemeral() => {
            debug!(%conn_id, kind = %element_type, "ignoring ephemeral element");
            return;
        }
        ClientMessage::CreateElement { element_type, path, .. } => path.validate(*element_type),
        ClientMessage::UpdateElement { path, .. } => path.validate_shape(),
        _ => Ok(()),
    };
    if let Err(e) = validated {
        warn!(%conn_id, room_id = %room_id, error = %e, "dropping mutation with invalid geometry");
        return;
    }

    let _guard = state.sequencer.lock(&room_id).await;
    let (element_id, persisted) = match message {
        ClientMessage::CreateElement {
            id,
            room_id,
            element_type,
            path,
        } => {
            let record = ElementRecord {
                id: id.clone(),
                room_id,
                element_type,
                path,
                author_id: user_id.to_string(),
            };
            (id, state.store.create_element(&record).await)
        }
        ClientMessage::UpdateElement { id, path, .. } => {
            let result = state.store.update_element(&room_id, &id, &path).await;
            (id, result)
        }
        ClientMessage::DeleteElement { id, .. } => {
            let result = state.store.delete_element(&room_id, &id).await;
            (id, result)
        }
        ClientMessage::JoinRoom { .. } | ClientMessage::LeaveRoom { .. } => return,
    };

    match persisted {
        Ok(()) => {
            let delivered = state.registry.broadcast(&room_id, conn_id, text);
            debug!(%conn_id, room_id = %room_id, element_id = %element_id, delivered, "relayed mutation");
        }
        Err(StoreError::NotFound(_)) => {
            debug!(%conn_id, room_id = %room_id, element_id = %element_id, "mutation for unknown element ignored");
        }
        Err(e) => {
            warn!(%conn_id, room_id = %room_id, element_id = %element_id, error = %e, "persistence failed, not broadcasting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OpenSessions;
    use crate::store::{BoxFuture, DurableStore, MemoryStore};
    use inkroom_core::{ElementKind, WirePath};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct FailingStore;

    impl DurableStore for FailingStore {
        fn create_element<'a>(&'a self, _: &'a ElementRecord) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Database(sqlx::Error::PoolClosed)) })
        }

        fn update_element<'a>(
            &'a self,
            _: &'a str,
            _: &'a str,
            _: &'a WirePath,
        ) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Database(sqlx::Error::PoolClosed)) })
        }

        fn delete_element<'a>(&'a self, _: &'a str, _: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Database(sqlx::Error::PoolClosed)) })
        }

        fn list_elements<'a>(&'a self, _: &'a str, _: usize) -> BoxFuture<'a, Result<Vec<ElementRecord>, StoreError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn state_with(store: Arc<dyn DurableStore>) -> AppState {
        AppState::new(store, Arc::new(OpenSessions), 500)
    }

    fn connect(state: &AppState) -> (ConnId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        (state.registry.register("user", tx), rx)
    }

    async fn join(state: &AppState, conn: ConnId, room: &str) -> Disposition {
        let frame = json!({"type": "join_room", "roomId": room}).to_string();
        handle_text(state, conn, "user", &frame).await
    }

    fn create_frame(id: &str, room: &str, x: f64) -> String {
        json!({
            "type": "create_element",
            "id": id,
            "roomId": room,
            "elementType": "rectangle",
            "path": {"x": x, "y": x, "w": 50, "h": 50}
        })
        .to_string()
    }

    fn update_frame(id: &str, room: &str, x: f64) -> String {
        json!({
            "type": "update_element",
            "id": id,
            "roomId": room,
            "path": {"x": x, "y": x, "w": 50, "h": 50}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_create_is_persisted_and_forwarded_verbatim() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, mut rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;

        let frame = create_frame("e1", "r1", 10.0);
        assert_eq!(handle_text(&state, a, "alice", &frame).await, Disposition::Continue);

        assert_eq!(rx_b.try_recv().ok(), Some(frame));
        assert!(rx_a.try_recv().is_err());

        let stored = state.store.list_elements("r1", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].author_id, "alice");
        assert_eq!(stored[0].element_type, ElementKind::Rectangle);
        assert_eq!(stored[0].path, WirePath::rect(10.0, 10.0, 50.0, 50.0));
    }

    #[tokio::test]
    async fn test_join_replies_with_snapshot() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        join(&state, a, "r1").await;
        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;

        let (b, _rx_b) = connect(&state);
        match join(&state, b, "r1").await {
            Disposition::Reply(ServerMessage::RoomSnapshot { room_id, elements }) => {
                assert_eq!(room_id, "r1");
                assert_eq!(elements.len(), 1);
                assert_eq!(elements[0].id, "e1");
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hydrate_limit_caps_snapshot() {
        let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(OpenSessions), 2);
        let (a, _rx) = connect(&state);
        join(&state, a, "r1").await;
        for (i, id) in ["e1", "e2", "e3"].iter().enumerate() {
            handle_text(&state, a, "alice", &create_frame(id, "r1", i as f64 * 10.0)).await;
        }
        let Disposition::Reply(ServerMessage::RoomSnapshot { elements, .. }) = join(&state, a, "r1").await else {
            panic!("expected snapshot");
        };
        let ids: Vec<_> = elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e2"]);
    }

    #[tokio::test]
    async fn test_malformed_join_disconnects() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx) = connect(&state);
        assert!(matches!(join(&state, a, "").await, Disposition::Disconnect(_)));
        let missing = json!({"type": "join_room"}).to_string();
        assert!(matches!(
            handle_text(&state, a, "user", &missing).await,
            Disposition::Disconnect(_)
        ));
        assert!(state.registry.rooms(a).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_mutation_keeps_connection() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;

        assert_eq!(handle_text(&state, a, "alice", "{not json").await, Disposition::Continue);
        let bad_version = json!({
            "type": "create_element",
            "id": "e1",
            "roomId": "r1",
            "elementType": "rectangle",
            "path": {"v": 7, "x": 0, "y": 0, "w": 5, "h": 5}
        })
        .to_string();
        assert_eq!(handle_text(&state, a, "alice", &bad_version).await, Disposition::Continue);
        let no_points = json!({
            "type": "create_element",
            "id": "e2",
            "roomId": "r1",
            "elementType": "freehand",
            "path": {"x": 0, "y": 0}
        })
        .to_string();
        assert_eq!(handle_text(&state, a, "alice", &no_points).await, Disposition::Continue);

        assert!(rx_b.try_recv().is_err());
        assert!(state.store.list_elements("r1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_broadcast() {
        let state = state_with(Arc::new(FailingStore));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;

        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_target_is_noop() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;

        handle_text(&state, a, "alice", &update_frame("ghost", "r1", 1.0)).await;
        let delete = json!({"type": "delete_element", "id": "ghost", "roomId": "r1"}).to_string();
        handle_text(&state, a, "alice", &delete).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_member_mutation_dropped() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, b, "r1").await;

        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;
        assert!(rx_b.try_recv().is_err());
        assert!(state.store.list_elements("r1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ephemeral_kinds_are_not_relayed() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;

        let laser = json!({
            "type": "create_element",
            "id": "l1",
            "roomId": "r1",
            "elementType": "laser-stroke",
            "path": {"points": [[0, 0], [5, 5]]}
        })
        .to_string();
        handle_text(&state, a, "alice", &laser).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        let (c, _rx_c) = connect(&state);
        for conn in [a, b, c] {
            join(&state, conn, "r1").await;
        }

        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;
        handle_text(&state, a, "alice", &update_frame("e1", "r1", 20.0)).await;
        handle_text(&state, c, "carol", &update_frame("e1", "r1", 99.0)).await;

        let received: Vec<_> = std::iter::from_fn(|| rx_b.try_recv().ok()).collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[2], update_frame("e1", "r1", 99.0));

        let stored = state.store.list_elements("r1", 10).await.unwrap();
        assert_eq!((stored[0].path.x, stored[0].path.y), (99.0, 99.0));
    }

    #[tokio::test]
    async fn test_other_room_cannot_touch_element() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        let (c, _rx_c) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;
        join(&state, c, "r2").await;
        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;
        assert!(rx_b.try_recv().is_ok());

        handle_text(&state, c, "carol", &update_frame("e1", "r2", 666.0)).await;
        let delete = json!({"type": "delete_element", "id": "e1", "roomId": "r2"}).to_string();
        handle_text(&state, c, "carol", &delete).await;
        handle_text(&state, c, "carol", &create_frame("e1", "r2", 30.0)).await;

        let r1 = state.store.list_elements("r1", 10).await.unwrap();
        assert_eq!(r1.len(), 1);
        assert_eq!(r1[0].path.x, 10.0);
        assert_eq!(state.store.list_elements("r2", 10).await.unwrap().len(), 1);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_and_leave() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let (a, _rx_a) = connect(&state);
        let (b, mut rx_b) = connect(&state);
        join(&state, a, "r1").await;
        join(&state, b, "r1").await;
        handle_text(&state, a, "alice", &create_frame("e1", "r1", 10.0)).await;

        let delete = json!({"type": "delete_element", "id": "e1", "roomId": "r1"}).to_string();
        handle_text(&state, a, "alice", &delete).await;
        assert_eq!(std::iter::from_fn(|| rx_b.try_recv().ok()).count(), 2);
        assert!(state.store.list_elements("r1", 10).await.unwrap().is_empty());

        let leave = json!({"type": "leave_room", "roomId": "r1"}).to_string();
        handle_text(&state, b, "bob", &leave).await;
        handle_text(&state, a, "alice", &create_frame("e2", "r1", 10.0)).await;
        assert!(rx_b.try_recv().is_err());
    }
}
