//! Sync client: bridges the local element store and a collaboration room.
//!
//! Local mutation intents go out as wire messages; peer messages are applied
//! to the store with last-write-wins semantics.

use crate::canvas::{ElementStore, MutationIntent};
use crate::shapes::{Element, ElementId};
use crate::sync::{ClientMessage, ServerMessage, Transport, TransportEvent};

/// Connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Joined(String),
    Closed,
}

/// What a poll changed.
///
/// Peer and hydration events must be passed to
/// [`Interaction::apply_sync_events`](crate::interaction::Interaction::apply_sync_events),
/// otherwise a local undo can revert peer work or reach before the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Opened,
    Closed,
    /// A room snapshot was applied. Applying this event rebases history.
    Hydrated { room_id: String, count: usize },
    PeerCreated(ElementId),
    PeerUpdated(ElementId),
    PeerDeleted(ElementId),
    /// The server rejected the connection.
    Rejected(String),
}

type ElementCallback = Box<dyn FnMut(&Element)>;
type DeleteCallback = Box<dyn FnMut(&str)>;

/// Room-scoped sync over any [`Transport`].
pub struct SyncClient<T: Transport> {
    transport: T,
    state: ConnectionState,
    /// Room to join once the transport opens.
    pending_room: Option<String>,
    on_peer_create: Option<ElementCallback>,
    on_peer_update: Option<ElementCallback>,
    on_peer_delete: Option<DeleteCallback>,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Connecting,
            pending_room: None,
            on_peer_create: None,
            on_peer_update: None,
            on_peer_delete: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn room(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Joined(room) => Some(room),
            _ => None,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn on_peer_create(&mut self, f: impl FnMut(&Element) + 'static) {
        self.on_peer_create = Some(Box::new(f));
    }

    pub fn on_peer_update(&mut self, f: impl FnMut(&Element) + 'static) {
        self.on_peer_update = Some(Box::new(f));
    }

    pub fn on_peer_delete(&mut self, f: impl FnMut(&str) + 'static) {
        self.on_peer_delete = Some(Box::new(f));
    }

    fn send(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(text) => {
                if let Err(e) = self.transport.send(&text) {
                    log::warn!("dropping outgoing message: {}", e);
                }
            }
            Err(e) => log::error!("failed to encode message: {}", e),
        }
    }

    /// Join a room, leaving the current one. Deferred until the transport opens.
    pub fn join(&mut self, room_id: impl Into<String>) {
        let room_id = room_id.into();
        match self.state {
            ConnectionState::Connecting => self.pending_room = Some(room_id),
            ConnectionState::Closed => log::warn!("cannot join {}: connection closed", room_id),
            ConnectionState::Open | ConnectionState::Joined(_) => {
                self.leave();
                self.send(&ClientMessage::JoinRoom {
                    room_id: room_id.clone(),
                });
                self.state = ConnectionState::Joined(room_id);
            }
        }
    }

    pub fn leave(&mut self) {
        if let ConnectionState::Joined(room_id) = &self.state {
            let room_id = room_id.clone();
            self.send(&ClientMessage::LeaveRoom { room_id });
            self.state = ConnectionState::Open;
        }
    }

    /// Send intents to the joined room. Dropped when not joined.
    pub fn publish(&mut self, intents: &[MutationIntent]) {
        let Some(room_id) = self.room().map(str::to_string) else {
            if !intents.is_empty() {
                log::debug!("not joined, dropping {} intents", intents.len());
            }
            return;
        };
        for intent in intents {
            if let Some(msg) = ClientMessage::from_intent(&room_id, intent) {
                self.send(&msg);
            }
        }
    }

    pub fn close(&mut self) {
        self.transport.close();
        self.state = ConnectionState::Closed;
    }

    /// Drain transport events and apply peer messages to `store`.
    #[must_use = "pass the events to Interaction::apply_sync_events"]
    pub fn poll(&mut self, store: &mut ElementStore) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Opened => {
                    self.state = ConnectionState::Open;
                    events.push(SyncEvent::Opened);
                    if let Some(room) = self.pending_room.take() {
                        self.join(room);
                    }
                }
                TransportEvent::Closed => {
                    self.state = ConnectionState::Closed;
                    events.push(SyncEvent::Closed);
                }
                TransportEvent::Error(e) => log::warn!("transport error: {}", e),
                TransportEvent::Text(text) => {
                    if let Some(event) = self.apply_text(store, &text) {
                        events.push(event);
                    }
                }
            }
        }
        events
    }

    fn in_room(&self, room_id: &str) -> bool {
        self.room() == Some(room_id)
    }

    /// Apply one inbound frame. Malformed or foreign-room frames are dropped.
    pub fn apply_text(&mut self, store: &mut ElementStore, text: &str) -> Option<SyncEvent> {
        let msg = match ServerMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("dropping inbound message: {}", e);
                return None;
            }
        };

        match msg {
            ServerMessage::CreateElement {
                id,
                room_id,
                element_type,
                path,
            } => {
                if !self.in_room(&room_id) || element_type.is_ephemeral() {
                    return None;
                }
                let element = path
                    .into_element(id, element_type)
                    .map_err(|e| log::warn!("dropping peer create: {}", e))
                    .ok()?;
                if let Some(cb) = self.on_peer_create.as_mut() {
                    cb(&element);
                }
                let id = element.id.clone();
                store.put(element);
                Some(SyncEvent::PeerCreated(id))
            }
            ServerMessage::UpdateElement { id, room_id, path } => {
                if !self.in_room(&room_id) {
                    return None;
                }
                let kind = store.get(&id)?.kind();
                let element = path
                    .into_element(id, kind)
                    .map_err(|e| log::warn!("dropping peer update: {}", e))
                    .ok()?;
                if let Some(cb) = self.on_peer_update.as_mut() {
                    cb(&element);
                }
                let id = element.id.clone();
                store.put(element);
                Some(SyncEvent::PeerUpdated(id))
            }
            ServerMessage::DeleteElement { id, room_id } => {
                if !self.in_room(&room_id) {
                    return None;
                }
                store.remove_unchecked(&id)?;
                if let Some(cb) = self.on_peer_delete.as_mut() {
                    cb(&id);
                }
                Some(SyncEvent::PeerDeleted(id))
            }
            ServerMessage::RoomSnapshot { room_id, elements } => {
                if !self.in_room(&room_id) {
                    return None;
                }
                let mut count = 0;
                // Oldest first, so the most recent record for an id wins.
                for record in elements.into_iter().rev() {
                    match record.path.into_element(record.id, record.element_type) {
                        Ok(element) => {
                            store.put(element);
                            count += 1;
                        }
                        Err(e) => log::warn!("skipping snapshot record: {}", e),
                    }
                }
                log::info!("hydrated {} elements for room {}", count, room_id);
                Some(SyncEvent::Hydrated { room_id, count })
            }
            ServerMessage::Error { message } => {
                log::warn!("server rejected connection: {}", message);
                Some(SyncEvent::Rejected(message))
            }
        }
    }
}
