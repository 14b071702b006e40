//! Per-room ordering of persist + broadcast.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per room. Holding the guard while persisting and
/// broadcasting keeps every peer's view of a room in server order.
///
/// A room's mutex only lives while someone holds or waits for it.
#[derive(Debug, Default)]
pub struct RoomSequencer {
    rooms: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive turn for one room. Dropping it releases the room.
#[derive(Debug)]
pub struct RoomGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    room_id: String,
    rooms: &'a DashMap<String, Arc<Mutex<()>>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody is waiting.
        self.rooms
            .remove_if(&self.room_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl RoomSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, room_id: &str) -> RoomGuard<'_> {
        // Clone out of the map so no shard lock is held across the await.
        let mutex = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RoomGuard {
            guard: Some(mutex.lock_owned().await),
            room_id: room_id.to_string(),
            rooms: &self.rooms,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
