use async_trait::async_trait;
use dashmap::DashMap;
use room_types::{PresenceEntry, RoomError, RoomId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Per-room broadcast group tracking who is connected right now.
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    /// Joins the room's group and announces `entry`. The returned
    /// subscription emits the full membership on every change.
    async fn subscribe(
        &self,
        room_id: RoomId,
        entry: PresenceEntry,
    ) -> Result<PresenceSubscription, RoomError>;

    /// Current membership of a room, empty if nobody is connected.
    async fn members(&self, room_id: RoomId) -> Result<Vec<PresenceEntry>, RoomError>;
}

/// Removes one tracked entry from its room group.
pub trait PresenceTracker: Send + Sync {
    fn untrack(&self);
}

/// A live membership in one room. Dropping it untracks the entry.
pub struct PresenceSubscription {
    room_id: RoomId,
    sync: watch::Receiver<Vec<PresenceEntry>>,
    tracker: Box<dyn PresenceTracker>,
}

impl PresenceSubscription {
    pub fn new(
        room_id: RoomId,
        sync: watch::Receiver<Vec<PresenceEntry>>,
        tracker: Box<dyn PresenceTracker>,
    ) -> Self {
        Self {
            room_id,
            sync,
            tracker,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Receiver of full-membership snapshots.
    pub fn sync(&self) -> watch::Receiver<Vec<PresenceEntry>> {
        self.sync.clone()
    }

    pub fn untrack(&self) {
        self.tracker.untrack();
    }
}

impl Drop for PresenceSubscription {
    fn drop(&mut self) {
        self.tracker.untrack();
    }
}

struct RoomPresence {
    entries: BTreeMap<u64, PresenceEntry>,
    sender: watch::Sender<Vec<PresenceEntry>>,
}

impl RoomPresence {
    fn new() -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            entries: BTreeMap::new(),
            sender,
        }
    }

    /// Membership in join order, one entry per participant.
    fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut members: Vec<PresenceEntry> = Vec::new();
        for entry in self.entries.values() {
            if !members.iter().any(|m| m.participant == entry.participant) {
                members.push(entry.clone());
            }
        }
        members
    }

    fn publish(&self) {
        self.sender.send_replace(self.snapshot());
    }
}

type RoomMap = DashMap<RoomId, RoomPresence>;

/// In-process presence for every participant connected to this server.
#[derive(Clone, Default)]
pub struct PresenceHub {
    rooms: Arc<RoomMap>,
    next_key: Arc<AtomicU64>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn track(
        &self,
        room_id: RoomId,
        entry: PresenceEntry,
    ) -> (u64, watch::Receiver<Vec<PresenceEntry>>) {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let mut room = self.rooms.entry(room_id).or_insert_with(RoomPresence::new);
        debug!("Tracking {} in room {}", entry.participant, room_id);
        room.entries.insert(key, entry);
        room.publish();
        (key, room.sender.subscribe())
    }
}

struct HubTracker {
    rooms: Arc<RoomMap>,
    room_id: RoomId,
    key: u64,
}

impl PresenceTracker for HubTracker {
    fn untrack(&self) {
        let now_empty = match self.rooms.get_mut(&self.room_id) {
            Some(mut room) => {
                if room.entries.remove(&self.key).is_some() {
                    debug!("Untracked presence key {} in room {}", self.key, self.room_id);
                    room.publish();
                }
                room.entries.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.rooms
                .remove_if(&self.room_id, |_, room| room.entries.is_empty());
        }
    }
}

#[async_trait]
impl PresenceChannel for PresenceHub {
    async fn subscribe(
        &self,
        room_id: RoomId,
        entry: PresenceEntry,
    ) -> Result<PresenceSubscription, RoomError> {
        let (key, sync) = self.track(room_id, entry);
        let tracker = HubTracker {
            rooms: self.rooms.clone(),
            room_id,
            key,
        };
        Ok(PresenceSubscription::new(room_id, sync, Box::new(tracker)))
    }

    async fn members(&self, room_id: RoomId) -> Result<Vec<PresenceEntry>, RoomError> {
        Ok(self
            .rooms
            .get(&room_id)
            .map(|room| room.snapshot())
            .unwrap_or_default())
    }
}
