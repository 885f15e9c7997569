use dashmap::DashMap;
use room_types::{CloseReason, Guess, RoomId};
use tokio::sync::broadcast;
use tracing::debug;

const FEED_CAPACITY: usize = 256;

/// What a wired session hears about its room from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    GuessInserted(Guess),
    /// Terminal. The room's channel is gone once this is sent.
    Closed(CloseReason),
}

/// Per-room fan-out of store changes. Stores publish after a successful
/// commit; sessions subscribe when they wire a room.
#[derive(Default)]
pub struct RoomFeed {
    rooms: DashMap<RoomId, broadcast::Sender<RoomEvent>>,
}

impl RoomFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent> {
        // Rooms whose listeners all went away are dropped here; publishing
        // to them would reach nobody anyway.
        self.rooms.retain(|id, sender| *id == room_id || sender.receiver_count() > 0);
        self.rooms
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    pub fn publish_guess(&self, guess: Guess) {
        let room_id = guess.room_id;
        if let Some(sender) = self.rooms.get(&room_id) {
            if sender.send(RoomEvent::GuessInserted(guess)).is_err() {
                debug!("No subscribers for feed of room {}", room_id);
            }
        }
    }

    /// Tell every listener the room is closed and drop its channel.
    pub fn close(&self, room_id: RoomId, reason: CloseReason) {
        if let Some((_, sender)) = self.rooms.remove(&room_id) {
            let listeners = sender.send(RoomEvent::Closed(reason)).unwrap_or(0);
            debug!("Room {} closed, {} listener(s) told", room_id, listeners);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;
    use uuid::Uuid;

    fn guess_in(room_id: RoomId, sequence: i64) -> Guess {
        Guess {
            id: Uuid::new_v4(),
            room_id,
            player_id: Uuid::new_v4(),
            player_nickname: "A".to_string(),
            word: "בית".to_string(),
            normalized_word: "בית".to_string(),
            similarity: 0.3,
            rank: None,
            is_correct: false,
            sequence,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_only_that_room() {
        let feed = RoomFeed::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let mut rx_a = feed.subscribe(room_a);
        let mut rx_b = feed.subscribe(room_b);

        feed.publish_guess(guess_in(room_a, 1));

        match rx_a.recv().await.unwrap() {
            RoomEvent::GuessInserted(guess) => assert_eq!(guess.sequence, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_notifies_listeners_and_drops_channel() {
        let feed = RoomFeed::new();
        let room = Uuid::new_v4();
        let mut rx = feed.subscribe(room);
        let mut other = feed.subscribe(room);

        feed.close(room, CloseReason::Inactivity);
        assert_eq!(feed.room_count(), 0);

        assert_eq!(rx.recv().await.unwrap(), RoomEvent::Closed(CloseReason::Inactivity));
        assert_eq!(other.recv().await.unwrap(), RoomEvent::Closed(CloseReason::Inactivity));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_subscribe_sweeps_rooms_without_listeners() {
        let feed = RoomFeed::new();
        let abandoned = Uuid::new_v4();
        let live = Uuid::new_v4();
        drop(feed.subscribe(abandoned));
        let _rx = feed.subscribe(live);

        assert_eq!(feed.room_count(), 1);

        // Closing a room nobody subscribed to is a no-op.
        feed.close(Uuid::new_v4(), CloseReason::Abandoned);
        assert_eq!(feed.room_count(), 1);
    }
}
