use async_trait::async_trait;
use chrono::NaiveDate;
use room_types::{
    CloseReason, Guess, NewGuess, NewPlayer, NewRoom, Player, PlayerId, Room, RoomError, RoomId,
};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{PresenceChannel, RoomEvent, Similarity};

/// Durable record of rooms, players and guesses, plus a per-room feed of
/// guess inserts and closes.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// A fresh code no existing room uses.
    async fn generate_unique_code(&self) -> Result<String, RoomError>;

    async fn create_room(&self, new_room: NewRoom) -> Result<Room, RoomError>;

    /// Lookup by code; callers pass the normalized (uppercase) code.
    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>, RoomError>;

    async fn find_room(&self, room_id: RoomId) -> Result<Option<Room>, RoomError>;

    /// Marks the room inactive and sends `RoomEvent::Closed` to everyone
    /// subscribed to it.
    async fn close_room(&self, room_id: RoomId, reason: CloseReason) -> Result<(), RoomError>;

    async fn active_rooms(&self) -> Result<Vec<Room>, RoomError>;

    /// Insert or refresh the player keyed by (room, participant). A rejoin
    /// updates nickname and re-activates the existing row.
    async fn upsert_player(&self, new_player: NewPlayer) -> Result<Player, RoomError>;

    async fn set_player_active(&self, player_id: PlayerId, is_active: bool)
    -> Result<(), RoomError>;

    /// All players of a room, active or not, in join order.
    async fn list_players(&self, room_id: RoomId) -> Result<Vec<Player>, RoomError>;

    /// Assigns the next per-room sequence number. Fails with `RoomClosed`,
    /// `RoomComplete` or `DuplicateGuess` when the room cannot take the guess.
    async fn insert_guess(&self, new_guess: NewGuess) -> Result<Guess, RoomError>;

    /// Guesses of a room ordered by sequence number.
    async fn list_guesses(&self, room_id: RoomId) -> Result<Vec<Guess>, RoomError>;

    fn subscribe_room(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent>;
}

/// Scores a candidate word against the target word.
#[async_trait]
pub trait SimilarityGateway: Send + Sync {
    async fn similarity(&self, target: &str, candidate: &str) -> Result<Similarity, RoomError>;
}

#[async_trait]
pub trait WordOfDay: Send + Sync {
    async fn word_for_date(&self, date: NaiveDate) -> Result<Option<String>, RoomError>;
}

/// Everything a room session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RoomStore>,
    pub gateway: Arc<dyn SimilarityGateway>,
    pub words: Arc<dyn WordOfDay>,
    pub presence: Arc<dyn PresenceChannel>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn RoomStore>,
        gateway: Arc<dyn SimilarityGateway>,
        words: Arc<dyn WordOfDay>,
        presence: Arc<dyn PresenceChannel>,
    ) -> Self {
        Self {
            store,
            gateway,
            words,
            presence,
        }
    }
}
