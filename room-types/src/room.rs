use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

pub type RoomId = Uuid;
pub type PlayerId = Uuid;
pub type GuessId = Uuid;

/// Who a participant is. A room creator and a player row carry exactly one
/// of these, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ParticipantId {
    User(Uuid),
    Guest(String),
}

impl ParticipantId {
    /// Stable key used for upsert conflict resolution in the store.
    pub fn key(&self) -> String {
        match self {
            ParticipantId::User(id) => format!("user:{}", id),
            ParticipantId::Guest(id) => format!("guest:{}", id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            ParticipantId::User(id) => Some(*id),
            ParticipantId::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            ParticipantId::User(_) => None,
            ParticipantId::Guest(id) => Some(id),
        }
    }

    /// Rebuilds an identity from the two mutually exclusive store columns.
    pub fn from_columns(user_id: Option<Uuid>, guest_id: Option<String>) -> Option<Self> {
        match (user_id, guest_id) {
            (Some(user_id), None) => Some(ParticipantId::User(user_id)),
            (None, Some(guest_id)) => Some(ParticipantId::Guest(guest_id)),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub word_date: String, // YYYY-MM-DD
    pub creator: ParticipantId,
    pub created_at: String, // ISO 8601 string
    pub is_active: bool,
    pub max_players: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub participant: ParticipantId,
    pub nickname: String,
    pub joined_at: String, // ISO 8601 string
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Guess {
    pub id: GuessId,
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub player_nickname: String,
    pub word: String,
    pub normalized_word: String,
    pub similarity: f64,
    pub rank: Option<i32>,
    pub is_correct: bool,
    pub sequence: i64,
    pub created_at: String, // ISO 8601 string
}

/// Ephemeral membership entry, valid only while the participant's
/// realtime connection is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PresenceEntry {
    pub participant: ParticipantId,
    pub nickname: String,
}

/// Values needed to insert a room; id, code and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: String,
    pub word_date: String,
    pub creator: ParticipantId,
    pub max_players: i32,
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub room_id: RoomId,
    pub participant: ParticipantId,
    pub nickname: String,
}

#[derive(Debug, Clone)]
pub struct NewGuess {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub player_nickname: String,
    pub word: String,
    pub normalized_word: String,
    pub similarity: f64,
    pub rank: Option<i32>,
    pub is_correct: bool,
}
