use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Guess, Player, PresenceEntry, Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SessionPhase {
    #[default]
    NoRoom,  // No session wired
    Joining, // create/join in flight
    Active,  // Accepting guesses
    Complete, // Solved, board stays live but no more guesses
}

/// Local view of one participant's room session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub room: Option<Room>,
    pub players: Vec<PresenceEntry>,
    pub guesses: Vec<Guess>,
    pub current_player: Option<Player>,
    pub is_complete: bool,
    pub is_loading: bool,
}

impl SessionState {
    pub fn room_id(&self) -> Option<crate::RoomId> {
        self.room.as_ref().map(|room| room.id)
    }

    /// True when the state carries nothing from a previous session.
    pub fn is_empty(&self) -> bool {
        self.phase == SessionPhase::NoRoom
            && self.room.is_none()
            && self.players.is_empty()
            && self.guesses.is_empty()
            && self.current_player.is_none()
            && !self.is_complete
            && !self.is_loading
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum CloseReason {
    /// Nobody guessed for the configured idle duration.
    Inactivity,
    /// The last active player left or dropped out.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SessionNotice {
    RoomClosed { room_code: String, reason: CloseReason },
    RoomSolved { room_code: String, word: String, solved_by: String },
}

/// Public read model for the room lookup endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSummary {
    pub code: String,
    pub word_date: String,
    pub is_active: bool,
    pub max_players: i32,
    pub active_players: u32,
    pub guess_count: u32,
    pub is_complete: bool,
}
