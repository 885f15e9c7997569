use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Every failure a room session operation can report. The `Display` text is
/// what the participant sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum RoomError {
    #[error("Nickname is required")]
    EmptyNickname,
    #[error("Nickname must be at most {max} characters")]
    NicknameTooLong { max: usize },
    #[error("Room code is required")]
    EmptyRoomCode,
    #[error("Room code '{code}' is not valid")]
    InvalidRoomCode { code: String },
    #[error("'{word}' is not a valid guess: {reason}")]
    InvalidGuess { word: String, reason: String },
    #[error("'{date}' is not a valid date")]
    InvalidWordDate { date: String },

    #[error("Room not found")]
    RoomNotFound { code: String },
    #[error("No word is configured for {date}")]
    WordNotFound { date: String },

    #[error("'{word}' was already guessed by {guessed_by}")]
    DuplicateGuess { word: String, guessed_by: String },

    #[error("You are not in a room")]
    NoActiveRoom,
    #[error("The word has already been found in this room")]
    RoomComplete,
    #[error("Room is full ({max} players)")]
    RoomFull { max: i32 },
    #[error("Room is closed")]
    RoomClosed,

    #[error("'{word}' is not in the vocabulary")]
    OutOfVocabulary { word: String },
    #[error("Could not score the guess, please try again")]
    GatewayUnavailable { message: String },
    #[error("Could not reach the game server, please try again")]
    Store { message: String },
    #[error("Could not connect to the room, please try again")]
    Presence { message: String },

    #[error("Session is no longer active")]
    StaleSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DuplicateGuess,
    State,
    Collaborator,
    Stale,
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::EmptyNickname
            | RoomError::NicknameTooLong { .. }
            | RoomError::EmptyRoomCode
            | RoomError::InvalidRoomCode { .. }
            | RoomError::InvalidGuess { .. }
            | RoomError::InvalidWordDate { .. } => ErrorKind::Validation,
            RoomError::RoomNotFound { .. } | RoomError::WordNotFound { .. } => ErrorKind::NotFound,
            RoomError::DuplicateGuess { .. } => ErrorKind::DuplicateGuess,
            RoomError::NoActiveRoom
            | RoomError::RoomComplete
            | RoomError::RoomFull { .. }
            | RoomError::RoomClosed => ErrorKind::State,
            RoomError::OutOfVocabulary { .. }
            | RoomError::GatewayUnavailable { .. }
            | RoomError::Store { .. }
            | RoomError::Presence { .. } => ErrorKind::Collaborator,
            RoomError::StaleSession => ErrorKind::Stale,
        }
    }

    /// Stale results are dropped, never shown to the participant.
    pub fn is_silent(&self) -> bool {
        self.kind() == ErrorKind::Stale
    }

    pub fn store(message: impl Into<String>) -> Self {
        RoomError::Store {
            message: message.into(),
        }
    }
}
