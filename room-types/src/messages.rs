use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ParticipantId, SessionNotice, SessionState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    CreateRoom { nickname: String, word_date: Option<String> },
    JoinRoom { room_code: String, nickname: String },
    MakeGuess { word: String },
    LeaveRoom,
    ResetSession,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    Welcome { participant: ParticipantId },
    RoomCreated { room_code: String },
    RoomJoined { room_code: String },
    SessionUpdate { state: SessionState },
    Notice { notice: SessionNotice },
    LeftRoom,
    HeartbeatAck,
    Error { message: String },
}
