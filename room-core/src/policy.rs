use std::time::Duration;

/// Tunable room rules. Values are policy choices, not protocol constants.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPolicy {
    pub inactivity_timeout: Duration, // 25 minutes idle closes the room
    pub correct_threshold: f64,       // similarity at or above counts as solved
    pub max_players: i32,
    pub nickname_max_len: usize,
    pub presence_grace: Duration, // absent from presence this long => reconciled inactive
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(25 * 60),
            correct_threshold: 0.999,
            max_players: 10,
            nickname_max_len: 20,
            presence_grace: Duration::from_secs(30),
        }
    }
}

impl RoomPolicy {
    pub fn new(
        inactivity_timeout: Duration,
        correct_threshold: f64,
        max_players: i32,
        nickname_max_len: usize,
        presence_grace: Duration,
    ) -> Self {
        Self {
            inactivity_timeout,
            correct_threshold,
            max_players,
            nickname_max_len,
            presence_grace,
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_max_players(mut self, max_players: i32) -> Self {
        self.max_players = max_players;
        self
    }
}
