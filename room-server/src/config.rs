use anyhow::{Context, Result};
use room_core::RoomPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://semantle_rooms.db?mode=rwc";
pub const DEFAULT_SIMILARITY_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub similarity_api_url: String,
    pub similarity_api_key: Option<String>,
    pub room_inactivity_minutes: u64,
    pub correct_similarity_threshold: f64,
    pub max_players_per_room: i32,
    pub nickname_max_length: usize,
    pub reconcile_interval_seconds: u64,
    pub presence_grace_seconds: u64,
    pub daily_words_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: text("HOST", "127.0.0.1"),
            port: parsed(&lookup, "PORT", 8080)?,
            database_url: text("DATABASE_URL", DEFAULT_DATABASE_URL),
            similarity_api_url: text("SIMILARITY_API_URL", DEFAULT_SIMILARITY_API_URL),
            similarity_api_key: lookup("SIMILARITY_API_KEY").filter(|key| !key.is_empty()),
            room_inactivity_minutes: parsed(&lookup, "ROOM_INACTIVITY_MINUTES", 25)?,
            correct_similarity_threshold: parsed(&lookup, "CORRECT_SIMILARITY_THRESHOLD", 0.999)?,
            max_players_per_room: parsed(&lookup, "MAX_PLAYERS_PER_ROOM", 10)?,
            nickname_max_length: parsed(&lookup, "NICKNAME_MAX_LENGTH", 20)?,
            reconcile_interval_seconds: parsed(&lookup, "RECONCILE_INTERVAL_SECONDS", 60)?,
            presence_grace_seconds: parsed(&lookup, "PRESENCE_GRACE_SECONDS", 30)?,
            daily_words_file: lookup("DAILY_WORDS_FILE").filter(|path| !path.is_empty()),
        })
    }

    pub fn policy(&self) -> RoomPolicy {
        RoomPolicy::new(
            Duration::from_secs(self.room_inactivity_minutes * 60),
            self.correct_similarity_threshold,
            self.max_players_per_room,
            self.nickname_max_length,
            self.presence_grace(),
        )
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds.max(1))
    }

    pub fn presence_grace(&self) -> Duration {
        Duration::from_secs(self.presence_grace_seconds)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
