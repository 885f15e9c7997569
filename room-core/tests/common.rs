#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use room_core::{
    Collaborators, PresenceHub, RoomEvent, RoomFeed, RoomPolicy, RoomSessionController, RoomStore,
    Similarity, SimilarityGateway, WordOfDay, generate_room_code, normalize_word,
};
use room_types::{
    CloseReason, Guess, NewGuess, NewPlayer, NewRoom, ParticipantId, Player, PlayerId, Room,
    RoomError, RoomId, SessionNotice, SessionState,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, watch};
use uuid::Uuid;

pub const TEST_DATE: &str = "2025-05-25";
pub const TEST_WORD: &str = "שלום";

#[derive(Default)]
struct StoreData {
    rooms: Vec<Room>,
    players: Vec<Player>,
    guesses: Vec<Guess>,
}

/// In-memory Room Store with the same guarantees the database one gives.
#[derive(Default)]
pub struct MemoryRoomStore {
    data: Mutex<StoreData>,
    feed: RoomFeed,
    close_gate: Mutex<Option<Arc<Notify>>>,
    close_calls: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guess_count(&self) -> usize {
        self.data.lock().unwrap().guesses.len()
    }

    pub fn room_count(&self) -> usize {
        self.data.lock().unwrap().rooms.len()
    }

    pub fn feed(&self) -> &RoomFeed {
        &self.feed
    }

    pub fn room(&self, room_id: RoomId) -> Option<Room> {
        self.data
            .lock()
            .unwrap()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
    }

    pub fn players_of(&self, room_id: RoomId) -> Vec<Player> {
        self.data
            .lock()
            .unwrap()
            .players
            .iter()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn backdate_players(&self, room_id: RoomId, by: Duration) {
        let mut data = self.data.lock().unwrap();
        for player in data.players.iter_mut().filter(|p| p.room_id == room_id) {
            let joined = chrono::Utc::now() - chrono::Duration::from_std(by).unwrap();
            player.joined_at = joined.to_rfc3339();
        }
    }

    /// Hold every `close_room` call until the returned notify fires.
    pub fn hold_closes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.close_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Flip the room inactive behind every session's back, with no event.
    pub fn deactivate_quietly(&self, room_id: RoomId) {
        let mut data = self.data.lock().unwrap();
        if let Some(room) = data.rooms.iter_mut().find(|r| r.id == room_id) {
            room.is_active = false;
        }
    }

    fn check_writable(&self) -> Result<(), RoomError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RoomError::store("write failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn generate_unique_code(&self) -> Result<String, RoomError> {
        let data = self.data.lock().unwrap();
        loop {
            let code = generate_room_code();
            if !data.rooms.iter().any(|r| r.code == code) {
                return Ok(code);
            }
        }
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<Room, RoomError> {
        self.check_writable()?;
        let room = Room {
            id: Uuid::new_v4(),
            code: new_room.code,
            word_date: new_room.word_date,
            creator: new_room.creator,
            created_at: chrono::Utc::now().to_rfc3339(),
            is_active: true,
            max_players: new_room.max_players,
        };
        self.data.lock().unwrap().rooms.push(room.clone());
        Ok(room)
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>, RoomError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .rooms
            .iter()
            .find(|r| r.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_room(&self, room_id: RoomId) -> Result<Option<Room>, RoomError> {
        Ok(self.room(room_id))
    }

    async fn close_room(&self, room_id: RoomId, reason: CloseReason) -> Result<(), RoomError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.close_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_writable()?;
        {
            let mut data = self.data.lock().unwrap();
            if let Some(room) = data.rooms.iter_mut().find(|r| r.id == room_id) {
                room.is_active = false;
            }
        }
        self.feed.close(room_id, reason);
        Ok(())
    }

    async fn active_rooms(&self) -> Result<Vec<Room>, RoomError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .rooms
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_player(&self, new_player: NewPlayer) -> Result<Player, RoomError> {
        self.check_writable()?;
        let mut data = self.data.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        if let Some(existing) = data
            .players
            .iter_mut()
            .find(|p| p.room_id == new_player.room_id && p.participant == new_player.participant)
        {
            existing.nickname = new_player.nickname;
            existing.is_active = true;
            existing.joined_at = now;
            return Ok(existing.clone());
        }

        let player = Player {
            id: Uuid::new_v4(),
            room_id: new_player.room_id,
            participant: new_player.participant,
            nickname: new_player.nickname,
            joined_at: now,
            is_active: true,
        };
        data.players.push(player.clone());
        Ok(player)
    }

    async fn set_player_active(
        &self,
        player_id: PlayerId,
        is_active: bool,
    ) -> Result<(), RoomError> {
        self.check_writable()?;
        let mut data = self.data.lock().unwrap();
        if let Some(player) = data.players.iter_mut().find(|p| p.id == player_id) {
            player.is_active = is_active;
        }
        Ok(())
    }

    async fn list_players(&self, room_id: RoomId) -> Result<Vec<Player>, RoomError> {
        Ok(self.players_of(room_id))
    }

    async fn insert_guess(&self, new_guess: NewGuess) -> Result<Guess, RoomError> {
        self.check_writable()?;
        let guess = {
            let mut data = self.data.lock().unwrap();
            let room = data
                .rooms
                .iter()
                .find(|r| r.id == new_guess.room_id)
                .ok_or(RoomError::RoomClosed)?;
            if !room.is_active {
                return Err(RoomError::RoomClosed);
            }

            let in_room: Vec<&Guess> = data
                .guesses
                .iter()
                .filter(|g| g.room_id == new_guess.room_id)
                .collect();
            if in_room.iter().any(|g| g.is_correct) {
                return Err(RoomError::RoomComplete);
            }
            if let Some(existing) = in_room
                .iter()
                .find(|g| g.normalized_word == new_guess.normalized_word)
            {
                return Err(RoomError::DuplicateGuess {
                    word: existing.word.clone(),
                    guessed_by: existing.player_nickname.clone(),
                });
            }
            let sequence = in_room.iter().map(|g| g.sequence).max().unwrap_or(0) + 1;

            let guess = Guess {
                id: Uuid::new_v4(),
                room_id: new_guess.room_id,
                player_id: new_guess.player_id,
                player_nickname: new_guess.player_nickname,
                word: new_guess.word,
                normalized_word: new_guess.normalized_word,
                similarity: new_guess.similarity,
                rank: new_guess.rank,
                is_correct: new_guess.is_correct,
                sequence,
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            data.guesses.push(guess.clone());
            guess
        };
        self.feed.publish_guess(guess.clone());
        Ok(guess)
    }

    async fn list_guesses(&self, room_id: RoomId) -> Result<Vec<Guess>, RoomError> {
        let mut guesses: Vec<Guess> = self
            .data
            .lock()
            .unwrap()
            .guesses
            .iter()
            .filter(|g| g.room_id == room_id)
            .cloned()
            .collect();
        guesses.sort_by_key(|g| g.sequence);
        Ok(guesses)
    }

    fn subscribe_room(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent> {
        self.feed.subscribe(room_id)
    }
}

/// Similarity service double: fixed scores, an out-of-vocabulary list, a
/// call log, and an optional gate that holds every call until released.
#[derive(Default)]
pub struct ScriptedGateway {
    scores: Mutex<HashMap<String, f64>>,
    unknown: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, word: &str, score: f64) {
        self.scores
            .lock()
            .unwrap()
            .insert(normalize_word(word), score);
    }

    pub fn unknown_word(&self, word: &str) {
        self.unknown.lock().unwrap().insert(normalize_word(word));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Hold every call until the returned notify fires.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SimilarityGateway for ScriptedGateway {
    async fn similarity(&self, target: &str, candidate: &str) -> Result<Similarity, RoomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let candidate = normalize_word(candidate);
        if self.unknown.lock().unwrap().contains(&candidate) {
            return Err(RoomError::OutOfVocabulary { word: candidate });
        }
        if candidate == normalize_word(target) {
            return Ok(Similarity {
                score: 1.0,
                rank: Some(1000),
            });
        }
        let score = self
            .scores
            .lock()
            .unwrap()
            .get(&candidate)
            .copied()
            .unwrap_or(0.1);
        Ok(Similarity { score, rank: None })
    }
}

#[derive(Default)]
pub struct StaticWords {
    words: Mutex<HashMap<NaiveDate, String>>,
}

impl StaticWords {
    pub fn with(date: &str, word: &str) -> Self {
        let words = Self::default();
        words.set(date, word);
        words
    }

    pub fn set(&self, date: &str, word: &str) {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        self.words.lock().unwrap().insert(date, word.to_string());
    }
}

#[async_trait]
impl WordOfDay for StaticWords {
    async fn word_for_date(&self, date: NaiveDate) -> Result<Option<String>, RoomError> {
        Ok(self.words.lock().unwrap().get(&date).cloned())
    }
}

/// Shared collaborators for several participants in one test.
pub struct TestRig {
    pub store: Arc<MemoryRoomStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub words: Arc<StaticWords>,
    pub presence: PresenceHub,
    pub policy: RoomPolicy,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_policy(RoomPolicy::default())
    }

    pub fn with_policy(policy: RoomPolicy) -> Self {
        Self {
            store: Arc::new(MemoryRoomStore::new()),
            gateway: Arc::new(ScriptedGateway::new()),
            words: Arc::new(StaticWords::with(TEST_DATE, TEST_WORD)),
            presence: PresenceHub::new(),
            policy,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.store.clone(),
            self.gateway.clone(),
            self.words.clone(),
            Arc::new(self.presence.clone()),
        )
    }

    pub fn participant(&self, guest_id: &str) -> RoomSessionController {
        RoomSessionController::new(
            ParticipantId::Guest(guest_id.to_string()),
            self.collaborators(),
            self.policy.clone(),
        )
    }
}

/// Wait until the published session state satisfies `predicate`.
pub async fn wait_for_state(
    controller: &RoomSessionController,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx: watch::Receiver<SessionState> = controller.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session state channel closed");
    state.clone()
}

pub async fn next_notice(rx: &mut broadcast::Receiver<SessionNotice>) -> SessionNotice {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for notice")
        .expect("notice channel closed")
}
