use std::sync::{Arc, Weak};

use room_types::{
    CloseReason, Guess, NewGuess, NewPlayer, NewRoom, ParticipantId, Player, PresenceEntry, Room,
    RoomError, RoomId, SessionNotice, SessionPhase, SessionState,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    Collaborators, GuestIdentity, InactivityTimer, PresenceSubscription, RoomEvent, RoomPolicy,
    find_duplicate, format_word_date, is_correct_guess, parse_room_code, parse_word_date,
    validate_guess,
};

const NOTICE_CAPACITY: usize = 16;

/// Identifies one wired room session. Every asynchronous completion compares
/// its token against the live session before touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionToken {
    generation: u64,
    room_id: RoomId,
}

struct RoomChannel {
    presence: PresenceSubscription,
    listener: JoinHandle<()>,
}

impl Drop for RoomChannel {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

struct Session {
    generation: u64,
    state: SessionState,
    target_word: Option<String>,
    timer: InactivityTimer,
    channel: Option<RoomChannel>,
}

impl Session {
    fn token(&self) -> Option<SessionToken> {
        self.state.room_id().map(|room_id| SessionToken {
            generation: self.generation,
            room_id,
        })
    }

    fn is_current(&self, token: SessionToken) -> bool {
        self.generation == token.generation && self.state.room_id() == Some(token.room_id)
    }

    fn room_code(&self) -> String {
        self.state
            .room
            .as_ref()
            .map(|room| room.code.clone())
            .unwrap_or_default()
    }

    /// The one place session state is torn down. Timer and channel go first,
    /// then the whole state is replaced in a single assignment.
    fn reset(&mut self) {
        self.timer.cancel();
        self.channel = None;
        self.target_word = None;
        self.state = SessionState::default();
        self.generation += 1;
    }
}

struct Shared {
    participant: ParticipantId,
    collaborators: Collaborators,
    policy: RoomPolicy,
    session: Mutex<Session>,
    state_tx: watch::Sender<SessionState>,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl Shared {
    fn publish(&self, session: &Session) {
        self.state_tx.send_replace(session.state.clone());
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.notice_tx.send(notice);
    }

    fn arm_inactivity(self: &Arc<Self>, session: &mut Session, token: SessionToken) {
        let shared = Arc::downgrade(self);
        session.timer.arm(async move {
            if let Some(shared) = shared.upgrade() {
                shared.expire(token).await;
            }
        });
    }

    /// Holds the session lock across the store write so a rearm cannot
    /// slip in between the check and the close.
    async fn expire(&self, token: SessionToken) {
        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            debug!("Inactivity expiry for stale session of room {}", token.room_id);
            return;
        }

        info!(
            "Room {} idle for {:?}, closing",
            token.room_id, self.policy.inactivity_timeout
        );
        if let Err(e) = self
            .collaborators
            .store
            .close_room(token.room_id, CloseReason::Inactivity)
            .await
        {
            warn!("Failed to mark room {} inactive: {}", token.room_id, e);
        }

        let room_code = session.room_code();
        session.reset();
        self.publish(&session);
        drop(session);

        self.notify(SessionNotice::RoomClosed {
            room_code,
            reason: CloseReason::Inactivity,
        });
    }

    /// Tear down the session if it still belongs to `token`. Returns the
    /// code of the room that was dropped.
    async fn reset_if_current(&self, token: SessionToken) -> Option<String> {
        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            return None;
        }
        let room_code = session.room_code();
        session.reset();
        self.publish(&session);
        Some(room_code)
    }

    /// Someone else closed the room this session is wired to.
    async fn room_closed(&self, token: SessionToken, reason: CloseReason) {
        let Some(room_code) = self.reset_if_current(token).await else {
            debug!("Close of room {} reached a stale session", token.room_id);
            return;
        };
        info!("Room {} was closed ({:?}), session reset", room_code, reason);
        self.notify(SessionNotice::RoomClosed { room_code, reason });
    }

    /// Replace, never merge: presence sync always carries the full set.
    async fn apply_presence(&self, token: SessionToken, members: Vec<PresenceEntry>) -> bool {
        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            debug!("Discarding presence sync for stale room {}", token.room_id);
            return false;
        }
        session.state.players = members;
        self.publish(&session);
        true
    }

    /// Re-fetch the room's guesses and adopt the store's sequence order.
    async fn refresh_guesses(self: &Arc<Self>, token: SessionToken, activity: bool) -> bool {
        let guesses = match self.collaborators.store.list_guesses(token.room_id).await {
            Ok(guesses) => guesses,
            Err(e) => {
                warn!("Failed to refresh guesses for room {}: {}", token.room_id, e);
                return true;
            }
        };

        let mut session = self.session.lock().await;
        if !session.is_current(token) {
            debug!("Discarding guess refresh for stale room {}", token.room_id);
            return false;
        }
        self.apply_guesses(&mut session, token, guesses, activity);
        true
    }

    fn apply_guesses(
        self: &Arc<Self>,
        session: &mut Session,
        token: SessionToken,
        mut guesses: Vec<Guess>,
        activity: bool,
    ) {
        guesses.sort_by_key(|guess| guess.sequence);
        let solved = guesses.iter().find(|guess| guess.is_correct).cloned();
        session.state.guesses = guesses;

        let mut notice = None;
        if let Some(winning) = solved {
            if !session.state.is_complete {
                session.state.is_complete = true;
                session.state.phase = SessionPhase::Complete;
                let room_code = session.room_code();
                info!(
                    "Room {} solved by {} with '{}'",
                    room_code, winning.player_nickname, winning.word
                );
                notice = Some(SessionNotice::RoomSolved {
                    room_code,
                    word: winning.word,
                    solved_by: winning.player_nickname,
                });
            }
        }

        if activity {
            self.arm_inactivity(session, token);
        }
        self.publish(session);

        if let Some(notice) = notice {
            self.notify(notice);
        }
    }
}

/// Consumes presence syncs and room feed events for one wired room until
/// the session it belongs to is torn down or the room closes.
async fn run_room_listener(
    shared: Weak<Shared>,
    token: SessionToken,
    mut presence: watch::Receiver<Vec<PresenceEntry>>,
    mut feed: broadcast::Receiver<RoomEvent>,
) {
    let members = presence.borrow_and_update().clone();
    let Some(strong) = shared.upgrade() else {
        return;
    };
    if !strong.apply_presence(token, members).await
        || !strong.refresh_guesses(token, false).await
    {
        return;
    }
    drop(strong);

    loop {
        tokio::select! {
            changed = presence.changed() => {
                if changed.is_err() {
                    debug!("Presence channel for room {} closed", token.room_id);
                    break;
                }
                let members = presence.borrow_and_update().clone();
                let Some(strong) = shared.upgrade() else { break };
                if !strong.apply_presence(token, members).await {
                    break;
                }
            }
            received = feed.recv() => {
                match received {
                    Ok(RoomEvent::GuessInserted(guess)) if guess.room_id != token.room_id => {
                        continue;
                    }
                    Ok(RoomEvent::GuessInserted(_)) => {}
                    Ok(RoomEvent::Closed(reason)) => {
                        if let Some(strong) = shared.upgrade() {
                            strong.room_closed(token, reason).await;
                        }
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Feed for room {} lagged by {}", token.room_id, skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Feed for room {} closed", token.room_id);
                        break;
                    }
                }
                let Some(strong) = shared.upgrade() else { break };
                if !strong.refresh_guesses(token, true).await {
                    break;
                }
            }
        }
    }
}

/// Owns one participant's room session: create/join, guess, leave, and the
/// realtime wiring that keeps the local view in step with the store.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct RoomSessionController {
    shared: Arc<Shared>,
}

impl RoomSessionController {
    pub fn new(
        participant: ParticipantId,
        collaborators: Collaborators,
        policy: RoomPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let session = Session {
            generation: 0,
            state: SessionState::default(),
            target_word: None,
            timer: InactivityTimer::new(policy.inactivity_timeout),
            channel: None,
        };

        Self {
            shared: Arc::new(Shared {
                participant,
                collaborators,
                policy,
                session: Mutex::new(session),
                state_tx,
                notice_tx,
            }),
        }
    }

    pub fn for_guest(
        identity: &GuestIdentity,
        collaborators: Collaborators,
        policy: RoomPolicy,
    ) -> Self {
        Self::new(identity.participant(), collaborators, policy)
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.shared.participant
    }

    pub fn policy(&self) -> &RoomPolicy {
        &self.shared.policy
    }

    /// Latest published session state.
    pub fn state(&self) -> SessionState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notice_tx.subscribe()
    }

    pub async fn inactivity_armed(&self) -> bool {
        self.shared.session.lock().await.timer.is_armed()
    }

    pub async fn channel_open(&self) -> bool {
        self.shared.session.lock().await.channel.is_some()
    }

    /// Creates a room for `word_date` with this participant as its first
    /// player and returns the shareable code.
    pub async fn create_room(&self, nickname: &str, word_date: &str) -> Result<String, RoomError> {
        let generation = self.begin_joining().await;
        let result = self.create_room_inner(generation, nickname, word_date).await;
        self.finish_joining(generation, result).await
    }

    /// Joins an existing active room by its (case-insensitive) code.
    pub async fn join_room(&self, room_code: &str, nickname: &str) -> Result<(), RoomError> {
        let generation = self.begin_joining().await;
        let result = self.join_room_inner(generation, room_code, nickname).await;
        self.finish_joining(generation, result).await
    }

    /// Scores and records a guess. The local guess list is only updated
    /// through the store's change feed.
    pub async fn make_guess(&self, word: &str) -> Result<(), RoomError> {
        let (token, player, target, normalized) = {
            let session = self.shared.session.lock().await;
            match session.state.phase {
                SessionPhase::Active => {}
                SessionPhase::Complete => return Err(RoomError::RoomComplete),
                SessionPhase::NoRoom | SessionPhase::Joining => return Err(RoomError::NoActiveRoom),
            }
            let token = session.token().ok_or(RoomError::NoActiveRoom)?;
            let player = session
                .state
                .current_player
                .clone()
                .ok_or(RoomError::NoActiveRoom)?;
            let target = session.target_word.clone().ok_or(RoomError::NoActiveRoom)?;

            let normalized = validate_guess(word)?;
            if let Some(existing) = find_duplicate(&session.state.guesses, &normalized) {
                info!(
                    "Rejected duplicate guess '{}' in room {} (first by {})",
                    normalized, token.room_id, existing.player_nickname
                );
                return Err(RoomError::DuplicateGuess {
                    word: existing.word.clone(),
                    guessed_by: existing.player_nickname.clone(),
                });
            }
            (token, player, target, normalized)
        };

        let similarity = self
            .shared
            .collaborators
            .gateway
            .similarity(&target, &normalized)
            .await
            .inspect_err(|e| warn!("Similarity lookup for '{}' failed: {:?}", normalized, e))?;

        {
            let session = self.shared.session.lock().await;
            if !session.is_current(token) {
                debug!("Discarding score for '{}', session changed", normalized);
                return Err(RoomError::StaleSession);
            }
            if session.state.is_complete {
                return Err(RoomError::RoomComplete);
            }
        }

        let is_correct = is_correct_guess(
            &normalized,
            &target,
            similarity.score,
            self.shared.policy.correct_threshold,
        );
        let inserted = self
            .shared
            .collaborators
            .store
            .insert_guess(NewGuess {
                room_id: token.room_id,
                player_id: player.id,
                player_nickname: player.nickname.clone(),
                word: word.trim().to_string(),
                normalized_word: normalized,
                similarity: similarity.score,
                rank: similarity.rank,
                is_correct,
            })
            .await;
        let guess = match inserted {
            Ok(guess) => guess,
            Err(RoomError::RoomClosed) => {
                if let Some(room_code) = self.shared.reset_if_current(token).await {
                    info!("Guess hit closed room {}, session reset", room_code);
                }
                return Err(RoomError::RoomClosed);
            }
            Err(e) => return Err(e),
        };

        info!(
            "Guess #{} '{}' by {} in room {} scored {:.4}",
            guess.sequence, guess.word, player.nickname, token.room_id, guess.similarity
        );

        let mut session = self.shared.session.lock().await;
        if session.is_current(token) {
            self.shared.arm_inactivity(&mut session, token);
        }
        Ok(())
    }

    /// Leaves the current room: untrack presence, mark the player inactive,
    /// then clean up. A no-op when not in a room.
    ///
    /// The session stays locked until the store writes finish, so this
    /// session's own listener never mistakes its closing of the room for
    /// someone else's.
    pub async fn leave_room(&self) -> Result<(), RoomError> {
        let mut session = self.shared.session.lock().await;
        let (Some(player), Some(channel), Some(room_id)) = (
            session.state.current_player.clone(),
            session.channel.as_ref(),
            session.state.room_id(),
        ) else {
            return Ok(());
        };
        channel.presence.untrack();

        let result = self.mark_left(&player).await;
        if let Err(e) = &result {
            warn!(
                "Failed to record {} leaving room {}: {}",
                player.nickname, room_id, e
            );
        }

        session.reset();
        self.shared.publish(&session);
        drop(session);
        info!("{} left room {}", player.nickname, room_id);
        result
    }

    /// Full cleanup: disarm the timer, drop the channel, empty the state.
    pub async fn cleanup(&self) {
        let mut session = self.shared.session.lock().await;
        session.reset();
        self.shared.publish(&session);
    }

    pub async fn reset_session(&self) {
        self.cleanup().await;
    }

    async fn begin_joining(&self) -> u64 {
        let mut session = self.shared.session.lock().await;
        session.reset();
        session.state.phase = SessionPhase::Joining;
        session.state.is_loading = true;
        self.shared.publish(&session);
        session.generation
    }

    async fn finish_joining<T>(
        &self,
        generation: u64,
        result: Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let mut session = self.shared.session.lock().await;
        if session.generation != generation {
            debug!("Joining attempt superseded: {:?}", err);
            return Err(RoomError::StaleSession);
        }
        warn!("Room session setup failed: {}", err);
        session.reset();
        self.shared.publish(&session);
        Err(err)
    }

    async fn create_room_inner(
        &self,
        generation: u64,
        nickname: &str,
        word_date: &str,
    ) -> Result<String, RoomError> {
        let nickname = self.validate_nickname(nickname)?;
        let date = parse_word_date(word_date)?;
        let store = &self.shared.collaborators.store;

        let code = store.generate_unique_code().await?;
        let room = store
            .create_room(NewRoom {
                code,
                word_date: format_word_date(date),
                creator: self.shared.participant.clone(),
                max_players: self.shared.policy.max_players,
            })
            .await?;
        let player = store
            .upsert_player(NewPlayer {
                room_id: room.id,
                participant: self.shared.participant.clone(),
                nickname,
            })
            .await?;
        let target = self.resolve_target_word(&room.word_date).await?;

        let me = PresenceEntry {
            participant: player.participant.clone(),
            nickname: player.nickname.clone(),
        };
        let code = room.code.clone();
        self.activate(generation, room, player, target, vec![me]).await?;
        info!("Created room {}", code);
        Ok(code)
    }

    async fn join_room_inner(
        &self,
        generation: u64,
        room_code: &str,
        nickname: &str,
    ) -> Result<(), RoomError> {
        let nickname = self.validate_nickname(nickname)?;
        let code = parse_room_code(room_code)?;
        let store = &self.shared.collaborators.store;

        let room = store
            .find_room_by_code(&code)
            .await?
            .filter(|room| room.is_active)
            .ok_or_else(|| RoomError::RoomNotFound { code: code.clone() })?;

        let players = store.list_players(room.id).await?;
        let rejoining = players
            .iter()
            .any(|p| p.participant == self.shared.participant);
        let active = players.iter().filter(|p| p.is_active).count();
        if !rejoining && active >= room.max_players.max(0) as usize {
            return Err(RoomError::RoomFull {
                max: room.max_players,
            });
        }

        let player = store
            .upsert_player(NewPlayer {
                room_id: room.id,
                participant: self.shared.participant.clone(),
                nickname,
            })
            .await?;
        let target = self.resolve_target_word(&room.word_date).await?;

        self.activate(generation, room, player, target, Vec::new()).await?;
        info!("Joined room {}", code);
        Ok(())
    }

    /// Wires presence, change feed and inactivity timer, then publishes the
    /// freshly built session. Fails with `StaleSession` if another
    /// create/join or a cleanup ran in the meantime.
    async fn activate(
        &self,
        generation: u64,
        room: Room,
        player: Player,
        target: String,
        players: Vec<PresenceEntry>,
    ) -> Result<(), RoomError> {
        let entry = PresenceEntry {
            participant: player.participant.clone(),
            nickname: player.nickname.clone(),
        };
        let presence = self
            .shared
            .collaborators
            .presence
            .subscribe(room.id, entry)
            .await?;
        let feed = self.shared.collaborators.store.subscribe_room(room.id);

        let mut session = self.shared.session.lock().await;
        if session.generation != generation {
            return Err(RoomError::StaleSession);
        }

        let token = SessionToken {
            generation,
            room_id: room.id,
        };
        let listener = tokio::spawn(run_room_listener(
            Arc::downgrade(&self.shared),
            token,
            presence.sync(),
            feed,
        ));
        session.channel = Some(RoomChannel { presence, listener });
        session.target_word = Some(target);
        session.state = SessionState {
            phase: SessionPhase::Active,
            room: Some(room),
            players,
            guesses: Vec::new(),
            current_player: Some(player),
            is_complete: false,
            is_loading: false,
        };
        self.shared.arm_inactivity(&mut session, token);
        self.shared.publish(&session);
        Ok(())
    }

    async fn resolve_target_word(&self, word_date: &str) -> Result<String, RoomError> {
        let date = parse_word_date(word_date)?;
        self.shared
            .collaborators
            .words
            .word_for_date(date)
            .await?
            .ok_or_else(|| RoomError::WordNotFound {
                date: format_word_date(date),
            })
    }

    async fn mark_left(&self, player: &Player) -> Result<(), RoomError> {
        let store = &self.shared.collaborators.store;
        store.set_player_active(player.id, false).await?;

        let players = store.list_players(player.room_id).await?;
        if !players.iter().any(|p| p.is_active) {
            info!("Last player left room {}, closing it", player.room_id);
            store
                .close_room(player.room_id, CloseReason::Abandoned)
                .await?;
        }
        Ok(())
    }

    fn validate_nickname(&self, nickname: &str) -> Result<String, RoomError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(RoomError::EmptyNickname);
        }
        let max = self.shared.policy.nickname_max_len;
        if nickname.chars().count() > max {
            return Err(RoomError::NicknameTooLong { max });
        }
        Ok(nickname.to_string())
    }
}
