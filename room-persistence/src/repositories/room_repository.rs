use async_trait::async_trait;
use chrono::Utc;
use room_core::{RoomEvent, RoomFeed, RoomStore, generate_room_code};
use room_types::{
    CloseReason, Guess, NewGuess, NewPlayer, NewRoom, ParticipantId, Player, PlayerId, Room,
    RoomError, RoomId, RoomSummary,
};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{prelude::*, room_guesses, room_players, rooms};

const MAX_CODE_ATTEMPTS: usize = 16;

fn db_err(e: DbErr) -> RoomError {
    RoomError::store(e.to_string())
}

/// Room Store on top of sea-orm. Guess inserts and room closes are
/// published on an in-process feed once written.
#[derive(Clone)]
pub struct RoomRepository {
    db: DatabaseConnection,
    feed: Arc<RoomFeed>,
}

impl RoomRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            feed: Arc::new(RoomFeed::new()),
        }
    }

    pub fn feed(&self) -> &RoomFeed {
        &self.feed
    }

    fn model_to_room(model: rooms::Model) -> Result<Room, RoomError> {
        let creator = ParticipantId::from_columns(model.creator_user_id, model.creator_guest_id)
            .ok_or_else(|| RoomError::store(format!("room {} has no creator", model.id)))?;

        Ok(Room {
            id: model.id,
            code: model.code,
            word_date: model.word_date,
            creator,
            created_at: model.created_at.to_rfc3339(),
            is_active: model.is_active,
            max_players: model.max_players,
        })
    }

    fn model_to_player(model: room_players::Model) -> Result<Player, RoomError> {
        let participant = ParticipantId::from_columns(model.user_id, model.guest_id)
            .ok_or_else(|| RoomError::store(format!("player {} has no identity", model.id)))?;

        Ok(Player {
            id: model.id,
            room_id: model.room_id,
            participant,
            nickname: model.nickname,
            joined_at: model.joined_at.to_rfc3339(),
            is_active: model.is_active,
        })
    }

    fn model_to_guess(model: room_guesses::Model) -> Guess {
        Guess {
            id: model.id,
            room_id: model.room_id,
            player_id: model.player_id,
            player_nickname: model.player_nickname,
            word: model.word,
            normalized_word: model.normalized_word,
            similarity: model.similarity,
            rank: model.rank,
            is_correct: model.is_correct,
            sequence: model.sequence,
            created_at: model.created_at.to_rfc3339(),
        }
    }

    /// Public view of a room for the lobby endpoint.
    pub async fn room_summary(&self, code: &str) -> Result<Option<RoomSummary>, RoomError> {
        let Some(room) = Rooms::find()
            .filter(rooms::Column::Code.eq(code.to_uppercase()))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let active_players = RoomPlayers::find()
            .filter(room_players::Column::RoomId.eq(room.id))
            .filter(room_players::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        let guess_count = RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(room.id))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        let solved = RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(room.id))
            .filter(room_guesses::Column::IsCorrect.eq(true))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        Ok(Some(RoomSummary {
            code: room.code,
            word_date: room.word_date,
            is_active: room.is_active,
            max_players: room.max_players,
            active_players: active_players as u32,
            guess_count: guess_count as u32,
            is_complete: solved > 0,
        }))
    }

    /// Checks and inserts one guess inside `txn`.
    async fn insert_guess_in(
        txn: &DatabaseTransaction,
        new_guess: &NewGuess,
    ) -> Result<room_guesses::Model, RoomError> {
        let room = Rooms::find_by_id(new_guess.room_id)
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or(RoomError::RoomClosed)?;
        if !room.is_active {
            return Err(RoomError::RoomClosed);
        }

        let solved = RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(room.id))
            .filter(room_guesses::Column::IsCorrect.eq(true))
            .count(txn)
            .await
            .map_err(db_err)?;
        if solved > 0 {
            return Err(RoomError::RoomComplete);
        }

        if let Some(existing) = Self::find_same_word(txn, new_guess).await? {
            return Err(RoomError::DuplicateGuess {
                word: existing.word,
                guessed_by: existing.player_nickname,
            });
        }

        let sequence = RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(room.id))
            .order_by_desc(room_guesses::Column::Sequence)
            .one(txn)
            .await
            .map_err(db_err)?
            .map(|last| last.sequence)
            .unwrap_or(0)
            + 1;

        let model = room_guesses::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(new_guess.room_id),
            player_id: Set(new_guess.player_id),
            player_nickname: Set(new_guess.player_nickname.clone()),
            word: Set(new_guess.word.clone()),
            normalized_word: Set(new_guess.normalized_word.clone()),
            similarity: Set(new_guess.similarity),
            rank: Set(new_guess.rank),
            is_correct: Set(new_guess.is_correct),
            sequence: Set(sequence),
            created_at: Set(Utc::now().into()),
        };

        match model.insert(txn).await {
            Ok(model) => Ok(model),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                match Self::find_same_word(txn, new_guess).await? {
                    Some(existing) => Err(RoomError::DuplicateGuess {
                        word: existing.word,
                        guessed_by: existing.player_nickname,
                    }),
                    None => Err(db_err(e)),
                }
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_same_word(
        txn: &DatabaseTransaction,
        new_guess: &NewGuess,
    ) -> Result<Option<room_guesses::Model>, RoomError> {
        RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(new_guess.room_id))
            .filter(room_guesses::Column::NormalizedWord.eq(new_guess.normalized_word.as_str()))
            .one(txn)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl RoomStore for RoomRepository {
    async fn generate_unique_code(&self) -> Result<String, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code();
            let taken = Rooms::find()
                .filter(rooms::Column::Code.eq(code.as_str()))
                .count(&self.db)
                .await
                .map_err(db_err)?;
            if taken == 0 {
                return Ok(code);
            }
            debug!("Room code {} already taken, retrying", code);
        }
        Err(RoomError::store("could not allocate a unique room code"))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<Room, RoomError> {
        let model = rooms::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(new_room.code),
            word_date: Set(new_room.word_date),
            creator_user_id: Set(new_room.creator.user_id()),
            creator_guest_id: Set(new_room.creator.guest_id().map(str::to_string)),
            created_at: Set(Utc::now().into()),
            is_active: Set(true),
            max_players: Set(new_room.max_players),
        };

        let model = model.insert(&self.db).await.map_err(db_err)?;
        info!("Stored room {} ({})", model.code, model.id);
        Self::model_to_room(model)
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>, RoomError> {
        Rooms::find()
            .filter(rooms::Column::Code.eq(code.to_uppercase()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(Self::model_to_room)
            .transpose()
    }

    async fn find_room(&self, room_id: RoomId) -> Result<Option<Room>, RoomError> {
        Rooms::find_by_id(room_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(Self::model_to_room)
            .transpose()
    }

    async fn close_room(&self, room_id: RoomId, reason: CloseReason) -> Result<(), RoomError> {
        Rooms::update_many()
            .col_expr(rooms::Column::IsActive, Expr::value(false))
            .filter(rooms::Column::Id.eq(room_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        info!("Room {} closed ({:?})", room_id, reason);
        self.feed.close(room_id, reason);
        Ok(())
    }

    async fn active_rooms(&self) -> Result<Vec<Room>, RoomError> {
        Rooms::find()
            .filter(rooms::Column::IsActive.eq(true))
            .order_by_asc(rooms::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Self::model_to_room)
            .collect()
    }

    async fn upsert_player(&self, new_player: NewPlayer) -> Result<Player, RoomError> {
        let identity_key = new_player.participant.key();
        let model = room_players::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(new_player.room_id),
            user_id: Set(new_player.participant.user_id()),
            guest_id: Set(new_player.participant.guest_id().map(str::to_string)),
            identity_key: Set(identity_key.clone()),
            nickname: Set(new_player.nickname),
            joined_at: Set(Utc::now().into()),
            is_active: Set(true),
        };

        RoomPlayers::insert(model)
            .on_conflict(
                OnConflict::columns([
                    room_players::Column::RoomId,
                    room_players::Column::IdentityKey,
                ])
                .update_columns([
                    room_players::Column::Nickname,
                    room_players::Column::JoinedAt,
                    room_players::Column::IsActive,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        let stored = RoomPlayers::find()
            .filter(room_players::Column::RoomId.eq(new_player.room_id))
            .filter(room_players::Column::IdentityKey.eq(identity_key.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                RoomError::store(format!("player {} missing after upsert", identity_key))
            })?;

        Self::model_to_player(stored)
    }

    async fn set_player_active(
        &self,
        player_id: PlayerId,
        is_active: bool,
    ) -> Result<(), RoomError> {
        RoomPlayers::update_many()
            .col_expr(room_players::Column::IsActive, Expr::value(is_active))
            .filter(room_players::Column::Id.eq(player_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_players(&self, room_id: RoomId) -> Result<Vec<Player>, RoomError> {
        RoomPlayers::find()
            .filter(room_players::Column::RoomId.eq(room_id))
            .order_by_asc(room_players::Column::JoinedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Self::model_to_player)
            .collect()
    }

    async fn insert_guess(&self, new_guess: NewGuess) -> Result<Guess, RoomError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = match Self::insert_guess_in(&txn, &new_guess).await {
            Ok(model) => model,
            Err(e) => {
                txn.rollback().await.map_err(db_err)?;
                return Err(e);
            }
        };
        txn.commit().await.map_err(db_err)?;

        let guess = Self::model_to_guess(model);
        self.feed.publish_guess(guess.clone());
        Ok(guess)
    }

    async fn list_guesses(&self, room_id: RoomId) -> Result<Vec<Guess>, RoomError> {
        let guesses = RoomGuesses::find()
            .filter(room_guesses::Column::RoomId.eq(room_id))
            .order_by_asc(room_guesses::Column::Sequence)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(guesses.into_iter().map(Self::model_to_guess).collect())
    }

    fn subscribe_room(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent> {
        self.feed.subscribe(room_id)
    }
}
