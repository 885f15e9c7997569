use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use room_core::{WordOfDay, format_word_date};
use room_types::RoomError;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::info;

use crate::entities::{daily_words, prelude::*};

/// Word-of-the-day table, one target word per date.
#[derive(Clone)]
pub struct DailyWordRepository {
    db: DatabaseConnection,
}

impl DailyWordRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_word(&self, date: NaiveDate) -> Result<Option<String>> {
        let model = DailyWords::find_by_id(format_word_date(date))
            .one(&self.db)
            .await?;
        Ok(model.map(|m| m.word))
    }

    /// Insert or replace the word for `date`.
    pub async fn upsert_word(&self, date: NaiveDate, word: &str) -> Result<()> {
        let model = daily_words::ActiveModel {
            word_date: Set(format_word_date(date)),
            word: Set(word.trim().to_string()),
            updated_at: Set(Utc::now().into()),
        };

        DailyWords::insert(model)
            .on_conflict(
                OnConflict::column(daily_words::Column::WordDate)
                    .update_columns([daily_words::Column::Word, daily_words::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    pub async fn seed(&self, schedule: &[(NaiveDate, String)]) -> Result<usize> {
        for (date, word) in schedule {
            self.upsert_word(*date, word).await?;
        }
        info!("Seeded {} daily words", schedule.len());
        Ok(schedule.len())
    }
}

#[async_trait]
impl WordOfDay for DailyWordRepository {
    async fn word_for_date(&self, date: NaiveDate) -> Result<Option<String>, RoomError> {
        self.find_word(date)
            .await
            .map_err(|e| RoomError::store(e.to_string()))
    }
}
