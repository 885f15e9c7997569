use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "room_guesses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub room_id: Uuid,
    pub player_id: Uuid,
    pub player_nickname: String,
    pub word: String,
    pub normalized_word: String,
    #[sea_orm(column_type = "Double")]
    pub similarity: f64,
    pub rank: Option<i32>,
    pub is_correct: bool,
    pub sequence: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rooms::Entity",
        from = "Column::RoomId",
        to = "super::rooms::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Rooms,
    #[sea_orm(
        belongs_to = "super::room_players::Entity",
        from = "Column::PlayerId",
        to = "super::room_players::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    RoomPlayers,
}

impl Related<super::rooms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rooms.def()
    }
}

impl Related<super::room_players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomPlayers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
