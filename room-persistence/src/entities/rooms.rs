use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub word_date: String,
    pub creator_user_id: Option<Uuid>,
    pub creator_guest_id: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub is_active: bool,
    pub max_players: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::room_players::Entity")]
    RoomPlayers,
    #[sea_orm(has_many = "super::room_guesses::Entity")]
    RoomGuesses,
}

impl Related<super::room_players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomPlayers.def()
    }
}

impl Related<super::room_guesses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoomGuesses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
