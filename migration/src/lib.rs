pub use sea_orm_migration::prelude::*;

mod m20250501_000001_create_rooms_table;
mod m20250501_000002_create_room_players_table;
mod m20250501_000003_create_room_guesses_table;
mod m20250501_000004_create_daily_words_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250501_000001_create_rooms_table::Migration),
            Box::new(m20250501_000002_create_room_players_table::Migration),
            Box::new(m20250501_000003_create_room_guesses_table::Migration),
            Box::new(m20250501_000004_create_daily_words_table::Migration),
        ]
    }
}
