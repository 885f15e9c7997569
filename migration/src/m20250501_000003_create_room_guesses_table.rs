use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RoomGuesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoomGuesses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoomGuesses::RoomId).uuid().not_null())
                    .col(ColumnDef::new(RoomGuesses::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(RoomGuesses::PlayerNickname).string().not_null())
                    .col(ColumnDef::new(RoomGuesses::Word).string().not_null())
                    .col(ColumnDef::new(RoomGuesses::NormalizedWord).string().not_null())
                    .col(ColumnDef::new(RoomGuesses::Similarity).double().not_null())
                    .col(ColumnDef::new(RoomGuesses::Rank).integer().null())
                    .col(
                        ColumnDef::new(RoomGuesses::IsCorrect)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RoomGuesses::Sequence).big_integer().not_null())
                    .col(
                        ColumnDef::new(RoomGuesses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_guesses_room")
                            .from(RoomGuesses::Table, RoomGuesses::RoomId)
                            .to(Rooms::Table, Rooms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_guesses_player")
                            .from(RoomGuesses::Table, RoomGuesses::PlayerId)
                            .to(RoomPlayers::Table, RoomPlayers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Guess order within a room
        manager
            .create_index(
                Index::create()
                    .name("idx_room_guesses_sequence")
                    .table(RoomGuesses::Table)
                    .col(RoomGuesses::RoomId)
                    .col(RoomGuesses::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // A word can be guessed once per room
        manager
            .create_index(
                Index::create()
                    .name("idx_room_guesses_word")
                    .table(RoomGuesses::Table)
                    .col(RoomGuesses::RoomId)
                    .col(RoomGuesses::NormalizedWord)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoomGuesses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RoomGuesses {
    Table,
    Id,
    RoomId,
    PlayerId,
    PlayerNickname,
    Word,
    NormalizedWord,
    Similarity,
    Rank,
    IsCorrect,
    Sequence,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum RoomPlayers {
    Table,
    Id,
}
