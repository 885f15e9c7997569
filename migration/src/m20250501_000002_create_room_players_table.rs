use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RoomPlayers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoomPlayers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoomPlayers::RoomId).uuid().not_null())
                    .col(ColumnDef::new(RoomPlayers::UserId).uuid().null())
                    .col(ColumnDef::new(RoomPlayers::GuestId).string().null())
                    .col(ColumnDef::new(RoomPlayers::IdentityKey).string().not_null())
                    .col(ColumnDef::new(RoomPlayers::Nickname).string().not_null())
                    .col(
                        ColumnDef::new(RoomPlayers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RoomPlayers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_players_room")
                            .from(RoomPlayers::Table, RoomPlayers::RoomId)
                            .to(Rooms::Table, Rooms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per participant per room; rejoins upsert on this key
        manager
            .create_index(
                Index::create()
                    .name("idx_room_players_identity")
                    .table(RoomPlayers::Table)
                    .col(RoomPlayers::RoomId)
                    .col(RoomPlayers::IdentityKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoomPlayers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RoomPlayers {
    Table,
    Id,
    RoomId,
    UserId,
    GuestId,
    IdentityKey,
    Nickname,
    JoinedAt,
    IsActive,
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
}
