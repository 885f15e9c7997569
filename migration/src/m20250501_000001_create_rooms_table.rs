use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rooms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rooms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rooms::Code).string().not_null().unique_key())
                    .col(ColumnDef::new(Rooms::WordDate).string().not_null())
                    .col(ColumnDef::new(Rooms::CreatorUserId).uuid().null())
                    .col(ColumnDef::new(Rooms::CreatorGuestId).string().null())
                    .col(
                        ColumnDef::new(Rooms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Rooms::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Rooms::MaxPlayers)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .to_owned(),
            )
            .await?;

        // Reconciliation walks the active rooms
        manager
            .create_index(
                Index::create()
                    .name("idx_rooms_is_active")
                    .table(Rooms::Table)
                    .col(Rooms::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rooms::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
    Code,
    WordDate,
    CreatorUserId,
    CreatorGuestId,
    CreatedAt,
    IsActive,
    MaxPlayers,
}
