use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyWords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyWords::WordDate)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyWords::Word).string().not_null())
                    .col(
                        ColumnDef::new(DailyWords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyWords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyWords {
    Table,
    WordDate,
    Word,
    UpdatedAt,
}
