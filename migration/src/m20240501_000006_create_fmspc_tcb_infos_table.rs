use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("fmspc_tcb_infos"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("fmspc")).string().not_null().primary_key())
                    .col(ColumnDef::new(Alias::new("tcb_info")).text().not_null())
                    .col(ColumnDef::new(Alias::new("tcb_info_issuer_chain")).text().not_null())
                    .col(ColumnDef::new(Alias::new("created_time")).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Alias::new("updated_time")).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("fmspc_tcb_infos")).to_owned())
            .await
    }
}
