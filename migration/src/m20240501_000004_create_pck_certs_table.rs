use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("pck_certs"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("qe_id")).string().not_null().primary_key())
                    .col(ColumnDef::new(Alias::new("pce_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("fmspc")).string().not_null())
                    .col(ColumnDef::new(Alias::new("cert_index")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("pck_certs")).json().not_null())
                    .col(ColumnDef::new(Alias::new("tcbms")).json().not_null())
                    .col(ColumnDef::new(Alias::new("pck_cert_chain_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("created_time")).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Alias::new("updated_time")).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pck_certs_pck_cert_chain")
                            .from(Alias::new("pck_certs"), Alias::new("pck_cert_chain_id"))
                            .to(Alias::new("pck_cert_chains"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("pck_certs")).to_owned())
            .await
    }
}
