pub use sea_orm_migration::prelude::*;
mod m20240501_000001_create_platforms_table;
mod m20240501_000002_create_platform_tcbs_table;
mod m20240501_000003_create_pck_cert_chains_table;
mod m20240501_000004_create_pck_certs_table;
mod m20240501_000005_create_pck_crls_table;
mod m20240501_000006_create_fmspc_tcb_infos_table;
mod m20240501_000007_create_qe_identities_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240501_000001_create_platforms_table::Migration),
            Box::new(m20240501_000002_create_platform_tcbs_table::Migration),
            Box::new(m20240501_000003_create_pck_cert_chains_table::Migration),
            Box::new(m20240501_000004_create_pck_certs_table::Migration),
            Box::new(m20240501_000005_create_pck_crls_table::Migration),
            Box::new(m20240501_000006_create_fmspc_tcb_infos_table::Migration),
            Box::new(m20240501_000007_create_qe_identities_table::Migration),
        ]
    }
}
