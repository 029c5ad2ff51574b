use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Issuer chain of the PCK certificates returned by PCS. A single row
/// (id = 1) exists at any time; refreshes overwrite it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pck_cert_chains")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub pck_cert_chain: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pck_cert::Entity")]
    PckCert,
}

impl Related<super::pck_cert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PckCert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed primary key of the singleton row.
pub const SINGLETON_ID: i32 = 1;
