use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Quoting Enclave identity document, stored verbatim. At most one row
/// (id = 1) exists.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "qe_identities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub qe_info: String,
    #[sea_orm(column_type = "Text")]
    pub qe_issuer_chain: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed primary key of the singleton row.
pub const SINGLETON_ID: i32 = 1;
