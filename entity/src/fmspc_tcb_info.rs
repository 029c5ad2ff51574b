use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// TCB info document for one FMSPC, stored verbatim as returned by PCS.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fmspc_tcb_infos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fmspc: String,
    #[sea_orm(column_type = "Text")]
    pub tcb_info: String,
    #[sea_orm(column_type = "Text")]
    pub tcb_info_issuer_chain: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
