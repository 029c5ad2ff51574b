use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SGX platform identifiers pushed by a registration agent. The FMSPC
/// column is empty until the first successful PCS fetch derives it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platforms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub qe_id: String,
    pub enc_ppid: String,
    pub manifest: String,
    pub cpu_svn: String,
    pub pce_svn: String,
    pub pce_id: String,
    pub fmspc: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
