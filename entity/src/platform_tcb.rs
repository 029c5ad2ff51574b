use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw TCB of a cached platform together with the TCBM of the PCK
/// certificate selected for it (16 CPU-SVN bytes + little-endian PCE-SVN).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platform_tcbs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub qe_id: String,
    pub pce_id: String,
    pub cpu_svn: String,
    pub pce_svn: String,
    pub tcbm: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
