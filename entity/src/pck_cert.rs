use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Full set of PCK certificates PCS issued for a platform, with the
/// parallel list of TCBM values and the index of the certificate selected
/// for the platform's raw TCB. `pck_certs` and `tcbms` always have the
/// same length and `cert_index` stays within bounds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pck_certs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub qe_id: String,
    pub pce_id: String,
    pub fmspc: String,
    pub cert_index: i32,
    #[sea_orm(column_type = "Json")]
    pub pck_certs: StringList,
    #[sea_orm(column_type = "Json")]
    pub tcbms: StringList,
    pub pck_cert_chain_id: i32,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

/// JSON-backed list column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pck_cert_chain::Entity",
        from = "Column::PckCertChainId",
        to = "super::pck_cert_chain::Column::Id",
        on_update = "Restrict",
        on_delete = "Restrict"
    )]
    PckCertChain,
}

impl Related<super::pck_cert_chain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PckCertChain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
