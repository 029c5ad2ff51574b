use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Certificate revocation list for one of the two PCK-issuing CAs.
/// `ca` is either "processor" or "platform"; the CRL body is stored
/// base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pck_crls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub ca: String,
    #[sea_orm(column_type = "Text")]
    pub pck_crl: String,
    #[sea_orm(column_type = "Text")]
    pub pck_crl_cert_chain: String,
    pub created_time: DateTimeUtc,
    pub updated_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
