use async_trait::async_trait;
use entity::{fmspc_tcb_info, pck_cert, pck_cert_chain, pck_crl, platform, platform_tcb, qe_identity};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel};

use crate::error::ScsError;

/// Persistence contracts for the seven collateral tables. The engine
/// depends on these traits only; the sea-orm implementation below is the
/// production backend and the tests swap in an in-memory one.

#[async_trait]
pub trait PlatformRepository: Send + Sync {
    async fn create(&self, row: platform::Model) -> Result<(), ScsError>;
    async fn retrieve(&self, qe_id: &str) -> Result<Option<platform::Model>, ScsError>;
    async fn retrieve_all(&self) -> Result<Vec<platform::Model>, ScsError>;
    async fn update(&self, row: platform::Model) -> Result<(), ScsError>;
    async fn delete(&self, qe_id: &str) -> Result<(), ScsError>;
}

#[async_trait]
pub trait PlatformTcbRepository: Send + Sync {
    async fn create(&self, row: platform_tcb::Model) -> Result<(), ScsError>;
    async fn retrieve(&self, qe_id: &str) -> Result<Option<platform_tcb::Model>, ScsError>;
    async fn update(&self, row: platform_tcb::Model) -> Result<(), ScsError>;
    async fn delete(&self, qe_id: &str) -> Result<(), ScsError>;
}

#[async_trait]
pub trait PckCertRepository: Send + Sync {
    async fn create(&self, row: pck_cert::Model) -> Result<(), ScsError>;
    async fn retrieve(&self, qe_id: &str) -> Result<Option<pck_cert::Model>, ScsError>;
    async fn retrieve_all(&self) -> Result<Vec<pck_cert::Model>, ScsError>;
    async fn update(&self, row: pck_cert::Model) -> Result<(), ScsError>;
    async fn delete(&self, qe_id: &str) -> Result<(), ScsError>;
}

/// Singleton table: one issuer-chain row, overwritten on refresh.
#[async_trait]
pub trait PckCertChainRepository: Send + Sync {
    async fn create(&self, row: pck_cert_chain::Model) -> Result<(), ScsError>;
    async fn retrieve(&self) -> Result<Option<pck_cert_chain::Model>, ScsError>;
    async fn update(&self, row: pck_cert_chain::Model) -> Result<(), ScsError>;
}

#[async_trait]
pub trait PckCrlRepository: Send + Sync {
    async fn create(&self, row: pck_crl::Model) -> Result<(), ScsError>;
    async fn retrieve(&self, ca: &str) -> Result<Option<pck_crl::Model>, ScsError>;
    async fn retrieve_all(&self) -> Result<Vec<pck_crl::Model>, ScsError>;
    async fn update(&self, row: pck_crl::Model) -> Result<(), ScsError>;
    async fn delete(&self, ca: &str) -> Result<(), ScsError>;
}

#[async_trait]
pub trait FmspcTcbInfoRepository: Send + Sync {
    async fn create(&self, row: fmspc_tcb_info::Model) -> Result<(), ScsError>;
    async fn retrieve(&self, fmspc: &str) -> Result<Option<fmspc_tcb_info::Model>, ScsError>;
    async fn retrieve_all(&self) -> Result<Vec<fmspc_tcb_info::Model>, ScsError>;
    async fn update(&self, row: fmspc_tcb_info::Model) -> Result<(), ScsError>;
    async fn delete(&self, fmspc: &str) -> Result<(), ScsError>;
}

/// Singleton table: at most one QE identity row.
#[async_trait]
pub trait QeIdentityRepository: Send + Sync {
    async fn create(&self, row: qe_identity::Model) -> Result<(), ScsError>;
    async fn retrieve(&self) -> Result<Option<qe_identity::Model>, ScsError>;
    async fn update(&self, row: qe_identity::Model) -> Result<(), ScsError>;
}

pub trait ScsDatabase: Send + Sync {
    fn platforms(&self) -> &dyn PlatformRepository;
    fn platform_tcbs(&self) -> &dyn PlatformTcbRepository;
    fn pck_certs(&self) -> &dyn PckCertRepository;
    fn pck_cert_chains(&self) -> &dyn PckCertChainRepository;
    fn pck_crls(&self) -> &dyn PckCrlRepository;
    fn fmspc_tcb_infos(&self) -> &dyn FmspcTcbInfoRepository;
    fn qe_identities(&self) -> &dyn QeIdentityRepository;
}

fn storage(err: sea_orm::DbErr) -> ScsError {
    ScsError::Storage(err.to_string())
}

/// sea-orm backed database, one repository value per table sharing the
/// pooled connection.
pub struct OrmDatabase {
    platforms: OrmPlatformRepository,
    platform_tcbs: OrmPlatformTcbRepository,
    pck_certs: OrmPckCertRepository,
    pck_cert_chains: OrmPckCertChainRepository,
    pck_crls: OrmPckCrlRepository,
    fmspc_tcb_infos: OrmFmspcTcbInfoRepository,
    qe_identities: OrmQeIdentityRepository,
}

impl OrmDatabase {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            platforms: OrmPlatformRepository { conn: conn.clone() },
            platform_tcbs: OrmPlatformTcbRepository { conn: conn.clone() },
            pck_certs: OrmPckCertRepository { conn: conn.clone() },
            pck_cert_chains: OrmPckCertChainRepository { conn: conn.clone() },
            pck_crls: OrmPckCrlRepository { conn: conn.clone() },
            fmspc_tcb_infos: OrmFmspcTcbInfoRepository { conn: conn.clone() },
            qe_identities: OrmQeIdentityRepository { conn },
        }
    }
}

impl ScsDatabase for OrmDatabase {
    fn platforms(&self) -> &dyn PlatformRepository {
        &self.platforms
    }
    fn platform_tcbs(&self) -> &dyn PlatformTcbRepository {
        &self.platform_tcbs
    }
    fn pck_certs(&self) -> &dyn PckCertRepository {
        &self.pck_certs
    }
    fn pck_cert_chains(&self) -> &dyn PckCertChainRepository {
        &self.pck_cert_chains
    }
    fn pck_crls(&self) -> &dyn PckCrlRepository {
        &self.pck_crls
    }
    fn fmspc_tcb_infos(&self) -> &dyn FmspcTcbInfoRepository {
        &self.fmspc_tcb_infos
    }
    fn qe_identities(&self) -> &dyn QeIdentityRepository {
        &self.qe_identities
    }
}

struct OrmPlatformRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl PlatformRepository for OrmPlatformRepository {
    async fn create(&self, row: platform::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self, qe_id: &str) -> Result<Option<platform::Model>, ScsError> {
        platform::Entity::find_by_id(qe_id.to_string())
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn retrieve_all(&self) -> Result<Vec<platform::Model>, ScsError> {
        platform::Entity::find().all(&self.conn).await.map_err(storage)
    }

    async fn update(&self, row: platform::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, qe_id: &str) -> Result<(), ScsError> {
        platform::Entity::delete_by_id(qe_id.to_string())
            .exec(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmPlatformTcbRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl PlatformTcbRepository for OrmPlatformTcbRepository {
    async fn create(&self, row: platform_tcb::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self, qe_id: &str) -> Result<Option<platform_tcb::Model>, ScsError> {
        platform_tcb::Entity::find_by_id(qe_id.to_string())
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn update(&self, row: platform_tcb::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, qe_id: &str) -> Result<(), ScsError> {
        platform_tcb::Entity::delete_by_id(qe_id.to_string())
            .exec(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmPckCertRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl PckCertRepository for OrmPckCertRepository {
    async fn create(&self, row: pck_cert::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self, qe_id: &str) -> Result<Option<pck_cert::Model>, ScsError> {
        pck_cert::Entity::find_by_id(qe_id.to_string())
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn retrieve_all(&self) -> Result<Vec<pck_cert::Model>, ScsError> {
        pck_cert::Entity::find().all(&self.conn).await.map_err(storage)
    }

    async fn update(&self, row: pck_cert::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, qe_id: &str) -> Result<(), ScsError> {
        pck_cert::Entity::delete_by_id(qe_id.to_string())
            .exec(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmPckCertChainRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl PckCertChainRepository for OrmPckCertChainRepository {
    async fn create(&self, row: pck_cert_chain::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self) -> Result<Option<pck_cert_chain::Model>, ScsError> {
        pck_cert_chain::Entity::find_by_id(pck_cert_chain::SINGLETON_ID)
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn update(&self, row: pck_cert_chain::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmPckCrlRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl PckCrlRepository for OrmPckCrlRepository {
    async fn create(&self, row: pck_crl::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self, ca: &str) -> Result<Option<pck_crl::Model>, ScsError> {
        pck_crl::Entity::find_by_id(ca.to_string())
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn retrieve_all(&self) -> Result<Vec<pck_crl::Model>, ScsError> {
        pck_crl::Entity::find().all(&self.conn).await.map_err(storage)
    }

    async fn update(&self, row: pck_crl::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, ca: &str) -> Result<(), ScsError> {
        pck_crl::Entity::delete_by_id(ca.to_string())
            .exec(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmFmspcTcbInfoRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl FmspcTcbInfoRepository for OrmFmspcTcbInfoRepository {
    async fn create(&self, row: fmspc_tcb_info::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self, fmspc: &str) -> Result<Option<fmspc_tcb_info::Model>, ScsError> {
        fmspc_tcb_info::Entity::find_by_id(fmspc.to_string())
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn retrieve_all(&self) -> Result<Vec<fmspc_tcb_info::Model>, ScsError> {
        fmspc_tcb_info::Entity::find()
            .all(&self.conn)
            .await
            .map_err(storage)
    }

    async fn update(&self, row: fmspc_tcb_info::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn delete(&self, fmspc: &str) -> Result<(), ScsError> {
        fmspc_tcb_info::Entity::delete_by_id(fmspc.to_string())
            .exec(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

struct OrmQeIdentityRepository {
    conn: DatabaseConnection,
}

#[async_trait]
impl QeIdentityRepository for OrmQeIdentityRepository {
    async fn create(&self, row: qe_identity::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .insert(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn retrieve(&self) -> Result<Option<qe_identity::Model>, ScsError> {
        qe_identity::Entity::find_by_id(qe_identity::SINGLETON_ID)
            .one(&self.conn)
            .await
            .map_err(storage)
    }

    async fn update(&self, row: qe_identity::Model) -> Result<(), ScsError> {
        row.into_active_model()
            .update(&self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
