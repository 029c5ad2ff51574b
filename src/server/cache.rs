use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use entity::pck_cert::StringList;
use entity::{fmspc_tcb_info, pck_cert, pck_cert_chain, pck_crl, platform, platform_tcb, qe_identity};
use percent_encoding::percent_decode_str;

use crate::error::ScsError;
use crate::pcs_client::{PckCertsQuery, ProvisioningClient};
use crate::repository::ScsDatabase;
use crate::selector::{self, RawTcb};
use crate::single_flight::SingleFlight;
use crate::tcb_status::{evaluate_tcb_status, verdict};
use crate::validation::{validate_input, InputKind};

/// Placeholder PCS returns for TCB levels without an issued certificate.
const NOT_AVAILABLE: &str = "Not available";

/// Whether a write lands as a fresh row or overwrites a cached one. The
/// flag selects create vs update and nothing else.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheKind {
    Insert,
    Refresh,
}

impl CacheKind {
    fn for_existing(existing: bool) -> Self {
        if existing {
            CacheKind::Refresh
        } else {
            CacheKind::Insert
        }
    }
}

/// Which walk a refresh request performs; absent means both.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshSelection {
    Certs,
    Tcbs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    AlreadyCached,
    Created,
}

/// Validated platform identifiers accepted by `POST /platforms`.
#[derive(Clone, Debug, Default)]
pub struct PlatformPush {
    pub enc_ppid: String,
    pub cpu_svn: String,
    pub pce_svn: String,
    pub pce_id: String,
    pub qe_id: String,
    pub manifest: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TcbStatusReport {
    pub up_to_date: bool,
    pub message: &'static str,
}

#[derive(Clone, Debug)]
struct PlatformFetchOutcome {
    ca_type: String,
}

/// Everything one `/pckcerts` + `/tcb` round produces for a platform.
struct FetchedCollateral {
    certs: Vec<String>,
    tcbms: Vec<String>,
    cert_index: usize,
    fmspc: String,
    ca_type: String,
    issuer_chain: String,
    tcb_info: String,
    tcb_issuer_chain: String,
}

/// Fetch-on-miss cache over the repository. All upstream traffic flows
/// through per-key single-flight tables, so concurrent requests and the
/// refresh scheduler never duplicate a fetch for the same natural key.
pub struct LazyCache {
    db: Arc<dyn ScsDatabase>,
    pcs: Arc<dyn ProvisioningClient>,
    pck_flights: SingleFlight<PlatformFetchOutcome>,
    crl_flights: SingleFlight<()>,
    tcb_flights: SingleFlight<()>,
    qe_flights: SingleFlight<()>,
}

impl LazyCache {
    pub fn new(db: Arc<dyn ScsDatabase>, pcs: Arc<dyn ProvisioningClient>) -> Self {
        Self {
            db,
            pcs,
            pck_flights: SingleFlight::new(),
            crl_flights: SingleFlight::new(),
            tcb_flights: SingleFlight::new(),
            qe_flights: SingleFlight::new(),
        }
    }

    /// Push flow: a known platform short-circuits, an unknown one runs
    /// the fetch-and-cache chain and backfills CRL and QE identity rows
    /// that are still missing.
    pub async fn push_platform(&self, push: PlatformPush) -> Result<PushOutcome, ScsError> {
        if self.db.platforms().retrieve(&push.qe_id).await?.is_some() {
            tracing::debug!(qe_id = %push.qe_id, "platform already cached");
            return Ok(PushOutcome::AlreadyCached);
        }

        let now = Utc::now();
        let platform_row = platform::Model {
            qe_id: push.qe_id,
            enc_ppid: push.enc_ppid,
            manifest: push.manifest,
            cpu_svn: push.cpu_svn,
            pce_svn: push.pce_svn,
            pce_id: push.pce_id,
            fmspc: String::new(),
            created_time: now,
            updated_time: now,
        };

        let outcome = self.cache_platform(&platform_row).await?;

        if self.db.pck_crls().retrieve(&outcome.ca_type).await?.is_none() {
            self.lazy_cache_pck_crl(&outcome.ca_type).await?;
        }
        if self.db.qe_identities().retrieve().await?.is_none() {
            self.lazy_cache_qe_identity().await?;
        }

        Ok(PushOutcome::Created)
    }

    pub async fn refresh(&self, selection: Option<RefreshSelection>) -> Result<(), ScsError> {
        match selection {
            Some(RefreshSelection::Certs) => self.refresh_pck_certs().await,
            Some(RefreshSelection::Tcbs) => self.refresh_non_pck_collateral().await,
            None => {
                self.refresh_pck_certs().await?;
                self.refresh_non_pck_collateral().await
            }
        }
    }

    /// Re-runs the certificate fetch for every cached platform.
    pub async fn refresh_pck_certs(&self) -> Result<(), ScsError> {
        let platforms = self.db.platforms().retrieve_all().await?;
        if platforms.is_empty() {
            return Err(ScsError::NotFound(
                "no platform value records are found in db, cannot perform refresh".to_string(),
            ));
        }
        for platform_row in platforms {
            self.cache_platform(&platform_row).await?;
        }
        tracing::debug!("pck certificates refetched from pcs");
        Ok(())
    }

    /// Refreshes PCK CRLs, TCB infos and the QE identity, in that order;
    /// the first failing step aborts the walk.
    pub async fn refresh_non_pck_collateral(&self) -> Result<(), ScsError> {
        let crls = self.db.pck_crls().retrieve_all().await?;
        if crls.is_empty() {
            return Err(ScsError::NotFound(
                "no pck crl record found in db, cannot perform refresh operation".to_string(),
            ));
        }
        for crl in crls {
            self.lazy_cache_pck_crl(&crl.ca).await?;
        }

        let tcb_infos = self.db.fmspc_tcb_infos().retrieve_all().await?;
        if tcb_infos.is_empty() {
            return Err(ScsError::NotFound(
                "no tcbinfo record found in db, cannot perform refresh operation".to_string(),
            ));
        }
        for info in tcb_infos {
            self.lazy_cache_fmspc_tcb_info(&info.fmspc).await?;
        }

        if self.db.qe_identities().retrieve().await?.is_none() {
            return Err(ScsError::NotFound(
                "no qe identity record found in db, cannot perform refresh operation".to_string(),
            ));
        }
        self.lazy_cache_qe_identity().await?;
        tracing::debug!("non-pck collateral refetched from pcs");
        Ok(())
    }

    /// Resolves the TCBM of the platform's selected certificate and walks
    /// the cached TCB levels for a verdict.
    pub async fn tcb_status(&self, qe_id: &str) -> Result<TcbStatusReport, ScsError> {
        let pck_cert_row = self
            .db
            .pck_certs()
            .retrieve(qe_id)
            .await?
            .ok_or_else(|| ScsError::NotFound("no pck cert record found".to_string()))?;
        let platform_row = self
            .db
            .platforms()
            .retrieve(qe_id)
            .await?
            .ok_or_else(|| ScsError::NotFound("no platform record found".to_string()))?;
        let tcb_info_row = self
            .db
            .fmspc_tcb_infos()
            .retrieve(&platform_row.fmspc)
            .await?
            .ok_or_else(|| ScsError::NotFound("no tcb info record found".to_string()))?;

        let cert_index = usize::try_from(pck_cert_row.cert_index)
            .map_err(|_| ScsError::Internal("stored cert index is negative".to_string()))?;
        let tcbm = pck_cert_row
            .tcbms
            .0
            .get(cert_index)
            .ok_or_else(|| ScsError::Internal("stored cert index is out of bounds".to_string()))?;

        let status = evaluate_tcb_status(tcbm, &tcb_info_row.tcb_info)?;
        let (up_to_date, message) = verdict(status.as_deref());
        Ok(TcbStatusReport { up_to_date, message })
    }

    /// One platform's fetch-and-cache chain under its single-flight key.
    async fn cache_platform(
        &self,
        platform_row: &platform::Model,
    ) -> Result<PlatformFetchOutcome, ScsError> {
        let db = Arc::clone(&self.db);
        let pcs = Arc::clone(&self.pcs);
        let row = platform_row.clone();
        self.pck_flights
            .run(&platform_row.qe_id, move || async move {
                let fetched = fetch_pck_cert_info(pcs.as_ref(), &row).await?;
                persist_platform_collateral(db.as_ref(), &row, &fetched).await?;
                Ok(PlatformFetchOutcome {
                    ca_type: fetched.ca_type,
                })
            })
            .await
    }

    async fn lazy_cache_pck_crl(&self, ca: &str) -> Result<(), ScsError> {
        let db = Arc::clone(&self.db);
        let pcs = Arc::clone(&self.pcs);
        let key = ca.to_string();
        let ca = key.clone();
        self.crl_flights
            .run(&key, move || async move {
                let reply = pcs.get_pck_crl(&ca).await?;
                let existing = db.pck_crls().retrieve(&ca).await?;
                let now = Utc::now();
                let row = pck_crl::Model {
                    ca: ca.clone(),
                    pck_crl: base64::engine::general_purpose::STANDARD.encode(&reply.crl),
                    pck_crl_cert_chain: reply.issuer_chain,
                    created_time: existing
                        .as_ref()
                        .map(|row| row.created_time)
                        .unwrap_or(now),
                    updated_time: now,
                };
                match CacheKind::for_existing(existing.is_some()) {
                    CacheKind::Insert => db.pck_crls().create(row).await,
                    CacheKind::Refresh => db.pck_crls().update(row).await,
                }
            })
            .await
    }

    async fn lazy_cache_fmspc_tcb_info(&self, fmspc: &str) -> Result<(), ScsError> {
        let db = Arc::clone(&self.db);
        let pcs = Arc::clone(&self.pcs);
        let key = fmspc.to_string();
        let fmspc = key.clone();
        self.tcb_flights
            .run(&key, move || async move {
                let reply = pcs.get_tcb_info(&fmspc).await?;
                save_fmspc_tcb_info(db.as_ref(), &fmspc, &reply.tcb_info, &reply.issuer_chain).await
            })
            .await
    }

    async fn lazy_cache_qe_identity(&self) -> Result<(), ScsError> {
        let db = Arc::clone(&self.db);
        let pcs = Arc::clone(&self.pcs);
        self.qe_flights
            .run("qe_identity", move || async move {
                let reply = pcs.get_qe_identity().await?;
                let existing = db.qe_identities().retrieve().await?;
                let now = Utc::now();
                let row = qe_identity::Model {
                    id: qe_identity::SINGLETON_ID,
                    qe_info: reply.qe_info,
                    qe_issuer_chain: reply.issuer_chain,
                    created_time: existing
                        .as_ref()
                        .map(|row| row.created_time)
                        .unwrap_or(now),
                    updated_time: now,
                };
                match CacheKind::for_existing(existing.is_some()) {
                    CacheKind::Insert => db.qe_identities().create(row).await,
                    CacheKind::Refresh => db.qe_identities().update(row).await,
                }
            })
            .await
    }
}

/// Calls `/pckcerts`, filters unissued entries, fetches the matching TCB
/// info and selects the certificate for the platform's raw TCB.
async fn fetch_pck_cert_info(
    pcs: &dyn ProvisioningClient,
    platform_row: &platform::Model,
) -> Result<FetchedCollateral, ScsError> {
    if platform_row.enc_ppid.is_empty() && platform_row.manifest.is_empty() {
        return Err(ScsError::InvalidInput(
            "invalid request, enc_ppid and platform_manifest are null".to_string(),
        ));
    }

    let reply = pcs
        .get_pck_certs(&PckCertsQuery {
            enc_ppid: platform_row.enc_ppid.clone(),
            manifest: platform_row.manifest.clone(),
            pce_id: platform_row.pce_id.clone(),
        })
        .await?;

    if !validate_input(InputKind::Ca, &reply.ca_type) {
        return Err(ScsError::UpstreamError {
            status: 200,
            dump: format!("unknown pck certificate ca type {:?}", reply.ca_type),
        });
    }

    let mut certs = Vec::new();
    let mut tcbms = Vec::new();
    for entry in &reply.entries {
        if entry.cert == NOT_AVAILABLE {
            continue;
        }
        let decoded = percent_decode_str(&entry.cert)
            .decode_utf8()
            .map_err(|err| ScsError::UpstreamError {
                status: 200,
                dump: format!("undecodable certificate in pckcerts response: {err}"),
            })?;
        certs.push(decoded.into_owned());
        tcbms.push(entry.tcbm.to_lowercase());
    }

    let tcb_reply = pcs.get_tcb_info(&reply.fmspc).await?;

    let raw = RawTcb::decode(
        &platform_row.cpu_svn,
        &platform_row.pce_svn,
        &platform_row.pce_id,
    )?;
    let cert_index = selector::select_best_pck_cert(&raw, &certs, &tcb_reply.tcb_info)?;

    Ok(FetchedCollateral {
        certs,
        tcbms,
        cert_index,
        fmspc: reply.fmspc,
        ca_type: reply.ca_type,
        issuer_chain: reply.issuer_chain,
        tcb_info: tcb_reply.tcb_info,
        tcb_issuer_chain: tcb_reply.issuer_chain,
    })
}

/// Writes one platform's collateral. The TCB info row goes in before the
/// certificate row that references its FMSPC; each row keeps its original
/// creation stamp across overwrites.
async fn persist_platform_collateral(
    db: &dyn ScsDatabase,
    platform_row: &platform::Model,
    fetched: &FetchedCollateral,
) -> Result<(), ScsError> {
    let now = Utc::now();

    let existing_chain = db.pck_cert_chains().retrieve().await?;
    let chain_row = pck_cert_chain::Model {
        id: pck_cert_chain::SINGLETON_ID,
        pck_cert_chain: fetched.issuer_chain.clone(),
        created_time: existing_chain
            .as_ref()
            .map(|row| row.created_time)
            .unwrap_or(now),
        updated_time: now,
    };
    match CacheKind::for_existing(existing_chain.is_some()) {
        CacheKind::Insert => db.pck_cert_chains().create(chain_row).await?,
        CacheKind::Refresh => db.pck_cert_chains().update(chain_row).await?,
    }

    save_fmspc_tcb_info(db, &fetched.fmspc, &fetched.tcb_info, &fetched.tcb_issuer_chain).await?;

    let existing_cert = db.pck_certs().retrieve(&platform_row.qe_id).await?;
    let cert_row = pck_cert::Model {
        qe_id: platform_row.qe_id.clone(),
        pce_id: platform_row.pce_id.clone(),
        fmspc: fetched.fmspc.clone(),
        cert_index: fetched.cert_index as i32,
        pck_certs: StringList(fetched.certs.clone()),
        tcbms: StringList(fetched.tcbms.clone()),
        pck_cert_chain_id: pck_cert_chain::SINGLETON_ID,
        created_time: existing_cert
            .as_ref()
            .map(|row| row.created_time)
            .unwrap_or(now),
        updated_time: now,
    };
    match CacheKind::for_existing(existing_cert.is_some()) {
        CacheKind::Insert => db.pck_certs().create(cert_row).await?,
        CacheKind::Refresh => db.pck_certs().update(cert_row).await?,
    }

    let existing_platform = db.platforms().retrieve(&platform_row.qe_id).await?;
    let mut platform_update = platform_row.clone();
    platform_update.fmspc = fetched.fmspc.clone();
    platform_update.updated_time = now;
    platform_update.created_time = existing_platform
        .as_ref()
        .map(|row| row.created_time)
        .unwrap_or(now);
    match CacheKind::for_existing(existing_platform.is_some()) {
        CacheKind::Insert => db.platforms().create(platform_update).await?,
        CacheKind::Refresh => db.platforms().update(platform_update).await?,
    }

    let tcbm = fetched
        .tcbms
        .get(fetched.cert_index)
        .cloned()
        .ok_or_else(|| ScsError::Internal("selected certificate has no tcbm".to_string()))?;
    let existing_tcb = db.platform_tcbs().retrieve(&platform_row.qe_id).await?;
    let tcb_row = platform_tcb::Model {
        qe_id: platform_row.qe_id.clone(),
        pce_id: platform_row.pce_id.clone(),
        cpu_svn: platform_row.cpu_svn.clone(),
        pce_svn: platform_row.pce_svn.clone(),
        tcbm,
        created_time: existing_tcb
            .as_ref()
            .map(|row| row.created_time)
            .unwrap_or(now),
        updated_time: now,
    };
    match CacheKind::for_existing(existing_tcb.is_some()) {
        CacheKind::Insert => db.platform_tcbs().create(tcb_row).await?,
        CacheKind::Refresh => db.platform_tcbs().update(tcb_row).await?,
    }

    Ok(())
}

async fn save_fmspc_tcb_info(
    db: &dyn ScsDatabase,
    fmspc: &str,
    tcb_info: &str,
    issuer_chain: &str,
) -> Result<(), ScsError> {
    let existing = db.fmspc_tcb_infos().retrieve(fmspc).await?;
    let now = Utc::now();
    let row = fmspc_tcb_info::Model {
        fmspc: fmspc.to_string(),
        tcb_info: tcb_info.to_string(),
        tcb_info_issuer_chain: issuer_chain.to_string(),
        created_time: existing.as_ref().map(|row| row.created_time).unwrap_or(now),
        updated_time: now,
    };
    match CacheKind::for_existing(existing.is_some()) {
        CacheKind::Insert => db.fmspc_tcb_infos().create(row).await,
        CacheKind::Refresh => db.fmspc_tcb_infos().update(row).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use base64::Engine as _;

    use super::*;
    use crate::repository::memory::MemDatabase;
    use crate::test_util::{FakePcs, UpstreamFixture};

    const QE_ID: &str = "00112233445566778899aabbccddeeff";

    fn push_request() -> PlatformPush {
        PlatformPush {
            enc_ppid: "ab".repeat(384),
            cpu_svn: "00".repeat(16),
            pce_svn: "0100".to_string(),
            pce_id: "0000".to_string(),
            qe_id: QE_ID.to_string(),
            manifest: String::new(),
        }
    }

    fn engine(fixture: UpstreamFixture) -> (LazyCache, Arc<MemDatabase>, Arc<FakePcs>) {
        let db = Arc::new(MemDatabase::default());
        let pcs = Arc::new(FakePcs::new(fixture));
        let cache = LazyCache::new(db.clone() as Arc<dyn ScsDatabase>, pcs.clone());
        (cache, db, pcs)
    }

    #[tokio::test]
    async fn happy_push_selects_and_persists_everything() {
        let (cache, db, pcs) = engine(UpstreamFixture::two_certs());

        let outcome = cache.push_platform(push_request()).await.unwrap();
        assert_eq!(outcome, PushOutcome::Created);
        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 1);

        let cert_row = db.pck_certs().retrieve(QE_ID).await.unwrap().unwrap();
        assert_eq!(cert_row.cert_index, 1);
        assert_eq!(cert_row.pck_certs.0.len(), 2);
        assert_eq!(cert_row.pck_certs.0.len(), cert_row.tcbms.0.len());
        assert!((cert_row.cert_index as usize) < cert_row.pck_certs.0.len());
        assert_eq!(cert_row.fmspc, UpstreamFixture::FMSPC);

        let platform_row = db.platforms().retrieve(QE_ID).await.unwrap().unwrap();
        assert_eq!(platform_row.fmspc, UpstreamFixture::FMSPC);

        // The TCB info row the certificate references must exist.
        assert!(db
            .fmspc_tcb_infos()
            .retrieve(&platform_row.fmspc)
            .await
            .unwrap()
            .is_some());

        let tcb_row = db.platform_tcbs().retrieve(QE_ID).await.unwrap().unwrap();
        assert_eq!(tcb_row.tcbm, cert_row.tcbms.0[1]);

        assert!(db.pck_cert_chains().retrieve().await.unwrap().is_some());
        assert!(db.qe_identities().retrieve().await.unwrap().is_some());

        let crl_row = db.pck_crls().retrieve("processor").await.unwrap().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&crl_row.pck_crl)
            .unwrap();
        assert_eq!(decoded, UpstreamFixture::CRL_BODY);
    }

    #[tokio::test]
    async fn duplicate_push_skips_the_upstream() {
        let (cache, _db, pcs) = engine(UpstreamFixture::two_certs());

        cache.push_platform(push_request()).await.unwrap();
        let second = cache.push_platform(push_request()).await.unwrap();
        assert_eq!(second, PushOutcome::AlreadyCached);
        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_pushes_share_one_pckcerts_call() {
        let mut fixture = UpstreamFixture::two_certs();
        fixture.delay = Some(Duration::from_millis(30));
        let (cache, _db, pcs) = engine(fixture);
        let cache = Arc::new(cache);

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.push_platform(push_request()).await })
        };
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.push_platform(push_request()).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_on_an_empty_cache_is_not_found() {
        let (cache, _db, pcs) = engine(UpstreamFixture::two_certs());
        let err = cache.refresh(None).await.unwrap_err();
        assert!(matches!(err, ScsError::NotFound(_)));
        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_overwrites_rows_and_preserves_keys() {
        let (cache, db, pcs) = engine(UpstreamFixture::two_certs());
        cache.push_platform(push_request()).await.unwrap();

        let before = db.pck_certs().retrieve(QE_ID).await.unwrap().unwrap();
        cache.refresh(None).await.unwrap();
        let after = db.pck_certs().retrieve(QE_ID).await.unwrap().unwrap();

        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(after.qe_id, before.qe_id);
        assert_eq!(after.fmspc, before.fmspc);
        assert_eq!(after.cert_index, before.cert_index);
        assert_eq!(after.created_time, before.created_time);
        assert!(after.updated_time >= before.updated_time);

        let platform_row = db.platforms().retrieve(QE_ID).await.unwrap().unwrap();
        assert_eq!(platform_row.qe_id, QE_ID);
        let crl_row = db.pck_crls().retrieve("processor").await.unwrap().unwrap();
        assert_eq!(crl_row.ca, "processor");
    }

    #[tokio::test]
    async fn certs_only_refresh_leaves_other_collateral_alone() {
        let (cache, _db, pcs) = engine(UpstreamFixture::two_certs());
        cache.push_platform(push_request()).await.unwrap();

        cache.refresh(Some(RefreshSelection::Certs)).await.unwrap();
        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pcs.crl_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pcs.qe_calls.load(Ordering::SeqCst), 1);

        cache.refresh(Some(RefreshSelection::Tcbs)).await.unwrap();
        assert_eq!(pcs.pckcerts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pcs.crl_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pcs.qe_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tcb_status_reports_up_to_date_after_a_push() {
        let (cache, _db, _pcs) = engine(UpstreamFixture::two_certs());
        cache.push_platform(push_request()).await.unwrap();

        let report = cache.tcb_status(QE_ID).await.unwrap();
        assert!(report.up_to_date);
        assert_eq!(report.message, "TCB Status is UpToDate");
    }

    #[tokio::test]
    async fn tcb_status_reports_stale_when_levels_require_more() {
        let (cache, _db, _pcs) = engine(UpstreamFixture::stale_level());
        cache.push_platform(push_request()).await.unwrap();

        let report = cache.tcb_status(QE_ID).await.unwrap();
        assert!(!report.up_to_date);
        assert_eq!(report.message, "TCB Status is not UpToDate");
    }

    #[tokio::test]
    async fn tcb_status_for_an_unknown_platform_is_not_found() {
        let (cache, _db, _pcs) = engine(UpstreamFixture::two_certs());
        let err = cache.tcb_status(QE_ID).await.unwrap_err();
        assert!(matches!(err, ScsError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_unissued_certificates_fail_selection() {
        let mut fixture = UpstreamFixture::two_certs();
        for entry in &mut fixture.entries {
            entry.cert = "Not available".to_string();
        }
        let (cache, db, _pcs) = engine(fixture);

        let err = cache.push_platform(push_request()).await.unwrap_err();
        assert!(matches!(err, ScsError::Selection(_)));
        assert!(db.platforms().retrieve(QE_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_ca_type_header_is_an_upstream_error() {
        let mut fixture = UpstreamFixture::two_certs();
        fixture.ca_type = "root".to_string();
        let (cache, _db, _pcs) = engine(fixture);

        let err = cache.push_platform(push_request()).await.unwrap_err();
        assert!(matches!(err, ScsError::UpstreamError { .. }));
    }

    #[tokio::test]
    async fn failed_qe_fetch_leaves_platform_rows_for_a_later_refresh() {
        let mut fixture = UpstreamFixture::two_certs();
        fixture.fail_qe_identity = true;
        let (cache, db, _pcs) = engine(fixture);

        let err = cache.push_platform(push_request()).await.unwrap_err();
        assert!(matches!(err, ScsError::UpstreamTimeout(_)));

        // Platform collateral persisted before the failing step stays.
        assert!(db.platforms().retrieve(QE_ID).await.unwrap().is_some());
        assert!(db.pck_certs().retrieve(QE_ID).await.unwrap().is_some());
        assert!(db.qe_identities().retrieve().await.unwrap().is_none());

        // A retried push sees the cached platform.
        let second = cache.push_platform(push_request()).await.unwrap();
        assert_eq!(second, PushOutcome::AlreadyCached);

        // The collateral walk reports the missing singleton.
        let err = cache.refresh_non_pck_collateral().await.unwrap_err();
        assert!(matches!(err, ScsError::NotFound(_)));
    }

    #[tokio::test]
    async fn manifest_push_prefers_the_manifest() {
        let (cache, _db, pcs) = engine(UpstreamFixture::two_certs());
        let mut push = push_request();
        push.manifest = "cc".repeat(100);
        cache.push_platform(push).await.unwrap();
        assert_eq!(
            pcs.last_identity_param.lock().unwrap().as_deref(),
            Some("platform_manifest")
        );
    }
}
