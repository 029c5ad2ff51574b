//! Test fixtures: a minimal DER writer able to fabricate PCK-shaped
//! certificates carrying a real SGX extension, TCB info documents, and a
//! scripted stand-in for the provisioning service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use crate::error::ScsError;
use crate::pcs_client::{
    PckCertEntry, PckCertsQuery, PckCertsReply, PckCrlReply, ProvisioningClient, QeIdentityReply,
    TcbInfoReply,
};
use crate::tcb_info::{TcbComponents, TCB_COMPONENT_COUNT};

const SGX_EXT: [u64; 7] = [1, 2, 840, 113741, 1, 13, 1];

/// Knobs for a fabricated PCK certificate.
#[derive(Clone, Debug)]
pub struct CertSpec {
    pub ppid: Vec<u8>,
    pub tcb_components: [u8; TCB_COMPONENT_COUNT],
    pub pce_svn: u16,
    /// Defaults to `tcb_components` when `None` (tcb type 0 layout).
    pub cpu_svn: Option<[u8; TCB_COMPONENT_COUNT]>,
    pub pce_id: u16,
    pub fmspc: [u8; 6],
}

impl CertSpec {
    pub fn with_tcb(tcb_components: [u8; TCB_COMPONENT_COUNT], pce_svn: u16) -> Self {
        Self {
            ppid: vec![0x11; 16],
            tcb_components,
            pce_svn,
            cpu_svn: None,
            pce_id: 0,
            fmspc: [0x00, 0x90, 0x6e, 0xa1, 0x00, 0x00],
        }
    }
}

/// Builds a syntactically valid v3 certificate whose SGX extension holds
/// the spec's TCB fields. The signature is garbage; selection never
/// verifies signatures.
pub fn synthetic_pck_cert(spec: &CertSpec) -> String {
    let cpu_svn = spec.cpu_svn.unwrap_or(spec.tcb_components);

    let mut tcb_children: Vec<Vec<u8>> = Vec::new();
    for (i, comp) in spec.tcb_components.iter().enumerate() {
        let mut arcs = SGX_EXT.to_vec();
        arcs.extend([2, (i + 1) as u64]);
        tcb_children.push(oid_value(&arcs, der_int(u64::from(*comp))));
    }
    let mut pcesvn_arcs = SGX_EXT.to_vec();
    pcesvn_arcs.extend([2, 17]);
    tcb_children.push(oid_value(&pcesvn_arcs, der_int(u64::from(spec.pce_svn))));
    let mut cpusvn_arcs = SGX_EXT.to_vec();
    cpusvn_arcs.extend([2, 18]);
    tcb_children.push(oid_value(&cpusvn_arcs, der_octet(&cpu_svn)));

    let ext_value = der_seq(&[
        oid_value(&arcs_with(1), der_octet(&spec.ppid)),
        oid_value(&arcs_with(2), der_seq(&tcb_children)),
        oid_value(&arcs_with(3), der_octet(&spec.pce_id.to_be_bytes())),
        oid_value(&arcs_with(4), der_octet(&spec.fmspc)),
    ]);

    let extensions = der_explicit(
        3,
        der_seq(&[der_seq(&[der_oid(&SGX_EXT), der_octet(&ext_value)])]),
    );

    let ecdsa_sha256 = der_seq(&[der_oid(&[1, 2, 840, 10045, 4, 3, 2])]);
    let spki = der_seq(&[
        der_seq(&[
            der_oid(&[1, 2, 840, 10045, 2, 1]),
            der_oid(&[1, 2, 840, 10045, 3, 1, 7]),
        ]),
        der_bitstring(&[0x04; 65]),
    ]);

    let tbs = der_seq(&[
        der_explicit(0, der_int(2)),
        der_int(1),
        ecdsa_sha256.clone(),
        der_seq(&[]),
        der_seq(&[der_utctime("240101000000Z"), der_utctime("340101000000Z")]),
        der_seq(&[]),
        spki,
        extensions,
    ]);

    let cert = der_seq(&[tbs, ecdsa_sha256, der_bitstring(&[0u8; 8])]);
    pem_wrap(&cert)
}

/// A signed TCB info document (v2 layout) with the given levels, ordered
/// as supplied.
pub fn tcb_info_json(
    fmspc: &str,
    pce_id: &str,
    levels: &[([u8; TCB_COMPONENT_COUNT], u16, &str)],
) -> String {
    let levels: Vec<serde_json::Value> = levels
        .iter()
        .map(|(svns, pcesvn, status)| {
            serde_json::json!({
                "tcb": TcbComponents::from_svns(*svns, *pcesvn),
                "tcbDate": "2024-03-01T00:00:00Z",
                "tcbStatus": status,
            })
        })
        .collect();
    serde_json::json!({
        "tcbInfo": {
            "version": 2,
            "issueDate": "2024-05-01T00:00:00Z",
            "nextUpdate": "2024-06-01T00:00:00Z",
            "fmspc": fmspc,
            "pceId": pce_id,
            "tcbType": 0,
            "tcbEvaluationDataNumber": 12,
            "tcbLevels": levels,
        },
        "signature": "00",
    })
    .to_string()
}

fn arcs_with(last: u64) -> Vec<u64> {
    let mut arcs = SGX_EXT.to_vec();
    arcs.push(last);
    arcs
}

fn oid_value(arcs: &[u64], value: Vec<u8>) -> Vec<u8> {
    der_seq(&[der_oid(arcs), value])
}

fn der_node(tag: u8, content: Vec<u8>) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 128 {
        out.push(len as u8);
    } else {
        let mut len_bytes = Vec::new();
        let mut remaining = len;
        while remaining > 0 {
            len_bytes.insert(0, (remaining & 0xff) as u8);
            remaining >>= 8;
        }
        out.push(0x80 | len_bytes.len() as u8);
        out.extend(len_bytes);
    }
    out.extend(content);
    out
}

fn der_seq(children: &[Vec<u8>]) -> Vec<u8> {
    der_node(0x30, children.concat())
}

fn der_int(value: u64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    der_node(0x02, bytes)
}

fn der_octet(bytes: &[u8]) -> Vec<u8> {
    der_node(0x04, bytes.to_vec())
}

fn der_bitstring(bytes: &[u8]) -> Vec<u8> {
    let mut content = vec![0u8];
    content.extend_from_slice(bytes);
    der_node(0x03, content)
}

fn der_utctime(value: &str) -> Vec<u8> {
    der_node(0x17, value.as_bytes().to_vec())
}

fn der_oid(arcs: &[u64]) -> Vec<u8> {
    let mut content = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        content.extend(base128(arc));
    }
    der_node(0x06, content)
}

fn base128(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        out.insert(0, (value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out
}

fn der_explicit(tag: u8, inner: Vec<u8>) -> Vec<u8> {
    der_node(0xa0 | tag, inner)
}

/// Canned upstream responses for one test.
#[derive(Clone, Debug)]
pub struct UpstreamFixture {
    pub entries: Vec<PckCertEntry>,
    pub fmspc: String,
    pub ca_type: String,
    pub tcb_info: String,
    pub delay: Option<Duration>,
    pub fail_qe_identity: bool,
}

impl UpstreamFixture {
    pub const FMSPC: &'static str = "00906ea10000";
    pub const CRL_BODY: &'static [u8] = b"fake-der-crl-bytes";

    fn with_levels(levels: &[([u8; TCB_COMPONENT_COUNT], u16, &str)]) -> Self {
        let low = synthetic_pck_cert(&CertSpec::with_tcb([0; TCB_COMPONENT_COUNT], 2));
        let high = synthetic_pck_cert(&CertSpec::with_tcb([0; TCB_COMPONENT_COUNT], 0x0100));
        let entries = vec![
            PckCertEntry {
                tcbm: format!("{}{}", "ff".repeat(16), "ffff"),
                cert: "Not available".to_string(),
            },
            PckCertEntry {
                tcbm: format!("{}{}", "00".repeat(16), "0200"),
                cert: low,
            },
            PckCertEntry {
                tcbm: format!("{}{}", "00".repeat(16), "0001"),
                cert: high,
            },
        ];
        Self {
            entries,
            fmspc: Self::FMSPC.to_string(),
            ca_type: "processor".to_string(),
            tcb_info: tcb_info_json(Self::FMSPC, "0000", levels),
            delay: None,
            fail_qe_identity: false,
        }
    }

    /// Two issued certificates (plus one unissued) and a TCB level the
    /// higher certificate meets.
    pub fn two_certs() -> Self {
        Self::with_levels(&[([0; TCB_COMPONENT_COUNT], 0x0100, "UpToDate")])
    }

    /// Same certificates, but every TCB level requires more than the
    /// selected certificate carries.
    pub fn stale_level() -> Self {
        Self::with_levels(&[([1; TCB_COMPONENT_COUNT], 0x0200, "UpToDate")])
    }
}

/// Call-counting `ProvisioningClient` fed from an `UpstreamFixture`.
pub struct FakePcs {
    fixture: UpstreamFixture,
    pub pckcerts_calls: AtomicUsize,
    pub crl_calls: AtomicUsize,
    pub tcb_calls: AtomicUsize,
    pub qe_calls: AtomicUsize,
    pub last_identity_param: Mutex<Option<String>>,
}

impl FakePcs {
    pub fn new(fixture: UpstreamFixture) -> Self {
        Self {
            fixture,
            pckcerts_calls: AtomicUsize::new(0),
            crl_calls: AtomicUsize::new(0),
            tcb_calls: AtomicUsize::new(0),
            qe_calls: AtomicUsize::new(0),
            last_identity_param: Mutex::new(None),
        }
    }

    async fn maybe_delay(&self) {
        if let Some(delay) = self.fixture.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProvisioningClient for FakePcs {
    async fn get_pck_certs(&self, query: &PckCertsQuery) -> Result<PckCertsReply, ScsError> {
        self.pckcerts_calls.fetch_add(1, Ordering::SeqCst);
        let (param, _) = query.identity_param()?;
        *self.last_identity_param.lock().expect("identity param") = Some(param.to_string());
        self.maybe_delay().await;
        Ok(PckCertsReply {
            entries: self.fixture.entries.clone(),
            issuer_chain: "pck-issuer-chain".to_string(),
            fmspc: self.fixture.fmspc.clone(),
            ca_type: self.fixture.ca_type.clone(),
        })
    }

    async fn get_pck_crl(&self, _ca: &str) -> Result<PckCrlReply, ScsError> {
        self.crl_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        Ok(PckCrlReply {
            crl: UpstreamFixture::CRL_BODY.to_vec(),
            issuer_chain: "crl-issuer-chain".to_string(),
        })
    }

    async fn get_tcb_info(&self, _fmspc: &str) -> Result<TcbInfoReply, ScsError> {
        self.tcb_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        Ok(TcbInfoReply {
            tcb_info: self.fixture.tcb_info.clone(),
            issuer_chain: "tcb-issuer-chain".to_string(),
        })
    }

    async fn get_qe_identity(&self) -> Result<QeIdentityReply, ScsError> {
        self.qe_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fixture.fail_qe_identity {
            return Err(ScsError::UpstreamTimeout(
                "qe identity endpoint unreachable".to_string(),
            ));
        }
        Ok(QeIdentityReply {
            qe_info: r#"{"enclaveIdentity":{}}"#.to_string(),
            issuer_chain: "qe-issuer-chain".to_string(),
        })
    }
}

fn pem_wrap(der: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(der);
    let mut body = String::new();
    for chunk in encoded.as_bytes().chunks(64) {
        body.push_str(std::str::from_utf8(chunk).expect("base64 is ascii"));
        body.push('\n');
    }
    format!("-----BEGIN CERTIFICATE-----\n{body}-----END CERTIFICATE-----\n")
}
