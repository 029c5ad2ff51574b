use x509_parser::oid_registry::asn1_rs::{oid, FromDer, Integer, OctetString, Oid, Sequence};
use x509_parser::pem::Pem;
use x509_parser::prelude::{FromDer as X509FromDer, X509Certificate, X509Version};

use crate::tcb_info::{TcbInfoSigned, TCB_COMPONENT_COUNT};

const PPID_OID: &str = "1.2.840.113741.1.13.1.1";
const TCB_OID: &str = "1.2.840.113741.1.13.1.2";
const PCESVN_OID: &str = "1.2.840.113741.1.13.1.2.17";
const CPUSVN_OID: &str = "1.2.840.113741.1.13.1.2.18";
const PCEID_OID: &str = "1.2.840.113741.1.13.1.3";
const FMSPC_OID: &str = "1.2.840.113741.1.13.1.4";

/// Outcomes of certificate selection, matching the closed return set of
/// the DCAP PCK-cert-selection library (zero is success and has no code
/// here; selection returns the chosen index instead).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SelectionCode {
    InvalidArg = 1,
    InvalidPckCert = 2,
    CpusvnMismatch = 3,
    InvalidVersion = 4,
    Unexpected = 5,
    PceidMismatch = 6,
    PpidMismatch = 7,
    FmspcMismatch = 8,
    InvalidTcbInfo = 9,
    TcbInfoPceidMismatch = 10,
    UnsupportedTcbType = 11,
    RawTcbBelowAll = 12,
}

impl SelectionCode {
    pub fn message(&self) -> &'static str {
        match self {
            SelectionCode::InvalidArg => "invalid arguments provided for pck cert selection",
            SelectionCode::InvalidPckCert => "invalid pck certificate",
            SelectionCode::CpusvnMismatch => {
                "pck certificate cpusvn doesn't match tcb components"
            }
            SelectionCode::InvalidVersion => "invalid pck certificate version",
            SelectionCode::Unexpected => "pck cert selection returned unexpected error",
            SelectionCode::PceidMismatch => "pck pceid doesn't match other pcks",
            SelectionCode::PpidMismatch => "pck ppid doesn't match other pcks",
            SelectionCode::FmspcMismatch => "pck fmspc doesn't match other pcks",
            SelectionCode::InvalidTcbInfo => "invalid tcb info provided for pck cert selection",
            SelectionCode::TcbInfoPceidMismatch => "tcb info pceid does not match input pceid",
            SelectionCode::UnsupportedTcbType => "tcb info tcb type is not supported",
            SelectionCode::RawTcbBelowAll => "raw tcb is lower than all input pcks",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("could not decode platform raw tcb values")]
    InvalidPlatform,
    #[error("pck cert selection failed: {}", .0.message())]
    Code(SelectionCode),
}

impl From<SelectionCode> for SelectionError {
    fn from(code: SelectionCode) -> Self {
        SelectionError::Code(code)
    }
}

/// A platform's current raw TCB as pushed by the registration agent.
#[derive(Copy, Clone, Debug)]
pub struct RawTcb {
    pub cpu_svn: [u8; TCB_COMPONENT_COUNT],
    pub pce_svn: u16,
    pub pce_id: u16,
}

impl RawTcb {
    pub fn decode(cpu_svn_hex: &str, pce_svn_hex: &str, pce_id_hex: &str) -> Result<Self, SelectionError> {
        let cpu_svn_bytes = hex::decode(cpu_svn_hex).map_err(|_| SelectionError::InvalidPlatform)?;
        let cpu_svn: [u8; TCB_COMPONENT_COUNT] = cpu_svn_bytes
            .try_into()
            .map_err(|_| SelectionError::InvalidPlatform)?;
        let pce_svn =
            u16::from_str_radix(pce_svn_hex, 16).map_err(|_| SelectionError::InvalidPlatform)?;
        let pce_id =
            u16::from_str_radix(pce_id_hex, 16).map_err(|_| SelectionError::InvalidPlatform)?;
        Ok(Self { cpu_svn, pce_svn, pce_id })
    }
}

/// TCB-bearing fields of the SGX extension embedded in a PCK certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PckCertFields {
    pub ppid: Vec<u8>,
    pub cpu_svn: [u8; TCB_COMPONENT_COUNT],
    pub tcb_components: [u8; TCB_COMPONENT_COUNT],
    pub pce_svn: u16,
    pub pce_id: u16,
    pub fmspc: [u8; 6],
}

/// Picks the candidate whose embedded TCB is the highest that does not
/// exceed the platform's raw TCB, per the DCAP selection rules. Returns
/// the index into `pck_certs`.
pub fn select_best_pck_cert(
    raw: &RawTcb,
    pck_certs: &[String],
    tcb_info_json: &str,
) -> Result<usize, SelectionError> {
    if pck_certs.is_empty() {
        return Err(SelectionCode::InvalidArg.into());
    }

    let doc: TcbInfoSigned =
        serde_json::from_str(tcb_info_json).map_err(|_| SelectionCode::InvalidTcbInfo)?;
    let tcb_info = &doc.tcb_info;
    if tcb_info.tcb_type != 0 {
        return Err(SelectionCode::UnsupportedTcbType.into());
    }
    let tcb_info_pce_id = u16::from_str_radix(&tcb_info.pce_id, 16)
        .map_err(|_| SelectionCode::InvalidTcbInfo)?;
    if tcb_info_pce_id != raw.pce_id {
        return Err(SelectionCode::TcbInfoPceidMismatch.into());
    }
    let tcb_info_fmspc: [u8; 6] = hex::decode(&tcb_info.fmspc)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(SelectionCode::InvalidTcbInfo)?;

    let parsed: Vec<PckCertFields> = pck_certs
        .iter()
        .map(|pem| parse_pck_cert(pem))
        .collect::<Result<_, _>>()?;

    let first = &parsed[0];
    for cert in &parsed {
        if cert.pce_id != first.pce_id {
            return Err(SelectionCode::PceidMismatch.into());
        }
        if cert.ppid != first.ppid {
            return Err(SelectionCode::PpidMismatch.into());
        }
        if cert.fmspc != first.fmspc {
            return Err(SelectionCode::FmspcMismatch.into());
        }
    }
    if first.pce_id != raw.pce_id {
        return Err(SelectionCode::PceidMismatch.into());
    }
    if first.fmspc != tcb_info_fmspc {
        return Err(SelectionCode::FmspcMismatch.into());
    }
    // With tcb type 0 the CPU-SVN decomposes into the component vector
    // unchanged, so both views embedded in the certificate must agree.
    for cert in &parsed {
        if cert.cpu_svn != cert.tcb_components {
            return Err(SelectionCode::CpusvnMismatch.into());
        }
    }

    select_among(raw, &parsed)
}

/// Core selection over already-parsed certificates: keep candidates not
/// exceeding the raw TCB, then take the highest; the earliest candidate
/// wins ties and incomparable pairs.
pub fn select_among(raw: &RawTcb, certs: &[PckCertFields]) -> Result<usize, SelectionError> {
    let mut best: Option<usize> = None;
    for (idx, cert) in certs.iter().enumerate() {
        let within = cert.pce_svn <= raw.pce_svn
            && cert
                .tcb_components
                .iter()
                .zip(raw.cpu_svn.iter())
                .all(|(cert_svn, raw_svn)| cert_svn <= raw_svn);
        if !within {
            continue;
        }
        match best {
            None => best = Some(idx),
            Some(current) => {
                if strictly_higher(cert, &certs[current]) {
                    best = Some(idx);
                }
            }
        }
    }
    best.ok_or_else(|| SelectionCode::RawTcbBelowAll.into())
}

fn strictly_higher(candidate: &PckCertFields, current: &PckCertFields) -> bool {
    let none_lower = candidate.pce_svn >= current.pce_svn
        && candidate
            .tcb_components
            .iter()
            .zip(current.tcb_components.iter())
            .all(|(cand, cur)| cand >= cur);
    let any_higher = candidate.pce_svn > current.pce_svn
        || candidate
            .tcb_components
            .iter()
            .zip(current.tcb_components.iter())
            .any(|(cand, cur)| cand > cur);
    none_lower && any_higher
}

/// Extracts the SGX extension fields from one PEM-encoded PCK certificate.
pub fn parse_pck_cert(pem: &str) -> Result<PckCertFields, SelectionError> {
    let pem_block = Pem::iter_from_buffer(pem.as_bytes())
        .next()
        .ok_or(SelectionCode::InvalidPckCert)?
        .map_err(|_| SelectionCode::InvalidPckCert)?;
    let (_, cert) = X509Certificate::from_der(&pem_block.contents)
        .map_err(|_| SelectionCode::InvalidPckCert)?;
    if cert.version() != X509Version::V3 {
        return Err(SelectionCode::InvalidVersion.into());
    }

    let extension = cert
        .get_extension_unique(&oid!(1.2.840.113741.1.13.1))
        .map_err(|_| SelectionCode::InvalidPckCert)?
        .ok_or(SelectionCode::InvalidPckCert)?;
    parse_sgx_extension(extension.value)
}

fn parse_sgx_extension(der: &[u8]) -> Result<PckCertFields, SelectionError> {
    let (_, outer) = Sequence::from_der(der).map_err(|_| SelectionCode::InvalidPckCert)?;

    let mut ppid: Option<Vec<u8>> = None;
    let mut cpu_svn: Option<[u8; TCB_COMPONENT_COUNT]> = None;
    let mut tcb_components: Option<[u8; TCB_COMPONENT_COUNT]> = None;
    let mut pce_svn: Option<u16> = None;
    let mut pce_id: Option<u16> = None;
    let mut fmspc: Option<[u8; 6]> = None;

    let mut rest: &[u8] = outer.content.as_ref();
    while !rest.is_empty() {
        let (next, entry) = Sequence::from_der(rest).map_err(|_| SelectionCode::InvalidPckCert)?;
        rest = next;
        let content: &[u8] = entry.content.as_ref();
        let (value_der, oid) = Oid::from_der(content).map_err(|_| SelectionCode::InvalidPckCert)?;
        match oid.to_id_string().as_str() {
            PPID_OID => {
                let (_, octets) =
                    OctetString::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                ppid = Some(octets.into_cow().to_vec());
            }
            TCB_OID => {
                let (comps, tcb_pce_svn, tcb_cpu_svn) = parse_tcb_sequence(value_der)?;
                tcb_components = Some(comps);
                pce_svn = Some(tcb_pce_svn);
                cpu_svn = Some(tcb_cpu_svn);
            }
            PCEID_OID => {
                let (_, octets) =
                    OctetString::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                let bytes: [u8; 2] = octets
                    .into_cow()
                    .as_ref()
                    .try_into()
                    .map_err(|_| SelectionCode::InvalidPckCert)?;
                pce_id = Some(u16::from_be_bytes(bytes));
            }
            FMSPC_OID => {
                let (_, octets) =
                    OctetString::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                let bytes: [u8; 6] = octets
                    .into_cow()
                    .as_ref()
                    .try_into()
                    .map_err(|_| SelectionCode::InvalidPckCert)?;
                fmspc = Some(bytes);
            }
            // SGX type, platform instance id and configuration flags do
            // not participate in selection.
            _ => {}
        }
    }

    match (ppid, cpu_svn, tcb_components, pce_svn, pce_id, fmspc) {
        (Some(ppid), Some(cpu_svn), Some(tcb_components), Some(pce_svn), Some(pce_id), Some(fmspc)) => {
            Ok(PckCertFields {
                ppid,
                cpu_svn,
                tcb_components,
                pce_svn,
                pce_id,
                fmspc,
            })
        }
        _ => Err(SelectionCode::InvalidPckCert.into()),
    }
}

fn parse_tcb_sequence(
    der: &[u8],
) -> Result<([u8; TCB_COMPONENT_COUNT], u16, [u8; TCB_COMPONENT_COUNT]), SelectionError> {
    let (_, tcb_seq) = Sequence::from_der(der).map_err(|_| SelectionCode::InvalidPckCert)?;

    let mut components = [0u8; TCB_COMPONENT_COUNT];
    let mut seen_components = 0usize;
    let mut pce_svn: Option<u16> = None;
    let mut cpu_svn: Option<[u8; TCB_COMPONENT_COUNT]> = None;

    let mut rest: &[u8] = tcb_seq.content.as_ref();
    while !rest.is_empty() {
        let (next, entry) = Sequence::from_der(rest).map_err(|_| SelectionCode::InvalidPckCert)?;
        rest = next;
        let content: &[u8] = entry.content.as_ref();
        let (value_der, oid) = Oid::from_der(content).map_err(|_| SelectionCode::InvalidPckCert)?;
        let oid_str = oid.to_id_string();
        match oid_str.as_str() {
            PCESVN_OID => {
                let (_, value) =
                    Integer::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                let value = value.as_u32().map_err(|_| SelectionCode::InvalidPckCert)?;
                pce_svn =
                    Some(u16::try_from(value).map_err(|_| SelectionCode::InvalidPckCert)?);
            }
            CPUSVN_OID => {
                let (_, octets) =
                    OctetString::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                let bytes: [u8; TCB_COMPONENT_COUNT] = octets
                    .into_cow()
                    .as_ref()
                    .try_into()
                    .map_err(|_| SelectionCode::InvalidPckCert)?;
                cpu_svn = Some(bytes);
            }
            other => {
                if let Some(component) = component_index(other) {
                    let (_, value) =
                        Integer::from_der(value_der).map_err(|_| SelectionCode::InvalidPckCert)?;
                    let value = value.as_u32().map_err(|_| SelectionCode::InvalidPckCert)?;
                    components[component] =
                        u8::try_from(value).map_err(|_| SelectionCode::InvalidPckCert)?;
                    seen_components += 1;
                }
            }
        }
    }

    if seen_components != TCB_COMPONENT_COUNT {
        return Err(SelectionCode::InvalidPckCert.into());
    }
    match (pce_svn, cpu_svn) {
        (Some(pce_svn), Some(cpu_svn)) => Ok((components, pce_svn, cpu_svn)),
        _ => Err(SelectionCode::InvalidPckCert.into()),
    }
}

/// Maps a TCB component OID (`…13.1.2.1` through `…13.1.2.16`) to its
/// zero-based slot.
fn component_index(oid_str: &str) -> Option<usize> {
    let suffix = oid_str.strip_prefix("1.2.840.113741.1.13.1.2.")?;
    let arc: usize = suffix.parse().ok()?;
    if (1..=TCB_COMPONENT_COUNT).contains(&arc) {
        Some(arc - 1)
    } else {
        None
    }
}
