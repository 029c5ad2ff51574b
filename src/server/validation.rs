use once_cell::sync::Lazy;
use regex::Regex;

/// Externally supplied identifiers, each with a fixed hex width (or a
/// closed word set). Checked before any repository or upstream work.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    EncryptedPpid,
    CpuSvn,
    PceSvn,
    PceId,
    QeId,
    Fmspc,
    Ca,
    RefreshType,
}

static ENC_PPID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{768}$").unwrap());
static CPU_SVN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());
static PCE_SVN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{4}$").unwrap());
static PCE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{4}$").unwrap());
static QE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());
static FMSPC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{12}$").unwrap());
static CA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(processor|platform)$").unwrap());
static TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(certs|tcbs)$").unwrap());

pub fn validate_input(kind: InputKind, value: &str) -> bool {
    let re: &Regex = match kind {
        InputKind::EncryptedPpid => &ENC_PPID_RE,
        InputKind::CpuSvn => &CPU_SVN_RE,
        InputKind::PceSvn => &PCE_SVN_RE,
        InputKind::PceId => &PCE_ID_RE,
        InputKind::QeId => &QE_ID_RE,
        InputKind::Fmspc => &FMSPC_RE,
        InputKind::Ca => &CA_RE,
        InputKind::RefreshType => &TYPE_RE,
    };
    re.is_match(value)
}
