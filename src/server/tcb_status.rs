use crate::error::ScsError;
use crate::tcb_info::{TcbInfoSigned, TCB_COMPONENT_COUNT};

/// Three-way outcome of comparing a platform TCB against one TCB level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TcbCompare {
    Error,
    EqualOrGreater,
    Lower,
    Undefined,
}

/// TCBM decoded into its raw parts: 16 CPU-SVN component bytes followed
/// by a little-endian 16-bit PCE SVN.
#[derive(Copy, Clone, Debug)]
pub struct RawTcbm {
    pub components: [u8; TCB_COMPONENT_COUNT],
    pub pce_svn: u16,
}

pub fn decode_tcbm(tcbm_hex: &str) -> Result<RawTcbm, ScsError> {
    let bytes = hex::decode(tcbm_hex)
        .map_err(|e| ScsError::Internal(format!("cannot decode tcbm: {e}")))?;
    if bytes.len() != TCB_COMPONENT_COUNT + 2 {
        return Err(ScsError::Internal(format!(
            "tcbm must be {} bytes, got {}",
            TCB_COMPONENT_COUNT + 2,
            bytes.len()
        )));
    }
    let mut components = [0u8; TCB_COMPONENT_COUNT];
    components.copy_from_slice(&bytes[..TCB_COMPONENT_COUNT]);
    let pce_svn = u16::from_le_bytes([bytes[TCB_COMPONENT_COUNT], bytes[TCB_COMPONENT_COUNT + 1]]);
    Ok(RawTcbm { components, pce_svn })
}

/// Compares the PCK-side TCB against one level's TCB. Both vectors must
/// carry exactly sixteen components; PCE SVNs compare as unsigned 16-bit.
pub fn compare_tcb_components(
    pck_components: &[u8],
    pck_pce_svn: u16,
    tcb_components: &[u8],
    tcb_pce_svn: u16,
) -> TcbCompare {
    if pck_components.len() != TCB_COMPONENT_COUNT || tcb_components.len() != TCB_COMPONENT_COUNT {
        return TcbCompare::Error;
    }

    let mut left_lower = pck_pce_svn < tcb_pce_svn;
    let mut right_lower = pck_pce_svn > tcb_pce_svn;

    for (pck, tcb) in pck_components.iter().zip(tcb_components.iter()) {
        if pck < tcb {
            left_lower = true;
        }
        if pck > tcb {
            right_lower = true;
        }
    }

    if left_lower && right_lower {
        return TcbCompare::Undefined;
    }
    if left_lower {
        return TcbCompare::Lower;
    }
    TcbCompare::EqualOrGreater
}

/// Walks the ordered TCB levels and returns the status of the first level
/// the selected certificate's TCBM meets or exceeds, or `None` when no
/// level matches.
pub fn evaluate_tcb_status(tcbm_hex: &str, tcb_info_json: &str) -> Result<Option<String>, ScsError> {
    let tcbm = decode_tcbm(tcbm_hex)?;
    let doc: TcbInfoSigned = serde_json::from_str(tcb_info_json)
        .map_err(|e| ScsError::Internal(format!("cannot decode tcbinfo: {e}")))?;

    for level in &doc.tcb_info.tcb_levels {
        let level_components = level.tcb.svns();
        let outcome = compare_tcb_components(
            &tcbm.components,
            tcbm.pce_svn,
            &level_components,
            level.tcb.pcesvn,
        );
        if outcome == TcbCompare::EqualOrGreater {
            return Ok(Some(level.tcb_status.clone()));
        }
    }
    Ok(None)
}

/// Client-visible verdict. `UpToDate` and `ConfigurationNeeded` count as
/// up to date; any other status, or no matching level, does not.
pub fn verdict(status: Option<&str>) -> (bool, &'static str) {
    match status {
        Some("UpToDate") | Some("ConfigurationNeeded") => (true, "TCB Status is UpToDate"),
        _ => (false, "TCB Status is not UpToDate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcb_info::TcbComponents;

    fn tcb_info_json(levels: &[(u8, u16, &str)]) -> String {
        let levels: Vec<serde_json::Value> = levels
            .iter()
            .map(|(svn, pcesvn, status)| {
                let comps = TcbComponents::from_svns([*svn; TCB_COMPONENT_COUNT], *pcesvn);
                serde_json::json!({
                    "tcb": comps,
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
                "fmspc": "00906ea10000",
                "pceId": "0000",
                "tcbType": 0,
                "tcbEvaluationDataNumber": 12,
                "tcbLevels": levels,
            },
            "signature": "00",
        })
        .to_string()
    }

    fn tcbm(svn: u8, pce_svn: u16) -> String {
        let mut bytes = [svn; TCB_COMPONENT_COUNT].to_vec();
        bytes.extend_from_slice(&pce_svn.to_le_bytes());
        hex::encode(bytes)
    }

    #[test]
    fn first_matching_level_wins() {
        let info = tcb_info_json(&[(5, 10, "UpToDate"), (1, 1, "OutOfDate")]);
        let status = evaluate_tcb_status(&tcbm(5, 10), &info).unwrap();
        assert_eq!(status.as_deref(), Some("UpToDate"));
    }

    #[test]
    fn lower_tcb_falls_through_to_later_level() {
        let info = tcb_info_json(&[(5, 10, "UpToDate"), (1, 1, "OutOfDate")]);
        let status = evaluate_tcb_status(&tcbm(2, 3), &info).unwrap();
        assert_eq!(status.as_deref(), Some("OutOfDate"));
    }

    #[test]
    fn no_matching_level_yields_none() {
        let info = tcb_info_json(&[(5, 10, "UpToDate")]);
        let status = evaluate_tcb_status(&tcbm(0, 0), &info).unwrap();
        assert_eq!(status, None);
        assert_eq!(verdict(status.as_deref()), (false, "TCB Status is not UpToDate"));
    }

    #[test]
    fn configuration_needed_counts_as_up_to_date() {
        assert_eq!(verdict(Some("ConfigurationNeeded")).0, true);
        assert_eq!(verdict(Some("OutOfDate")).0, false);
        assert_eq!(verdict(Some("SWHardeningNeeded")).0, false);
    }

    #[test]
    fn incomparable_vectors_are_undefined() {
        let mut pck = [5u8; TCB_COMPONENT_COUNT];
        pck[0] = 0;
        let tcb = [3u8; TCB_COMPONENT_COUNT];
        assert_eq!(compare_tcb_components(&pck, 10, &tcb, 10), TcbCompare::Undefined);
    }

    #[test]
    fn pce_svn_uses_unsigned_16_bit_semantics() {
        let comps = [0u8; TCB_COMPONENT_COUNT];
        // 0x8000 is greater than 0x7fff when unsigned.
        assert_eq!(
            compare_tcb_components(&comps, 0x8000, &comps, 0x7fff),
            TcbCompare::EqualOrGreater
        );
        assert_eq!(
            compare_tcb_components(&comps, 0x7fff, &comps, 0x8000),
            TcbCompare::Lower
        );
    }

    #[test]
    fn wrong_vector_length_is_an_error() {
        let short = [0u8; 15];
        let full = [0u8; TCB_COMPONENT_COUNT];
        assert_eq!(compare_tcb_components(&short, 0, &full, 0), TcbCompare::Error);
        assert_eq!(compare_tcb_components(&full, 0, &short, 0), TcbCompare::Error);
    }

    #[test]
    fn tcbm_decodes_little_endian_pce_svn() {
        let parsed = decode_tcbm(&tcbm(7, 0x0102)).unwrap();
        assert_eq!(parsed.components, [7u8; TCB_COMPONENT_COUNT]);
        assert_eq!(parsed.pce_svn, 0x0102);
    }

    #[test]
    fn malformed_tcbm_is_rejected()  {
        assert!(decode_tcbm("zz").is_err());
        assert!(decode_tcbm("aabb").is_err());
    }
}
