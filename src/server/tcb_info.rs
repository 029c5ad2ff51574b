use serde::{Deserialize, Serialize};

/// Number of CPU-SVN components in a TCB level.
pub const TCB_COMPONENT_COUNT: usize = 16;

/// Signed TCB info document as served by `GET /tcb`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TcbInfoSigned {
    #[serde(rename = "tcbInfo")]
    pub tcb_info: TcbInfoData,
    #[serde(default)]
    pub signature: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcbInfoData {
    pub version: u32,
    #[serde(default)]
    pub issue_date: String,
    #[serde(default)]
    pub next_update: String,
    pub fmspc: String,
    pub pce_id: String,
    #[serde(default)]
    pub tcb_type: u32,
    #[serde(default)]
    pub tcb_evaluation_data_number: u32,
    pub tcb_levels: Vec<TcbLevel>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcbLevel {
    pub tcb: TcbComponents,
    #[serde(default)]
    pub tcb_date: String,
    pub tcb_status: String,
}

/// The sixteen named component SVNs plus the PCE SVN of one TCB level.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TcbComponents {
    pub sgxtcbcomp01svn: u8,
    pub sgxtcbcomp02svn: u8,
    pub sgxtcbcomp03svn: u8,
    pub sgxtcbcomp04svn: u8,
    pub sgxtcbcomp05svn: u8,
    pub sgxtcbcomp06svn: u8,
    pub sgxtcbcomp07svn: u8,
    pub sgxtcbcomp08svn: u8,
    pub sgxtcbcomp09svn: u8,
    pub sgxtcbcomp10svn: u8,
    pub sgxtcbcomp11svn: u8,
    pub sgxtcbcomp12svn: u8,
    pub sgxtcbcomp13svn: u8,
    pub sgxtcbcomp14svn: u8,
    pub sgxtcbcomp15svn: u8,
    pub sgxtcbcomp16svn: u8,
    pub pcesvn: u16,
}

impl TcbComponents {
    /// The component SVNs in level order.
    pub fn svns(&self) -> [u8; TCB_COMPONENT_COUNT] {
        [
            self.sgxtcbcomp01svn,
            self.sgxtcbcomp02svn,
            self.sgxtcbcomp03svn,
            self.sgxtcbcomp04svn,
            self.sgxtcbcomp05svn,
            self.sgxtcbcomp06svn,
            self.sgxtcbcomp07svn,
            self.sgxtcbcomp08svn,
            self.sgxtcbcomp09svn,
            self.sgxtcbcomp10svn,
            self.sgxtcbcomp11svn,
            self.sgxtcbcomp12svn,
            self.sgxtcbcomp13svn,
            self.sgxtcbcomp14svn,
            self.sgxtcbcomp15svn,
            self.sgxtcbcomp16svn,
        ]
    }

    pub fn from_svns(svns: [u8; TCB_COMPONENT_COUNT], pcesvn: u16) -> Self {
        Self {
            sgxtcbcomp01svn: svns[0],
            sgxtcbcomp02svn: svns[1],
            sgxtcbcomp03svn: svns[2],
            sgxtcbcomp04svn: svns[3],
            sgxtcbcomp05svn: svns[4],
            sgxtcbcomp06svn: svns[5],
            sgxtcbcomp07svn: svns[6],
            sgxtcbcomp08svn: svns[7],
            sgxtcbcomp09svn: svns[8],
            sgxtcbcomp10svn: svns[9],
            sgxtcbcomp11svn: svns[10],
            sgxtcbcomp12svn: svns[11],
            sgxtcbcomp13svn: svns[12],
            sgxtcbcomp14svn: svns[13],
            sgxtcbcomp15svn: svns[14],
            sgxtcbcomp16svn: svns[15],
            pcesvn,
        }
    }
}
