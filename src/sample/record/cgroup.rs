use std::ffi::CString;

use super::{Cursor, RecordCommon};
use crate::sample::values::SampleValues;

/// A new cgroup was created while cgroup sampling was on.
///
/// Correlates the cgroup ids found in samples with a path. Since Linux 5.7.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CgroupRecord {
    pub id: u64,
    /// Path below the cgroup filesystem root.
    pub path: CString,
    pub common: RecordCommon,
}

impl CgroupRecord {
    // struct {
    //     struct perf_event_header header;
    //     u64 id;
    //     char path[];    // null terminated, padded to u64
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(cur: &mut Cursor, values: &SampleValues) -> Self {
        let id = cur.u64().unwrap_or(0);
        let path = cur.cstr().unwrap_or_default();
        // The path is padded to the next u64 boundary before the trailer.
        let consumed = 8 + path.as_bytes_with_nul().len();
        let _ = cur.skip(consumed.wrapping_neg() % 8);
        let common = RecordCommon::parse(cur, values);
        Self { id, path, common }
    }
}
