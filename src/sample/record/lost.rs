use super::{Cursor, RecordCommon};
use crate::sample::values::SampleValues;

/// The kernel dropped records: the buffer was full or the CPU too busy.
///
/// Overflow is non-fatal; losses surface here and sampling continues.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LossRecord {
    /// Id of the counter whose records were dropped.
    pub id: u64,
    /// How many records were lost.
    pub lost: u64,
    pub common: RecordCommon,
}

impl LossRecord {
    // struct {
    //     struct perf_event_header header;
    //     u64 id;
    //     u64 lost;
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(cur: &mut Cursor, values: &SampleValues) -> Self {
        let id = cur.u64().unwrap_or(0);
        let lost = cur.u64().unwrap_or(0);
        let common = RecordCommon::parse(cur, values);
        Self { id, lost, common }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_count_and_trailer_are_read() {
        let mut values = SampleValues::default();
        values.time = true;

        let mut buf = Vec::new();
        buf.extend_from_slice(&5u64.to_ne_bytes()); // id
        buf.extend_from_slice(&123u64.to_ne_bytes()); // lost
        buf.extend_from_slice(&777u64.to_ne_bytes()); // sample_id.time

        let loss = LossRecord::parse(&mut Cursor::new(&buf), &values);
        assert_eq!(loss.id, 5);
        assert_eq!(loss.lost, 123);
        assert_eq!(loss.common.time, Some(777));
    }
}
