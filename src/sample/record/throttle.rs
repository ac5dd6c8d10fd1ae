use super::{Cursor, RecordCommon};
use crate::ffi::bindings::{self as b, PerfEventHeader};
use crate::sample::values::SampleValues;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThrottleKind {
    /// The kernel started throttling the counter (sample rate too high).
    Throttle,
    /// Throttling ended.
    Unthrottle,
}

/// Sampling was throttled or unthrottled.
///
/// Only surfaced when [`SampleValues::throttle`] is set.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleRecord {
    pub kind: ThrottleKind,
    pub time: u64,
    pub id: u64,
    pub stream_id: u64,
    pub common: RecordCommon,
}

impl ThrottleRecord {
    // struct {
    //     struct perf_event_header header;
    //     u64 time;
    //     u64 id;
    //     u64 stream_id;
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(cur: &mut Cursor, header: &PerfEventHeader, values: &SampleValues) -> Self {
        let kind = if header.type_ == b::PERF_RECORD_THROTTLE {
            ThrottleKind::Throttle
        } else {
            ThrottleKind::Unthrottle
        };
        let time = cur.u64().unwrap_or(0);
        let id = cur.u64().unwrap_or(0);
        let stream_id = cur.u64().unwrap_or(0);
        let common = RecordCommon::parse(cur, values);
        Self {
            kind,
            time,
            id,
            stream_id,
            common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_the_record_type() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u64.to_ne_bytes());
        buf.extend_from_slice(&2u64.to_ne_bytes());
        buf.extend_from_slice(&3u64.to_ne_bytes());

        for (type_, kind) in [
            (b::PERF_RECORD_THROTTLE, ThrottleKind::Throttle),
            (b::PERF_RECORD_UNTHROTTLE, ThrottleKind::Unthrottle),
        ] {
            let header = PerfEventHeader {
                type_,
                misc: 0,
                size: 32,
            };
            let record =
                ThrottleRecord::parse(&mut Cursor::new(&buf), &header, &SampleValues::default());
            assert_eq!(record.kind, kind);
            assert_eq!(record.time, 1);
            assert_eq!(record.id, 2);
            assert_eq!(record.stream_id, 3);
        }
    }
}
