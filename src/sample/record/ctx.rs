use super::{Cursor, RecordCommon};
use crate::ffi::bindings::{self as b, PerfEventHeader};
use crate::sample::values::SampleValues;

/// Direction of a context switch, decoded from the header misc bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SwitchDirection {
    /// The monitored task was switched in.
    In,
    /// The monitored task was switched out.
    Out {
        /// The switch was a preemption. Since Linux 4.17.
        preempted: bool,
    },
}

/// A context switch affecting the monitored task or CPU.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchRecord {
    pub direction: SwitchDirection,
    /// Previous/next task: only present in the CPU-wide record variant.
    pub task: Option<(u32, u32)>,
    pub common: RecordCommon,
}

impl SwitchRecord {
    // PERF_RECORD_SWITCH:          { header; sample_id; }
    // PERF_RECORD_SWITCH_CPU_WIDE: { header; u32 next_prev_pid, next_prev_tid; sample_id; }
    pub(crate) fn parse(cur: &mut Cursor, header: &PerfEventHeader, values: &SampleValues) -> Self {
        let task = if header.type_ == b::PERF_RECORD_SWITCH_CPU_WIDE {
            let pid = cur.u32().unwrap_or(0);
            let tid = cur.u32().unwrap_or(0);
            Some((pid, tid))
        } else {
            None
        };

        let direction = if header.misc & b::PERF_RECORD_MISC_SWITCH_OUT != 0 {
            #[cfg(feature = "linux-4.17")]
            let preempted = header.misc & b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT != 0;
            #[cfg(not(feature = "linux-4.17"))]
            let preempted = false;
            SwitchDirection::Out { preempted }
        } else {
            SwitchDirection::In
        };

        let common = RecordCommon::parse(cur, values);
        Self {
            direction,
            task,
            common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_switches_carry_no_task() {
        let header = PerfEventHeader {
            type_: b::PERF_RECORD_SWITCH,
            misc: b::PERF_RECORD_MISC_SWITCH_OUT,
            size: 8,
        };
        let record = SwitchRecord::parse(
            &mut Cursor::new(&[]),
            &header,
            &SampleValues::default(),
        );
        assert_eq!(record.task, None);
        assert!(matches!(record.direction, SwitchDirection::Out { .. }));
    }

    #[test]
    fn cpu_wide_switches_carry_the_other_task() {
        let header = PerfEventHeader {
            type_: b::PERF_RECORD_SWITCH_CPU_WIDE,
            misc: 0,
            size: 16,
        };
        let mut buf = Vec::new();
        buf.extend_from_slice(&40u32.to_ne_bytes());
        buf.extend_from_slice(&41u32.to_ne_bytes());

        let record = SwitchRecord::parse(
            &mut Cursor::new(&buf),
            &header,
            &SampleValues::default(),
        );
        assert_eq!(record.task, Some((40, 41)));
        assert_eq!(record.direction, SwitchDirection::In);
    }

    #[cfg(feature = "linux-4.17")]
    #[test]
    fn preemption_is_reported_on_switch_out() {
        let header = PerfEventHeader {
            type_: b::PERF_RECORD_SWITCH,
            misc: b::PERF_RECORD_MISC_SWITCH_OUT | b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT,
            size: 8,
        };
        let record = SwitchRecord::parse(
            &mut Cursor::new(&[]),
            &header,
            &SampleValues::default(),
        );
        assert_eq!(
            record.direction,
            SwitchDirection::Out { preempted: true }
        );
    }
}
