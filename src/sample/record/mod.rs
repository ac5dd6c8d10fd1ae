//! Typed records reconstructed from the kernel's ring-buffer byte stream.

use std::ffi::CString;

use crate::ffi::bindings::{self as b, PerfEventHeader};
use crate::sample::values::SampleValues;

mod cgroup;
mod ctx;
mod lost;
pub mod sample;
mod throttle;

pub use cgroup::CgroupRecord;
pub use ctx::{SwitchDirection, SwitchRecord};
pub use lost::LossRecord;
pub use sample::{Branch, DataSource, EventRecord, Transaction, Weight};
pub use throttle::{ThrottleKind, ThrottleRecord};

/// Execution mode the CPU was in when the record was produced, decoded from
/// the three-bit cpumode field of the record header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    User,
    Kernel,
    Hypervisor,
    GuestKernel,
    GuestUser,
    Unknown,
}

impl Mode {
    fn from_misc(misc: u16) -> Self {
        match misc & b::PERF_RECORD_MISC_CPUMODE_MASK {
            b::PERF_RECORD_MISC_KERNEL => Self::Kernel,
            b::PERF_RECORD_MISC_USER => Self::User,
            b::PERF_RECORD_MISC_HYPERVISOR => Self::Hypervisor,
            b::PERF_RECORD_MISC_GUEST_KERNEL => Self::GuestKernel,
            b::PERF_RECORD_MISC_GUEST_USER => Self::GuestUser,
            _ => Self::Unknown,
        }
    }
}

/// One drained record with its header-derived context.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Execution mode at record time.
    pub mode: Mode,
    /// True when the instruction pointer is exact (zero skid). Reflects the
    /// precision the counter was ultimately opened with, which may be lower
    /// than requested.
    pub is_exact_ip: bool,
    /// The record payload.
    pub kind: Record,
}

/// Payload alternatives of a drained record.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    /// A regular sample.
    Event(Box<EventRecord>),
    /// Records were dropped (full buffer, throttling).
    Loss(LossRecord),
    /// A context switch.
    Switch(SwitchRecord),
    /// A new cgroup came into existence.
    Cgroup(CgroupRecord),
    /// Sampling was throttled or unthrottled.
    Throttle(ThrottleRecord),
}

impl Sample {
    /// Timestamp of the record, when the field mask recorded one.
    pub fn time(&self) -> Option<u64> {
        match &self.kind {
            Record::Event(event) => event.time,
            Record::Loss(loss) => loss.common.time,
            Record::Switch(switch) => switch.common.time,
            Record::Cgroup(cgroup) => cgroup.common.time,
            Record::Throttle(throttle) => Some(throttle.time),
        }
    }
}

/// The `sample_id` trailer appended to every non-sample record when
/// `sample_id_all` is set: the identifying subset of the field mask.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordCommon {
    pub pid: Option<u32>,
    pub tid: Option<u32>,
    pub time: Option<u64>,
    pub stream_id: Option<u64>,
    pub cpu: Option<u32>,
    pub id: Option<u64>,
}

impl RecordCommon {
    // struct sample_id {
    //     { u32 pid, tid;  } && PERF_SAMPLE_TID
    //     { u64 time;      } && PERF_SAMPLE_TIME
    //     { u64 stream_id; } && PERF_SAMPLE_STREAM_ID
    //     { u32 cpu, res;  } && PERF_SAMPLE_CPU
    //     { u64 id;        } && PERF_SAMPLE_IDENTIFIER
    // }
    pub(crate) fn parse(cur: &mut Cursor, values: &SampleValues) -> Self {
        let mut common = Self::default();
        let _ = Self::fill(&mut common, cur, values);
        common
    }

    fn fill(common: &mut Self, cur: &mut Cursor, values: &SampleValues) -> Option<()> {
        if values.tid {
            common.pid = Some(cur.u32()?);
            common.tid = Some(cur.u32()?);
        }
        if values.time {
            common.time = Some(cur.u64()?);
        }
        if values.stream_id {
            common.stream_id = Some(cur.u64()?);
        }
        if values.cpu {
            common.cpu = Some(cur.u32()?);
            cur.skip(4)?; // res
        }
        if values.identifier {
            common.id = Some(cur.u64()?);
        }
        Some(())
    }
}

/// Bounds-checked reader over one record body.
///
/// Truncated records are tolerated by construction: a read past the end
/// yields `None`, the caller keeps whatever fields it has filled so far, and
/// the drain continues at the next header.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u16(&mut self) -> Option<u16> {
        let bytes = self.bytes(2)?;
        Some(u16::from_ne_bytes(bytes.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> Option<u32> {
        let bytes = self.bytes(4)?;
        Some(u32::from_ne_bytes(bytes.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Option<u64> {
        let bytes = self.bytes(8)?;
        Some(u64::from_ne_bytes(bytes.try_into().unwrap()))
    }

    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        if end > self.buf.len() {
            return None;
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.bytes(len).map(|_| ())
    }

    /// Reads a null-terminated string and leaves the cursor after the
    /// terminator.
    pub fn cstr(&mut self) -> Option<CString> {
        let rest = &self.buf[self.pos..];
        let nul = rest.iter().position(|&byte| byte == 0)?;
        self.pos += nul + 1;
        CString::new(&rest[..nul]).ok()
    }
}

/// Dispatches one drained record by header type.
///
/// `names` are the companion-counter names remembered at open time, paired
/// with READ values. Returns `None` for record types the caller did not ask
/// for (throttle without the toggle) or does not model.
pub(crate) fn parse_record(
    header: &PerfEventHeader,
    body: &[u8],
    values: &SampleValues,
    names: &[String],
) -> Option<Sample> {
    let mut cur = Cursor::new(body);
    let mode = Mode::from_misc(header.misc);
    let is_exact_ip = header.misc & b::PERF_RECORD_MISC_EXACT_IP != 0;

    let kind = match header.type_ {
        b::PERF_RECORD_SAMPLE => Record::Event(Box::new(sample::EventRecord::parse(
            &mut cur, values, names,
        ))),
        b::PERF_RECORD_LOST => Record::Loss(lost::LossRecord::parse(&mut cur, values)),
        #[cfg(feature = "linux-4.3")]
        b::PERF_RECORD_SWITCH | b::PERF_RECORD_SWITCH_CPU_WIDE => Record::Switch(
            ctx::SwitchRecord::parse(&mut cur, header, values),
        ),
        #[cfg(feature = "linux-5.7")]
        b::PERF_RECORD_CGROUP => Record::Cgroup(cgroup::CgroupRecord::parse(&mut cur, values)),
        b::PERF_RECORD_THROTTLE | b::PERF_RECORD_UNTHROTTLE if values.throttle => {
            Record::Throttle(throttle::ThrottleRecord::parse(&mut cur, header, values))
        }
        _ => return None,
    };

    Some(Sample {
        mode,
        is_exact_ip,
        kind,
    })
}
