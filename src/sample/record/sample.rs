//! The regular sample record: an open set of optional fields, populated in
//! the exact order the kernel emits them.

use super::Cursor;
use crate::count::CounterResult;
use crate::ffi::bindings as b;
use crate::sample::values::{SampleValues, WeightRepr};

/// One taken branch from the branch-stack hardware (e.g. Intel LBR).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Branch {
    pub from: u64,
    pub to: u64,
    pub mispredicted: bool,
    pub predicted: bool,
    /// Taken inside a memory transaction.
    pub in_transaction: bool,
    /// Taken in an aborted transaction.
    pub aborted: bool,
    /// Cycle count since the last branch.
    pub cycles: u16,
}

/// Hardware-reported cost of the sampled operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Weight {
    /// Single 64-bit weight.
    Full(u64),
    /// Split weight; on memory events `var1` is the load latency. Since
    /// Linux 5.12.
    Vars { var1: u32, var2: u16, var3: u16 },
}

/// Type of the sampled memory opcode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemOp {
    pub na: bool,
    pub load: bool,
    pub store: bool,
    pub prefetch: bool,
    pub exec: bool,
}

/// Memory hierarchy level the access was satisfied from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemLevel {
    pub na: bool,
    pub hit: bool,
    pub miss: bool,
    pub l1: bool,
    pub lfb: bool,
    pub l2: bool,
    pub l3: bool,
    pub local_ram: bool,
    pub remote_ram1: bool,
    pub remote_ram2: bool,
    pub remote_cache1: bool,
    pub remote_cache2: bool,
    pub io: bool,
    pub uncached: bool,
}

/// Snoop mode of the access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemSnoop {
    pub na: bool,
    pub none: bool,
    pub hit: bool,
    pub miss: bool,
    pub hit_modified: bool,
}

/// Lock status of the sampled instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemLock {
    pub na: bool,
    pub locked: bool,
}

/// TLB access of the sampled instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemTlb {
    pub na: bool,
    pub hit: bool,
    pub miss: bool,
    pub l1: bool,
    pub l2: bool,
    pub walker: bool,
    pub fault_handler: bool,
}

/// Where in the memory hierarchy a sampled access was served, decoded from
/// the kernel's `perf_mem_data_src` bit groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSource {
    pub op: MemOp,
    pub level: MemLevel,
    pub snoop: MemSnoop,
    pub lock: MemLock,
    pub tlb: MemTlb,
    /// Served from a remote node.
    pub remote: bool,
}

impl DataSource {
    pub(crate) fn from_bits(bits: u64) -> Self {
        macro_rules! when {
            ($shifted:expr, $flag:ident) => {
                $shifted & b::$flag != 0
            };
        }

        let op = MemOp {
            na: when!(bits, PERF_MEM_OP_NA),
            load: when!(bits, PERF_MEM_OP_LOAD),
            store: when!(bits, PERF_MEM_OP_STORE),
            prefetch: when!(bits, PERF_MEM_OP_PFETCH),
            exec: when!(bits, PERF_MEM_OP_EXEC),
        };

        let shifted = bits >> b::PERF_MEM_LVL_SHIFT;
        let level = MemLevel {
            na: when!(shifted, PERF_MEM_LVL_NA),
            hit: when!(shifted, PERF_MEM_LVL_HIT),
            miss: when!(shifted, PERF_MEM_LVL_MISS),
            l1: when!(shifted, PERF_MEM_LVL_L1),
            lfb: when!(shifted, PERF_MEM_LVL_LFB),
            l2: when!(shifted, PERF_MEM_LVL_L2),
            l3: when!(shifted, PERF_MEM_LVL_L3),
            local_ram: when!(shifted, PERF_MEM_LVL_LOC_RAM),
            remote_ram1: when!(shifted, PERF_MEM_LVL_REM_RAM1),
            remote_ram2: when!(shifted, PERF_MEM_LVL_REM_RAM2),
            remote_cache1: when!(shifted, PERF_MEM_LVL_REM_CCE1),
            remote_cache2: when!(shifted, PERF_MEM_LVL_REM_CCE2),
            io: when!(shifted, PERF_MEM_LVL_IO),
            uncached: when!(shifted, PERF_MEM_LVL_UNC),
        };

        let shifted = bits >> b::PERF_MEM_SNOOP_SHIFT;
        let snoop = MemSnoop {
            na: when!(shifted, PERF_MEM_SNOOP_NA),
            none: when!(shifted, PERF_MEM_SNOOP_NONE),
            hit: when!(shifted, PERF_MEM_SNOOP_HIT),
            miss: when!(shifted, PERF_MEM_SNOOP_MISS),
            hit_modified: when!(shifted, PERF_MEM_SNOOP_HITM),
        };

        let shifted = bits >> b::PERF_MEM_LOCK_SHIFT;
        let lock = MemLock {
            na: when!(shifted, PERF_MEM_LOCK_NA),
            locked: when!(shifted, PERF_MEM_LOCK_LOCKED),
        };

        let shifted = bits >> b::PERF_MEM_TLB_SHIFT;
        let tlb = MemTlb {
            na: when!(shifted, PERF_MEM_TLB_NA),
            hit: when!(shifted, PERF_MEM_TLB_HIT),
            miss: when!(shifted, PERF_MEM_TLB_MISS),
            l1: when!(shifted, PERF_MEM_TLB_L1),
            l2: when!(shifted, PERF_MEM_TLB_L2),
            walker: when!(shifted, PERF_MEM_TLB_WK),
            fault_handler: when!(shifted, PERF_MEM_TLB_OS),
        };

        let remote = (bits >> b::PERF_MEM_REMOTE_SHIFT) & 1 != 0;

        Self {
            op,
            level,
            snoop,
            lock,
            tlb,
            remote,
        }
    }
}

/// Why a memory transaction aborted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transaction {
    /// From lock elision.
    pub elision: bool,
    /// From a real transaction.
    pub transaction: bool,
    /// Abort caused by the current thread.
    pub is_sync: bool,
    /// Abort caused by another thread.
    pub is_async: bool,
    /// Retry is possible.
    pub retry: bool,
    /// Conflict with another thread.
    pub conflict: bool,
    /// Read capacity overflow.
    pub capacity_read: bool,
    /// Write capacity overflow.
    pub capacity_write: bool,
    /// User-supplied abort code.
    pub code: u32,
}

impl Transaction {
    pub(crate) fn from_bits(bits: u64) -> Self {
        macro_rules! when {
            ($flag:ident) => {
                bits & b::$flag != 0
            };
        }
        Self {
            elision: when!(PERF_TXN_ELISION),
            transaction: when!(PERF_TXN_TRANSACTION),
            is_sync: when!(PERF_TXN_SYNC),
            is_async: when!(PERF_TXN_ASYNC),
            retry: when!(PERF_TXN_RETRY),
            conflict: when!(PERF_TXN_CONFLICT),
            capacity_read: when!(PERF_TXN_CAPACITY_READ),
            capacity_write: when!(PERF_TXN_CAPACITY_WRITE),
            code: (bits >> b::PERF_TXN_ABORT_SHIFT) as u32,
        }
    }
}

/// A regular sample; every field mirrors one bit of the field mask.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventRecord {
    /// Stable event id (IDENTIFIER).
    pub sample_id: Option<u64>,
    /// Instruction pointer.
    pub ip: Option<u64>,
    pub pid: Option<u32>,
    pub tid: Option<u32>,
    pub time: Option<u64>,
    /// Sampled data address.
    pub addr: Option<u64>,
    pub stream_id: Option<u64>,
    pub cpu: Option<u32>,
    /// Sampling period in effect when the sample was taken.
    pub period: Option<u64>,
    /// Multiplexing-corrected companion counter values, paired with the
    /// counter names given at open time. Unset when the kernel reported a
    /// different member count than expected.
    pub counter_values: Option<CounterResult>,
    /// Call chain, outermost frame last.
    pub callchain: Option<Vec<u64>>,
    /// Raw PMU payload; opaque, layout depends on hardware and kernel.
    pub raw: Option<Vec<u8>>,
    pub branches: Option<Vec<Branch>>,
    /// ABI of the recorded user registers (0 = none captured).
    pub user_regs_abi: Option<u64>,
    pub user_registers: Option<Vec<u64>>,
    pub weight: Option<Weight>,
    pub data_src: Option<DataSource>,
    pub transaction: Option<Transaction>,
    /// ABI of the recorded interrupt registers (0 = none captured).
    pub kernel_regs_abi: Option<u64>,
    pub kernel_registers: Option<Vec<u64>>,
    pub phys_addr: Option<u64>,
    pub cgroup_id: Option<u64>,
    pub data_page_size: Option<u64>,
    pub code_page_size: Option<u64>,
}

impl EventRecord {
    // struct {
    //     struct perf_event_header header;
    //     { u64 id;        } && PERF_SAMPLE_IDENTIFIER
    //     { u64 ip;        } && PERF_SAMPLE_IP
    //     { u32 pid, tid;  } && PERF_SAMPLE_TID
    //     { u64 time;      } && PERF_SAMPLE_TIME
    //     { u64 addr;      } && PERF_SAMPLE_ADDR
    //     { u64 stream_id; } && PERF_SAMPLE_STREAM_ID
    //     { u32 cpu, res;  } && PERF_SAMPLE_CPU
    //     { u64 period;    } && PERF_SAMPLE_PERIOD
    //     { struct read_format values; } && PERF_SAMPLE_READ
    //     { u64 nr; u64 ips[nr]; } && PERF_SAMPLE_CALLCHAIN
    //     { u32 size; char data[size]; } && PERF_SAMPLE_RAW
    //     { u64 nr; { u64 from, to, flags; } lbr[nr]; } && PERF_SAMPLE_BRANCH_STACK
    //     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_USER
    //     { u64 weight; } && PERF_SAMPLE_WEIGHT | perf_sample_weight && PERF_SAMPLE_WEIGHT_STRUCT
    //     { u64 data_src; } && PERF_SAMPLE_DATA_SRC
    //     { u64 transaction; } && PERF_SAMPLE_TRANSACTION
    //     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_INTR
    //     { u64 phys_addr; } && PERF_SAMPLE_PHYS_ADDR
    //     { u64 cgroup; } && PERF_SAMPLE_CGROUP
    //     { u64 data_page_size; } && PERF_SAMPLE_DATA_PAGE_SIZE
    //     { u64 code_page_size; } && PERF_SAMPLE_CODE_PAGE_SIZE
    // };
    pub(crate) fn parse(cur: &mut Cursor, values: &SampleValues, names: &[String]) -> Self {
        let mut record = Self::default();
        let _ = Self::fill(&mut record, cur, values, names);
        record
    }

    fn fill(
        record: &mut Self,
        cur: &mut Cursor,
        values: &SampleValues,
        names: &[String],
    ) -> Option<()> {
        if values.identifier {
            record.sample_id = Some(cur.u64()?);
        }
        if values.ip {
            record.ip = Some(cur.u64()?);
        }
        if values.tid {
            record.pid = Some(cur.u32()?);
            record.tid = Some(cur.u32()?);
        }
        if values.time {
            record.time = Some(cur.u64()?);
        }
        if values.addr {
            record.addr = Some(cur.u64()?);
        }
        if values.stream_id {
            record.stream_id = Some(cur.u64()?);
        }
        if values.cpu {
            record.cpu = Some(cur.u32()?);
            cur.skip(4)?; // res
        }
        if values.period {
            record.period = Some(cur.u64()?);
        }
        if values.read {
            record.counter_values = parse_read_group(cur, names)?;
        }
        if values.callchain {
            let nr = cur.u64()? as usize;
            let mut ips = Vec::with_capacity(nr.min(1024));
            for _ in 0..nr {
                ips.push(cur.u64()?);
            }
            record.callchain = Some(ips);
        }
        if values.raw {
            let size = cur.u32()? as usize;
            record.raw = Some(cur.bytes(size)?.to_vec());
        }
        if values.branch_stack.is_some() {
            let nr = cur.u64()? as usize;
            let mut branches = Vec::with_capacity(nr.min(1024));
            for _ in 0..nr {
                let from = cur.u64()?;
                let to = cur.u64()?;
                let flags = cur.u64()?;
                branches.push(Branch {
                    from,
                    to,
                    mispredicted: flags & 0b1 != 0,
                    predicted: flags & 0b10 != 0,
                    in_transaction: flags & 0b100 != 0,
                    aborted: flags & 0b1000 != 0,
                    cycles: ((flags >> 4) & 0xffff) as u16,
                });
            }
            record.branches = Some(branches);
        }
        if let Some(mask) = values.user_registers {
            let abi = cur.u64()?;
            record.user_regs_abi = Some(abi);
            if abi != 0 {
                let mut regs = Vec::with_capacity(mask.count());
                for _ in 0..mask.count() {
                    regs.push(cur.u64()?);
                }
                record.user_registers = Some(regs);
            }
        }
        match values.weight {
            Some(WeightRepr::Full) => {
                record.weight = Some(Weight::Full(cur.u64()?));
            }
            Some(WeightRepr::Vars) => {
                #[cfg(target_endian = "little")]
                let weight = Weight::Vars {
                    var1: cur.u32()?,
                    var2: cur.u16()?,
                    var3: cur.u16()?,
                };
                #[cfg(target_endian = "big")]
                let weight = {
                    let var3 = cur.u16()?;
                    let var2 = cur.u16()?;
                    let var1 = cur.u32()?;
                    Weight::Vars { var1, var2, var3 }
                };
                record.weight = Some(weight);
            }
            None => {}
        }
        if values.data_src {
            record.data_src = Some(DataSource::from_bits(cur.u64()?));
        }
        if values.transaction {
            record.transaction = Some(Transaction::from_bits(cur.u64()?));
        }
        if let Some(mask) = values.kernel_registers {
            let abi = cur.u64()?;
            record.kernel_regs_abi = Some(abi);
            if abi != 0 {
                let mut regs = Vec::with_capacity(mask.count());
                for _ in 0..mask.count() {
                    regs.push(cur.u64()?);
                }
                record.kernel_registers = Some(regs);
            }
        }
        #[cfg(feature = "linux-4.13")]
        if values.phys_addr {
            record.phys_addr = Some(cur.u64()?);
        }
        #[cfg(feature = "linux-5.7")]
        if values.cgroup {
            record.cgroup_id = Some(cur.u64()?);
        }
        #[cfg(feature = "linux-5.11")]
        if values.data_page_size {
            record.data_page_size = Some(cur.u64()?);
        }
        #[cfg(feature = "linux-5.11")]
        if values.code_page_size {
            record.code_page_size = Some(cur.u64()?);
        }
        Some(())
    }
}

// struct read_format {
//     u64 nr;
//     u64 time_enabled;
//     u64 time_running;
//     { u64 value; u64 id; } cntr[nr];
// }
//
// Each value is scaled by time_enabled / time_running so multiplexed
// counters read as if they had run the whole time. `Some(None)` means the
// stream was intact but the member count did not match the expectation, in
// which case the whole READ block is dropped from the sample.
fn parse_read_group(cur: &mut Cursor, names: &[String]) -> Option<Option<CounterResult>> {
    let nr = cur.u64()? as usize;
    let time_enabled = cur.u64()?;
    let time_running = cur.u64()?;
    let correction = if time_running == 0 {
        1.0
    } else {
        time_enabled as f64 / time_running as f64
    };

    let mut raw = Vec::with_capacity(nr.min(64));
    for _ in 0..nr {
        let value = cur.u64()?;
        let _id = cur.u64()?;
        raw.push(value);
    }

    if nr != names.len() {
        return Some(None);
    }

    let results = names
        .iter()
        .zip(raw)
        .map(|(name, value)| (name.clone(), value as f64 * correction))
        .collect();
    Some(Some(CounterResult::new(results)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::values::RegsMask;

    fn push_u64(buf: &mut Vec<u8>, value: u64) {
        buf.extend_from_slice(&value.to_ne_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_ne_bytes());
    }

    #[test]
    fn fields_parse_in_kernel_order() {
        let mut values = SampleValues::default();
        values.ip = true;
        values.tid = true;
        values.time = true;
        values.addr = true;
        values.cpu = true;
        values.period = true;

        let mut buf = Vec::new();
        push_u64(&mut buf, 0x4000); // ip
        push_u32(&mut buf, 12); // pid
        push_u32(&mut buf, 34); // tid
        push_u64(&mut buf, 1111); // time
        push_u64(&mut buf, 0x7f00); // addr
        push_u32(&mut buf, 2); // cpu
        push_u32(&mut buf, 0); // res
        push_u64(&mut buf, 10_000); // period

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.ip, Some(0x4000));
        assert_eq!(record.pid, Some(12));
        assert_eq!(record.tid, Some(34));
        assert_eq!(record.time, Some(1111));
        assert_eq!(record.addr, Some(0x7f00));
        assert_eq!(record.cpu, Some(2));
        assert_eq!(record.period, Some(10_000));
        // Nothing else was recorded.
        assert!(record.callchain.is_none());
        assert!(record.counter_values.is_none());
    }

    #[test]
    fn read_group_applies_the_per_sample_correction() {
        let mut values = SampleValues::default();
        values.read = true;
        let names = vec!["cycles".to_string(), "instructions".to_string()];

        let mut buf = Vec::new();
        push_u64(&mut buf, 2); // nr
        push_u64(&mut buf, 200); // time_enabled
        push_u64(&mut buf, 100); // time_running
        push_u64(&mut buf, 50); // value[0]
        push_u64(&mut buf, 1); // id[0]
        push_u64(&mut buf, 30); // value[1]
        push_u64(&mut buf, 2); // id[1]

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &names);
        let counters = record.counter_values.unwrap();
        assert_eq!(counters.get("cycles"), Some(100.0));
        assert_eq!(counters.get("instructions"), Some(60.0));
    }

    #[test]
    fn mismatched_read_member_counts_drop_the_block_but_not_the_rest() {
        let mut values = SampleValues::default();
        values.read = true;
        values.callchain = true;
        let names = vec!["cycles".to_string(), "instructions".to_string()];

        let mut buf = Vec::new();
        push_u64(&mut buf, 1); // nr: kernel reported fewer members
        push_u64(&mut buf, 100);
        push_u64(&mut buf, 100);
        push_u64(&mut buf, 42);
        push_u64(&mut buf, 1);
        push_u64(&mut buf, 2); // callchain nr
        push_u64(&mut buf, 0xa);
        push_u64(&mut buf, 0xb);

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &names);
        assert!(record.counter_values.is_none());
        assert_eq!(record.callchain, Some(vec![0xa, 0xb]));
    }

    #[test]
    fn callchain_raw_and_branches_parse_with_lengths() {
        let mut values = SampleValues::default();
        values.callchain = true;
        values.raw = true;
        values.branch_stack = Some(Default::default());

        let mut buf = Vec::new();
        push_u64(&mut buf, 2); // callchain nr
        push_u64(&mut buf, 0x100);
        push_u64(&mut buf, 0x200);
        push_u32(&mut buf, 3); // raw size
        buf.extend_from_slice(&[9, 8, 7]);
        push_u64(&mut buf, 1); // branch nr
        push_u64(&mut buf, 0x10); // from
        push_u64(&mut buf, 0x20); // to
        push_u64(&mut buf, (7 << 4) | 0b0101); // flags: mispred, in_tx, 7 cycles

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.callchain, Some(vec![0x100, 0x200]));
        assert_eq!(record.raw, Some(vec![9, 8, 7]));
        let branches = record.branches.unwrap();
        assert_eq!(
            branches[0],
            Branch {
                from: 0x10,
                to: 0x20,
                mispredicted: true,
                predicted: false,
                in_transaction: true,
                aborted: false,
                cycles: 7,
            }
        );
    }

    #[test]
    fn registers_follow_the_mask_width_and_abi() {
        let mut values = SampleValues::default();
        values.user_registers = Some(RegsMask(0b111)); // three registers

        let mut buf = Vec::new();
        push_u64(&mut buf, 2); // abi 64-bit
        push_u64(&mut buf, 1);
        push_u64(&mut buf, 2);
        push_u64(&mut buf, 3);

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.user_regs_abi, Some(2));
        assert_eq!(record.user_registers, Some(vec![1, 2, 3]));
    }

    #[test]
    fn abi_none_means_no_register_words_follow() {
        let mut values = SampleValues::default();
        values.user_registers = Some(RegsMask(0b11));
        values.data_src = true;

        let mut buf = Vec::new();
        push_u64(&mut buf, 0); // abi none, registers omitted by the kernel
        push_u64(&mut buf, b::PERF_MEM_OP_LOAD | (b::PERF_MEM_LVL_HIT << b::PERF_MEM_LVL_SHIFT));

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.user_regs_abi, Some(0));
        assert!(record.user_registers.is_none());
        let src = record.data_src.unwrap();
        assert!(src.op.load);
        assert!(src.level.hit);
        assert!(!src.level.miss);
    }

    #[test]
    fn weight_representations_decode() {
        let mut values = SampleValues::default();
        values.weight = Some(WeightRepr::Full);
        let mut buf = Vec::new();
        push_u64(&mut buf, 333);
        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.weight, Some(Weight::Full(333)));

        #[cfg(feature = "linux-5.12")]
        {
            let mut values = SampleValues::default();
            values.weight = Some(WeightRepr::Vars);
            let mut buf = Vec::new();
            push_u32(&mut buf, 55);
            buf.extend_from_slice(&7u16.to_ne_bytes());
            buf.extend_from_slice(&9u16.to_ne_bytes());
            let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
            assert_eq!(
                record.weight,
                Some(Weight::Vars {
                    var1: 55,
                    var2: 7,
                    var3: 9
                })
            );
        }
    }

    #[test]
    fn transaction_bits_decode() {
        let bits = b::PERF_TXN_TRANSACTION | b::PERF_TXN_RETRY | (0x42u64 << b::PERF_TXN_ABORT_SHIFT);
        let txn = Transaction::from_bits(bits);
        assert!(txn.transaction);
        assert!(txn.retry);
        assert!(!txn.elision);
        assert_eq!(txn.code, 0x42);
    }

    #[test]
    fn truncated_samples_keep_the_prefix() {
        let mut values = SampleValues::default();
        values.ip = true;
        values.time = true;

        let mut buf = Vec::new();
        push_u64(&mut buf, 0x4000);
        // time is missing entirely

        let record = EventRecord::parse(&mut Cursor::new(&buf), &values, &[]);
        assert_eq!(record.ip, Some(0x4000));
        assert_eq!(record.time, None);
    }
}
