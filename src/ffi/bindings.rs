//! Hand-maintained bindings for the `perf_event_open` ABI.
//!
//! The attribute layout and every constant below are frozen kernel ABI
//! (`include/uapi/linux/perf_event.h`); they never change, only grow.
//! The struct is pinned at `PERF_ATTR_SIZE_VER6` (120 bytes); older kernels
//! accept the larger size as long as the trailing bytes they do not know
//! stay zero, which the feature gates guarantee.

#![allow(dead_code)]

use std::mem;

// PERF_TYPE_*
pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;
pub const PERF_TYPE_TRACEPOINT: u32 = 2;
pub const PERF_TYPE_HW_CACHE: u32 = 3;
pub const PERF_TYPE_RAW: u32 = 4;
pub const PERF_TYPE_BREAKPOINT: u32 = 5;

// PERF_COUNT_HW_*
pub const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
pub const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;
pub const PERF_COUNT_HW_CACHE_REFERENCES: u64 = 2;
pub const PERF_COUNT_HW_CACHE_MISSES: u64 = 3;
pub const PERF_COUNT_HW_BRANCH_INSTRUCTIONS: u64 = 4;
pub const PERF_COUNT_HW_BRANCH_MISSES: u64 = 5;
pub const PERF_COUNT_HW_BUS_CYCLES: u64 = 6;
pub const PERF_COUNT_HW_STALLED_CYCLES_FRONTEND: u64 = 7;
pub const PERF_COUNT_HW_STALLED_CYCLES_BACKEND: u64 = 8;
pub const PERF_COUNT_HW_REF_CPU_CYCLES: u64 = 9;

// PERF_COUNT_HW_CACHE_*
pub const PERF_COUNT_HW_CACHE_L1D: u64 = 0;
pub const PERF_COUNT_HW_CACHE_L1I: u64 = 1;
pub const PERF_COUNT_HW_CACHE_LL: u64 = 2;
pub const PERF_COUNT_HW_CACHE_DTLB: u64 = 3;
pub const PERF_COUNT_HW_CACHE_ITLB: u64 = 4;
pub const PERF_COUNT_HW_CACHE_BPU: u64 = 5;
pub const PERF_COUNT_HW_CACHE_NODE: u64 = 6;
pub const PERF_COUNT_HW_CACHE_OP_READ: u64 = 0;
pub const PERF_COUNT_HW_CACHE_OP_WRITE: u64 = 1;
pub const PERF_COUNT_HW_CACHE_OP_PREFETCH: u64 = 2;
pub const PERF_COUNT_HW_CACHE_RESULT_ACCESS: u64 = 0;
pub const PERF_COUNT_HW_CACHE_RESULT_MISS: u64 = 1;

// PERF_COUNT_SW_*
pub const PERF_COUNT_SW_CPU_CLOCK: u64 = 0;
pub const PERF_COUNT_SW_TASK_CLOCK: u64 = 1;
pub const PERF_COUNT_SW_PAGE_FAULTS: u64 = 2;
pub const PERF_COUNT_SW_CONTEXT_SWITCHES: u64 = 3;
pub const PERF_COUNT_SW_CPU_MIGRATIONS: u64 = 4;
pub const PERF_COUNT_SW_PAGE_FAULTS_MIN: u64 = 5;
pub const PERF_COUNT_SW_PAGE_FAULTS_MAJ: u64 = 6;
pub const PERF_COUNT_SW_ALIGNMENT_FAULTS: u64 = 7;
pub const PERF_COUNT_SW_EMULATION_FAULTS: u64 = 8;
pub const PERF_COUNT_SW_DUMMY: u64 = 9;
pub const PERF_COUNT_SW_BPF_OUTPUT: u64 = 10;
/// Since Linux 5.13.
pub const PERF_COUNT_SW_CGROUP_SWITCHES: u64 = 11;

// PERF_SAMPLE_* (attr.sample_type)
pub const PERF_SAMPLE_IP: u64 = 1 << 0;
pub const PERF_SAMPLE_TID: u64 = 1 << 1;
pub const PERF_SAMPLE_TIME: u64 = 1 << 2;
pub const PERF_SAMPLE_ADDR: u64 = 1 << 3;
pub const PERF_SAMPLE_READ: u64 = 1 << 4;
pub const PERF_SAMPLE_CALLCHAIN: u64 = 1 << 5;
pub const PERF_SAMPLE_ID: u64 = 1 << 6;
pub const PERF_SAMPLE_CPU: u64 = 1 << 7;
pub const PERF_SAMPLE_PERIOD: u64 = 1 << 8;
pub const PERF_SAMPLE_STREAM_ID: u64 = 1 << 9;
pub const PERF_SAMPLE_RAW: u64 = 1 << 10;
pub const PERF_SAMPLE_BRANCH_STACK: u64 = 1 << 11;
pub const PERF_SAMPLE_REGS_USER: u64 = 1 << 12;
pub const PERF_SAMPLE_STACK_USER: u64 = 1 << 13;
pub const PERF_SAMPLE_WEIGHT: u64 = 1 << 14;
pub const PERF_SAMPLE_DATA_SRC: u64 = 1 << 15;
pub const PERF_SAMPLE_IDENTIFIER: u64 = 1 << 16;
pub const PERF_SAMPLE_TRANSACTION: u64 = 1 << 17;
pub const PERF_SAMPLE_REGS_INTR: u64 = 1 << 18;
/// Since Linux 4.13.
pub const PERF_SAMPLE_PHYS_ADDR: u64 = 1 << 19;
/// Since Linux 5.7.
pub const PERF_SAMPLE_CGROUP: u64 = 1 << 21;
/// Since Linux 5.11.
pub const PERF_SAMPLE_DATA_PAGE_SIZE: u64 = 1 << 22;
/// Since Linux 5.11.
pub const PERF_SAMPLE_CODE_PAGE_SIZE: u64 = 1 << 23;
/// Since Linux 5.12.
pub const PERF_SAMPLE_WEIGHT_STRUCT: u64 = 1 << 24;

// PERF_SAMPLE_BRANCH_* (attr.branch_sample_type)
pub const PERF_SAMPLE_BRANCH_USER: u64 = 1 << 0;
pub const PERF_SAMPLE_BRANCH_KERNEL: u64 = 1 << 1;
pub const PERF_SAMPLE_BRANCH_HV: u64 = 1 << 2;
pub const PERF_SAMPLE_BRANCH_ANY: u64 = 1 << 3;
pub const PERF_SAMPLE_BRANCH_ANY_CALL: u64 = 1 << 4;
pub const PERF_SAMPLE_BRANCH_ANY_RETURN: u64 = 1 << 5;
pub const PERF_SAMPLE_BRANCH_IND_CALL: u64 = 1 << 6;
pub const PERF_SAMPLE_BRANCH_ABORT_TX: u64 = 1 << 7;
pub const PERF_SAMPLE_BRANCH_IN_TX: u64 = 1 << 8;
pub const PERF_SAMPLE_BRANCH_NO_TX: u64 = 1 << 9;
pub const PERF_SAMPLE_BRANCH_COND: u64 = 1 << 10;
pub const PERF_SAMPLE_BRANCH_CALL_STACK: u64 = 1 << 11;
/// Since Linux 4.2.
pub const PERF_SAMPLE_BRANCH_IND_JUMP: u64 = 1 << 12;
/// Since Linux 4.4.
pub const PERF_SAMPLE_BRANCH_CALL: u64 = 1 << 13;

// PERF_FORMAT_* (attr.read_format)
pub const PERF_FORMAT_TOTAL_TIME_ENABLED: u64 = 1 << 0;
pub const PERF_FORMAT_TOTAL_TIME_RUNNING: u64 = 1 << 1;
pub const PERF_FORMAT_ID: u64 = 1 << 2;
pub const PERF_FORMAT_GROUP: u64 = 1 << 3;

// attr flag bits. The kernel declares these as a C bitfield; on every
// supported target bit N of the field is simply `1 << N`.
pub const ATTR_FLAG_DISABLED: u64 = 1 << 0;
pub const ATTR_FLAG_INHERIT: u64 = 1 << 1;
pub const ATTR_FLAG_EXCLUDE_USER: u64 = 1 << 4;
pub const ATTR_FLAG_EXCLUDE_KERNEL: u64 = 1 << 5;
pub const ATTR_FLAG_EXCLUDE_HV: u64 = 1 << 6;
pub const ATTR_FLAG_EXCLUDE_IDLE: u64 = 1 << 7;
pub const ATTR_FLAG_FREQ: u64 = 1 << 10;
pub const ATTR_FLAG_SAMPLE_ID_ALL: u64 = 1 << 18;
pub const ATTR_FLAG_EXCLUDE_HOST: u64 = 1 << 19;
pub const ATTR_FLAG_EXCLUDE_GUEST: u64 = 1 << 20;
/// Since Linux 4.3.
pub const ATTR_FLAG_CONTEXT_SWITCH: u64 = 1 << 26;
/// Since Linux 5.7.
pub const ATTR_FLAG_CGROUP: u64 = 1 << 32;
/// Since Linux 5.13.
pub const ATTR_FLAG_INHERIT_THREAD: u64 = 1 << 35;

pub const ATTR_PRECISE_IP_SHIFT: u32 = 15;
pub const ATTR_PRECISE_IP_MASK: u64 = 0b11 << ATTR_PRECISE_IP_SHIFT;

// perf_event_open flags
pub const PERF_FLAG_FD_CLOEXEC: u64 = 1 << 3;

// ioctls on the event fd
pub const PERF_EVENT_IOC_ENABLE: u64 = 0x2400;
pub const PERF_EVENT_IOC_DISABLE: u64 = 0x2401;
pub const PERF_EVENT_IOC_REFRESH: u64 = 0x2402;
pub const PERF_EVENT_IOC_RESET: u64 = 0x2403;
// _IOR('$', 7, u64): writes the kernel-assigned event id to the argument.
pub const PERF_EVENT_IOC_ID: u64 = 0x8008_2407;

// PERF_RECORD_* (header.type)
pub const PERF_RECORD_LOST: u32 = 2;
pub const PERF_RECORD_THROTTLE: u32 = 5;
pub const PERF_RECORD_UNTHROTTLE: u32 = 6;
pub const PERF_RECORD_SAMPLE: u32 = 9;
/// Since Linux 4.3.
pub const PERF_RECORD_SWITCH: u32 = 14;
/// Since Linux 4.3.
pub const PERF_RECORD_SWITCH_CPU_WIDE: u32 = 15;
/// Since Linux 5.7.
pub const PERF_RECORD_CGROUP: u32 = 19;

// header.misc: the low three bits carry the CPU mode as an enum, not flags.
pub const PERF_RECORD_MISC_CPUMODE_MASK: u16 = 7;
pub const PERF_RECORD_MISC_CPUMODE_UNKNOWN: u16 = 0;
pub const PERF_RECORD_MISC_KERNEL: u16 = 1;
pub const PERF_RECORD_MISC_USER: u16 = 2;
pub const PERF_RECORD_MISC_HYPERVISOR: u16 = 3;
pub const PERF_RECORD_MISC_GUEST_KERNEL: u16 = 4;
pub const PERF_RECORD_MISC_GUEST_USER: u16 = 5;
/// Set on SWITCH / SWITCH_CPU_WIDE records when the task is scheduled out.
pub const PERF_RECORD_MISC_SWITCH_OUT: u16 = 1 << 13;
/// On SAMPLE records: the instruction pointer is exact (zero skid).
pub const PERF_RECORD_MISC_EXACT_IP: u16 = 1 << 14;
/// On SWITCH records: the task was preempted. Since Linux 4.17.
pub const PERF_RECORD_MISC_SWITCH_OUT_PREEMPT: u16 = 1 << 14;

// perf_mem_data_src decoding: bit groups at fixed shifts.
pub const PERF_MEM_OP_NA: u64 = 1 << 0;
pub const PERF_MEM_OP_LOAD: u64 = 1 << 1;
pub const PERF_MEM_OP_STORE: u64 = 1 << 2;
pub const PERF_MEM_OP_PFETCH: u64 = 1 << 3;
pub const PERF_MEM_OP_EXEC: u64 = 1 << 4;
pub const PERF_MEM_LVL_SHIFT: u64 = 5;
pub const PERF_MEM_LVL_NA: u64 = 1 << 0;
pub const PERF_MEM_LVL_HIT: u64 = 1 << 1;
pub const PERF_MEM_LVL_MISS: u64 = 1 << 2;
pub const PERF_MEM_LVL_L1: u64 = 1 << 3;
pub const PERF_MEM_LVL_LFB: u64 = 1 << 4;
pub const PERF_MEM_LVL_L2: u64 = 1 << 5;
pub const PERF_MEM_LVL_L3: u64 = 1 << 6;
pub const PERF_MEM_LVL_LOC_RAM: u64 = 1 << 7;
pub const PERF_MEM_LVL_REM_RAM1: u64 = 1 << 8;
pub const PERF_MEM_LVL_REM_RAM2: u64 = 1 << 9;
pub const PERF_MEM_LVL_REM_CCE1: u64 = 1 << 10;
pub const PERF_MEM_LVL_REM_CCE2: u64 = 1 << 11;
pub const PERF_MEM_LVL_IO: u64 = 1 << 12;
pub const PERF_MEM_LVL_UNC: u64 = 1 << 13;
pub const PERF_MEM_SNOOP_SHIFT: u64 = 19;
pub const PERF_MEM_SNOOP_NA: u64 = 1 << 0;
pub const PERF_MEM_SNOOP_NONE: u64 = 1 << 1;
pub const PERF_MEM_SNOOP_HIT: u64 = 1 << 2;
pub const PERF_MEM_SNOOP_MISS: u64 = 1 << 3;
pub const PERF_MEM_SNOOP_HITM: u64 = 1 << 4;
pub const PERF_MEM_LOCK_SHIFT: u64 = 24;
pub const PERF_MEM_LOCK_NA: u64 = 1 << 0;
pub const PERF_MEM_LOCK_LOCKED: u64 = 1 << 1;
pub const PERF_MEM_TLB_SHIFT: u64 = 26;
pub const PERF_MEM_TLB_NA: u64 = 1 << 0;
pub const PERF_MEM_TLB_HIT: u64 = 1 << 1;
pub const PERF_MEM_TLB_MISS: u64 = 1 << 2;
pub const PERF_MEM_TLB_L1: u64 = 1 << 3;
pub const PERF_MEM_TLB_L2: u64 = 1 << 4;
pub const PERF_MEM_TLB_WK: u64 = 1 << 5;
pub const PERF_MEM_TLB_OS: u64 = 1 << 6;
pub const PERF_MEM_REMOTE_SHIFT: u64 = 37;

// perf_txn flags
pub const PERF_TXN_ELISION: u64 = 1 << 0;
pub const PERF_TXN_TRANSACTION: u64 = 1 << 1;
pub const PERF_TXN_SYNC: u64 = 1 << 2;
pub const PERF_TXN_ASYNC: u64 = 1 << 3;
pub const PERF_TXN_RETRY: u64 = 1 << 4;
pub const PERF_TXN_CONFLICT: u64 = 1 << 5;
pub const PERF_TXN_CAPACITY_WRITE: u64 = 1 << 6;
pub const PERF_TXN_CAPACITY_READ: u64 = 1 << 7;
pub const PERF_TXN_ABORT_SHIFT: u64 = 32;

/// `perf_event_attr`, pinned at `PERF_ATTR_SIZE_VER6`.
///
/// The kernel's anonymous unions are flattened into single fields; which
/// interpretation applies is decided by the flag bits, exactly as in the
/// C header.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PerfEventAttr {
    pub type_: u32,
    pub size: u32,
    pub config: u64,
    /// `sample_period` or, with [`ATTR_FLAG_FREQ`], `sample_freq`.
    pub sample_period_or_freq: u64,
    pub sample_type: u64,
    pub read_format: u64,
    pub flags: u64,
    pub wakeup_events_or_watermark: u32,
    pub bp_type: u32,
    pub bp_addr_or_config1: u64,
    pub bp_len_or_config2: u64,
    pub branch_sample_type: u64,
    pub sample_regs_user: u64,
    pub sample_stack_user: u32,
    pub clockid: i32,
    pub sample_regs_intr: u64,
    pub aux_watermark: u32,
    pub sample_max_stack: u16,
    pub __reserved_2: u16,
    pub aux_sample_size: u32,
    pub __reserved_3: u32,
}

impl PerfEventAttr {
    pub fn zeroed() -> Self {
        let mut attr: Self = unsafe { mem::zeroed() };
        attr.size = mem::size_of::<Self>() as u32;
        attr
    }

    pub fn set_flag(&mut self, flag: u64, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn set_precise_ip(&mut self, precise_ip: u8) {
        self.flags &= !ATTR_PRECISE_IP_MASK;
        self.flags |= (precise_ip as u64 & 0b11) << ATTR_PRECISE_IP_SHIFT;
    }

    pub fn precise_ip(&self) -> u8 {
        ((self.flags & ATTR_PRECISE_IP_MASK) >> ATTR_PRECISE_IP_SHIFT) as u8
    }
}

/// Control page at the start of every perf mmap region.
#[repr(C)]
pub struct PerfEventMmapPage {
    pub version: u32,
    pub compat_version: u32,
    pub lock: u32,
    pub index: u32,
    pub offset: i64,
    pub time_enabled: u64,
    pub time_running: u64,
    pub capabilities: u64,
    pub pmc_width: u16,
    pub time_shift: u16,
    pub time_mult: u32,
    pub time_offset: u64,
    pub time_zero: u64,
    pub size: u32,
    // Pads the header so data_head lands at offset 0x400.
    pub __reserved: [u8; 948],
    pub data_head: u64,
    pub data_tail: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub aux_head: u64,
    pub aux_tail: u64,
    pub aux_offset: u64,
    pub aux_size: u64,
}

/// Header preceding every record in the data ring.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerfEventHeader {
    pub type_: u32,
    pub misc: u16,
    pub size: u16,
}
