//! Declarative selection of which sample fields to record.

use crate::error::Result;
use crate::ffi::bindings as b;

/// Register mask selecting the CPU registers to dump with each sample.
///
/// The bit layout is architecture-specific, described by the kernel header
/// `arch/<arch>/include/uapi/asm/perf_regs.h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegsMask(pub u64);

impl RegsMask {
    /// Number of registers the mask selects; the kernel dumps exactly this
    /// many words per sample.
    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }
}

/// How sample weights are represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightRepr {
    /// One 64-bit weight value.
    Full,
    /// Split weight (`var1`/`var2`/`var3`). Since Linux 5.12.
    Vars,
}

/// Which branch types the branch stack records.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchType {
    /// Branches in user space.
    pub user: bool,
    /// Branches in kernel space.
    pub kernel: bool,
    /// Branches in the hypervisor.
    pub hv: bool,

    /// Any branch type.
    pub any: bool,
    /// Any call branch (incl. direct, indirect, far jumps).
    pub any_call: bool,
    /// Any return branch.
    pub any_return: bool,
    /// Indirect calls.
    pub ind_call: bool,
    /// Conditional branches.
    pub cond: bool,
    /// Call stack captured via the branch hardware.
    pub call_stack: bool,
    /// Indirect jumps. Since Linux 4.2.
    pub ind_jump: bool,
    /// Direct calls. Since Linux 4.4.
    pub call: bool,

    /// Branches in transactional memory transactions.
    pub in_tx: bool,
    /// Branches outside transactions.
    pub no_tx: bool,
    /// Transaction aborts.
    pub abort_tx: bool,
}

impl BranchType {
    pub(crate) fn as_branch_sample_type(&self) -> Result<u64> {
        let mut mask = 0;
        macro_rules! when {
            ($($feature:literal,)? $field:ident, $flag:ident) => {
                if self.$field {
                    $(#[cfg(feature = $feature)])?
                    {
                        mask |= b::$flag;
                    }
                    $(
                    #[cfg(not(feature = $feature))]
                    return Err(Error::Unsupported(stringify!($field)));
                    )?
                }
            };
        }
        when!(user, PERF_SAMPLE_BRANCH_USER);
        when!(kernel, PERF_SAMPLE_BRANCH_KERNEL);
        when!(hv, PERF_SAMPLE_BRANCH_HV);
        when!(any, PERF_SAMPLE_BRANCH_ANY);
        when!(any_call, PERF_SAMPLE_BRANCH_ANY_CALL);
        when!(any_return, PERF_SAMPLE_BRANCH_ANY_RETURN);
        when!(ind_call, PERF_SAMPLE_BRANCH_IND_CALL);
        when!(cond, PERF_SAMPLE_BRANCH_COND);
        when!(call_stack, PERF_SAMPLE_BRANCH_CALL_STACK);
        when!("linux-4.2", ind_jump, PERF_SAMPLE_BRANCH_IND_JUMP);
        when!("linux-4.4", call, PERF_SAMPLE_BRANCH_CALL);
        when!(in_tx, PERF_SAMPLE_BRANCH_IN_TX);
        when!(no_tx, PERF_SAMPLE_BRANCH_NO_TX);
        when!(abort_tx, PERF_SAMPLE_BRANCH_ABORT_TX);
        Ok(mask)
    }
}

/// Declarative field mask: which values each sample carries, plus the
/// orthogonal record toggles and side tables.
///
/// Every flag corresponds to a kernel `PERF_SAMPLE_*` bit; the parser reads
/// record fields in the kernel-dictated order for exactly the bits set here.
#[derive(Clone, Debug, Default)]
pub struct SampleValues {
    /// Stable event id, at a fixed position in every record.
    pub identifier: bool,
    /// Instruction pointer.
    pub ip: bool,
    /// Process and thread id.
    pub tid: bool,
    /// Timestamp.
    pub time: bool,
    /// Data address (memory events, tracepoints, breakpoints).
    pub addr: bool,
    /// Read the group's companion counters with each sample.
    pub read: bool,
    /// Call chain (stack backtrace).
    pub callchain: bool,
    /// CPU number.
    pub cpu: bool,
    /// Sampling period in effect.
    pub period: bool,
    /// Stream id of the originating counter.
    pub stream_id: bool,
    /// Raw, PMU-specific payload.
    pub raw: bool,
    /// Branch stack; the mask selects which branches are recorded.
    pub branch_stack: Option<BranchType>,
    /// User-level registers at sample time.
    pub user_registers: Option<RegsMask>,
    /// Registers at interrupt (kernel) time.
    pub kernel_registers: Option<RegsMask>,
    /// Hardware weight of the sampled operation (e.g. load latency).
    pub weight: Option<WeightRepr>,
    /// Source of the sampled data in the memory hierarchy.
    pub data_src: bool,
    /// Transactional-memory abort reason.
    pub transaction: bool,
    /// Physical data address. Since Linux 4.13.
    pub phys_addr: bool,
    /// Cgroup id of the sampled task. Since Linux 5.7.
    pub cgroup: bool,
    /// Page size backing the data address. Since Linux 5.11.
    pub data_page_size: bool,
    /// Page size backing the instruction pointer. Since Linux 5.11.
    pub code_page_size: bool,

    /// Cap on recorded call-chain depth (kernel clamps to
    /// `/proc/sys/kernel/perf_event_max_stack`). Since Linux 4.8.
    pub max_call_stack: Option<u16>,

    /// Emit context-switch records. Since Linux 4.3.
    pub context_switches: bool,
    /// Surface throttle/unthrottle records in the drained results.
    pub throttle: bool,

    /// Companion counters read into each sample; requires [`read`][Self::read].
    pub counters: Vec<String>,
}

/// Kernel-facing digest of a [`SampleValues`]: the bitmasks and side values
/// the attribute record needs.
#[derive(Clone, Debug)]
pub(crate) struct SampleSpec {
    pub sample_type: u64,
    pub branch_mask: Option<u64>,
    pub user_regs: Option<u64>,
    pub kernel_regs: Option<u64>,
    pub max_callstack: Option<u16>,
    pub include_context_switch: bool,
    pub include_cgroup: bool,
}

impl SampleValues {
    /// The `PERF_SAMPLE_*` bitmask these values select.
    pub(crate) fn as_sample_type(&self) -> Result<u64> {
        let mut mask = 0;
        macro_rules! when {
            ($($feature:literal,)? $field:ident, $flag:ident) => {
                if self.$field {
                    $(#[cfg(feature = $feature)])?
                    {
                        mask |= b::$flag;
                    }
                    $(
                    #[cfg(not(feature = $feature))]
                    return Err(Error::Unsupported(stringify!($field)));
                    )?
                }
            };
        }
        when!(identifier, PERF_SAMPLE_IDENTIFIER);
        when!(ip, PERF_SAMPLE_IP);
        when!(tid, PERF_SAMPLE_TID);
        when!(time, PERF_SAMPLE_TIME);
        when!(addr, PERF_SAMPLE_ADDR);
        when!(read, PERF_SAMPLE_READ);
        when!(callchain, PERF_SAMPLE_CALLCHAIN);
        when!(cpu, PERF_SAMPLE_CPU);
        when!(period, PERF_SAMPLE_PERIOD);
        when!(stream_id, PERF_SAMPLE_STREAM_ID);
        when!(raw, PERF_SAMPLE_RAW);
        when!(data_src, PERF_SAMPLE_DATA_SRC);
        when!(transaction, PERF_SAMPLE_TRANSACTION);
        when!("linux-4.13", phys_addr, PERF_SAMPLE_PHYS_ADDR);
        when!("linux-5.7", cgroup, PERF_SAMPLE_CGROUP);
        when!("linux-5.11", data_page_size, PERF_SAMPLE_DATA_PAGE_SIZE);
        when!("linux-5.11", code_page_size, PERF_SAMPLE_CODE_PAGE_SIZE);

        if self.branch_stack.is_some() {
            mask |= b::PERF_SAMPLE_BRANCH_STACK;
        }
        if self.user_registers.is_some() {
            mask |= b::PERF_SAMPLE_REGS_USER;
        }
        if self.kernel_registers.is_some() {
            mask |= b::PERF_SAMPLE_REGS_INTR;
        }
        match self.weight {
            Some(WeightRepr::Full) => mask |= b::PERF_SAMPLE_WEIGHT,
            #[cfg(feature = "linux-5.12")]
            Some(WeightRepr::Vars) => mask |= b::PERF_SAMPLE_WEIGHT_STRUCT,
            #[cfg(not(feature = "linux-5.12"))]
            Some(WeightRepr::Vars) => return Err(Error::Unsupported("weight_struct")),
            None => {}
        }

        Ok(mask)
    }

    pub(crate) fn is_set(&self, flag: u64) -> bool {
        self.as_sample_type().map_or(false, |mask| mask & flag != 0)
    }

    pub(crate) fn spec(&self) -> Result<SampleSpec> {
        Ok(SampleSpec {
            sample_type: self.as_sample_type()?,
            branch_mask: self
                .branch_stack
                .as_ref()
                .map(|branch| branch.as_branch_sample_type())
                .transpose()?,
            user_regs: self.user_registers.map(|mask| mask.0),
            kernel_regs: self.kernel_registers.map(|mask| mask.0),
            max_callstack: if self.callchain { self.max_call_stack } else { None },
            include_context_switch: self.context_switches,
            include_cgroup: self.cgroup,
        })
    }
}
