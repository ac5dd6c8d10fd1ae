//! Measurement configuration shared by counting and sampling.

use crate::count::group::MAX_MEMBERS;

/// Controls when a trigger generates a sample record.
///
/// The kernel maintains a counter with a negative initial value; every event
/// moves it towards overflow, and each overflow produces one sample. `Count`
/// fixes the distance between overflows, `Freq` asks the kernel to adjust the
/// period so that the requested number of samples per second is reached.
///
/// The two arms are mutually exclusive by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleOn {
    /// Sample on frequency (samples per second).
    Freq(u64),
    /// Sample on every N event counts (the sample period).
    Count(u64),
}

impl Default for SampleOn {
    fn default() -> Self {
        Self::Count(4000)
    }
}

/// Controls the amount of sample skid.
///
/// Skid is how many instructions execute between the event of interest and
/// the point where the kernel is able to stop and record state. Smaller skid
/// attributes samples to the right instruction, but hardware limits how small
/// it can get; the kernel may silently downgrade the request (see
/// [`Counter::precise_ip`][crate::count::Counter::precise_ip]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleSkid {
    /// Can have arbitrary skid.
    Arbitrary,
    /// Must have constant skid. This is the level that enables PEBS/IBS
    /// assistance on most hardware.
    Const,
    /// Requested to have 0 skid.
    ReqZero,
    /// Must have 0 skid.
    Zero,
}

impl SampleSkid {
    pub(crate) fn as_precise_ip(self) -> u8 {
        match self {
            Self::Arbitrary => 0,
            Self::Const => 1,
            Self::ReqZero => 2,
            Self::Zero => 3,
        }
    }
}

impl Default for SampleSkid {
    fn default() -> Self {
        Self::Const
    }
}

/// Controls which child tasks inherit a counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inherit {
    /// New child tasks (processes and threads) inherit the counter.
    ///
    /// Only children created after the counter is opened are affected.
    NewChild,
    /// Like [`NewChild`][Self::NewChild], but only new threads inherit.
    ///
    /// Since Linux 5.13.
    NewThread,
}

/// Configuration for counting (and the counting side of sampling).
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of groups an [`EventCounter`][crate::count::EventCounter]
    /// may open.
    pub max_groups: usize,
    /// Maximum number of counters placed into one group. Values above the
    /// kernel read-format limit of 8 are clamped.
    pub max_counters_per_group: usize,

    /// Inheritance of the counters to child tasks.
    pub inherit: Option<Inherit>,

    /// Count kernel-mode activity.
    pub include_kernel: bool,
    /// Count user-mode activity.
    pub include_user: bool,
    /// Count hypervisor activity.
    pub include_hypervisor: bool,
    /// Count while the CPU runs the idle task.
    pub include_idle: bool,
    /// Count guest-mode activity.
    pub include_guest: bool,

    /// CPU to monitor; `None` monitors every CPU.
    pub cpu_id: Option<u16>,
    /// Process to monitor: `0` is the calling process, a positive value that
    /// pid, `-1` every process (requires `cpu_id` to be set).
    pub process_id: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_groups: 5,
            max_counters_per_group: 4,
            inherit: None,
            include_kernel: true,
            include_user: true,
            include_hypervisor: true,
            include_idle: true,
            include_guest: true,
            cpu_id: None,
            process_id: 0,
        }
    }
}

impl Config {
    pub(crate) fn counters_per_group_limit(&self) -> usize {
        self.max_counters_per_group.min(MAX_MEMBERS)
    }

    pub(crate) fn target_cpu(&self) -> i32 {
        self.cpu_id.map(i32::from).unwrap_or(-1)
    }
}

/// Configuration for sampling.
///
/// The counting knobs live in [`base`][Self::base]; the fields here only
/// affect how samples are generated and stored.
#[derive(Clone, Debug)]
pub struct SampleConfig {
    pub base: Config,

    /// Pages mapped for each ring buffer (control page included). The data
    /// area must be a power of two pages, so `2^n + 1` is the shape to pick.
    pub buffer_pages: usize,
    /// Default period or frequency for triggers that do not override it.
    pub sample_on: SampleOn,
    /// Default skid constraint for triggers that do not override it.
    pub skid: SampleSkid,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            base: Config::default(),
            buffer_pages: 8192 + 1,
            sample_on: SampleOn::default(),
            skid: SampleSkid::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skid_maps_to_precise_ip() {
        assert_eq!(SampleSkid::Arbitrary.as_precise_ip(), 0);
        assert_eq!(SampleSkid::Const.as_precise_ip(), 1);
        assert_eq!(SampleSkid::ReqZero.as_precise_ip(), 2);
        assert_eq!(SampleSkid::Zero.as_precise_ip(), 3);
    }

    #[test]
    fn group_limit_clamps_to_read_format_capacity() {
        let mut config = Config::default();
        config.max_counters_per_group = 64;
        assert_eq!(config.counters_per_group_limit(), MAX_MEMBERS);
    }
}
