//! Event counting: single counters, leader/follower groups and the
//! name-driven [`EventCounter`] frontend.

use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};

use tracing::debug;

use crate::config::{Config, Inherit, SampleOn};
use crate::error::{Error, Result};
use crate::event::CounterConfig;
use crate::ffi::syscall::{ioctl_argp, perf_event_open};
use crate::ffi::{bindings as b, Attr};
use crate::sample::values::SampleSpec;

pub mod event_counter;
pub mod group;
mod multi;

pub use event_counter::EventCounter;
pub use multi::{MultiCoreEventCounter, MultiProcessEventCounter, MultiThreadEventCounter};

/// Ordered counter/metric values produced by a measurement.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterResult {
    results: Vec<(String, f64)>,
}

impl CounterResult {
    pub fn new(results: Vec<(String, f64)>) -> Self {
        Self { results }
    }

    /// Value of the counter or metric with the given name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.results.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl<'a> IntoIterator for &'a CounterResult {
    type Item = &'a (String, f64);
    type IntoIter = std::slice::Iter<'a, (String, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Per-call parameters for [`Counter::open`].
pub(crate) struct OpenRequest<'a> {
    pub config: &'a Config,
    pub is_group_leader: bool,
    /// The immediate follower of an auxiliary leader; carries the sample
    /// attribute in place of the leader.
    pub is_secret_leader: bool,
    /// Leader fd for followers; ignored for the leader itself.
    pub group_fd: RawFd,
    /// Request the grouped read format on this counter.
    pub read_format: bool,
    /// Sample configuration; `None` for pure counting.
    pub sampling: Option<&'a SampleSpec>,
}

/// One kernel counter: an event config bound to a file descriptor.
///
/// Constructed unopened. Opening binds it to a process/CPU and optionally
/// enrolls it under a group leader; closing releases the descriptor exactly
/// once, and dropping an open counter closes it too.
pub struct Counter {
    config: CounterConfig,
    file: Option<File>,
    id: u64,
    precise_ip: u8,
}

impl Counter {
    pub(crate) fn new(config: CounterConfig) -> Self {
        Self {
            config,
            file: None,
            id: 0,
            precise_ip: 0,
        }
    }

    /// Kernel-assigned id, used to identify this counter inside grouped
    /// reads. Zero until the counter is opened.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The owned descriptor, or `None` while the counter is closed.
    pub fn file_descriptor(&self) -> Option<RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    pub(crate) fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn is_auxiliary(&self) -> bool {
        self.config.is_auxiliary()
    }

    /// The skid constraint the counter was actually opened with. May be lower
    /// than requested: sampling opens retry with decreasing precision when
    /// the PMU rejects the level.
    pub fn precise_ip(&self) -> u8 {
        self.precise_ip
    }

    pub(crate) fn open(&mut self, request: &OpenRequest) -> Result<()> {
        let mut attr = build_attr(&self.config, request)?;

        let pid = request.config.process_id;
        let cpu = request.config.target_cpu();
        let group_fd = if request.is_group_leader {
            -1
        } else {
            request.group_fd
        };
        let flags = b::PERF_FLAG_FD_CLOEXEC;

        let file = if request.sampling.is_some() {
            // The PMU may not support the requested precision. EINVAL and
            // EOPNOTSUPP both indicate that a lower level could still work.
            let mut precise_ip = self.config.skid().as_precise_ip();
            loop {
                attr.set_precise_ip(precise_ip);
                match perf_event_open(&attr, pid, cpu, group_fd, flags) {
                    Ok(file) => break file,
                    Err(err) => {
                        let errno = err.raw_os_error().unwrap_or(0);
                        let retryable = errno == libc::EINVAL || errno == libc::EOPNOTSUPP;
                        if precise_ip == 0 || !retryable {
                            return Err(Error::from_errno(err));
                        }
                        debug!(
                            event_id = self.config.event_id(),
                            from = precise_ip,
                            to = precise_ip - 1,
                            "precise_ip rejected, degrading"
                        );
                        precise_ip -= 1;
                    }
                }
            }
        } else {
            perf_event_open(&attr, pid, cpu, group_fd, flags).map_err(Error::from_errno)?
        };

        let mut id = 0u64;
        ioctl_argp(&file, b::PERF_EVENT_IOC_ID, &mut id).map_err(Error::from_errno)?;

        debug!(
            ty = attr.type_,
            config = attr.config,
            pid,
            cpu,
            group_fd,
            leader = request.is_group_leader,
            secret_leader = request.is_secret_leader,
            precise_ip = attr.precise_ip(),
            sample_type = attr.sample_type,
            read_format = attr.read_format,
            id,
            fd = file.as_raw_fd(),
            "counter opened"
        );

        self.precise_ip = attr.precise_ip();
        self.id = id;
        self.file = Some(file);
        Ok(())
    }

    /// Releases the descriptor. Idempotent.
    pub(crate) fn close(&mut self) {
        self.file = None;
    }

    #[cfg(test)]
    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Builds the kernel attribute record for one open call.
fn build_attr(config: &CounterConfig, request: &OpenRequest) -> Result<Attr> {
    let mut attr = Attr::zeroed();

    attr.type_ = config.ty();
    attr.config = config.event_id();
    let [ext1, ext2] = config.event_id_extension();
    attr.bp_addr_or_config1 = ext1;
    attr.bp_len_or_config2 = ext2;

    // The leader is opened disabled so the whole group starts atomically on
    // the leader's ENABLE; followers piggyback on it.
    attr.set_flag(b::ATTR_FLAG_DISABLED, request.is_group_leader);

    match request.config.inherit {
        Some(Inherit::NewChild) => attr.set_flag(b::ATTR_FLAG_INHERIT, true),
        #[cfg(feature = "linux-5.13")]
        Some(Inherit::NewThread) => {
            attr.set_flag(b::ATTR_FLAG_INHERIT, true);
            attr.set_flag(b::ATTR_FLAG_INHERIT_THREAD, true);
        }
        #[cfg(not(feature = "linux-5.13"))]
        Some(Inherit::NewThread) => return Err(Error::Unsupported("inherit new threads only")),
        None => {}
    }

    let cfg = request.config;
    attr.set_flag(b::ATTR_FLAG_EXCLUDE_KERNEL, !cfg.include_kernel);
    attr.set_flag(b::ATTR_FLAG_EXCLUDE_USER, !cfg.include_user);
    attr.set_flag(b::ATTR_FLAG_EXCLUDE_HV, !cfg.include_hypervisor);
    attr.set_flag(b::ATTR_FLAG_EXCLUDE_IDLE, !cfg.include_idle);
    attr.set_flag(b::ATTR_FLAG_EXCLUDE_GUEST, !cfg.include_guest);

    if let Some(spec) = request.sampling {
        // Only the group leader carries the sample attribute; under an
        // auxiliary leader that role falls to the secret leader instead.
        if request.is_group_leader || request.is_secret_leader {
            attr.sample_type = spec.sample_type;
            attr.set_flag(b::ATTR_FLAG_SAMPLE_ID_ALL, true);

            match config.sample_on() {
                SampleOn::Freq(freq) => {
                    attr.set_flag(b::ATTR_FLAG_FREQ, true);
                    attr.sample_period_or_freq = freq;
                }
                SampleOn::Count(period) => attr.sample_period_or_freq = period,
            }

            if let Some(mask) = spec.branch_mask {
                attr.branch_sample_type = mask;
            }
            if let Some(mask) = spec.user_regs {
                attr.sample_regs_user = mask;
            }
            if let Some(mask) = spec.kernel_regs {
                attr.sample_regs_intr = mask;
            }

            #[cfg(feature = "linux-4.8")]
            if let Some(max_stack) = spec.max_callstack {
                attr.sample_max_stack = max_stack;
            }
            #[cfg(not(feature = "linux-4.8"))]
            if spec.max_callstack.is_some() {
                return Err(Error::Unsupported("sample_max_stack"));
            }

            #[cfg(feature = "linux-4.3")]
            attr.set_flag(b::ATTR_FLAG_CONTEXT_SWITCH, spec.include_context_switch);
            #[cfg(not(feature = "linux-4.3"))]
            if spec.include_context_switch {
                return Err(Error::Unsupported("context switch records"));
            }

            #[cfg(feature = "linux-5.7")]
            attr.set_flag(b::ATTR_FLAG_CGROUP, spec.include_cgroup);
            #[cfg(not(feature = "linux-5.7"))]
            if spec.include_cgroup {
                return Err(Error::Unsupported("cgroup records"));
            }
        }
    }

    if request.read_format {
        attr.read_format = b::PERF_FORMAT_GROUP | b::PERF_FORMAT_ID;
        if request.is_group_leader {
            attr.read_format |= b::PERF_FORMAT_TOTAL_TIME_ENABLED | b::PERF_FORMAT_TOTAL_TIME_RUNNING;
        }
    }

    Ok(attr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::values::SampleValues;

    fn request<'a>(config: &'a Config, spec: Option<&'a SampleSpec>) -> OpenRequest<'a> {
        OpenRequest {
            config,
            is_group_leader: true,
            is_secret_leader: false,
            group_fd: -1,
            read_format: true,
            sampling: spec,
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mut counter = Counter::new(CounterConfig::new(b::PERF_TYPE_HARDWARE, 0));
        assert!(counter.file_descriptor().is_none());
        counter.close();
        counter.close();
        assert!(counter.file_descriptor().is_none());
    }

    #[test]
    fn leader_attr_is_disabled_with_grouped_read() {
        let config = Config::default();
        let counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 0);
        let attr = build_attr(&counter_config, &request(&config, None)).unwrap();

        assert_ne!(attr.flags & b::ATTR_FLAG_DISABLED, 0);
        assert_eq!(
            attr.read_format,
            b::PERF_FORMAT_GROUP
                | b::PERF_FORMAT_ID
                | b::PERF_FORMAT_TOTAL_TIME_ENABLED
                | b::PERF_FORMAT_TOTAL_TIME_RUNNING
        );
    }

    #[test]
    fn follower_attr_is_enabled_without_time_fields() {
        let config = Config::default();
        let counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 1);
        let mut req = request(&config, None);
        req.is_group_leader = false;
        req.group_fd = 7;
        let attr = build_attr(&counter_config, &req).unwrap();

        assert_eq!(attr.flags & b::ATTR_FLAG_DISABLED, 0);
        assert_eq!(attr.read_format, b::PERF_FORMAT_GROUP | b::PERF_FORMAT_ID);
    }

    #[test]
    fn privilege_excludes_invert_the_includes() {
        let mut config = Config::default();
        config.include_kernel = false;
        config.include_idle = false;
        let counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 0);
        let attr = build_attr(&counter_config, &request(&config, None)).unwrap();

        assert_ne!(attr.flags & b::ATTR_FLAG_EXCLUDE_KERNEL, 0);
        assert_ne!(attr.flags & b::ATTR_FLAG_EXCLUDE_IDLE, 0);
        assert_eq!(attr.flags & b::ATTR_FLAG_EXCLUDE_USER, 0);
    }

    #[test]
    fn sampling_leader_carries_the_sample_attribute() {
        let config = Config::default();
        let mut values = SampleValues::default();
        values.ip = true;
        values.time = true;
        let spec = values.spec().unwrap();

        let mut counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 0);
        counter_config.set_sample_on(SampleOn::Freq(1000));

        let attr = build_attr(&counter_config, &request(&config, Some(&spec))).unwrap();
        assert_eq!(attr.sample_type, b::PERF_SAMPLE_IP | b::PERF_SAMPLE_TIME);
        assert_ne!(attr.flags & b::ATTR_FLAG_SAMPLE_ID_ALL, 0);
        assert_ne!(attr.flags & b::ATTR_FLAG_FREQ, 0);
        assert_eq!(attr.sample_period_or_freq, 1000);
    }

    #[test]
    fn sampling_follower_does_not_carry_the_sample_attribute() {
        let config = Config::default();
        let mut values = SampleValues::default();
        values.ip = true;
        let spec = values.spec().unwrap();

        let counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 1);
        let mut req = request(&config, Some(&spec));
        req.is_group_leader = false;
        req.group_fd = 7;
        let attr = build_attr(&counter_config, &req).unwrap();

        assert_eq!(attr.sample_type, 0);
        assert_eq!(attr.flags & b::ATTR_FLAG_SAMPLE_ID_ALL, 0);
    }

    #[test]
    fn secret_leader_carries_the_sample_attribute() {
        let config = Config::default();
        let mut values = SampleValues::default();
        values.ip = true;
        let spec = values.spec().unwrap();

        let counter_config = CounterConfig::new(b::PERF_TYPE_RAW, 0x1cd);
        let mut req = request(&config, Some(&spec));
        req.is_group_leader = false;
        req.is_secret_leader = true;
        req.group_fd = 7;
        let attr = build_attr(&counter_config, &req).unwrap();

        assert_eq!(attr.sample_type, b::PERF_SAMPLE_IP);
        assert_ne!(attr.flags & b::ATTR_FLAG_SAMPLE_ID_ALL, 0);
    }

    #[test]
    fn period_config_does_not_set_the_freq_bit() {
        let config = Config::default();
        let mut values = SampleValues::default();
        values.ip = true;
        let spec = values.spec().unwrap();

        let mut counter_config = CounterConfig::new(b::PERF_TYPE_HARDWARE, 0);
        counter_config.set_sample_on(SampleOn::Count(10_000));
        let attr = build_attr(&counter_config, &request(&config, Some(&spec))).unwrap();

        assert_eq!(attr.flags & b::ATTR_FLAG_FREQ, 0);
        assert_eq!(attr.sample_period_or_freq, 10_000);
    }

    #[test]
    fn counter_result_lookup() {
        let result = CounterResult::new(vec![("cycles".into(), 1.5), ("instructions".into(), 2.0)]);
        assert_eq!(result.get("cycles"), Some(1.5));
        assert_eq!(result.get("branches"), None);
        assert_eq!(result.len(), 2);
    }
}
