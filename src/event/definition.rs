//! The counter-definition registry: names for events and derived metrics.

use std::collections::HashMap;

use tracing::debug;

use super::CounterConfig;
use crate::count::CounterResult;
use crate::ffi::bindings as b;
use crate::hw::HardwareInfo;

/// A derived value computed from named hardware counters.
///
/// Implementations declare which counters they need; an
/// [`EventCounter`][crate::count::EventCounter] opens those as hidden
/// dependencies and hands their values back through `compute`.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Counter names this metric reads in [`compute`][Self::compute].
    fn required_counters(&self) -> Vec<String>;

    /// Evaluate the metric over the measured counter values. `None` when the
    /// metric is undefined for the measurement (e.g. a zero denominator).
    fn compute(&self, counters: &CounterResult) -> Option<f64>;
}

macro_rules! ratio_metric {
    ($ty:ident, $name:literal, $num:literal / $den:literal) => {
        struct $ty;

        impl Metric for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn required_counters(&self) -> Vec<String> {
                vec![$num.into(), $den.into()]
            }

            fn compute(&self, counters: &CounterResult) -> Option<f64> {
                let num = counters.get($num)?;
                let den = counters.get($den)?;
                (den != 0.0).then(|| num / den)
            }
        }
    };
}

ratio_metric!(CyclesPerInstruction, "cycles-per-instruction", "cycles" / "instructions");
ratio_metric!(DTlbMissRatio, "dTLB-miss-ratio", "dTLB-load-misses" / "dTLB-loads");
ratio_metric!(ITlbMissRatio, "iTLB-miss-ratio", "iTLB-load-misses" / "iTLB-loads");
ratio_metric!(L1DataMissRatio, "L1-data-miss-ratio", "L1-dcache-load-misses" / "L1-dcache-loads");

struct CacheHitRatio;

impl Metric for CacheHitRatio {
    fn name(&self) -> &str {
        "cache-hit-ratio"
    }

    fn required_counters(&self) -> Vec<String> {
        vec!["cache-misses".into(), "cache-references".into()]
    }

    fn compute(&self, counters: &CounterResult) -> Option<f64> {
        let misses = counters.get("cache-misses")?;
        let references = counters.get("cache-references")?;
        (references != 0.0).then(|| (references - misses) / references)
    }
}

/// Registry mapping names to counter configs and metrics.
///
/// A fresh registry knows the generalized hardware, cache and software
/// events the kernel exposes on every PMU, plus whatever the running
/// machine's PMUs advertise: AMD IBS op/fetch counters and Intel PEBS
/// memory events discovered through sysfs.
pub struct CounterDefinition {
    counters: HashMap<String, CounterConfig>,
    metrics: HashMap<String, Box<dyn Metric>>,
}

impl Default for CounterDefinition {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterDefinition {
    pub fn new() -> Self {
        let mut this = Self {
            counters: HashMap::with_capacity(64),
            metrics: HashMap::with_capacity(8),
        };
        this.initialize_generalized_counters();
        this.initialize_amd_ibs_counters();
        this.initialize_intel_pebs_counters();
        this.initialize_metrics();
        this
    }

    /// An empty registry; useful when only hand-registered events matter.
    pub fn empty() -> Self {
        Self {
            counters: HashMap::new(),
            metrics: HashMap::new(),
        }
    }

    pub fn add_counter(&mut self, name: impl Into<String>, config: CounterConfig) {
        self.counters.insert(name.into(), config);
    }

    pub fn add_metric(&mut self, metric: Box<dyn Metric>) {
        self.metrics.insert(metric.name().to_owned(), metric);
    }

    pub fn counter(&self, name: &str) -> Option<&CounterConfig> {
        self.counters.get(name)
    }

    pub fn metric(&self, name: &str) -> Option<&dyn Metric> {
        self.metrics.get(name).map(|m| m.as_ref())
    }

    pub fn is_metric(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Names of all registered counters, unordered.
    pub fn counter_names(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(|k| k.as_str())
    }

    fn add_hw(&mut self, name: &str, event_id: u64) {
        self.add_counter(name, CounterConfig::new(b::PERF_TYPE_HARDWARE, event_id));
    }

    fn add_sw(&mut self, name: &str, event_id: u64) {
        self.add_counter(name, CounterConfig::new(b::PERF_TYPE_SOFTWARE, event_id));
    }

    fn add_cache(&mut self, name: &str, cache: u64, op: u64, result: u64) {
        let event_id = cache | (op << 8) | (result << 16);
        self.add_counter(name, CounterConfig::new(b::PERF_TYPE_HW_CACHE, event_id));
    }

    fn initialize_generalized_counters(&mut self) {
        self.add_hw("instructions", b::PERF_COUNT_HW_INSTRUCTIONS);

        self.add_hw("cycles", b::PERF_COUNT_HW_CPU_CYCLES);
        self.add_hw("cpu-cycles", b::PERF_COUNT_HW_CPU_CYCLES);
        self.add_hw("bus-cycles", b::PERF_COUNT_HW_BUS_CYCLES);
        self.add_hw("ref-cycles", b::PERF_COUNT_HW_REF_CPU_CYCLES);

        self.add_hw("branches", b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS);
        self.add_hw("branch-instructions", b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS);
        self.add_hw("branch-misses", b::PERF_COUNT_HW_BRANCH_MISSES);

        self.add_hw("stalled-cycles-backend", b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND);
        self.add_hw("idle-cycles-backend", b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND);
        self.add_hw("stalled-cycles-frontend", b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND);
        self.add_hw("idle-cycles-frontend", b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND);

        self.add_sw("cpu-clock", b::PERF_COUNT_SW_CPU_CLOCK);
        self.add_sw("task-clock", b::PERF_COUNT_SW_TASK_CLOCK);
        self.add_sw("page-faults", b::PERF_COUNT_SW_PAGE_FAULTS);
        self.add_sw("faults", b::PERF_COUNT_SW_PAGE_FAULTS);
        self.add_sw("major-faults", b::PERF_COUNT_SW_PAGE_FAULTS_MAJ);
        self.add_sw("minor-faults", b::PERF_COUNT_SW_PAGE_FAULTS_MIN);
        self.add_sw("alignment-faults", b::PERF_COUNT_SW_ALIGNMENT_FAULTS);
        self.add_sw("emulation-faults", b::PERF_COUNT_SW_EMULATION_FAULTS);
        self.add_sw("context-switches", b::PERF_COUNT_SW_CONTEXT_SWITCHES);
        self.add_sw("bpf-output", b::PERF_COUNT_SW_BPF_OUTPUT);
        #[cfg(feature = "linux-5.13")]
        self.add_sw("cgroup-switches", b::PERF_COUNT_SW_CGROUP_SWITCHES);
        self.add_sw("cpu-migrations", b::PERF_COUNT_SW_CPU_MIGRATIONS);
        self.add_sw("migrations", b::PERF_COUNT_SW_CPU_MIGRATIONS);

        self.add_hw("cache-misses", b::PERF_COUNT_HW_CACHE_MISSES);
        self.add_hw("cache-references", b::PERF_COUNT_HW_CACHE_REFERENCES);

        use b::{
            PERF_COUNT_HW_CACHE_DTLB as DTLB, PERF_COUNT_HW_CACHE_ITLB as ITLB,
            PERF_COUNT_HW_CACHE_L1D as L1D, PERF_COUNT_HW_CACHE_L1I as L1I,
            PERF_COUNT_HW_CACHE_OP_READ as READ, PERF_COUNT_HW_CACHE_RESULT_ACCESS as ACCESS,
            PERF_COUNT_HW_CACHE_RESULT_MISS as MISS,
        };
        self.add_cache("L1-dcache-loads", L1D, READ, ACCESS);
        self.add_cache("L1-dcache-load-misses", L1D, READ, MISS);
        self.add_cache("L1-icache-loads", L1I, READ, ACCESS);
        self.add_cache("L1-icache-load-misses", L1I, READ, MISS);
        self.add_cache("dTLB-loads", DTLB, READ, ACCESS);
        self.add_cache("dTLB-load-misses", DTLB, READ, MISS);
        self.add_cache("iTLB-loads", ITLB, READ, ACCESS);
        self.add_cache("iTLB-load-misses", ITLB, READ, MISS);
    }

    fn initialize_amd_ibs_counters(&mut self) {
        let Some(ibs_op) = HardwareInfo::amd_ibs_op_type() else {
            return;
        };
        debug!(ibs_op, "registering AMD IBS op events");
        self.add_counter("ibs_op", CounterConfig::new(ibs_op, 0));
        self.add_counter("ibs_op_uops", CounterConfig::new(ibs_op, 1 << 19));
        if HardwareInfo::is_ibs_l3_filter_supported() {
            self.add_counter("ibs_op_l3missonly", CounterConfig::new(ibs_op, 1 << 16));
            self.add_counter(
                "ibs_op_uops_l3missonly",
                CounterConfig::new(ibs_op, (1 << 19) | (1 << 16)),
            );
        }

        if let Some(ibs_fetch) = HardwareInfo::amd_ibs_fetch_type() {
            debug!(ibs_fetch, "registering AMD IBS fetch events");
            self.add_counter("ibs_fetch", CounterConfig::new(ibs_fetch, 1 << 57));
            if HardwareInfo::is_ibs_l3_filter_supported() {
                self.add_counter(
                    "ibs_fetch_l3missonly",
                    CounterConfig::new(ibs_fetch, (1 << 57) | (1 << 16)),
                );
            }
        }
    }

    fn initialize_intel_pebs_counters(&mut self) {
        if !HardwareInfo::is_intel() {
            return;
        }

        if HardwareInfo::is_intel_aux_counter_required() {
            if let Some(event_id) = HardwareInfo::intel_pebs_mem_loads_aux_event_id() {
                debug!(event_id, "registering Intel mem-loads-aux");
                let mut config = CounterConfig::new(b::PERF_TYPE_RAW, event_id);
                config.mark_auxiliary();
                self.add_counter("mem-loads-aux", config);
            }
        }

        if let Some(event_id) = HardwareInfo::intel_pebs_mem_loads_event_id() {
            self.add_counter("mem-loads", CounterConfig::new(b::PERF_TYPE_RAW, event_id));
        }
        if let Some(event_id) = HardwareInfo::intel_pebs_mem_stores_event_id() {
            self.add_counter("mem-stores", CounterConfig::new(b::PERF_TYPE_RAW, event_id));
        }
    }

    fn initialize_metrics(&mut self) {
        self.add_metric(Box::new(CyclesPerInstruction));
        self.add_metric(Box::new(CacheHitRatio));
        self.add_metric(Box::new(DTlbMissRatio));
        self.add_metric(Box::new(ITlbMissRatio));
        self.add_metric(Box::new(L1DataMissRatio));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generalized_counters_are_registered() {
        let defs = CounterDefinition::new();
        let instr = defs.counter("instructions").unwrap();
        assert_eq!(instr.ty(), b::PERF_TYPE_HARDWARE);
        assert_eq!(instr.event_id(), b::PERF_COUNT_HW_INSTRUCTIONS);

        let dtlb_misses = defs.counter("dTLB-load-misses").unwrap();
        assert_eq!(dtlb_misses.ty(), b::PERF_TYPE_HW_CACHE);
        assert_eq!(
            dtlb_misses.event_id(),
            b::PERF_COUNT_HW_CACHE_DTLB
                | (b::PERF_COUNT_HW_CACHE_OP_READ << 8)
                | (b::PERF_COUNT_HW_CACHE_RESULT_MISS << 16)
        );
    }

    #[test]
    fn metric_names_are_not_counters() {
        let defs = CounterDefinition::new();
        assert!(defs.is_metric("cycles-per-instruction"));
        assert!(defs.counter("cycles-per-instruction").is_none());
        assert!(!defs.is_metric("cycles"));
    }

    #[test]
    fn cpi_computes_from_both_counters() {
        let defs = CounterDefinition::new();
        let metric = defs.metric("cycles-per-instruction").unwrap();

        let values = CounterResult::new(vec![
            ("cycles".into(), 3000.0),
            ("instructions".into(), 1000.0),
        ]);
        assert_eq!(metric.compute(&values), Some(3.0));

        let missing = CounterResult::new(vec![("cycles".into(), 3000.0)]);
        assert_eq!(metric.compute(&missing), None);

        let zero = CounterResult::new(vec![
            ("cycles".into(), 3000.0),
            ("instructions".into(), 0.0),
        ]);
        assert_eq!(metric.compute(&zero), None);
    }

    #[test]
    fn user_counters_can_be_registered() {
        let mut defs = CounterDefinition::empty();
        defs.add_counter("uops_retired", CounterConfig::new(b::PERF_TYPE_RAW, 0x01c2));
        assert_eq!(defs.counter("uops_retired").unwrap().event_id(), 0x01c2);
    }
}
