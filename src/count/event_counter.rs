//! Name-driven counting: partitions requested counters and metrics across
//! groups and computes the final result.

use std::sync::Arc;

use super::group::Group;
use super::CounterResult;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{CounterConfig, CounterDefinition};

#[derive(Clone, Debug)]
pub(crate) enum EventEntry {
    Counter {
        name: String,
        group_id: usize,
        in_group_id: usize,
        /// Required only by a metric, not requested by the user directly.
        hidden: bool,
    },
    Metric {
        name: String,
    },
}

/// Counts named events and evaluates metrics over them.
///
/// Counters are packed into [`Group`]s in request order; a fresh group is
/// opened when the current one reaches the configured per-group limit, up to
/// the configured group maximum. Metrics pull in their dependencies as hidden
/// counters that never surface in [`result`][Self::result] unless they were
/// also requested by name.
pub struct EventCounter {
    definitions: Arc<CounterDefinition>,
    config: Config,
    groups: Vec<Group>,
    events: Vec<EventEntry>,
}

impl EventCounter {
    pub fn new(definitions: Arc<CounterDefinition>, config: Config) -> Self {
        Self {
            definitions,
            config,
            groups: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn entries(&self) -> &[EventEntry] {
        &self.events
    }

    pub(crate) fn group_value(&self, group_id: usize, in_group_id: usize) -> f64 {
        self.groups
            .get(group_id)
            .map(|g| g.get(in_group_id))
            .unwrap_or(0.0)
    }

    /// Adds a counter or metric by name.
    ///
    /// The empty name closes the current group: subsequent counters go into
    /// a fresh one. A counter that is already present is only "un-hidden"
    /// when re-added explicitly. A metric adds all of its dependencies as
    /// hidden counters, then the metric entry itself.
    pub fn add(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            if self.groups.is_empty() || self.groups.last().is_some_and(Group::is_empty) {
                return Ok(());
            }
            if self.groups.len() < self.config.max_groups {
                self.groups.push(Group::new());
                return Ok(());
            }
            return Err(Error::TooManyGroups {
                max: self.config.max_groups,
            });
        }

        if let Some(config) = self.definitions.counter(name) {
            let config = *config;
            return self.add_counter_entry(name, config, false);
        }

        let definitions = Arc::clone(&self.definitions);
        if let Some(metric) = definitions.metric(name) {
            for dependency in metric.required_counters() {
                let Some(config) = definitions.counter(&dependency) else {
                    return Err(Error::UnknownName(dependency));
                };
                let config = *config;
                self.add_counter_entry(&dependency, config, true)?;
            }
            self.events.push(EventEntry::Metric { name: name.into() });
            return Ok(());
        }

        Err(Error::UnknownName(name.into()))
    }

    /// Adds several names, stopping at the first failure.
    pub fn add_all<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add(name.as_ref())?;
        }
        Ok(())
    }

    fn add_counter_entry(&mut self, name: &str, config: CounterConfig, hidden: bool) -> Result<()> {
        // Re-adding a counter merges into the existing entry.
        for event in &mut self.events {
            if let EventEntry::Counter {
                name: existing,
                hidden: existing_hidden,
                ..
            } = event
            {
                if existing == name {
                    *existing_hidden = *existing_hidden && hidden;
                    return Ok(());
                }
            }
        }

        let per_group = self.config.counters_per_group_limit();
        let last_full = self.groups.last().is_some_and(|g| g.size() >= per_group);
        if last_full && self.groups.len() >= self.config.max_groups {
            return Err(Error::NoCapacity { name: name.into() });
        }
        if self.groups.is_empty() || last_full {
            self.groups.push(Group::new());
        }

        let group_id = self.groups.len() - 1;
        let group = self.groups.last_mut().expect("group was just ensured");
        let in_group_id = group.size();
        if !group.add(config) {
            return Err(Error::NoCapacity { name: name.into() });
        }
        self.events.push(EventEntry::Counter {
            name: name.into(),
            group_id,
            in_group_id,
            hidden,
        });
        Ok(())
    }

    /// Opens and starts every group. On failure, descriptors acquired so far
    /// are released and the instance stays re-startable.
    pub fn start(&mut self) -> Result<()> {
        for index in 0..self.groups.len() {
            if let Err(err) = self.groups[index].open(&self.config) {
                self.close_groups();
                return Err(err);
            }
        }
        for index in 0..self.groups.len() {
            if let Err(err) = self.groups[index].start() {
                self.close_groups();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Stops every group and releases the descriptors.
    pub fn stop(&mut self) -> Result<()> {
        let mut first_error = None;
        for group in &mut self.groups {
            if let Err(err) = group.stop() {
                first_error.get_or_insert(err);
            }
        }
        self.close_groups();
        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    fn close_groups(&mut self) {
        for group in &mut self.groups {
            group.close();
        }
    }

    /// Counter and metric values, counters divided by `normalization`.
    ///
    /// Hidden counters feed metric evaluation but are not surfaced.
    pub fn result(&self, normalization: u64) -> CounterResult {
        aggregate_result(std::slice::from_ref(self), normalization)
    }
}

/// Shared result computation for one instance or a fan-out of instances.
///
/// Hardware counter values are summed across all instances and divided by
/// `normalization`; metrics are recomputed from the aggregate, not averaged.
pub(crate) fn aggregate_result(instances: &[EventCounter], normalization: u64) -> CounterResult {
    let Some(reference) = instances.first() else {
        return CounterResult::default();
    };

    // Side table over every hardware counter, hidden ones included.
    let mut hardware = Vec::with_capacity(reference.events.len());
    for event in &reference.events {
        if let EventEntry::Counter {
            name,
            group_id,
            in_group_id,
            ..
        } = event
        {
            let sum: f64 = instances
                .iter()
                .map(|counter| counter.group_value(*group_id, *in_group_id))
                .sum();
            hardware.push((name.clone(), sum / normalization as f64));
        }
    }
    let hardware = CounterResult::new(hardware);

    let mut results = Vec::with_capacity(reference.events.len());
    for event in &reference.events {
        match event {
            EventEntry::Counter { name, hidden, .. } => {
                if !hidden {
                    if let Some(value) = hardware.get(name) {
                        results.push((name.clone(), value));
                    }
                }
            }
            EventEntry::Metric { name } => {
                if let Some(metric) = reference.definitions.metric(name) {
                    if let Some(value) = metric.compute(&hardware) {
                        results.push((name.clone(), value));
                    }
                }
            }
        }
    }

    CounterResult::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count::group::MAX_MEMBERS;

    fn definitions() -> Arc<CounterDefinition> {
        Arc::new(CounterDefinition::new())
    }

    fn counter(config: Config) -> EventCounter {
        EventCounter::new(definitions(), config)
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut events = counter(Config::default());
        assert!(matches!(
            events.add("not-a-counter"),
            Err(Error::UnknownName(name)) if name == "not-a-counter"
        ));
    }

    #[test]
    fn counters_fill_groups_in_request_order() {
        let mut events = counter(Config::default());
        events.add_all(["cycles", "instructions", "branches"]).unwrap();

        assert_eq!(events.groups.len(), 1);
        assert_eq!(events.groups[0].size(), 3);
        let placements: Vec<_> = events
            .entries()
            .iter()
            .map(|e| match e {
                EventEntry::Counter {
                    group_id,
                    in_group_id,
                    ..
                } => (*group_id, *in_group_id),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(placements, vec![(0, 0), (0, 1), (0, 2)]);
    }

    #[test]
    fn a_full_group_spills_into_a_fresh_one() {
        let mut config = Config::default();
        config.max_counters_per_group = 2;
        let mut events = counter(config);
        events.add_all(["cycles", "instructions", "branches"]).unwrap();

        assert_eq!(events.groups.len(), 2);
        assert_eq!(events.groups[0].size(), 2);
        assert_eq!(events.groups[1].size(), 1);
    }

    #[test]
    fn empty_name_closes_the_current_group() {
        let mut events = counter(Config::default());
        events.add("cycles").unwrap();
        events.add("").unwrap();
        events.add("instructions").unwrap();

        assert_eq!(events.groups.len(), 2);
        assert_eq!(events.groups[0].size(), 1);
        assert_eq!(events.groups[1].size(), 1);
    }

    #[test]
    fn empty_name_on_an_empty_group_is_a_no_op() {
        let mut events = counter(Config::default());
        events.add("").unwrap();
        events.add("").unwrap();
        assert!(events.groups.is_empty());
    }

    #[test]
    fn group_limit_is_enforced() {
        let mut config = Config::default();
        config.max_groups = 1;
        let mut events = counter(config);
        events.add("cycles").unwrap();
        assert!(matches!(
            events.add(""),
            Err(Error::TooManyGroups { max: 1 })
        ));
    }

    #[test]
    fn capacity_is_exhausted_when_groups_and_slots_are_full() {
        let mut config = Config::default();
        config.max_groups = 1;
        config.max_counters_per_group = 2;
        let mut events = counter(config);
        events.add_all(["cycles", "instructions"]).unwrap();
        assert!(matches!(
            events.add("branches"),
            Err(Error::NoCapacity { name }) if name == "branches"
        ));
    }

    #[test]
    fn eight_members_fit_and_the_ninth_does_not() {
        let mut config = Config::default();
        config.max_groups = 1;
        config.max_counters_per_group = MAX_MEMBERS;
        let mut events = counter(config);
        events
            .add_all([
                "cycles",
                "instructions",
                "branches",
                "branch-misses",
                "cache-misses",
                "cache-references",
                "bus-cycles",
                "ref-cycles",
            ])
            .unwrap();
        assert_eq!(events.groups[0].size(), MAX_MEMBERS);
        assert!(matches!(
            events.add("task-clock"),
            Err(Error::NoCapacity { .. })
        ));
    }

    #[test]
    fn re_adding_a_counter_keeps_one_entry_and_unhides_it() {
        let mut events = counter(Config::default());
        // "cycles-per-instruction" adds cycles and instructions hidden.
        events.add("cycles-per-instruction").unwrap();
        let hidden_count = events
            .entries()
            .iter()
            .filter(|e| matches!(e, EventEntry::Counter { hidden: true, .. }))
            .count();
        assert_eq!(hidden_count, 2);

        events.add("cycles").unwrap();
        let cycles_hidden = events.entries().iter().find_map(|e| match e {
            EventEntry::Counter { name, hidden, .. } if name == "cycles" => Some(*hidden),
            _ => None,
        });
        assert_eq!(cycles_hidden, Some(false));

        // Still exactly one cycles entry and two counters in the group.
        let cycles_entries = events
            .entries()
            .iter()
            .filter(
                |e| matches!(e, EventEntry::Counter { name, .. } if name == "cycles"),
            )
            .count();
        assert_eq!(cycles_entries, 1);
        assert_eq!(events.groups[0].size(), 2);
    }

    #[test]
    fn metric_dependencies_stay_hidden_in_results() {
        let mut events = counter(Config::default());
        events.add("cycles-per-instruction").unwrap();

        // Without a run every counter reads zero; the metric denominator is
        // zero, so nothing at all surfaces.
        let result = events.result(1);
        assert!(result.is_empty());
    }

    #[test]
    fn result_surfaces_requested_counters() {
        let mut events = counter(Config::default());
        events.add_all(["cycles", "instructions"]).unwrap();
        let result = events.result(1);
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("cycles"), Some(0.0));
        assert_eq!(result.get("instructions"), Some(0.0));
    }

    #[test]
    fn stop_without_start_fails_on_the_missing_descriptor() {
        let mut events = counter(Config::default());
        events.add("cycles").unwrap();
        // The group exists but was never opened, so its leader has no fd.
        assert!(matches!(
            events.stop(),
            Err(Error::OpenFailed { errno: libc::EBADF })
        ));
    }
}
