//! Statistical sampling: trigger groups, mapped ring buffers and typed
//! drained samples.

use std::sync::Arc;

use tracing::debug;

use crate::config::{SampleConfig, SampleOn, SampleSkid};
use crate::count::group::Group;
use crate::count::OpenRequest;
use crate::error::{Error, Result};
use crate::event::CounterDefinition;
use crate::ffi::bindings as b;

mod arena;
mod multi;
mod rb;
pub mod record;
pub mod values;

pub use multi::{MultiCoreSampler, MultiThreadSampler};
pub use record::{Record, Sample};
pub use values::SampleValues;

use arena::Arena;
use rb::RingBuffer;

/// One trigger: a named counter whose overflow produces samples, with
/// optional per-trigger overrides of the sampler-wide defaults.
#[derive(Clone, Debug)]
pub struct Trigger {
    name: String,
    skid: Option<SampleSkid>,
    sample_on: Option<SampleOn>,
}

impl Trigger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skid: None,
            sample_on: None,
        }
    }

    /// Overrides the skid constraint for this trigger only.
    pub fn with_skid(mut self, skid: SampleSkid) -> Self {
        self.skid = Some(skid);
        self
    }

    /// Overrides the period/frequency for this trigger only.
    pub fn with_sample_on(mut self, sample_on: SampleOn) -> Self {
        self.sample_on = Some(sample_on);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One opened trigger group: the kernel group, its mapped buffer and the
/// companion-counter names paired with READ values at parse time.
struct SampleCounter {
    group: Group,
    arena: Option<Arena>,
    names: Vec<String>,
}

/// Event sampler.
///
/// Configure the field mask through [`values_mut`][Self::values_mut] and the
/// trigger groups through [`trigger`][Self::trigger], then `start`, run the
/// workload, `stop`, and drain with [`result`][Self::result].
pub struct Sampler {
    definitions: Arc<CounterDefinition>,
    config: SampleConfig,
    values: SampleValues,
    triggers: Vec<Vec<Trigger>>,
    counters: Vec<SampleCounter>,
    opened: bool,
}

impl Sampler {
    pub fn new(definitions: Arc<CounterDefinition>, config: SampleConfig) -> Self {
        Self {
            definitions,
            config,
            values: SampleValues::default(),
            triggers: Vec::new(),
            counters: Vec::new(),
            opened: false,
        }
    }

    pub fn values(&self) -> &SampleValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut SampleValues {
        &mut self.values
    }

    pub(crate) fn set_values(&mut self, values: SampleValues) {
        self.values = values;
    }

    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// Configures trigger groups from plain counter names.
    ///
    /// Each inner list becomes one kernel group with its own ring buffer.
    pub fn trigger<I, G, S>(&mut self, groups: I) -> Result<()>
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers = groups
            .into_iter()
            .map(|group| group.into_iter().map(|name| Trigger::new(name)).collect())
            .collect();
        self.trigger_with(triggers)
    }

    /// Configures trigger groups with per-trigger overrides.
    pub fn trigger_with(&mut self, groups: Vec<Vec<Trigger>>) -> Result<()> {
        for group in &groups {
            for trigger in group {
                // Metrics expand to several events and cannot overflow.
                if self.definitions.is_metric(trigger.name()) {
                    return Err(Error::MetricAsTrigger(trigger.name().into()));
                }
                if self.definitions.counter(trigger.name()).is_none() {
                    return Err(Error::UnknownName(trigger.name().into()));
                }
            }
        }
        self.triggers = groups;
        Ok(())
    }

    /// Builds the kernel groups and maps the ring buffers.
    ///
    /// Called implicitly by [`start`][Self::start]; a failure rolls back
    /// every descriptor and mapping acquired so far.
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        if self.triggers.is_empty() {
            return Err(Error::NoTriggers);
        }

        let result = self.open_inner();
        if result.is_err() {
            self.counters.clear();
        } else {
            self.opened = true;
        }
        result
    }

    fn open_inner(&mut self) -> Result<()> {
        let spec = self.values.spec()?;
        let wants_read = self.values.read;

        let trigger_groups = self.triggers.clone();
        for triggers in &trigger_groups {
            let mut group = Group::new();
            let mut names = Vec::new();

            for trigger in triggers {
                let Some(config) = self.definitions.counter(trigger.name()) else {
                    return Err(Error::UnknownName(trigger.name().into()));
                };
                let mut config = *config;
                config.set_skid(trigger.skid.unwrap_or(self.config.skid));
                config.set_sample_on(trigger.sample_on.unwrap_or(self.config.sample_on));
                if !group.add(config) {
                    return Err(Error::NoCapacity {
                        name: trigger.name().into(),
                    });
                }
                if wants_read {
                    names.push(trigger.name().to_owned());
                }
            }

            // Companion counters ride along in the same group so the kernel
            // reads them into each sample.
            if wants_read {
                for name in &self.values.counters {
                    if self.definitions.is_metric(name) {
                        return Err(Error::MetricAsTrigger(name.clone()));
                    }
                    let Some(config) = self.definitions.counter(name) else {
                        return Err(Error::UnknownName(name.clone()));
                    };
                    if !group.add(*config) {
                        return Err(Error::NoCapacity { name: name.clone() });
                    }
                    names.push(name.clone());
                }
            }

            // On microarchitectures that require an auxiliary leader, the
            // follower right after it carries the sample configuration.
            let aux_leader = group.member(0).is_some_and(|m| m.is_auxiliary());

            let mut group_fd = -1;
            for index in 0..group.size() {
                let request = OpenRequest {
                    config: &self.config.base,
                    is_group_leader: index == 0,
                    is_secret_leader: aux_leader && index == 1,
                    group_fd,
                    read_format: wants_read,
                    sampling: Some(&spec),
                };
                let members = group.members_mut();
                members[index].open(&request)?;
                if index == 0 {
                    group_fd = members[0].file_descriptor().unwrap_or(-1);
                }
            }

            // The buffer belongs to the counter that carries the sample
            // configuration: member 1 under an auxiliary leader.
            let buffer_member = if aux_leader && group.size() > 1 { 1 } else { 0 };
            let file = group
                .member(buffer_member)
                .and_then(|member| member.file())
                .expect("buffer member was just opened");
            let arena =
                Arena::new(file, self.config.buffer_pages).map_err(Error::BufferMapFailed)?;

            debug!(
                members = group.size(),
                aux_leader,
                buffer_member,
                pages = self.config.buffer_pages,
                "trigger group opened"
            );

            self.counters.push(SampleCounter {
                group,
                arena: Some(arena),
                names,
            });
        }

        Ok(())
    }

    /// Opens (if needed) and enables every trigger group.
    pub fn start(&mut self) -> Result<()> {
        self.open()?;
        for counter in &self.counters {
            counter.group.enable()?;
        }
        Ok(())
    }

    /// Disables every trigger group. Buffers and descriptors stay mapped so
    /// [`result`][Self::result] can drain them.
    pub fn stop(&mut self) -> Result<()> {
        for counter in &self.counters {
            counter.group.disable()?;
        }
        Ok(())
    }

    /// Drains every ring buffer into typed samples.
    ///
    /// With `sort_by_time` the records of all buffers are merged into one
    /// timeline; sorting is silently skipped when the field mask does not
    /// record timestamps. An unopened sampler returns no samples.
    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        let mut samples = Vec::new();

        for counter in &self.counters {
            let Some(arena) = &counter.arena else {
                continue;
            };
            let ring = RingBuffer::new(arena.data(), arena.head(), arena.tail());
            for (header, body) in ring.drain() {
                if let Some(sample) =
                    record::parse_record(&header, &body, &self.values, &counter.names)
                {
                    samples.push(sample);
                }
            }
        }

        if sort_by_time && self.values.is_set(b::PERF_SAMPLE_TIME) {
            samples.sort_by_key(|sample| sample.time().unwrap_or(0));
        }
        samples
    }

    /// Unmaps every buffer and closes every counter; the sampler can be
    /// opened again afterwards.
    pub fn close(&mut self) {
        for counter in &mut self.counters {
            counter.arena = None;
            counter.group.close();
        }
        self.counters.clear();
        self.opened = false;
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.close();
    }
}
