//! Fan-out of [`Sampler`] across threads and CPU cores.

use std::sync::Arc;

use super::record::Sample;
use super::values::SampleValues;
use super::{Sampler, Trigger};
use crate::config::SampleConfig;
use crate::error::Result;
use crate::event::CounterDefinition;
use crate::ffi::bindings as b;

/// One [`Sampler`] per thread; each thread drives its own instance.
pub struct MultiThreadSampler {
    samplers: Vec<Sampler>,
}

impl MultiThreadSampler {
    pub fn new(definitions: Arc<CounterDefinition>, num_threads: usize, config: SampleConfig) -> Self {
        let samplers = (0..num_threads)
            .map(|_| Sampler::new(Arc::clone(&definitions), config.clone()))
            .collect();
        Self { samplers }
    }

    /// Applies the field mask to every thread-local sampler.
    pub fn set_values(&mut self, values: SampleValues) {
        for sampler in &mut self.samplers {
            sampler.set_values(values.clone());
        }
    }

    /// Configures the same trigger groups on every thread-local sampler.
    pub fn trigger_with(&mut self, groups: Vec<Vec<Trigger>>) -> Result<()> {
        for sampler in &mut self.samplers {
            sampler.trigger_with(groups.clone())?;
        }
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.samplers.len()
    }

    /// The sampler belonging to `thread_id`.
    pub fn of_thread(&mut self, thread_id: usize) -> Option<&mut Sampler> {
        self.samplers.get_mut(thread_id)
    }

    /// Merged samples of every thread.
    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        merged_result(&mut self.samplers, sort_by_time)
    }
}

/// One [`Sampler`] per CPU core, sampling every process on it.
pub struct MultiCoreSampler {
    samplers: Vec<Sampler>,
}

impl MultiCoreSampler {
    pub fn new(
        definitions: Arc<CounterDefinition>,
        cpu_ids: impl IntoIterator<Item = u16>,
        config: SampleConfig,
    ) -> Self {
        let samplers = cpu_ids
            .into_iter()
            .map(|cpu_id| {
                let mut config = config.clone();
                // Record every thread and process on the selected CPUs.
                config.base.process_id = -1;
                config.base.cpu_id = Some(cpu_id);
                Sampler::new(Arc::clone(&definitions), config)
            })
            .collect();
        Self { samplers }
    }

    pub fn set_values(&mut self, values: SampleValues) {
        for sampler in &mut self.samplers {
            sampler.set_values(values.clone());
        }
    }

    pub fn trigger_with(&mut self, groups: Vec<Vec<Trigger>>) -> Result<()> {
        for sampler in &mut self.samplers {
            sampler.trigger_with(groups.clone())?;
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        for index in 0..self.samplers.len() {
            if let Err(err) = self.samplers[index].start() {
                for started in &mut self.samplers[..index] {
                    let _ = started.stop();
                    started.close();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let mut first_error = None;
        for sampler in &mut self.samplers {
            if let Err(err) = sampler.stop() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        merged_result(&mut self.samplers, sort_by_time)
    }
}

/// Drains every instance and merges the timelines. Sorting only applies when
/// every instance records timestamps; otherwise buffer order is preserved.
fn merged_result(samplers: &mut [Sampler], sort_by_time: bool) -> Vec<Sample> {
    let sortable = samplers
        .iter()
        .all(|sampler| sampler.values().is_set(b::PERF_SAMPLE_TIME));

    let mut samples = Vec::new();
    for sampler in samplers {
        samples.extend(sampler.result(false));
    }

    if sort_by_time && sortable {
        samples.sort_by_key(|sample| sample.time().unwrap_or(0));
    }
    samples
}
