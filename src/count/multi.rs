//! Fan-out of [`EventCounter`] across threads, processes and CPU cores.
//!
//! Each wrapper holds N independent instances bound to distinct
//! `(process, cpu)` pairs. Aggregated results sum the hardware counters
//! across instances and recompute metrics from the aggregate.

use std::sync::Arc;

use super::event_counter::{aggregate_result, EventCounter};
use super::CounterResult;
use crate::config::Config;
use crate::error::Result;
use crate::event::CounterDefinition;

/// One [`EventCounter`] per thread.
///
/// Every thread drives its own instance through
/// [`of_thread`][Self::of_thread]; concurrent mutation of the same instance
/// is not synchronized here.
pub struct MultiThreadEventCounter {
    instances: Vec<EventCounter>,
}

impl MultiThreadEventCounter {
    pub fn new(definitions: Arc<CounterDefinition>, num_threads: usize, config: Config) -> Self {
        let instances = (0..num_threads)
            .map(|_| EventCounter::new(Arc::clone(&definitions), config.clone()))
            .collect();
        Self { instances }
    }

    /// Adds a counter or metric to every thread-local instance.
    pub fn add(&mut self, name: &str) -> Result<()> {
        for instance in &mut self.instances {
            instance.add(name)?;
        }
        Ok(())
    }

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

    pub fn num_threads(&self) -> usize {
        self.instances.len()
    }

    /// The instance belonging to `thread_id`.
    pub fn of_thread(&mut self, thread_id: usize) -> Option<&mut EventCounter> {
        self.instances.get_mut(thread_id)
    }

    /// Aggregated result over every thread, divided by `normalization`.
    pub fn result(&self, normalization: u64) -> CounterResult {
        aggregate_result(&self.instances, normalization)
    }
}

/// One [`EventCounter`] per monitored process.
pub struct MultiProcessEventCounter {
    instances: Vec<EventCounter>,
}

impl MultiProcessEventCounter {
    pub fn new(
        definitions: Arc<CounterDefinition>,
        process_ids: impl IntoIterator<Item = i32>,
        config: Config,
    ) -> Self {
        let instances = process_ids
            .into_iter()
            .map(|process_id| {
                let mut config = config.clone();
                config.process_id = process_id;
                EventCounter::new(Arc::clone(&definitions), config)
            })
            .collect();
        Self { instances }
    }

    pub fn add(&mut self, name: &str) -> Result<()> {
        for instance in &mut self.instances {
            instance.add(name)?;
        }
        Ok(())
    }

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

    pub fn start(&mut self) -> Result<()> {
        start_all(&mut self.instances)
    }

    pub fn stop(&mut self) -> Result<()> {
        stop_all(&mut self.instances)
    }

    pub fn result(&self, normalization: u64) -> CounterResult {
        aggregate_result(&self.instances, normalization)
    }
}

/// One [`EventCounter`] per CPU core, monitoring every process on it.
pub struct MultiCoreEventCounter {
    instances: Vec<EventCounter>,
}

impl MultiCoreEventCounter {
    pub fn new(
        definitions: Arc<CounterDefinition>,
        cpu_ids: impl IntoIterator<Item = u16>,
        config: Config,
    ) -> Self {
        let instances = cpu_ids
            .into_iter()
            .map(|cpu_id| {
                let mut config = config.clone();
                // Record every process and thread on the selected CPUs.
                config.process_id = -1;
                config.cpu_id = Some(cpu_id);
                EventCounter::new(Arc::clone(&definitions), config)
            })
            .collect();
        Self { instances }
    }

    pub fn add(&mut self, name: &str) -> Result<()> {
        for instance in &mut self.instances {
            instance.add(name)?;
        }
        Ok(())
    }

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

    pub fn start(&mut self) -> Result<()> {
        start_all(&mut self.instances)
    }

    pub fn stop(&mut self) -> Result<()> {
        stop_all(&mut self.instances)
    }

    pub fn result(&self, normalization: u64) -> CounterResult {
        aggregate_result(&self.instances, normalization)
    }
}

fn start_all(instances: &mut [EventCounter]) -> Result<()> {
    for index in 0..instances.len() {
        if let Err(err) = instances[index].start() {
            for started in &mut instances[..index] {
                let _ = started.stop();
            }
            return Err(err);
        }
    }
    Ok(())
}

fn stop_all(instances: &mut [EventCounter]) -> Result<()> {
    let mut first_error = None;
    for instance in instances {
        if let Err(err) = instance.stop() {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
