//! Typed event counting and statistical sampling on top of the Linux
//! `perf_event_open` syscall.
//!
//! Two frontends cover the two halves of the perf subsystem:
//!
//! - [`EventCounter`][count::EventCounter] counts named hardware and
//!   software events across a code region and evaluates derived metrics,
//!   similar to `perf stat`.
//! - [`Sampler`][sample::Sampler] drives trigger groups with mapped ring
//!   buffers and reconstructs typed [`Sample`][sample::Sample]s from the
//!   kernel's record stream, similar to `perf record`.
//!
//! Both resolve event names through a [`CounterDefinition`][event::CounterDefinition]
//! registry that knows the generalized kernel events and whatever the
//! running machine's PMUs advertise (AMD IBS, Intel PEBS memory events).
//!
//! ## Counting
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use perfmon::config::Config;
//! use perfmon::count::EventCounter;
//! use perfmon::event::CounterDefinition;
//!
//! # fn main() -> perfmon::Result<()> {
//! let definitions = Arc::new(CounterDefinition::new());
//! let mut events = EventCounter::new(definitions, Config::default());
//! events.add_all(["instructions", "cycles", "cycles-per-instruction"])?;
//!
//! events.start()?;
//! // ... workload ...
//! events.stop()?;
//!
//! for (name, value) in events.result(1).iter() {
//!     println!("{value:>12.2}  {name}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sampling
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use perfmon::config::{SampleConfig, SampleOn};
//! use perfmon::event::CounterDefinition;
//! use perfmon::sample::Sampler;
//!
//! # fn main() -> perfmon::Result<()> {
//! let definitions = Arc::new(CounterDefinition::new());
//! let mut config = SampleConfig::default();
//! config.sample_on = SampleOn::Count(10_000);
//!
//! let mut sampler = Sampler::new(definitions, config);
//! sampler.values_mut().ip = true;
//! sampler.values_mut().time = true;
//! sampler.trigger([["cycles"]])?;
//!
//! sampler.start()?;
//! // ... workload ...
//! sampler.stop()?;
//!
//! for sample in sampler.result(true) {
//!     println!("{sample:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Permissions
//!
//! Access to performance monitoring needs `CAP_PERFMON` (or `CAP_SYS_ADMIN`),
//! or a permissive `/proc/sys/kernel/perf_event_paranoid`:
//!
//! - `-1`: allow (almost) everything to all users
//! - `>= 0`: no raw tracepoint access
//! - `>= 1`: no CPU-wide event access
//! - `>= 2`: no kernel profiling
//!
//! ## Kernel compatibility
//!
//! Any kernel since 4.0 works. Capabilities that appeared later are gated
//! behind the cumulative `linux-*` cargo features (see `Cargo.toml`); the
//! default `latest` feature enables everything up to Linux 5.13.

pub mod config;
pub mod count;
mod error;
pub mod event;
mod ffi;
pub mod hw;
pub mod sample;

pub use error::{Error, Result};
