use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while configuring, opening or mapping
/// counters.
///
/// Degradations the kernel absorbs silently (lower sampling precision,
/// multiplexed counters) are not errors; they surface through
/// [`Sample::is_exact_ip`][crate::sample::record::Sample] and the
/// multiplexing correction instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced name is neither a counter nor a metric in the registry.
    #[error("unknown counter or metric '{0}'")]
    UnknownName(String),

    /// A metric was supplied where a trigger event is required. Metrics
    /// consist of multiple events and cannot drive a ring buffer.
    #[error("'{0}' is a metric; metrics cannot be used as sample triggers")]
    MetricAsTrigger(String),

    /// The configured maximum number of groups is exhausted.
    #[error("cannot open another group (maximum: {max})")]
    TooManyGroups { max: usize },

    /// Neither the current group nor a fresh one can take another counter.
    #[error("no capacity left for counter '{name}'")]
    NoCapacity { name: String },

    /// Every `perf_event_open` attempt failed.
    #[error("perf_event_open failed (errno {errno})")]
    OpenFailed { errno: i32 },

    /// `mmap` of the sample ring buffer failed.
    #[error("mapping the sample buffer failed")]
    BufferMapFailed(#[source] io::Error),

    /// `start` was called on a group without members.
    #[error("cannot start an empty group")]
    EmptyGroup,

    /// The sampler has no trigger groups configured.
    #[error("no trigger for sampling specified")]
    NoTriggers,

    /// The capability needs a newer `linux-*` crate feature than this build
    /// was compiled with.
    #[error("'{0}' requires a newer kernel feature level than this build targets")]
    Unsupported(&'static str),
}

impl Error {
    pub(crate) fn from_errno(err: io::Error) -> Self {
        Error::OpenFailed {
            errno: err.raw_os_error().unwrap_or(0),
        }
    }
}
