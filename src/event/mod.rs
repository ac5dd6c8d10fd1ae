//! Event descriptions: the immutable per-event attribute tuple and the
//! name registry that maps human-readable counter names onto it.

pub mod definition;

pub use definition::{CounterDefinition, Metric};

use crate::config::{SampleOn, SampleSkid};

/// Event id of Intel's `mem-loads-aux` event, the auxiliary counter some
/// microarchitectures require to lead a memory-sampling group. Used as a
/// fallback when sysfs discovery is unavailable.
pub(crate) const INTEL_AUX_EVENT_ID: u64 = 0x8203;

/// Immutable description of a single kernel event.
///
/// A config pairs the PMU `type` number (a well-known constant or a value
/// discovered under `/sys/bus/event_source/devices/.../type`) with the 64-bit
/// event id and the two extension words some PMUs interpret, plus the
/// sampling hints applied when the event drives a trigger group.
#[derive(Clone, Copy, Debug)]
pub struct CounterConfig {
    ty: u32,
    event_id: u64,
    event_id_extension: [u64; 2],
    skid: SampleSkid,
    sample_on: SampleOn,
    auxiliary: bool,
}

impl CounterConfig {
    pub fn new(ty: u32, event_id: u64) -> Self {
        Self {
            ty,
            event_id,
            event_id_extension: [0, 0],
            skid: SampleSkid::Arbitrary,
            sample_on: SampleOn::default(),
            auxiliary: false,
        }
    }

    pub fn with_extension(ty: u32, event_id: u64, ext1: u64, ext2: u64) -> Self {
        Self {
            event_id_extension: [ext1, ext2],
            ..Self::new(ty, event_id)
        }
    }

    pub fn ty(&self) -> u32 {
        self.ty
    }

    pub fn event_id(&self) -> u64 {
        self.event_id
    }

    pub fn event_id_extension(&self) -> [u64; 2] {
        self.event_id_extension
    }

    pub fn skid(&self) -> SampleSkid {
        self.skid
    }

    pub fn sample_on(&self) -> SampleOn {
        self.sample_on
    }

    pub fn set_skid(&mut self, skid: SampleSkid) {
        self.skid = skid;
    }

    pub fn set_sample_on(&mut self, sample_on: SampleOn) {
        self.sample_on = sample_on;
    }

    /// True if this event is an auxiliary counter that must lead a
    /// memory-sampling group without being the semantic sample source.
    ///
    /// Events registered from the discovered sysfs `mem-loads-aux` id are
    /// flagged directly; the hard-coded id covers configs built by hand.
    pub fn is_auxiliary(&self) -> bool {
        self.auxiliary || self.event_id == INTEL_AUX_EVENT_ID
    }

    pub(crate) fn mark_auxiliary(&mut self) {
        self.auxiliary = true;
    }
}
