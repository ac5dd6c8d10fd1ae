//! Counter groups: up to eight events scheduled onto the PMU as a unit.

use std::fs::File;
use std::mem;

use arrayvec::ArrayVec;

use super::{Counter, OpenRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::CounterConfig;
use crate::ffi::bindings as b;
use crate::ffi::syscall::{ioctl_arg, read};

/// The grouped read format caps out at eight members; more events per group
/// could not be read back in one snapshot.
pub const MAX_MEMBERS: usize = 8;

// struct read_format {
//     u64 nr;
//     u64 time_enabled;   && PERF_FORMAT_TOTAL_TIME_ENABLED
//     u64 time_running;   && PERF_FORMAT_TOTAL_TIME_RUNNING
//     { u64 value; u64 id; } cntr[nr];
// }
const READ_BUF_LEN: usize = (3 + 2 * MAX_MEMBERS) * mem::size_of::<u64>();

/// One grouped read: enabled/running times plus `(id, value)` per member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct GroupSnapshot {
    pub time_enabled: u64,
    pub time_running: u64,
    pub values: ArrayVec<(u64, u64), MAX_MEMBERS>,
}

impl GroupSnapshot {
    /// Decodes the kernel read format from however many bytes the read
    /// returned. `None` if not even the header fits.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let mut words = buf
            .chunks_exact(mem::size_of::<u64>())
            .map(|c| u64::from_ne_bytes(c.try_into().unwrap()));

        let nr = words.next()?;
        let time_enabled = words.next()?;
        let time_running = words.next()?;

        let mut values = ArrayVec::new();
        for _ in 0..nr.min(MAX_MEMBERS as u64) {
            let value = words.next()?;
            let id = words.next()?;
            values.push((id, value));
        }

        Some(Self {
            time_enabled,
            time_running,
            values,
        })
    }

    pub fn value_for_id(&self, id: u64) -> Option<u64> {
        self.values
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, value)| *value)
    }
}

/// An ordered set of at most [`MAX_MEMBERS`] counters sharing a leader.
///
/// The group is put onto the PMU only as a whole, so member values count the
/// same instruction stream and can be meaningfully compared and divided.
/// Member 0 is the leader; its descriptor carries enable/disable/read for
/// everyone.
pub struct Group {
    members: ArrayVec<Counter, MAX_MEMBERS>,
    start_value: Option<GroupSnapshot>,
    end_value: Option<GroupSnapshot>,
    // Memoized at stop: time_enabled delta over time_running delta.
    multiplexing_correction: f64,
}

impl Group {
    pub fn new() -> Self {
        Self {
            members: ArrayVec::new(),
            start_value: None,
            end_value: None,
            multiplexing_correction: 1.0,
        }
    }

    /// Appends an (unopened) counter. `false` when the group is full.
    pub(crate) fn add(&mut self, config: CounterConfig) -> bool {
        self.members.try_push(Counter::new(config)).is_ok()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, index: usize) -> Option<&Counter> {
        self.members.get(index)
    }

    pub(crate) fn members_mut(&mut self) -> &mut [Counter] {
        &mut self.members
    }

    /// The leader's descriptor: the descriptor of member 0.
    pub fn leader_file_descriptor(&self) -> Option<i32> {
        self.members.first().and_then(Counter::file_descriptor)
    }

    fn leader_file(&self) -> Result<&File> {
        let leader = self.members.first().ok_or(Error::EmptyGroup)?;
        // A member without a descriptor means the group was never opened.
        leader.file().ok_or(Error::OpenFailed {
            errno: libc::EBADF,
        })
    }

    /// Opens every member for counting (no sampling), leader first.
    pub(crate) fn open(&mut self, config: &Config) -> Result<()> {
        let mut group_fd = -1;
        for index in 0..self.members.len() {
            let request = OpenRequest {
                config,
                is_group_leader: index == 0,
                is_secret_leader: false,
                group_fd,
                read_format: true,
                sampling: None,
            };
            if let Err(err) = self.members[index].open(&request) {
                // Roll back the descriptors acquired so far.
                self.close();
                return Err(err);
            }
            if index == 0 {
                group_fd = self.members[0].file_descriptor().unwrap_or(-1);
            }
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        for member in &mut self.members {
            member.close();
        }
    }

    /// Resets and enables the group, then records the start snapshot.
    pub fn start(&mut self) -> Result<()> {
        let leader = self.leader_file()?;
        ioctl_arg(leader, b::PERF_EVENT_IOC_RESET, 0).map_err(Error::from_errno)?;
        ioctl_arg(leader, b::PERF_EVENT_IOC_ENABLE, 0).map_err(Error::from_errno)?;
        self.start_value = self.read_snapshot()?;
        Ok(())
    }

    /// Records the end snapshot, disables the group and memoizes the
    /// multiplexing correction.
    pub fn stop(&mut self) -> Result<()> {
        self.end_value = self.read_snapshot()?;
        let leader = self.leader_file()?;
        ioctl_arg(leader, b::PERF_EVENT_IOC_DISABLE, 0).map_err(Error::from_errno)?;

        self.multiplexing_correction = match (&self.start_value, &self.end_value) {
            (Some(start), Some(end)) => {
                let enabled = end.time_enabled.saturating_sub(start.time_enabled);
                let running = end.time_running.saturating_sub(start.time_running);
                if running == 0 {
                    1.0
                } else {
                    enabled as f64 / running as f64
                }
            }
            _ => 1.0,
        };
        Ok(())
    }

    /// Enables the group without snapshotting (sampling path).
    pub(crate) fn enable(&self) -> Result<()> {
        let leader = self.leader_file()?;
        ioctl_arg(leader, b::PERF_EVENT_IOC_ENABLE, 0).map_err(Error::from_errno)?;
        Ok(())
    }

    /// Disables the group without snapshotting (sampling path).
    pub(crate) fn disable(&self) -> Result<()> {
        let leader = self.leader_file()?;
        ioctl_arg(leader, b::PERF_EVENT_IOC_DISABLE, 0).map_err(Error::from_errno)?;
        Ok(())
    }

    /// Multiplexing-corrected count of the member at `index` between the two
    /// snapshots. Zero when the counter id is missing from either snapshot
    /// (e.g. the group was never started).
    pub fn get(&self, index: usize) -> f64 {
        let Some(member) = self.members.get(index) else {
            return 0.0;
        };
        let (Some(start), Some(end)) = (&self.start_value, &self.end_value) else {
            return 0.0;
        };
        let (Some(start_value), Some(end_value)) = (
            start.value_for_id(member.id()),
            end.value_for_id(member.id()),
        ) else {
            return 0.0;
        };

        // Clamp: a follower that never got scheduled can read lower than at
        // start.
        let delta = end_value.saturating_sub(start_value);
        delta as f64 * self.multiplexing_correction
    }

    fn read_snapshot(&self) -> Result<Option<GroupSnapshot>> {
        let leader = self.leader_file()?;
        let mut buf = [0u8; READ_BUF_LEN];
        let n = read(leader, &mut buf).map_err(Error::from_errno)?;
        Ok(GroupSnapshot::parse(&buf[..n]))
    }

    #[cfg(test)]
    pub(crate) fn set_snapshots(&mut self, start: GroupSnapshot, end: GroupSnapshot) {
        let enabled = end.time_enabled.saturating_sub(start.time_enabled);
        let running = end.time_running.saturating_sub(start.time_running);
        self.multiplexing_correction = if running == 0 {
            1.0
        } else {
            enabled as f64 / running as f64
        };
        self.start_value = Some(start);
        self.end_value = Some(end);
    }

    #[cfg(test)]
    pub(crate) fn set_member_id(&mut self, index: usize, id: u64) {
        self.members[index].set_id(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(time_enabled: u64, time_running: u64, values: &[(u64, u64)]) -> GroupSnapshot {
        GroupSnapshot {
            time_enabled,
            time_running,
            values: values.iter().copied().collect(),
        }
    }

    fn words(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn snapshot_parses_the_kernel_read_format() {
        let buf = words(&[2, 100, 50, 11, 1, 22, 2]);
        let snap = GroupSnapshot::parse(&buf).unwrap();
        assert_eq!(snap.time_enabled, 100);
        assert_eq!(snap.time_running, 50);
        assert_eq!(snap.value_for_id(1), Some(11));
        assert_eq!(snap.value_for_id(2), Some(22));
        assert_eq!(snap.value_for_id(3), None);
    }

    #[test]
    fn snapshot_tolerates_short_reads() {
        assert_eq!(GroupSnapshot::parse(&[]), None);
        // Header present but the advertised members are cut off.
        let buf = words(&[2, 100, 50, 11, 1]);
        assert_eq!(GroupSnapshot::parse(&buf), None);
    }

    fn two_member_group() -> Group {
        let mut group = Group::new();
        assert!(group.add(CounterConfig::new(b::PERF_TYPE_HARDWARE, 0)));
        assert!(group.add(CounterConfig::new(b::PERF_TYPE_HARDWARE, 1)));
        group.set_member_id(0, 100);
        group.set_member_id(1, 200);
        group
    }

    #[test]
    fn get_applies_the_multiplexing_correction() {
        let mut group = two_member_group();
        group.set_snapshots(
            snapshot(0, 0, &[(100, 10), (200, 5)]),
            // Enabled twice as long as running: counts scale by 2.
            snapshot(200, 100, &[(100, 110), (200, 55)]),
        );
        assert_eq!(group.get(0), 200.0);
        assert_eq!(group.get(1), 100.0);
    }

    #[test]
    fn correction_falls_back_to_one_when_never_running() {
        let mut group = two_member_group();
        group.set_snapshots(snapshot(0, 0, &[(100, 0)]), snapshot(500, 0, &[(100, 7)]));
        assert_eq!(group.get(0), 7.0);
    }

    #[test]
    fn negative_deltas_clamp_to_zero() {
        let mut group = two_member_group();
        group.set_snapshots(
            snapshot(0, 0, &[(100, 50)]),
            snapshot(10, 10, &[(100, 40)]),
        );
        assert_eq!(group.get(0), 0.0);
    }

    #[test]
    fn missing_ids_read_as_zero() {
        let mut group = two_member_group();
        group.set_snapshots(
            snapshot(0, 0, &[(100, 1)]),
            snapshot(10, 10, &[(100, 2)]),
        );
        // Member 1 (id 200) is absent from both snapshots.
        assert_eq!(group.get(1), 0.0);
    }

    #[test]
    fn unstarted_groups_read_as_zero() {
        let group = two_member_group();
        assert_eq!(group.get(0), 0.0);
    }

    #[test]
    fn the_ninth_member_is_rejected() {
        let mut group = Group::new();
        for i in 0..MAX_MEMBERS {
            assert!(group.add(CounterConfig::new(b::PERF_TYPE_RAW, i as u64)));
        }
        assert!(!group.add(CounterConfig::new(b::PERF_TYPE_RAW, 99)));
        assert_eq!(group.size(), MAX_MEMBERS);
    }

    #[test]
    fn start_on_an_empty_group_fails() {
        let mut group = Group::new();
        assert!(matches!(group.start(), Err(Error::EmptyGroup)));
    }

    #[test]
    fn leader_fd_is_member_zero() {
        let group = two_member_group();
        // Unopened members have no descriptor, leader included.
        assert_eq!(group.leader_file_descriptor(), None);
    }
}
