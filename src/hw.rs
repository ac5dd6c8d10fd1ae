//! Runtime hardware discovery: CPUID checks and the sysfs event-source tree.
//!
//! All queries are stateless and return `None`/`false` when the probe fails
//! (non-x86 target, unsupported CPU, missing sysfs file). Callers that probe
//! repeatedly should memoize on their side.

use std::fs;
use std::path::Path;

/// Queries about the machine the process runs on.
pub struct HardwareInfo;

impl HardwareInfo {
    /// True on Intel processors.
    pub fn is_intel() -> bool {
        vendor_is("GenuineIntel")
    }

    /// True on AMD processors.
    pub fn is_amd() -> bool {
        vendor_is("AuthenticAMD")
    }

    /// True on Intel processors that require the `mem-loads-aux` auxiliary
    /// counter to lead memory-sampling groups (Sapphire Rapids, Alder Lake).
    pub fn is_intel_aux_counter_required() -> bool {
        Self::is_intel() && family_model().is_some_and(|(family, model)| {
            family == 6 && matches!(model, 0x8f | 0x97 | 0x9a)
        })
    }

    /// True on AMD processors supporting Instruction Based Sampling
    /// (CPUID 0x8000_0001 ECX bit 10).
    pub fn is_amd_ibs_supported() -> bool {
        Self::is_amd() && extended_leaf(0x8000_0001).is_some_and(|r| r.ecx & (1 << 10) != 0)
    }

    /// True on AMD processors whose IBS supports L3-miss filtering
    /// (CPUID 0x8000_001B EAX bit 11).
    pub fn is_ibs_l3_filter_supported() -> bool {
        Self::is_amd_ibs_supported()
            && extended_leaf(0x8000_001b).is_some_and(|r| r.eax & (1 << 11) != 0)
    }

    /// Dynamic PMU type number of the AMD IBS execution counter.
    pub fn amd_ibs_op_type() -> Option<u32> {
        if !Self::is_amd_ibs_supported() {
            return None;
        }
        parse_type_file("/sys/bus/event_source/devices/ibs_op/type")
    }

    /// Dynamic PMU type number of the AMD IBS fetch counter.
    pub fn amd_ibs_fetch_type() -> Option<u32> {
        if !Self::is_amd_ibs_supported() {
            return None;
        }
        parse_type_file("/sys/bus/event_source/devices/ibs_fetch/type")
    }

    /// Event id of Intel's PEBS `mem-loads` event.
    pub fn intel_pebs_mem_loads_event_id() -> Option<u64> {
        Self::intel_event_id("mem-loads")
    }

    /// Event id of Intel's PEBS `mem-loads-aux` event.
    pub fn intel_pebs_mem_loads_aux_event_id() -> Option<u64> {
        Self::intel_event_id("mem-loads-aux")
    }

    /// Event id of Intel's PEBS `mem-stores` event.
    pub fn intel_pebs_mem_stores_event_id() -> Option<u64> {
        Self::intel_event_id("mem-stores")
    }

    fn intel_event_id(event: &str) -> Option<u64> {
        if !Self::is_intel() {
            return None;
        }
        let path = format!("/sys/bus/event_source/devices/cpu/events/{event}");
        let line = fs::read_to_string(path).ok()?;
        parse_event_umask(&line)
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn vendor_is(name: &str) -> bool {
    raw_cpuid::CpuId::new()
        .get_vendor_info()
        .is_some_and(|v| v.as_str() == name)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn family_model() -> Option<(u16, u16)> {
    let info = raw_cpuid::CpuId::new().get_feature_info()?;
    Some((info.family_id() as u16, info.model_id() as u16))
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn extended_leaf(leaf: u32) -> Option<raw_cpuid::CpuIdResult> {
    let max = raw_cpuid::cpuid!(0x8000_0000u32).eax;
    (max >= leaf).then(|| raw_cpuid::cpuid!(leaf))
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn vendor_is(_name: &str) -> bool {
    false
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn family_model() -> Option<(u16, u16)> {
    None
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
struct CpuIdResult {
    eax: u32,
    ecx: u32,
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn extended_leaf(_leaf: u32) -> Option<CpuIdResult> {
    None
}

fn parse_type_file(path: impl AsRef<Path>) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Parses a sysfs event description of the form `event=0xCD,umask=0x1,ldlat=3`
/// into the encoded event id: the hexadecimal concatenation `<umask><event>`.
fn parse_event_umask(line: &str) -> Option<u64> {
    let mut event = None;
    let mut umask = None;

    for token in line.trim().split(',') {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_start_matches("0x");
        match key.as_str() {
            "event" => event = Some(value),
            "umask" => umask = Some(value),
            _ => {}
        }
    }

    let (event, umask) = (event?, umask?);
    u64::from_str_radix(&format!("{umask}{event}"), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_umask_lines_concatenate_hex() {
        assert_eq!(parse_event_umask("event=0xcd,umask=0x1,ldlat=3"), Some(0x1cd));
        assert_eq!(parse_event_umask("event=0xd0, umask=0x82"), Some(0x82d0));
        // Key order and case must not matter.
        assert_eq!(parse_event_umask("UMASK=0x3,EVENT=0x8"), Some(0x38));
    }

    #[test]
    fn malformed_event_lines_are_rejected() {
        assert_eq!(parse_event_umask("event=0xcd"), None);
        assert_eq!(parse_event_umask(""), None);
        assert_eq!(parse_event_umask("event=0xzz,umask=0x1"), None);
    }

    #[test]
    fn vendor_checks_are_exclusive() {
        assert!(!(HardwareInfo::is_intel() && HardwareInfo::is_amd()));
    }

    #[test]
    fn ibs_types_require_amd() {
        if !HardwareInfo::is_amd() {
            assert_eq!(HardwareInfo::amd_ibs_op_type(), None);
            assert_eq!(HardwareInfo::amd_ibs_fetch_type(), None);
        }
    }
}
