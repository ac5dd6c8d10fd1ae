use std::fs::File;
use std::io::Result;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::AtomicU64;

use tracing::trace;

use crate::ffi::bindings::PerfEventMmapPage;
use crate::ffi::syscall::{mmap, munmap};
use crate::ffi::PAGE_SIZE;

/// One mapped perf buffer: the control page followed by the data ring.
///
/// Mapped shared and writable so the reader can publish `data_tail` back to
/// the kernel after draining; unmapped on drop.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    len: usize,
}

impl Arena {
    pub fn new(file: &File, pages: usize) -> Result<Self> {
        let len = pages * PAGE_SIZE;
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        let flags = libc::MAP_SHARED;
        let ptr = unsafe { mmap(len, prot, flags, file, 0) }?;
        trace!(pages, len, "sample buffer mapped");
        Ok(Self {
            ptr: NonNull::new(ptr).expect("mmap success is non-null"),
            len,
        })
    }

    fn control(&self) -> *mut PerfEventMmapPage {
        self.ptr.as_ptr() as *mut PerfEventMmapPage
    }

    /// `data_head`: advanced by the kernel as records are written.
    pub fn head(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(&mut (*self.control()).data_head as *mut u64) }
    }

    /// `data_tail`: advanced by us after records are consumed.
    pub fn tail(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(&mut (*self.control()).data_tail as *mut u64) }
    }

    /// The power-of-two data ring behind the control page.
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(PAGE_SIZE), self.len - PAGE_SIZE) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(err) = unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            tracing::error!(%err, "failed to unmap sample buffer");
        } else {
            trace!(len = self.len, "sample buffer unmapped");
        }
    }
}

// The mapping stays valid for the lifetime of the Arena.
unsafe impl Send for Arena {}
