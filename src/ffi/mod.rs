pub mod bindings;
pub mod syscall;

// The perf ring buffer is always carved out of 4096-byte pages; the control
// page is exactly one of them.
pub const PAGE_SIZE: usize = 4096;

pub use bindings::PerfEventAttr as Attr;
