//! Byte-exact drain of the kernel data ring.
//!
//! `data_head` and `data_tail` are monotonically increasing byte offsets into
//! a power-of-two ring; records are concatenated, each starting with a
//! `perf_event_header`. A drain walks from tail to head, copying out every
//! record (a record may wrap around the ring edge), and finally publishes
//! `data_tail = data_head` so the kernel can reuse the space. Skipping that
//! store would make the kernel consider the buffer full and drop all new
//! records.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ffi::bindings::PerfEventHeader;

const HEADER_LEN: usize = mem::size_of::<PerfEventHeader>();

/// Reader over one mapped data ring.
pub(crate) struct RingBuffer<'a> {
    data: &'a [u8],
    head: &'a AtomicU64,
    tail: &'a AtomicU64,
}

impl<'a> RingBuffer<'a> {
    pub fn new(data: &'a [u8], head: &'a AtomicU64, tail: &'a AtomicU64) -> Self {
        debug_assert!(data.len().is_power_of_two());
        Self { data, head, tail }
    }

    /// Consumes every record currently in the ring.
    ///
    /// Returns `(header, body)` pairs in kernel-enqueue order; the body
    /// excludes the header bytes.
    pub fn drain(&self) -> Vec<(PerfEventHeader, Vec<u8>)> {
        let size = self.data.len() as u64;
        // Pairs with the kernel's Release store of data_head.
        let head = self.head.load(Ordering::Acquire);
        let mut tail = self.tail.load(Ordering::Relaxed);

        let mut records = Vec::new();
        while tail < head {
            let available = head - tail;
            if available < HEADER_LEN as u64 {
                break;
            }

            let header_bytes = self.copy_out(tail, HEADER_LEN);
            let header = PerfEventHeader {
                type_: u32::from_ne_bytes(header_bytes[0..4].try_into().unwrap()),
                misc: u16::from_ne_bytes(header_bytes[4..6].try_into().unwrap()),
                size: u16::from_ne_bytes(header_bytes[6..8].try_into().unwrap()),
            };

            // A record never exceeds the ring and never claims more than is
            // published; anything else means we lost sync with the producer.
            let record_len = header.size as u64;
            if record_len < HEADER_LEN as u64 || record_len > available || record_len > size {
                tail = head;
                break;
            }

            let body = self.copy_out(tail + HEADER_LEN as u64, record_len as usize - HEADER_LEN);
            records.push((header, body));
            tail += record_len;
        }

        // Publish consumption so the kernel can overwrite the space.
        self.tail.store(head, Ordering::Release);
        records
    }

    /// Copies `len` bytes starting at absolute offset `at`, handling the
    /// wrap at the ring edge.
    fn copy_out(&self, at: u64, len: usize) -> Vec<u8> {
        let size = self.data.len();
        let start = (at % size as u64) as usize;
        let mut out = Vec::with_capacity(len);
        let first = len.min(size - start);
        out.extend_from_slice(&self.data[start..start + first]);
        if first < len {
            out.extend_from_slice(&self.data[..len - first]);
        }
        out
    }
}
