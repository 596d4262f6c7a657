//! Set of live extension-owned object handles.
//!
//! This is the only state that changes between calls. It is a presence
//! check, not a reference count: a handle is either an extension instance
//! the bridge created and has not freed, or it is not.
//!
//! Each host slot index maps to one atomic cell holding the full handle
//! (slot plus generation) while it is tracked, or zero. Cells live in
//! segments that double in size and are allocated on first `track`, so
//! `contains` is two atomic loads and never blocks behind `track`/`untrack`.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::raw::RawHandle;

/// Cells in segment zero. Segment `k` holds `BASE << k` cells.
const BASE: u64 = 64;
/// Enough segments to cover every `u32` slot index.
const SEGMENTS: usize = 27;

type Segment = Box<[AtomicU64]>;

#[derive(Default)]
pub struct InstanceTracker {
    segments: [OnceLock<Segment>; SEGMENTS],
    len: AtomicUsize,
}

/// Segment number and offset within it for a slot index.
#[inline]
fn locate(index: u32) -> (usize, usize) {
    let bucket = index as u64 / BASE + 1;
    let segment = (63 - bucket.leading_zeros()) as usize;
    let start = BASE * ((1u64 << segment) - 1);
    (segment, (index as u64 - start) as usize)
}

impl InstanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, handle: RawHandle) -> Option<&AtomicU64> {
        let (segment, offset) = locate(handle.index()?);
        self.segments[segment].get()?.get(offset)
    }

    fn cell_or_alloc(&self, handle: RawHandle) -> Option<&AtomicU64> {
        let (segment, offset) = locate(handle.index()?);
        let cells = self.segments[segment].get_or_init(|| {
            (0..BASE << segment).map(|_| AtomicU64::new(0)).collect()
        });
        cells.get(offset)
    }

    /// Returns false if the handle was already tracked.
    ///
    /// A slot still holding an older generation is overwritten: the host
    /// only reuses a slot after destroying its previous object.
    pub fn track(&self, handle: RawHandle) -> bool {
        let Some(cell) = self.cell_or_alloc(handle) else {
            return false;
        };
        let previous = cell.swap(handle.0, Ordering::AcqRel);
        if previous == handle.0 {
            return false;
        }
        if previous == 0 {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Returns false if the handle was not tracked.
    pub fn untrack(&self, handle: RawHandle) -> bool {
        let Some(cell) = self.cell(handle) else {
            return false;
        };
        let cleared = cell
            .compare_exchange(handle.0, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cleared {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        cleared
    }

    #[inline]
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.cell(handle)
            .is_some_and(|cell| cell.load(Ordering::Acquire) == handle.0)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InstanceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allocated = self.segments.iter().filter(|s| s.get().is_some()).count();
        f.debug_struct("InstanceTracker")
            .field("len", &self.len())
            .field("segments", &allocated)
            .finish()
    }
}
