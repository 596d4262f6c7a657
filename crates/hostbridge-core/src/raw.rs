//! Raw views over host-owned argument and return memory.
//!
//! Arguments are packed back to back in declaration order with no padding.
//! The offset of argument `i` is the sum of the widths before it; see
//! [`ArgLayout`]. The bridge never allocates or retains these buffers.

use bytemuck::{Pod, Zeroable};

use crate::error::ConversionError;
use crate::wire::{VARIANT_INLINE_PAYLOAD, WireType};

/// A host allocation handle.
///
/// Encodes `(generation << 32) | (slot + 1)`; zero is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct RawHandle(pub u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    #[inline]
    pub fn from_parts(index: u32, generation: u32) -> Self {
        RawHandle(((generation as u64) << 32) | (index as u64 + 1))
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Slot index, or `None` for the null handle.
    #[inline]
    pub fn index(self) -> Option<u32> {
        let low = (self.0 & 0xFFFF_FFFF) as u32;
        low.checked_sub(1)
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

/// Byte offsets of each argument in a packed buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgLayout {
    offsets: Vec<usize>,
    widths: Vec<usize>,
    total: usize,
}

impl ArgLayout {
    /// Build a layout from argument widths in declaration order.
    pub fn new(widths: impl IntoIterator<Item = usize>) -> Self {
        let widths: Vec<usize> = widths.into_iter().collect();
        let mut offsets = Vec::with_capacity(widths.len());
        let mut total = 0;
        for width in &widths {
            offsets.push(total);
            total += width;
        }
        Self {
            offsets,
            widths,
            total,
        }
    }

    #[inline]
    pub fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    #[inline]
    pub fn width(&self, index: usize) -> usize {
        self.widths[index]
    }

    /// Minimum buffer size for a call.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Borrowed argument buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawArgs<'a> {
    bytes: &'a [u8],
}

impl<'a> RawArgs<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn empty() -> RawArgs<'static> {
        RawArgs { bytes: &[] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a plain-data value at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is too short; that is a layout disagreement
    /// between host and bridge.
    #[inline]
    pub fn read<T: Pod>(&self, offset: usize) -> T {
        let end = offset + std::mem::size_of::<T>();
        let Some(bytes) = self.bytes.get(offset..end) else {
            panic!(
                "layout mismatch: read of {end} bytes from a {} byte argument buffer",
                self.bytes.len()
            );
        };
        bytemuck::pod_read_unaligned(bytes)
    }
}

/// Borrowed output slot for a return value.
#[derive(Debug)]
pub struct RawReturn<'a> {
    bytes: &'a mut [u8],
    written: bool,
}

impl<'a> RawReturn<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bytes,
            written: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Whether anything has been written to the slot.
    #[inline]
    pub fn written(&self) -> bool {
        self.written
    }

    /// Write a plain-data value at the start of the slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is narrower than the value.
    #[inline]
    pub fn write<T: Pod>(&mut self, value: T) {
        let src = bytemuck::bytes_of(&value);
        let capacity = self.bytes.len();
        let Some(dst) = self.bytes.get_mut(..src.len()) else {
            panic!(
                "layout mismatch: {} byte return written to a {capacity} byte slot",
                src.len()
            );
        };
        dst.copy_from_slice(src);
        self.written = true;
    }

    /// Read back what was written; used by hosts and tests.
    #[inline]
    pub fn read<T: Pod>(&self) -> T {
        RawArgs::new(self.bytes).read(0)
    }
}

/// A tagged value as laid out on the wire: `u32` tag, `u32` padding and a
/// 16-byte payload.
///
/// Reference types store their handle in the first 8 payload bytes.
/// Aggregates wider than the payload are stored in a host blob whose handle
/// takes the same place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct RawVariant {
    pub tag: u32,
    pub pad: u32,
    pub payload: [u8; VARIANT_INLINE_PAYLOAD],
}

impl RawVariant {
    pub const NIL: RawVariant = RawVariant {
        tag: 0,
        pad: 0,
        payload: [0; VARIANT_INLINE_PAYLOAD],
    };

    /// Build a variant from a tag and plain data that fits the payload.
    pub fn new<T: Pod>(wire: WireType, value: T) -> Self {
        let mut raw = RawVariant {
            tag: wire.into(),
            ..Self::NIL
        };
        let src = bytemuck::bytes_of(&value);
        raw.payload[..src.len()].copy_from_slice(src);
        raw
    }

    pub fn from_handle(wire: WireType, handle: RawHandle) -> Self {
        Self::new(wire, handle)
    }

    pub fn wire_type(&self) -> Result<WireType, ConversionError> {
        WireType::try_from(self.tag).map_err(|_| ConversionError::InvalidTag { tag: self.tag })
    }

    /// Read the payload as plain data.
    pub fn payload<T: Pod>(&self) -> T {
        bytemuck::pod_read_unaligned(&self.payload[..std::mem::size_of::<T>()])
    }

    /// The host handle this variant owns, if any.
    pub fn owned_handle(&self) -> Option<RawHandle> {
        let wire = self.wire_type().ok()?;
        if !wire.variant_holds_handle() {
            return None;
        }
        let handle: RawHandle = self.payload();
        (!handle.is_null()).then_some(handle)
    }
}
