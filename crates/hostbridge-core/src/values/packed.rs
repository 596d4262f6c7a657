//! Packed arrays: contiguous host buffers of one element type.

use std::fmt;
use std::marker::PhantomData;

use super::{HostHandle, unexpected};
use crate::error::ConversionError;
use crate::host::{HostRef, HostValue, PackedData};
use crate::math::{Color, Vector2, Vector3, Vector4};
use crate::raw::RawHandle;
use crate::wire::WireType;

/// Element type of a packed array.
pub trait PackedElement: Sized + Clone + 'static {
    const WIRE: WireType;

    fn pack(items: Vec<Self>) -> PackedData;

    fn unpack(data: PackedData) -> Option<Vec<Self>>;
}

macro_rules! packed_element {
    ($($ty:ty => $wire:ident, $data:ident;)*) => {
        $(
            impl PackedElement for $ty {
                const WIRE: WireType = WireType::$wire;

                fn pack(items: Vec<Self>) -> PackedData {
                    PackedData::$data(items)
                }

                fn unpack(data: PackedData) -> Option<Vec<Self>> {
                    match data {
                        PackedData::$data(items) => Some(items),
                        _ => None,
                    }
                }
            }
        )*
    };
}

packed_element! {
    u8 => PackedByteArray, Byte;
    i32 => PackedInt32Array, Int32;
    i64 => PackedInt64Array, Int64;
    f32 => PackedFloat32Array, Float32;
    f64 => PackedFloat64Array, Float64;
    String => PackedStringArray, String;
    Vector2 => PackedVector2Array, Vector2;
    Vector3 => PackedVector3Array, Vector3;
    Color => PackedColorArray, Color;
    Vector4 => PackedVector4Array, Vector4;
}

/// Host packed array of `T`.
pub struct Packed<T: PackedElement> {
    inner: HostHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PackedElement> Packed<T> {
    pub fn new(host: &HostRef, items: Vec<T>) -> Self {
        Self::wrap(HostHandle::alloc(host, HostValue::Packed(T::pack(items))))
    }

    fn wrap(inner: HostHandle) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn adopt(host: &HostRef, raw: RawHandle) -> Result<Self, ConversionError> {
        HostHandle::adopt(host, raw, T::WIRE.name()).map(Self::wrap)
    }

    pub fn duplicate(host: &HostRef, raw: RawHandle) -> Result<Self, ConversionError> {
        HostHandle::duplicate(host, raw, T::WIRE.name()).map(Self::wrap)
    }

    #[inline]
    pub fn handle(&self) -> RawHandle {
        self.inner.raw()
    }

    #[inline]
    pub fn into_raw(self) -> RawHandle {
        self.inner.into_raw()
    }

    pub fn to_vec(&self) -> Result<Vec<T>, ConversionError> {
        match self.inner.read()? {
            HostValue::Packed(data) => T::unpack(data).ok_or(ConversionError::TypeMismatch {
                expected: T::WIRE.name(),
                actual: "Packed",
            }),
            other => Err(unexpected(T::WIRE.name(), &other)),
        }
    }

    pub fn len(&self) -> Result<usize, ConversionError> {
        match self.inner.read()? {
            HostValue::Packed(data) => Ok(data.len()),
            other => Err(unexpected(T::WIRE.name(), &other)),
        }
    }
}

impl<T: PackedElement> Clone for Packed<T> {
    fn clone(&self) -> Self {
        Self::wrap(self.inner.clone())
    }
}

impl<T: PackedElement> PartialEq for Packed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: PackedElement> Eq for Packed<T> {}

impl<T: PackedElement> fmt::Debug for Packed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::WIRE.name(), self.inner)
    }
}
