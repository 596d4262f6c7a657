//! Self-describing values for the boxed call path.

use bytemuck::Pod;

use crate::error::ConversionError;
use crate::host::{HostRef, HostValue};
use crate::math::{
    Aabb, Aggregate, Basis, Color, Plane, Projection, Quaternion, Rect2, Rect2i, Rid, Transform2D,
    Transform3D, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
};
use crate::raw::{RawHandle, RawVariant};
use crate::values::{Array, Callable, Dictionary, Name, NodePath, Object, Packed, Signal, Text};
use crate::wire::WireType;

/// A tagged value of any wire type.
///
/// Equality compares values by value and references by handle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Text),
    Vector2(Vector2),
    Vector2i(Vector2i),
    Rect2(Rect2),
    Rect2i(Rect2i),
    Vector3(Vector3),
    Vector3i(Vector3i),
    Transform2D(Transform2D),
    Vector4(Vector4),
    Vector4i(Vector4i),
    Plane(Plane),
    Quaternion(Quaternion),
    Aabb(Aabb),
    Basis(Basis),
    Transform3D(Transform3D),
    Projection(Projection),
    Color(Color),
    StringName(Name),
    NodePath(NodePath),
    Rid(Rid),
    Object(Object),
    Callable(Callable),
    Signal(Signal),
    Dictionary(Dictionary),
    Array(Array),
    PackedByteArray(Packed<u8>),
    PackedInt32Array(Packed<i32>),
    PackedInt64Array(Packed<i64>),
    PackedFloat32Array(Packed<f32>),
    PackedFloat64Array(Packed<f64>),
    PackedStringArray(Packed<String>),
    PackedVector2Array(Packed<Vector2>),
    PackedVector3Array(Packed<Vector3>),
    PackedColorArray(Packed<Color>),
    PackedVector4Array(Packed<Vector4>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Claim {
    Adopt,
    Duplicate,
}

impl Variant {
    pub fn wire_type(&self) -> WireType {
        match self {
            Variant::Nil => WireType::Nil,
            Variant::Bool(_) => WireType::Bool,
            Variant::Int(_) => WireType::Int,
            Variant::Float(_) => WireType::Float,
            Variant::String(_) => WireType::String,
            Variant::Vector2(_) => WireType::Vector2,
            Variant::Vector2i(_) => WireType::Vector2i,
            Variant::Rect2(_) => WireType::Rect2,
            Variant::Rect2i(_) => WireType::Rect2i,
            Variant::Vector3(_) => WireType::Vector3,
            Variant::Vector3i(_) => WireType::Vector3i,
            Variant::Transform2D(_) => WireType::Transform2D,
            Variant::Vector4(_) => WireType::Vector4,
            Variant::Vector4i(_) => WireType::Vector4i,
            Variant::Plane(_) => WireType::Plane,
            Variant::Quaternion(_) => WireType::Quaternion,
            Variant::Aabb(_) => WireType::Aabb,
            Variant::Basis(_) => WireType::Basis,
            Variant::Transform3D(_) => WireType::Transform3D,
            Variant::Projection(_) => WireType::Projection,
            Variant::Color(_) => WireType::Color,
            Variant::StringName(_) => WireType::StringName,
            Variant::NodePath(_) => WireType::NodePath,
            Variant::Rid(_) => WireType::Rid,
            Variant::Object(_) => WireType::Object,
            Variant::Callable(_) => WireType::Callable,
            Variant::Signal(_) => WireType::Signal,
            Variant::Dictionary(_) => WireType::Dictionary,
            Variant::Array(_) => WireType::Array,
            Variant::PackedByteArray(_) => WireType::PackedByteArray,
            Variant::PackedInt32Array(_) => WireType::PackedInt32Array,
            Variant::PackedInt64Array(_) => WireType::PackedInt64Array,
            Variant::PackedFloat32Array(_) => WireType::PackedFloat32Array,
            Variant::PackedFloat64Array(_) => WireType::PackedFloat64Array,
            Variant::PackedStringArray(_) => WireType::PackedStringArray,
            Variant::PackedVector2Array(_) => WireType::PackedVector2Array,
            Variant::PackedVector3Array(_) => WireType::PackedVector3Array,
            Variant::PackedColorArray(_) => WireType::PackedColorArray,
            Variant::PackedVector4Array(_) => WireType::PackedVector4Array,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.wire_type().name()
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Lay the value out on the wire, handing any reference it holds to
    /// the receiver.
    pub fn into_raw(self, host: &HostRef) -> RawVariant {
        match self {
            Variant::Nil => RawVariant::NIL,
            Variant::Bool(v) => RawVariant::new(WireType::Bool, u8::from(v)),
            Variant::Int(v) => RawVariant::new(WireType::Int, v),
            Variant::Float(v) => RawVariant::new(WireType::Float, v),
            Variant::Vector2(v) => aggregate_to_raw(host, v),
            Variant::Vector2i(v) => aggregate_to_raw(host, v),
            Variant::Rect2(v) => aggregate_to_raw(host, v),
            Variant::Rect2i(v) => aggregate_to_raw(host, v),
            Variant::Vector3(v) => aggregate_to_raw(host, v),
            Variant::Vector3i(v) => aggregate_to_raw(host, v),
            Variant::Transform2D(v) => aggregate_to_raw(host, v),
            Variant::Vector4(v) => aggregate_to_raw(host, v),
            Variant::Vector4i(v) => aggregate_to_raw(host, v),
            Variant::Plane(v) => aggregate_to_raw(host, v),
            Variant::Quaternion(v) => aggregate_to_raw(host, v),
            Variant::Aabb(v) => aggregate_to_raw(host, v),
            Variant::Basis(v) => aggregate_to_raw(host, v),
            Variant::Transform3D(v) => aggregate_to_raw(host, v),
            Variant::Projection(v) => aggregate_to_raw(host, v),
            Variant::Color(v) => aggregate_to_raw(host, v),
            Variant::Rid(v) => RawVariant::new(WireType::Rid, v),
            Variant::String(v) => RawVariant::from_handle(WireType::String, v.into_raw()),
            Variant::StringName(v) => RawVariant::from_handle(WireType::StringName, v.into_raw()),
            Variant::NodePath(v) => RawVariant::from_handle(WireType::NodePath, v.into_raw()),
            Variant::Object(v) => RawVariant::from_handle(WireType::Object, v.into_raw()),
            Variant::Callable(v) => RawVariant::from_handle(WireType::Callable, v.into_raw()),
            Variant::Signal(v) => RawVariant::from_handle(WireType::Signal, v.into_raw()),
            Variant::Dictionary(v) => RawVariant::from_handle(WireType::Dictionary, v.into_raw()),
            Variant::Array(v) => RawVariant::from_handle(WireType::Array, v.into_raw()),
            Variant::PackedByteArray(v) => packed_to_raw(v),
            Variant::PackedInt32Array(v) => packed_to_raw(v),
            Variant::PackedInt64Array(v) => packed_to_raw(v),
            Variant::PackedFloat32Array(v) => packed_to_raw(v),
            Variant::PackedFloat64Array(v) => packed_to_raw(v),
            Variant::PackedStringArray(v) => packed_to_raw(v),
            Variant::PackedVector2Array(v) => packed_to_raw(v),
            Variant::PackedVector3Array(v) => packed_to_raw(v),
            Variant::PackedColorArray(v) => packed_to_raw(v),
            Variant::PackedVector4Array(v) => packed_to_raw(v),
        }
    }

    /// Take over a raw variant the caller owns.
    pub fn adopt_raw(host: &HostRef, raw: RawVariant) -> Result<Variant, ConversionError> {
        Self::from_raw(host, raw, Claim::Adopt)
    }

    /// Copy a raw variant the caller keeps, taking new references.
    pub fn duplicate_raw(host: &HostRef, raw: RawVariant) -> Result<Variant, ConversionError> {
        Self::from_raw(host, raw, Claim::Duplicate)
    }

    fn from_raw(host: &HostRef, raw: RawVariant, claim: Claim) -> Result<Variant, ConversionError> {
        macro_rules! reference {
            ($ty:ty) => {{
                let handle: RawHandle = raw.payload();
                match claim {
                    Claim::Adopt => <$ty>::adopt(host, handle)?,
                    Claim::Duplicate => <$ty>::duplicate(host, handle)?,
                }
            }};
        }

        let value = match raw.wire_type()? {
            WireType::Nil => Variant::Nil,
            WireType::Bool => Variant::Bool(raw.payload::<u8>() != 0),
            WireType::Int => Variant::Int(raw.payload()),
            WireType::Float => Variant::Float(raw.payload()),
            WireType::Vector2 => Variant::Vector2(aggregate_from_raw(host, &raw, claim)?),
            WireType::Vector2i => Variant::Vector2i(aggregate_from_raw(host, &raw, claim)?),
            WireType::Rect2 => Variant::Rect2(aggregate_from_raw(host, &raw, claim)?),
            WireType::Rect2i => Variant::Rect2i(aggregate_from_raw(host, &raw, claim)?),
            WireType::Vector3 => Variant::Vector3(aggregate_from_raw(host, &raw, claim)?),
            WireType::Vector3i => Variant::Vector3i(aggregate_from_raw(host, &raw, claim)?),
            WireType::Transform2D => Variant::Transform2D(aggregate_from_raw(host, &raw, claim)?),
            WireType::Vector4 => Variant::Vector4(aggregate_from_raw(host, &raw, claim)?),
            WireType::Vector4i => Variant::Vector4i(aggregate_from_raw(host, &raw, claim)?),
            WireType::Plane => Variant::Plane(aggregate_from_raw(host, &raw, claim)?),
            WireType::Quaternion => Variant::Quaternion(aggregate_from_raw(host, &raw, claim)?),
            WireType::Aabb => Variant::Aabb(aggregate_from_raw(host, &raw, claim)?),
            WireType::Basis => Variant::Basis(aggregate_from_raw(host, &raw, claim)?),
            WireType::Transform3D => Variant::Transform3D(aggregate_from_raw(host, &raw, claim)?),
            WireType::Projection => Variant::Projection(aggregate_from_raw(host, &raw, claim)?),
            WireType::Color => Variant::Color(aggregate_from_raw(host, &raw, claim)?),
            WireType::Rid => Variant::Rid(raw.payload()),
            WireType::String => Variant::String(reference!(Text)),
            WireType::StringName => Variant::StringName(reference!(Name)),
            WireType::NodePath => Variant::NodePath(reference!(NodePath)),
            WireType::Object => {
                let handle: RawHandle = raw.payload();
                if handle.is_null() {
                    Variant::Nil
                } else {
                    Variant::Object(match claim {
                        Claim::Adopt => Object::adopt(host, handle)?,
                        Claim::Duplicate => Object::view(host, handle)?,
                    })
                }
            }
            WireType::Callable => Variant::Callable(reference!(Callable)),
            WireType::Signal => Variant::Signal(reference!(Signal)),
            WireType::Dictionary => Variant::Dictionary(reference!(Dictionary)),
            WireType::Array => Variant::Array(reference!(Array)),
            WireType::PackedByteArray => Variant::PackedByteArray(reference!(Packed<u8>)),
            WireType::PackedInt32Array => Variant::PackedInt32Array(reference!(Packed<i32>)),
            WireType::PackedInt64Array => Variant::PackedInt64Array(reference!(Packed<i64>)),
            WireType::PackedFloat32Array => Variant::PackedFloat32Array(reference!(Packed<f32>)),
            WireType::PackedFloat64Array => Variant::PackedFloat64Array(reference!(Packed<f64>)),
            WireType::PackedStringArray => Variant::PackedStringArray(reference!(Packed<String>)),
            WireType::PackedVector2Array => {
                Variant::PackedVector2Array(reference!(Packed<Vector2>))
            }
            WireType::PackedVector3Array => {
                Variant::PackedVector3Array(reference!(Packed<Vector3>))
            }
            WireType::PackedColorArray => Variant::PackedColorArray(reference!(Packed<Color>)),
            WireType::PackedVector4Array => {
                Variant::PackedVector4Array(reference!(Packed<Vector4>))
            }
            // a variant never nests a variant tag
            WireType::Variant => return Err(ConversionError::InvalidTag { tag: raw.tag }),
        };
        Ok(value)
    }
}

fn packed_to_raw<T: crate::values::PackedElement>(value: Packed<T>) -> RawVariant {
    RawVariant::from_handle(T::WIRE, value.into_raw())
}

fn aggregate_to_raw<T: Aggregate>(host: &HostRef, value: T) -> RawVariant {
    if T::WIRE.is_boxed_in_variant() {
        let blob = host.alloc(HostValue::Blob(bytemuck::bytes_of(&value).to_vec()));
        RawVariant::from_handle(T::WIRE, blob)
    } else {
        RawVariant::new(T::WIRE, value)
    }
}

fn aggregate_from_raw<T: Aggregate + Pod>(
    host: &HostRef,
    raw: &RawVariant,
    claim: Claim,
) -> Result<T, ConversionError> {
    if !T::WIRE.is_boxed_in_variant() {
        return Ok(raw.payload());
    }
    let blob: RawHandle = raw.payload();
    let bytes = match host.read(blob)? {
        HostValue::Blob(bytes) => bytes,
        other => {
            return Err(ConversionError::TypeMismatch {
                expected: T::WIRE.name(),
                actual: other.kind(),
            });
        }
    };
    if bytes.len() != std::mem::size_of::<T>() {
        return Err(ConversionError::TypeMismatch {
            expected: T::WIRE.name(),
            actual: "Blob",
        });
    }
    let value = bytemuck::pod_read_unaligned(&bytes);
    if claim == Claim::Adopt {
        host.release(blob);
    }
    Ok(value)
}
