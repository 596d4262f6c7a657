//! The closed set of wire types and the per-type tables derived from it.
//!
//! Everything the transcoding path needs to know about a value category
//! (width, ownership, how to decode, how to encode) is a pure function of
//! [`WireType`] plus [`ArgMetadata`]. Adding a wire type means touching the
//! tables in this file and the decode/encode switch, nothing else.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::ConversionError;

/// Value category for crossing the host boundary, numbered like the host ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum WireType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
    PackedVector4Array = 38,
    /// Wildcard slot: any tagged value.
    Variant = 39,
}

/// Size of a host handle on the wire.
pub const HANDLE_WIDTH: usize = 8;

/// Size of a tagged variant on the wire (tag, padding, 16-byte payload).
pub const VARIANT_WIDTH: usize = 24;

/// Largest aggregate stored inline in a variant payload.
pub const VARIANT_INLINE_PAYLOAD: usize = 16;

impl WireType {
    /// Every wire type, in ABI order.
    pub const ALL: [WireType; 40] = [
        WireType::Nil,
        WireType::Bool,
        WireType::Int,
        WireType::Float,
        WireType::String,
        WireType::Vector2,
        WireType::Vector2i,
        WireType::Rect2,
        WireType::Rect2i,
        WireType::Vector3,
        WireType::Vector3i,
        WireType::Transform2D,
        WireType::Vector4,
        WireType::Vector4i,
        WireType::Plane,
        WireType::Quaternion,
        WireType::Aabb,
        WireType::Basis,
        WireType::Transform3D,
        WireType::Projection,
        WireType::Color,
        WireType::StringName,
        WireType::NodePath,
        WireType::Rid,
        WireType::Object,
        WireType::Callable,
        WireType::Signal,
        WireType::Dictionary,
        WireType::Array,
        WireType::PackedByteArray,
        WireType::PackedInt32Array,
        WireType::PackedInt64Array,
        WireType::PackedFloat32Array,
        WireType::PackedFloat64Array,
        WireType::PackedStringArray,
        WireType::PackedVector2Array,
        WireType::PackedVector3Array,
        WireType::PackedColorArray,
        WireType::PackedVector4Array,
        WireType::Variant,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            WireType::Nil => "Nil",
            WireType::Bool => "Bool",
            WireType::Int => "Int",
            WireType::Float => "Float",
            WireType::String => "String",
            WireType::Vector2 => "Vector2",
            WireType::Vector2i => "Vector2i",
            WireType::Rect2 => "Rect2",
            WireType::Rect2i => "Rect2i",
            WireType::Vector3 => "Vector3",
            WireType::Vector3i => "Vector3i",
            WireType::Transform2D => "Transform2D",
            WireType::Vector4 => "Vector4",
            WireType::Vector4i => "Vector4i",
            WireType::Plane => "Plane",
            WireType::Quaternion => "Quaternion",
            WireType::Aabb => "AABB",
            WireType::Basis => "Basis",
            WireType::Transform3D => "Transform3D",
            WireType::Projection => "Projection",
            WireType::Color => "Color",
            WireType::StringName => "StringName",
            WireType::NodePath => "NodePath",
            WireType::Rid => "RID",
            WireType::Object => "Object",
            WireType::Callable => "Callable",
            WireType::Signal => "Signal",
            WireType::Dictionary => "Dictionary",
            WireType::Array => "Array",
            WireType::PackedByteArray => "PackedByteArray",
            WireType::PackedInt32Array => "PackedInt32Array",
            WireType::PackedInt64Array => "PackedInt64Array",
            WireType::PackedFloat32Array => "PackedFloat32Array",
            WireType::PackedFloat64Array => "PackedFloat64Array",
            WireType::PackedStringArray => "PackedStringArray",
            WireType::PackedVector2Array => "PackedVector2Array",
            WireType::PackedVector3Array => "PackedVector3Array",
            WireType::PackedColorArray => "PackedColorArray",
            WireType::PackedVector4Array => "PackedVector4Array",
            WireType::Variant => "Variant",
        }
    }

    /// Ownership class: a fixed function of the wire type.
    pub fn ownership(self) -> OwnershipClass {
        use WireType::*;
        match self {
            Nil | Bool | Int | Float | Vector2 | Vector2i | Rect2 | Rect2i | Vector3 | Vector3i
            | Transform2D | Vector4 | Vector4i | Plane | Quaternion | Aabb | Basis
            | Transform3D | Projection | Color | Rid => OwnershipClass::Value,
            String | StringName | NodePath | PackedByteArray | PackedInt32Array
            | PackedInt64Array | PackedFloat32Array | PackedFloat64Array | PackedStringArray
            | PackedVector2Array | PackedVector3Array | PackedColorArray | PackedVector4Array
            | Variant => OwnershipClass::TransferredReference,
            Array | Dictionary | Callable | Signal => OwnershipClass::BorrowedReference,
            Object => OwnershipClass::ManagedHandle,
        }
    }

    /// Size in bytes of a value of this type in an argument buffer.
    ///
    /// `Nil` is only ever a variant tag and has no width.
    pub fn width(self, meta: ArgMetadata) -> usize {
        use WireType::*;
        match self {
            Nil => 0,
            Bool => 1,
            Int => 8,
            Float => meta.float_width(),
            Vector2 | Vector2i => 8,
            Rect2 | Rect2i => 16,
            Vector3 | Vector3i => 12,
            Transform2D => 24,
            Vector4 | Vector4i => 16,
            Plane | Quaternion => 16,
            Aabb => 24,
            Basis => 36,
            Transform3D => 48,
            Projection => 64,
            Color => 16,
            Rid => 8,
            Variant => VARIANT_WIDTH,
            String | StringName | NodePath | Object | Callable | Signal | Dictionary | Array
            | PackedByteArray | PackedInt32Array | PackedInt64Array | PackedFloat32Array
            | PackedFloat64Array | PackedStringArray | PackedVector2Array
            | PackedVector3Array | PackedColorArray | PackedVector4Array => HANDLE_WIDTH,
        }
    }

    /// Fixed-size plain data struct (vectors, rects, transforms, color).
    pub fn is_aggregate(self) -> bool {
        use WireType::*;
        matches!(
            self,
            Vector2
                | Vector2i
                | Rect2
                | Rect2i
                | Vector3
                | Vector3i
                | Transform2D
                | Vector4
                | Vector4i
                | Plane
                | Quaternion
                | Aabb
                | Basis
                | Transform3D
                | Projection
                | Color
        )
    }

    /// Aggregates too wide for a variant payload travel as a host blob.
    pub fn is_boxed_in_variant(self) -> bool {
        self.is_aggregate() && self.width(ArgMetadata::None) > VARIANT_INLINE_PAYLOAD
    }

    /// Whether a variant with this tag owns a host handle in its payload.
    pub fn variant_holds_handle(self) -> bool {
        match self.ownership() {
            OwnershipClass::Value => self.is_boxed_in_variant(),
            OwnershipClass::TransferredReference => self != WireType::Variant,
            OwnershipClass::BorrowedReference | OwnershipClass::ManagedHandle => true,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of a call releases a reference-typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipClass {
    /// Copied by value; nothing to release.
    Value,
    /// The receiver owns the reference after the call.
    TransferredReference,
    /// The sender keeps its reference; the receiver takes its own.
    BorrowedReference,
    /// Host object; ownership depends on whether the bridge tracks it.
    ManagedHandle,
}

/// How an argument is taken out of a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// Read the bytes.
    Copy,
    /// Take an extra reference (+1), released after the call.
    Duplicate,
    /// Take over the caller's reference, released after the call.
    Adopt,
    /// Wrap the object; counted only when the host object is refcounted.
    View,
}

/// How a return value is put into a raw output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeRule {
    /// Write the bytes.
    Copy,
    /// Hand the bridge's reference to the host.
    Transfer,
    /// Leave tracked extension instances alone, transfer anything else.
    TransferUnlessTracked,
}

impl OwnershipClass {
    pub fn decode_rule(self) -> DecodeRule {
        match self {
            OwnershipClass::Value => DecodeRule::Copy,
            OwnershipClass::TransferredReference => DecodeRule::Adopt,
            OwnershipClass::BorrowedReference => DecodeRule::Duplicate,
            OwnershipClass::ManagedHandle => DecodeRule::View,
        }
    }

    pub fn encode_rule(self) -> EncodeRule {
        match self {
            OwnershipClass::Value => EncodeRule::Copy,
            OwnershipClass::TransferredReference | OwnershipClass::BorrowedReference => {
                EncodeRule::Transfer
            }
            OwnershipClass::ManagedHandle => EncodeRule::TransferUnlessTracked,
        }
    }
}

/// Precision/narrowing metadata attached to numeric arguments.
///
/// Integer variants name the range an `Int` must fit after it is read.
/// Float variants pick how many bytes a `Float` occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ArgMetadata {
    #[default]
    None = 0,
    IntIsInt8 = 1,
    IntIsInt16 = 2,
    IntIsInt32 = 3,
    IntIsInt64 = 4,
    IntIsUint8 = 5,
    IntIsUint16 = 6,
    IntIsUint32 = 7,
    IntIsUint64 = 8,
    RealIsFloat = 9,
    RealIsDouble = 10,
    IntIsChar16 = 11,
    IntIsChar32 = 12,
}

impl ArgMetadata {
    /// Bytes occupied by a `Float` with this metadata.
    pub fn float_width(self) -> usize {
        match self {
            ArgMetadata::RealIsFloat => 4,
            _ => 8,
        }
    }

    /// Range check an `Int` read from the wire.
    ///
    /// `IntIsUint64` accepts every bit pattern; the host has no unsigned
    /// 64-bit integer and the value is reinterpreted on conversion.
    pub fn check_int(self, value: i64) -> Result<i64, ConversionError> {
        fn fits<T: TryFrom<i64>>(
            value: i64,
            target_type: &'static str,
        ) -> Result<i64, ConversionError> {
            T::try_from(value)
                .map(|_| value)
                .map_err(|_| ConversionError::IntegerOverflow { value, target_type })
        }

        match self {
            ArgMetadata::IntIsInt8 => fits::<i8>(value, "i8"),
            ArgMetadata::IntIsInt16 => fits::<i16>(value, "i16"),
            ArgMetadata::IntIsInt32 => fits::<i32>(value, "i32"),
            ArgMetadata::IntIsUint8 => fits::<u8>(value, "u8"),
            ArgMetadata::IntIsUint16 | ArgMetadata::IntIsChar16 => fits::<u16>(value, "u16"),
            ArgMetadata::IntIsUint32 => fits::<u32>(value, "u32"),
            ArgMetadata::IntIsChar32 => u32::try_from(value)
                .ok()
                .and_then(char::from_u32)
                .map(|_| value)
                .ok_or(ConversionError::IntegerOverflow {
                    value,
                    target_type: "char",
                }),
            _ => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_numbering() {
        assert_eq!(u32::from(WireType::Nil), 0);
        assert_eq!(u32::from(WireType::Object), 24);
        assert_eq!(u32::from(WireType::PackedVector4Array), 38);
        assert_eq!(WireType::try_from(21u32), Ok(WireType::StringName));
        assert!(WireType::try_from(40u32).is_err());
        for (i, wire) in WireType::ALL.iter().enumerate() {
            assert_eq!(u32::from(*wire) as usize, i);
        }
    }

    #[test]
    fn every_classifiable_type_has_width_and_rules() {
        for wire in WireType::ALL.into_iter().filter(|w| *w != WireType::Nil) {
            assert!(wire.width(ArgMetadata::None) > 0, "{wire} has no width");
            let ownership = wire.ownership();
            // decode and encode rules must agree on whether a handle is involved
            let decodes_bytes = ownership.decode_rule() == DecodeRule::Copy;
            let encodes_bytes = ownership.encode_rule() == EncodeRule::Copy;
            assert_eq!(decodes_bytes, encodes_bytes, "{wire}");
        }
    }

    #[test]
    fn ownership_table() {
        assert_eq!(WireType::Int.ownership(), OwnershipClass::Value);
        assert_eq!(WireType::Rid.ownership(), OwnershipClass::Value);
        assert_eq!(WireType::Transform3D.ownership(), OwnershipClass::Value);
        assert_eq!(WireType::String.ownership(), OwnershipClass::TransferredReference);
        assert_eq!(WireType::PackedColorArray.ownership(), OwnershipClass::TransferredReference);
        assert_eq!(WireType::Variant.ownership(), OwnershipClass::TransferredReference);
        assert_eq!(WireType::Array.ownership(), OwnershipClass::BorrowedReference);
        assert_eq!(WireType::Signal.ownership(), OwnershipClass::BorrowedReference);
        assert_eq!(WireType::Object.ownership(), OwnershipClass::ManagedHandle);
    }

    #[test]
    fn widths() {
        assert_eq!(WireType::Bool.width(ArgMetadata::None), 1);
        assert_eq!(WireType::Int.width(ArgMetadata::IntIsInt8), 8);
        assert_eq!(WireType::Float.width(ArgMetadata::None), 8);
        assert_eq!(WireType::Float.width(ArgMetadata::RealIsFloat), 4);
        assert_eq!(WireType::Vector3.width(ArgMetadata::None), 12);
        assert_eq!(WireType::Basis.width(ArgMetadata::None), 36);
        assert_eq!(WireType::Projection.width(ArgMetadata::None), 64);
        assert_eq!(WireType::String.width(ArgMetadata::None), 8);
        assert_eq!(WireType::Variant.width(ArgMetadata::None), 24);
    }

    #[test]
    fn boxed_in_variant() {
        assert!(!WireType::Vector4.is_boxed_in_variant());
        assert!(WireType::Transform2D.is_boxed_in_variant());
        assert!(WireType::Projection.is_boxed_in_variant());
        assert!(!WireType::String.is_boxed_in_variant());
        assert!(WireType::Aabb.variant_holds_handle());
        assert!(!WireType::Color.variant_holds_handle());
        assert!(WireType::NodePath.variant_holds_handle());
    }

    #[test]
    fn metadata_narrowing() {
        assert_eq!(ArgMetadata::IntIsInt8.check_int(127), Ok(127));
        assert!(matches!(
            ArgMetadata::IntIsInt8.check_int(128),
            Err(ConversionError::IntegerOverflow { target_type: "i8", .. })
        ));
        assert!(ArgMetadata::IntIsUint32.check_int(-1).is_err());
        assert_eq!(ArgMetadata::IntIsUint64.check_int(-1), Ok(-1));
        assert_eq!(ArgMetadata::IntIsChar32.check_int('a' as i64), Ok(97));
        assert!(ArgMetadata::IntIsChar32.check_int(0xD800).is_err());
        assert_eq!(ArgMetadata::None.check_int(i64::MIN), Ok(i64::MIN));
    }
}
