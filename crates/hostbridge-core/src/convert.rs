//! Conversion traits between Rust values and [`Variant`]s.
//!
//! - [`FromVariant`]: take a Rust value out of a decoded variant
//! - [`ToVariant`]: turn a Rust value into a variant for encoding
//!
//! Both take the host, since reference types allocate or read through it.
//! Every implementor also implements [`Reflect`], which is how the type
//! registry decides its wire type.
//!
//! ## Supported Types
//!
//! - Integers `i8`..`i64`, `u8`..`u64`, `char` (narrowed with overflow checks)
//! - `f32`, `f64`, `OrderedFloat<f64>`, `bool`, `()`
//! - `String` (copied), [`Text`], [`Name`], [`NodePath`]
//! - aggregates from [`crate::math`], [`Rid`]
//! - [`Array`], [`Dictionary`], [`Packed<T>`], [`Callable`], [`Signal`]
//! - [`Object`], `Option<T>` for handles, [`Variant`]
//! - `Vec<T>`, `HashMap<K, V>` (structural), [`Ranged`]
//! - [`ErrorCode`] and `Result<(), ErrorCode>`

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use ordered_float::OrderedFloat;

use crate::error::ConversionError;
use crate::error_code::ErrorCode;
use crate::host::HostRef;
use crate::math::{
    Aabb, Basis, Color, Plane, Projection, Quaternion, Rect2, Rect2i, Rid, Transform2D, Transform3D,
    Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
};
use crate::reflect::{Reflect, Shape, TypeInfo};
use crate::values::{
    Array, Callable, Dictionary, Name, NodePath, Object, Packed, PackedElement, Signal, Text,
};
use crate::variant::Variant;

/// Extract a Rust value from a variant.
pub trait FromVariant: Sized {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError>;
}

/// Convert a Rust value into a variant.
pub trait ToVariant {
    fn to_variant(self, host: &HostRef) -> Variant;
}

#[inline]
pub(crate) fn mismatch(expected: &'static str, actual: &Variant) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

macro_rules! opaque {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::opaque::<$ty>()
                }
            }
        )*
    };
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
                    match value {
                        Variant::Int(v) => <$ty>::try_from(v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: v,
                                target_type: stringify!($ty),
                            }
                        }),
                        other => Err(mismatch("Int", &other)),
                    }
                }
            }

            impl ToVariant for $ty {
                fn to_variant(self, _host: &HostRef) -> Variant {
                    Variant::Int(self as i64)
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, u8, u16, u32);

// The host has no unsigned 64-bit integer; the bits are reinterpreted.
impl FromVariant for u64 {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Int(v) => Ok(v as u64),
            other => Err(mismatch("Int", &other)),
        }
    }
}

impl ToVariant for u64 {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Int(self as i64)
    }
}

impl FromVariant for char {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Int(v) => u32::try_from(v)
                .ok()
                .and_then(char::from_u32)
                .ok_or(ConversionError::IntegerOverflow {
                    value: v,
                    target_type: "char",
                }),
            other => Err(mismatch("Int", &other)),
        }
    }
}

impl ToVariant for char {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Int(self as i64)
    }
}

impl FromVariant for bool {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Bool(v) => Ok(v),
            other => Err(mismatch("Bool", &other)),
        }
    }
}

impl ToVariant for bool {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Bool(self)
    }
}

impl FromVariant for f64 {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Float(v) => Ok(v),
            other => Err(mismatch("Float", &other)),
        }
    }
}

impl ToVariant for f64 {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Float(self)
    }
}

impl FromVariant for f32 {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        f64::from_variant(value, host).map(|v| v as f32)
    }
}

impl ToVariant for f32 {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Float(self as f64)
    }
}

impl FromVariant for OrderedFloat<f64> {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        f64::from_variant(value, host).map(OrderedFloat)
    }
}

impl ToVariant for OrderedFloat<f64> {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Float(self.0)
    }
}

/// No return value.
impl ToVariant for () {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Nil
    }
}

impl Reflect for () {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<()>(Shape::Unit)
    }
}

opaque!(i8, i16, i32, i64, u8, u16, u32, u64, char, bool, f32, f64, OrderedFloat<f64>);

// ============================================================================
// Aggregates
// ============================================================================

macro_rules! impl_by_value {
    ($($ty:ident),* $(,)?) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
                    match value {
                        Variant::$ty(v) => Ok(v),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }

            impl ToVariant for $ty {
                fn to_variant(self, _host: &HostRef) -> Variant {
                    Variant::$ty(self)
                }
            }

            opaque!($ty);
        )*
    };
}

impl_by_value!(
    Vector2,
    Vector2i,
    Rect2,
    Rect2i,
    Vector3,
    Vector3i,
    Transform2D,
    Vector4,
    Vector4i,
    Plane,
    Quaternion,
    Aabb,
    Basis,
    Transform3D,
    Projection,
    Color,
    Rid,
);

// ============================================================================
// Host references
// ============================================================================

macro_rules! impl_by_reference {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
                    match value {
                        Variant::$variant(v) => Ok(v),
                        other => Err(mismatch(stringify!($variant), &other)),
                    }
                }
            }

            impl ToVariant for $ty {
                fn to_variant(self, _host: &HostRef) -> Variant {
                    Variant::$variant(self)
                }
            }
        )*
    };
}

impl_by_reference!(
    Text => String,
    Name => StringName,
    NodePath => NodePath,
    Array => Array,
    Dictionary => Dictionary,
    Callable => Callable,
    Signal => Signal,
    Object => Object,
);

opaque!(Text, Name, NodePath, Array, Dictionary);

impl Reflect for Callable {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Callable>(Shape::Callable)
    }
}

impl Reflect for Signal {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Signal>(Shape::Signal)
    }
}

impl Reflect for Object {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Object>(Shape::Handle { class: "Object" })
    }
}

/// Copies the text out of the host.
impl FromVariant for String {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::String(text) => text.read(),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl ToVariant for String {
    fn to_variant(self, host: &HostRef) -> Variant {
        Variant::String(Text::new(host, &self))
    }
}

opaque!(String);

macro_rules! impl_packed {
    ($($elem:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromVariant for Packed<$elem> {
                fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
                    match value {
                        Variant::$variant(v) => Ok(v),
                        other => Err(mismatch(stringify!($variant), &other)),
                    }
                }
            }

            impl ToVariant for Packed<$elem> {
                fn to_variant(self, _host: &HostRef) -> Variant {
                    Variant::$variant(self)
                }
            }
        )*
    };
}

impl_packed!(
    u8 => PackedByteArray,
    i32 => PackedInt32Array,
    i64 => PackedInt64Array,
    f32 => PackedFloat32Array,
    f64 => PackedFloat64Array,
    String => PackedStringArray,
    Vector2 => PackedVector2Array,
    Vector3 => PackedVector3Array,
    Color => PackedColorArray,
    Vector4 => PackedVector4Array,
);

impl<T: PackedElement> Reflect for Packed<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::opaque::<Packed<T>>()
    }
}

// ============================================================================
// Variant (wildcard)
// ============================================================================

impl FromVariant for Variant {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl ToVariant for Variant {
    fn to_variant(self, _host: &HostRef) -> Variant {
        self
    }
}

opaque!(Variant);

// ============================================================================
// Structural types
// ============================================================================

/// Nullable handle. `Nil` maps to `None`.
impl<T: FromVariant> FromVariant for Option<T> {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Nil => Ok(None),
            other => T::from_variant(other, host).map(Some),
        }
    }
}

impl<T: ToVariant> ToVariant for Option<T> {
    fn to_variant(self, host: &HostRef) -> Variant {
        match self {
            Some(v) => v.to_variant(host),
            None => Variant::Nil,
        }
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Option<T>>(Shape::Optional(T::type_info))
    }
}

/// Copied element by element into a host array.
impl<T: FromVariant> FromVariant for Vec<T> {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Array(array) => array
                .to_vec()?
                .into_iter()
                .map(|item| T::from_variant(item, host))
                .collect(),
            other => Err(mismatch("Array", &other)),
        }
    }
}

impl<T: ToVariant> ToVariant for Vec<T> {
    fn to_variant(self, host: &HostRef) -> Variant {
        let items = self.into_iter().map(|item| item.to_variant(host));
        Variant::Array(Array::from_variants(host, items))
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Vec<T>>(Shape::List(T::type_info))
    }
}

impl<K, V, S> FromVariant for HashMap<K, V, S>
where
    K: FromVariant + Eq + Hash,
    V: FromVariant,
    S: BuildHasher + Default,
{
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Dictionary(dict) => dict
                .entries()?
                .into_iter()
                .map(|(k, v)| -> Result<(K, V), ConversionError> {
                    Ok((K::from_variant(k, host)?, V::from_variant(v, host)?))
                })
                .collect(),
            other => Err(mismatch("Dictionary", &other)),
        }
    }
}

impl<K: ToVariant, V: ToVariant, S> ToVariant for HashMap<K, V, S> {
    fn to_variant(self, host: &HostRef) -> Variant {
        let dict = Dictionary::new(host);
        for (k, v) in self {
            // keys come from a map, so no replacement happens
            let _ = dict.insert(k.to_variant(host), v.to_variant(host));
        }
        Variant::Dictionary(dict)
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for HashMap<K, V, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<HashMap<K, V, S>>(Shape::Map(K::type_info, V::type_info))
    }
}

/// Integer limited to `MIN..=MAX`, registered with a range hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ranged<const MIN: i64, const MAX: i64>(pub i64);

impl<const MIN: i64, const MAX: i64> Ranged<MIN, MAX> {
    pub fn new(value: i64) -> Result<Self, ConversionError> {
        if (MIN..=MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConversionError::IntegerOverflow {
                value,
                target_type: "Ranged",
            })
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl<const MIN: i64, const MAX: i64> FromVariant for Ranged<MIN, MAX> {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Int(v) => Self::new(v),
            other => Err(mismatch("Int", &other)),
        }
    }
}

impl<const MIN: i64, const MAX: i64> ToVariant for Ranged<MIN, MAX> {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Int(self.0)
    }
}

impl<const MIN: i64, const MAX: i64> Reflect for Ranged<MIN, MAX> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>(Shape::Ranged { min: MIN, max: MAX })
    }
}

// ============================================================================
// Error codes
// ============================================================================

impl FromVariant for ErrorCode {
    fn from_variant(value: Variant, _host: &HostRef) -> Result<Self, ConversionError> {
        match value {
            Variant::Int(v) => i32::try_from(v).map(ErrorCode::from).map_err(|_| {
                ConversionError::IntegerOverflow {
                    value: v,
                    target_type: "ErrorCode",
                }
            }),
            other => Err(mismatch("Int", &other)),
        }
    }
}

impl ToVariant for ErrorCode {
    fn to_variant(self, _host: &HostRef) -> Variant {
        Variant::Int(i32::from(self) as i64)
    }
}

impl FromVariant for Result<(), ErrorCode> {
    fn from_variant(value: Variant, host: &HostRef) -> Result<Self, ConversionError> {
        ErrorCode::from_variant(value, host).map(ErrorCode::into_result)
    }
}

impl ToVariant for Result<(), ErrorCode> {
    fn to_variant(self, host: &HostRef) -> Variant {
        ErrorCode::from_result(self).to_variant(host)
    }
}

opaque!(ErrorCode, Result<(), ErrorCode>);

/// Declare a typed handle to a host class.
///
/// ```
/// use hostbridge_core::host_class;
///
/// host_class!(
///     /// A scene tree node.
///     pub struct Node: "Node"
/// );
/// ```
#[macro_export]
macro_rules! host_class {
    ($(#[$meta:meta])* $vis:vis struct $name:ident : $class:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $name(pub $crate::Object);

        impl $crate::Reflect for $name {
            fn type_info() -> $crate::TypeInfo {
                $crate::TypeInfo::of::<$name>($crate::Shape::Handle { class: $class })
            }
        }

        impl $crate::FromVariant for $name {
            fn from_variant(
                value: $crate::Variant,
                host: &$crate::HostRef,
            ) -> Result<Self, $crate::ConversionError> {
                <$crate::Object as $crate::FromVariant>::from_variant(value, host).map($name)
            }
        }

        impl $crate::ToVariant for $name {
            fn to_variant(self, host: &$crate::HostRef) -> $crate::Variant {
                $crate::ToVariant::to_variant(self.0, host)
            }
        }
    };
}
