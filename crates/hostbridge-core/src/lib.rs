//! Core types for the hostbridge dispatch bridge.
//!
//! This crate holds everything both call paths and the registry agree on:
//!
//! - [`WireType`], [`OwnershipClass`] and [`ArgMetadata`]: the closed wire tables
//! - [`HostApi`] / [`ClassSink`]: what the bridge needs from the host
//! - [`Variant`] and the reference wrappers in [`values`]
//! - [`Reflect`], [`FromVariant`], [`ToVariant`]: how Rust types describe
//!   and convert themselves
//! - [`Descriptor`]: the immutable record for one registered method

pub mod convert;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod error_code;
pub mod hints;
pub mod host;
pub mod instances;
pub mod math;
pub mod raw;
pub mod reflect;
pub mod type_hash;
pub mod values;
pub mod variant;
pub mod wire;

pub use convert::{FromVariant, Ranged, ToVariant};
pub use descriptor::{ArgSpec, ClassHooks, Descriptor, TypeSpec, VirtualSignature};
pub use dispatch::{ArgSource, BoxedCallFn, CallEnv, ClassHierarchy, RawCallFn};
pub use error::{CallError, ConversionError, RegistrationError};
pub use error_code::ErrorCode;
pub use hints::{MethodFlags, PropertyUsage, TypeHint};
pub use host::{
    ClassRegistration, ClassSink, ConstantRegistration, HostApi, HostRef, HostValue, LocalHost,
    MethodRegistration, PackedData, PropertyGroupRegistration, PropertyRegistration,
    SignalRegistration,
};
pub use instances::InstanceTracker;
pub use math::{
    Aabb, Aggregate, Basis, Color, Plane, Projection, Quaternion, Rect2, Rect2i, Rid, Transform2D,
    Transform3D, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
};
pub use raw::{ArgLayout, RawArgs, RawHandle, RawReturn, RawVariant};
pub use reflect::{Reflect, Shape, TypeInfo};
pub use type_hash::{ClassId, MethodId};
pub use values::{
    Array, Callable, Dictionary, Name, NodePath, Object, Packed, PackedElement, Signal, Text,
};
pub use variant::Variant;
pub use wire::{ArgMetadata, DecodeRule, EncodeRule, OwnershipClass, WireType};
