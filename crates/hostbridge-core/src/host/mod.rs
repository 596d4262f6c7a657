//! The host runtime's memory and object API, as seen by the bridge.
//!
//! The host owns every reference-typed payload. The bridge only ever holds
//! [`RawHandle`]s and adjusts their reference counts through [`HostApi`].

mod local;
mod sink;

pub use local::LocalHost;
pub use sink::{
    ClassRegistration, ClassSink, ConstantRegistration, MethodRegistration,
    PropertyGroupRegistration, PropertyRegistration, SignalRegistration,
};

use std::sync::Arc;

use crate::error::ConversionError;
use crate::math::{Color, Vector2, Vector3, Vector4};
use crate::raw::{RawHandle, RawVariant};

/// Shared handle to the host.
pub type HostRef = Arc<dyn HostApi>;

/// Payload behind a host handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    String(String),
    StringName(String),
    NodePath(String),
    /// Elements own the handles in their payloads.
    Array(Vec<RawVariant>),
    /// Keys and values own the handles in their payloads.
    Dictionary(Vec<(RawVariant, RawVariant)>),
    Packed(PackedData),
    Callable { object: RawHandle, method: String },
    Signal { object: RawHandle, name: String },
    /// Plain bytes, used for aggregates boxed inside a variant.
    Blob(Vec<u8>),
    Object { class: String, refcounted: bool },
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::String(_) => "String",
            HostValue::StringName(_) => "StringName",
            HostValue::NodePath(_) => "NodePath",
            HostValue::Array(_) => "Array",
            HostValue::Dictionary(_) => "Dictionary",
            HostValue::Packed(_) => "Packed",
            HostValue::Callable { .. } => "Callable",
            HostValue::Signal { .. } => "Signal",
            HostValue::Blob(_) => "Blob",
            HostValue::Object { .. } => "Object",
        }
    }

    /// Handles owned by this payload, released when it is freed.
    pub fn owned_handles(&self) -> Vec<RawHandle> {
        match self {
            HostValue::Array(items) => items.iter().filter_map(RawVariant::owned_handle).collect(),
            HostValue::Dictionary(entries) => entries
                .iter()
                .flat_map(|(k, v)| [k.owned_handle(), v.owned_handle()])
                .flatten()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Contents of a packed array.
#[derive(Debug, Clone, PartialEq)]
pub enum PackedData {
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
    Vector2(Vec<Vector2>),
    Vector3(Vec<Vector3>),
    Color(Vec<Color>),
    Vector4(Vec<Vector4>),
}

impl PackedData {
    pub fn len(&self) -> usize {
        match self {
            PackedData::Byte(v) => v.len(),
            PackedData::Int32(v) => v.len(),
            PackedData::Int64(v) => v.len(),
            PackedData::Float32(v) => v.len(),
            PackedData::Float64(v) => v.len(),
            PackedData::String(v) => v.len(),
            PackedData::Vector2(v) => v.len(),
            PackedData::Vector3(v) => v.len(),
            PackedData::Color(v) => v.len(),
            PackedData::Vector4(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Memory and object operations provided by the host runtime.
///
/// Implementations must be callable from any thread the host calls in on.
pub trait HostApi: Send + Sync {
    /// Allocate a payload with a reference count of one.
    fn alloc(&self, value: HostValue) -> RawHandle;

    /// Copy out the payload behind a handle.
    fn read(&self, handle: RawHandle) -> Result<HostValue, ConversionError>;

    /// Replace the payload behind a handle.
    fn write(&self, handle: RawHandle, value: HostValue) -> Result<(), ConversionError>;

    /// Returns false if the handle is stale.
    fn add_ref(&self, handle: RawHandle) -> bool;

    /// Drop one reference. Returns true if the payload was freed.
    fn release(&self, handle: RawHandle) -> bool;

    /// Current count, or `None` if the handle is stale.
    fn ref_count(&self, handle: RawHandle) -> Option<u32>;

    /// Create a host object of `class`.
    fn object_new(&self, class: &str, refcounted: bool) -> RawHandle;

    /// Class name of a live object.
    fn object_class(&self, handle: RawHandle) -> Option<String>;

    fn object_is_refcounted(&self, handle: RawHandle) -> bool;

    /// Free an object regardless of its reference count.
    fn object_destroy(&self, handle: RawHandle);
}
