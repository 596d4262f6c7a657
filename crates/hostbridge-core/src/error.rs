//! Error types for registration, value conversion and dispatch.
//!
//! ## Error Hierarchy
//!
//! ```text
//! RegistrationError - class/method registration, raised once at startup
//! ConversionError   - a single value failed to cross the boundary
//! CallError         - a dispatch failed (wraps ConversionError per slot)
//! ```
//!
//! Layout mismatches between a descriptor and a raw buffer are not errors:
//! they indicate host/bridge disagreement and panic.

use thiserror::Error;

use crate::descriptor::VirtualSignature;
use crate::type_hash::MethodId;
use crate::wire::WireType;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while building class descriptors.
///
/// Any of these aborts registration of the whole class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// No classification rule matches the type.
    #[error("type '{type_name}' has no wire representation")]
    Unclassifiable { type_name: &'static str },

    /// A method parameter could not be classified.
    #[error("{class}::{method}: parameter {index} has unsupported type '{type_name}'")]
    UnclassifiableParameter {
        class: String,
        method: String,
        index: usize,
        type_name: &'static str,
    },

    /// A method return type could not be classified.
    #[error("{class}::{method}: return type '{type_name}' is unsupported")]
    UnclassifiableReturn {
        class: String,
        method: String,
        type_name: &'static str,
    },

    /// `Option<T>` where `T` is not an object handle.
    #[error("'{type_name}' is nullable but not an object handle")]
    NullableNonHandle { type_name: &'static str },

    /// A class with this name is already registered.
    #[error("class '{class}' is already registered")]
    DuplicateClass { class: String },

    /// The same member name was registered twice on one class.
    #[error("{class}::{method} is registered more than once")]
    DuplicateMethod { class: String, method: String },

    /// The declared parent class is unknown to the class database.
    #[error("class '{class}' extends unknown class '{parent}'")]
    UnknownParent { class: String, parent: String },

    /// A member uses a lifecycle hook name.
    #[error("{class}::{name} uses a reserved lifecycle name")]
    ReservedName { class: String, name: String },

    /// No class of that name is known to the class database.
    #[error("unknown class '{class}'")]
    UnknownClass { class: String },

    /// No ancestor declares a virtual method of this name.
    #[error("{class}::{method} overrides no virtual method")]
    UnknownVirtual { class: String, method: String },

    /// An override does not match the declared virtual signature.
    #[error("{class}::{method}: override has signature {actual}, expected {expected}")]
    VirtualMismatch {
        class: String,
        method: String,
        expected: VirtualSignature,
        actual: VirtualSignature,
    },
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// A value could not be converted between its wire and Rust forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The value holds a different type than expected.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer does not fit the narrower target type.
    #[error("integer overflow: {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// A null handle where a live reference was required.
    #[error("null handle where {expected} was required")]
    NullHandle { expected: &'static str },

    /// The handle no longer refers to a live host allocation.
    #[error("stale handle {handle:#x}")]
    StaleHandle { handle: u64 },

    /// A variant carried a tag outside the wire type table.
    #[error("invalid variant tag {tag}")]
    InvalidTag { tag: u32 },
}

// ============================================================================
// Call Errors
// ============================================================================

/// A method dispatch failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// No descriptor for this id.
    #[error("no method registered with id {id}")]
    MethodNotFound { id: MethodId },

    /// No method with this name on the class or its extension ancestors.
    #[error("no method '{method}' on class '{class}'")]
    MethodNotFoundByName { class: String, method: String },

    /// The class is not a registered extension class.
    #[error("unknown extension class '{class}'")]
    UnknownClass { class: String },

    /// Wrong number of boxed arguments.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// A boxed argument carries the wrong wire type.
    #[error("argument {index}: expected {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        expected: WireType,
        actual: WireType,
    },

    /// An object argument is not of the declared class.
    #[error("argument {index}: expected object of class '{expected}', got '{actual}'")]
    ObjectKind {
        index: usize,
        expected: String,
        actual: String,
    },

    /// The instance passed in is not the descriptor's Rust type.
    #[error("instance is not a {expected}")]
    InstanceType { expected: &'static str },

    /// An argument failed to convert.
    #[error("argument {index}: {source}")]
    Conversion {
        index: usize,
        #[source]
        source: ConversionError,
    },

    /// The return value failed to convert.
    #[error("return value: {0}")]
    Return(#[source] ConversionError),

    /// The user method panicked (reported by the C ABI trampolines).
    #[error("method panicked: {message}")]
    Panicked { message: String },
}
