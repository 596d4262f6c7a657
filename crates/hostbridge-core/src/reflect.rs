//! Static type metadata for method signatures.
//!
//! Rust has no runtime reflection, so each parameter and return type reports
//! its identity and structure through [`Reflect`]. The type registry turns
//! that into a wire type when a class is registered.

use std::any::{TypeId, type_name};
use std::fmt;

/// Structural description used by the registry's fallback rules.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// Only an exact registry entry can classify this type.
    Opaque,
    /// `()`: no return value.
    Unit,
    /// A host object handle of the given class.
    Handle { class: &'static str },
    Signal,
    Callable,
    /// `Option<T>`; only valid when `T` is a handle.
    Optional(fn() -> TypeInfo),
    /// Homogeneous sequence.
    List(fn() -> TypeInfo),
    /// Key/value map.
    Map(fn() -> TypeInfo, fn() -> TypeInfo),
    /// Integer constrained to an inclusive range.
    Ranged { min: i64, max: i64 },
}

/// Identity and shape of one Rust type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
    pub shape: Shape,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>(shape: Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape,
        }
    }

    pub fn opaque<T: ?Sized + 'static>() -> Self {
        Self::of::<T>(Shape::Opaque)
    }

    #[inline]
    pub fn is_unit(&self) -> bool {
        matches!(self.shape, Shape::Unit)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Types that can describe themselves to the type registry.
pub trait Reflect: 'static {
    fn type_info() -> TypeInfo;
}
