//! Deterministic hash-based identities for classes and methods.
//!
//! [`ClassId`] and [`MethodId`] are 64-bit hashes computed from names, so the
//! host and the bridge agree on a method's identity without exchanging a
//! lookup table:
//!
//! - Same class + method name = same id, across processes and builds
//! - No registration order dependencies
//! - Single map lookup on dispatch
//!
//! # Examples
//!
//! ```
//! use hostbridge_core::{ClassId, MethodId};
//!
//! let a = MethodId::new("Calculator", "add");
//! let b = MethodId::new("Calculator", "add");
//! assert_eq!(a, b);
//! assert_ne!(a, MethodId::new("Calculator", "sub"));
//! assert_ne!(ClassId::from_name("Calculator"), ClassId::from_name("Node"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Class and method hashes of the same name never collide because each
/// domain is mixed with its own marker.
pub mod hash_constants {
    /// Separator constant between path components
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes
    pub const CLASS: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;
}

/// A deterministic 64-bit hash identifying a registered class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u64);

impl ClassId {
    /// Empty/invalid id.
    pub const EMPTY: ClassId = ClassId(0);

    /// Hash a class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        ClassId(hash_constants::CLASS ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is the empty id.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({:#018x})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A deterministic 64-bit hash identifying one method of one class.
///
/// This is the `method_id` the host passes back on every invocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodId(pub u64);

impl MethodId {
    /// Empty/invalid id.
    pub const EMPTY: MethodId = MethodId(0);

    /// Hash a method name scoped to its owning class.
    #[inline]
    pub fn new(class: &str, method: &str) -> Self {
        let owner = ClassId::from_name(class).0;
        let mut hash = hash_constants::METHOD ^ owner;
        hash = hash.wrapping_mul(hash_constants::SEP) ^ xxh64(method.as_bytes(), 0);
        MethodId(hash)
    }

    /// Raw 64-bit value, as handed across the C ABI.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({:#018x})", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
