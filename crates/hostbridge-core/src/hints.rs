//! Editor/host hints and flag sets attached to registered members.

use bitflags::bitflags;

use crate::wire::WireType;

/// Extra type information the host uses for validation and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    #[default]
    None,
    /// Inclusive integer range.
    Range { min: i64, max: i64 },
    /// Typed array; `class` is set for arrays of objects.
    ArrayOf {
        element: WireType,
        class: Option<&'static str>,
    },
    /// Typed dictionary.
    DictionaryOf { key: WireType, value: WireType },
    /// Object of a specific host or extension class.
    ObjectOf { class: &'static str },
}

impl TypeHint {
    /// Declared object class, if this hint names one.
    pub fn object_class(&self) -> Option<&'static str> {
        match self {
            TypeHint::ObjectOf { class } => Some(class),
            _ => None,
        }
    }
}

bitflags! {
    /// Method flags, numbered like the host ABI.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u32 {
        const NORMAL = 1;
        const EDITOR = 2;
        const CONST = 4;
        const VIRTUAL = 8;
        const VARARG = 16;
        const STATIC = 32;
    }
}

impl Default for MethodFlags {
    fn default() -> Self {
        MethodFlags::NORMAL
    }
}

bitflags! {
    /// Property usage flags, numbered like the host ABI.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyUsage: u32 {
        const STORAGE = 2;
        const EDITOR = 4;
        const INTERNAL = 8;
        const CHECKABLE = 16;
        const CHECKED = 32;
        const GROUP = 64;
        const CATEGORY = 128;
        const READ_ONLY = 1 << 27;
    }
}

impl Default for PropertyUsage {
    fn default() -> Self {
        PropertyUsage::STORAGE | PropertyUsage::EDITOR
    }
}
