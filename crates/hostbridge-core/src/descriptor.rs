//! Immutable per-method calling convention records.

use std::any::Any;
use std::fmt;

use crate::dispatch::{BoxedCallFn, CallEnv, RawCallFn};
use crate::error::CallError;
use crate::hints::{MethodFlags, TypeHint};
use crate::host::MethodRegistration;
use crate::raw::{ArgLayout, RawArgs, RawReturn};
use crate::type_hash::MethodId;
use crate::variant::Variant;
use crate::wire::{ArgMetadata, WireType};

/// Result of classifying one Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub wire: WireType,
    pub meta: ArgMetadata,
    pub hint: TypeHint,
    /// `Nil` is a valid value (nullable object handles only).
    pub nullable: bool,
}

impl TypeSpec {
    pub const fn new(wire: WireType) -> Self {
        Self {
            wire,
            meta: ArgMetadata::None,
            hint: TypeHint::None,
            nullable: false,
        }
    }

    pub const fn with_meta(mut self, meta: ArgMetadata) -> Self {
        self.meta = meta;
        self
    }

    pub const fn with_hint(mut self, hint: TypeHint) -> Self {
        self.hint = hint;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.wire.width(self.meta)
    }
}

/// A classified parameter or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub type_name: &'static str,
    pub ty: TypeSpec,
}

impl ArgSpec {
    #[inline]
    pub fn wire(&self) -> WireType {
        self.ty.wire
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.ty.width()
    }
}

/// Everything needed to call one registered method, built once at
/// registration and never changed.
#[derive(Clone)]
pub struct Descriptor {
    pub class: String,
    pub name: String,
    pub id: MethodId,
    pub flags: MethodFlags,
    pub args: Vec<ArgSpec>,
    /// `None` for methods without a return value.
    pub ret: Option<ArgSpec>,
    pub layout: ArgLayout,
    pub boxed: BoxedCallFn,
    pub raw: RawCallFn,
}

impl Descriptor {
    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Width of the output slot, or 0 when nothing is returned.
    pub fn return_width(&self) -> usize {
        self.ret.map_or(0, |ret| ret.width())
    }

    pub fn call_boxed(
        &self,
        instance: &mut dyn Any,
        args: &[Variant],
        env: &CallEnv<'_>,
    ) -> Result<Option<Variant>, CallError> {
        (self.boxed)(instance, args, env)
    }

    pub fn call_raw(
        &self,
        instance: &mut dyn Any,
        args: RawArgs<'_>,
        ret: &mut RawReturn<'_>,
        env: &CallEnv<'_>,
    ) -> Result<(), CallError> {
        (self.raw)(instance, args, ret, env)
    }

    /// The record handed to the host's class database.
    pub fn registration(&self) -> MethodRegistration {
        MethodRegistration {
            class: self.class.clone(),
            name: self.name.clone(),
            id: self.id,
            args: self.args.clone(),
            ret: self.ret,
            flags: self.flags,
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("class", &self.class)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .field("ret", &self.ret)
            .finish_non_exhaustive()
    }
}

/// Wire shape of a virtual method a host class lets extensions override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSignature {
    pub args: Vec<WireType>,
    pub ret: Option<WireType>,
}

impl VirtualSignature {
    pub fn new(args: impl Into<Vec<WireType>>, ret: Option<WireType>) -> Self {
        Self {
            args: args.into(),
            ret,
        }
    }

    /// The signature a classified method actually has.
    pub fn of(args: &[ArgSpec], ret: Option<&ArgSpec>) -> Self {
        Self {
            args: args.iter().map(ArgSpec::wire).collect(),
            ret: ret.map(ArgSpec::wire),
        }
    }
}

impl fmt::Display for VirtualSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, wire) in self.args.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{wire}")?;
        }
        f.write_str(")")?;
        match self.ret {
            Some(ret) => write!(f, " -> {ret}"),
            None => Ok(()),
        }
    }
}

/// Lifecycle entry points of an extension class, type-erased.
#[derive(Clone, Copy)]
pub struct ClassHooks {
    pub create: fn() -> Box<dyn Any + Send>,
    pub on_create: fn(&mut dyn Any),
    pub on_free: fn(&mut dyn Any),
    pub notification: fn(&mut dyn Any, i32),
    pub to_string: fn(&dyn Any) -> Option<String>,
}

impl fmt::Debug for ClassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClassHooks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_width_follows_metadata() {
        let f32_spec = TypeSpec::new(WireType::Float).with_meta(ArgMetadata::RealIsFloat);
        assert_eq!(f32_spec.width(), 4);
        assert_eq!(TypeSpec::new(WireType::Float).width(), 8);

        let nullable = TypeSpec::new(WireType::Object)
            .with_hint(TypeHint::ObjectOf { class: "Node" })
            .nullable();
        assert!(nullable.nullable);
        assert_eq!(nullable.width(), 8);
    }

    #[test]
    fn virtual_signature_display() {
        let sig = VirtualSignature::new([WireType::Float, WireType::Bool], Some(WireType::Int));
        assert_eq!(sig.to_string(), "(Float, Bool) -> Int");
        assert_eq!(VirtualSignature::new([], None).to_string(), "()");
    }
}
