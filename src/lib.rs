//! Dispatch bridge between Rust extension classes and a dynamic host object
//! system.
//!
//! An extension declares its classes through [`ExtensionClass`] and
//! [`ClassBuilder`]; the [`Bridge`] freezes them into a descriptor table and
//! serves host calls through two paths:
//!
//! - [`Bridge::call_raw`]: arguments packed in a host buffer, decoded and
//!   encoded per wire type with fixed ownership rules
//! - [`Bridge::call_boxed`]: self-describing [`Variant`] arguments, for
//!   late-bound calls
//!
//! The C ABI trampolines in [`ffi`] wrap both for the host.
//!
//! # Example
//!
//! ```ignore
//! use hostbridge::prelude::*;
//!
//! struct Calculator;
//!
//! impl ExtensionClass for Calculator {
//!     const NAME: &'static str = "Calculator";
//!
//!     fn create() -> Self {
//!         Calculator
//!     }
//!
//!     fn register(
//!         class: ClassBuilder<'_, Self>,
//!     ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
//!         class.method("add", |_: &mut Calculator, a: i64, b: i64| a + b)
//!     }
//! }
//!
//! let host: HostRef = Arc::new(LocalHost::new());
//! let mut builder = Bridge::builder(host);
//! builder.register::<Calculator>()?;
//! let bridge = builder.build();
//! ```

pub mod bridge;
pub mod call;
pub mod class_builder;
pub mod extension;
pub mod ffi;
pub mod method;

pub use bridge::{Bridge, BridgeBuilder, ExtensionInstance};
pub use class_builder::{ClassBuilder, RESERVED_NAMES};
pub use extension::ExtensionClass;
pub use ffi::CallStatus;
pub use method::{ByMut, ByRef, Invoker, Method, SignalArgs, Signature, StaticMethod};

pub use hostbridge_core;
pub use hostbridge_core::{CallError, ConversionError, RegistrationError, Variant};
pub use hostbridge_registry;

pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{Bridge, BridgeBuilder, ClassBuilder, ExtensionClass, ExtensionInstance};
    pub use hostbridge_core::host_class;
    pub use hostbridge_core::{
        Array, CallError, ClassSink, Color, ConversionError, Dictionary, ErrorCode, FromVariant,
        HostRef, LocalHost, MethodId, Name, NodePath, Object, Packed, Ranged, RawArgs, RawReturn,
        Reflect, RegistrationError, Rid, Text, ToVariant, TypeSpec, Variant, Vector2, Vector3,
        VirtualSignature, WireType,
    };
}
