//! Registration-time tables for the hostbridge dispatch bridge.
//!
//! - [`TypeRegistry`]: decides the wire type of every Rust type used in a
//!   method signature
//! - [`ClassDb`]: host and extension classes, their hierarchy, and the
//!   descriptor table the bridge dispatches through

mod class_db;
mod type_registry;

pub use class_db::{
    ClassDb, ClassKind, CommittedClass, OBJECT_CLASS, REF_COUNTED_CLASS, StagedClass,
};
pub use type_registry::TypeRegistry;
