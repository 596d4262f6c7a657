//! Types shared by the two call paths.

use std::any::Any;
use std::sync::Arc;

use crate::error::CallError;
use crate::host::HostRef;
use crate::instances::InstanceTracker;
use crate::raw::{RawArgs, RawReturn};
use crate::variant::Variant;

/// Where a type-erased invoker pulls its arguments from.
///
/// Each index is taken exactly once, in order.
pub trait ArgSource {
    fn take(&mut self, index: usize) -> Result<Variant, CallError>;
}

/// Parent/child relation between host and extension classes.
pub trait ClassHierarchy: Send + Sync {
    /// True if `class` is `ancestor` or derives from it.
    fn is_subclass(&self, class: &str, ancestor: &str) -> bool;
}

/// Everything a call needs besides its arguments.
#[derive(Clone, Copy)]
pub struct CallEnv<'a> {
    pub host: &'a HostRef,
    pub instances: &'a InstanceTracker,
    pub classes: &'a dyn ClassHierarchy,
}

/// Boxed entry point stored on a descriptor.
pub type BoxedCallFn = Arc<
    dyn Fn(&mut dyn Any, &[Variant], &CallEnv<'_>) -> Result<Option<Variant>, CallError>
        + Send
        + Sync,
>;

/// Raw entry point stored on a descriptor.
pub type RawCallFn = Arc<
    dyn Fn(&mut dyn Any, RawArgs<'_>, &mut RawReturn<'_>, &CallEnv<'_>) -> Result<(), CallError>
        + Send
        + Sync,
>;
