//! User-facing trait for classes implemented in Rust.

use std::any::Any;

use hostbridge_core::{ClassHooks, RegistrationError};
use hostbridge_registry::OBJECT_CLASS;

use crate::class_builder::ClassBuilder;

/// A Rust type the host can instantiate and call into.
///
/// ```ignore
/// struct Calculator;
///
/// impl Calculator {
///     fn add(&mut self, a: i64, b: i64) -> i64 {
///         a + b
///     }
/// }
///
/// impl ExtensionClass for Calculator {
///     const NAME: &'static str = "Calculator";
///
///     fn create() -> Self {
///         Calculator
///     }
///
///     fn register(
///         class: ClassBuilder<'_, Self>,
///     ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
///         class.method("add", Self::add)
///     }
/// }
/// ```
pub trait ExtensionClass: Any + Send + Sized {
    /// Class name in the host's class database.
    const NAME: &'static str;

    /// Host or extension class this one derives from. Instances are
    /// reference counted when the parent chain reaches `RefCounted`.
    const PARENT: &'static str = OBJECT_CLASS;

    fn create() -> Self;

    /// Declare methods, properties, signals and constants.
    fn register(
        class: ClassBuilder<'_, Self>,
    ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
        Ok(class)
    }

    /// Called once the host object backing the instance exists.
    fn on_create(&mut self) {}

    /// Called before the instance is freed.
    fn on_free(&mut self) {}

    fn notification(&mut self, what: i32) {
        let _ = what;
    }

    /// Text the host shows for the instance, if not the default.
    fn to_host_string(&self) -> Option<String> {
        None
    }
}

fn create<T: ExtensionClass>() -> Box<dyn Any + Send> {
    Box::new(T::create())
}

fn on_create<T: ExtensionClass>(this: &mut dyn Any) {
    if let Some(this) = this.downcast_mut::<T>() {
        this.on_create();
    }
}

fn on_free<T: ExtensionClass>(this: &mut dyn Any) {
    if let Some(this) = this.downcast_mut::<T>() {
        this.on_free();
    }
}

fn notification<T: ExtensionClass>(this: &mut dyn Any, what: i32) {
    if let Some(this) = this.downcast_mut::<T>() {
        this.notification(what);
    }
}

fn to_string<T: ExtensionClass>(this: &dyn Any) -> Option<String> {
    this.downcast_ref::<T>()?.to_host_string()
}

/// Lifecycle hooks of `T`, erased for the class database.
pub(crate) fn hooks<T: ExtensionClass>() -> ClassHooks {
    ClassHooks {
        create: create::<T>,
        on_create: on_create::<T>,
        on_free: on_free::<T>,
        notification: notification::<T>,
        to_string: to_string::<T>,
    }
}
