//! Signature reflection over Rust function arity.
//!
//! Any function or closure whose parameters implement [`FromVariant`] and whose
//! return type implements [`ToVariant`] can be registered as a method. The
//! impls below extract the ordered parameter types as [`TypeInfo`] and erase
//! the function into one [`Invoker`] that both call paths share.
//!
//! | receiver | trait | flags |
//! |----------|-------|-------|
//! | `Fn(&mut T, ..) -> R` | [`Method<T, (ByMut, (..))>`](Method) | `NORMAL` |
//! | `Fn(&T, ..) -> R` | [`Method<T, (ByRef, (..))>`](Method) | `NORMAL \| CONST` |
//! | `Fn(..) -> R` | [`StaticMethod<(..)>`](StaticMethod) | `NORMAL \| STATIC` |
//!
//! Up to eight parameters are supported.

use std::any::{Any, type_name};
use std::sync::Arc;

use hostbridge_core::{
    ArgSource, CallError, FromVariant, HostRef, MethodFlags, Reflect, ToVariant, TypeInfo, Variant,
};

/// A registered function with its receiver and arguments erased.
///
/// Pulls each argument from the source in declaration order and returns the
/// converted result (`Nil` for unit-returning functions).
pub type Invoker = Arc<
    dyn Fn(&mut dyn Any, &mut dyn ArgSource, &HostRef) -> Result<Variant, CallError>
        + Send
        + Sync,
>;

/// Ordered parameter types and return type of a registered function.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<TypeInfo>,
    pub ret: TypeInfo,
}

/// Marker for methods taking `&mut self`.
pub enum ByMut {}

/// Marker for methods taking `&self`.
pub enum ByRef {}

/// An instance method of `T`.
///
/// `Marker` only disambiguates the blanket impls and is always inferred.
pub trait Method<T, Marker>: Send + Sync + 'static {
    fn signature() -> Signature;

    fn flags() -> MethodFlags;

    fn into_invoker(self) -> Invoker;
}

/// A function registered without a receiver.
pub trait StaticMethod<Args>: Send + Sync + 'static {
    fn signature() -> Signature;

    fn into_invoker(self) -> Invoker;
}

/// Argument list of a signal, as a tuple of parameter types.
pub trait SignalArgs {
    fn types() -> Vec<TypeInfo>;
}

fn instance<T: 'static>(this: &mut dyn Any) -> Result<&mut T, CallError> {
    this.downcast_mut::<T>().ok_or(CallError::InstanceType {
        expected: type_name::<T>(),
    })
}

fn arg<A: FromVariant>(
    source: &mut dyn ArgSource,
    index: usize,
    host: &HostRef,
) -> Result<A, CallError> {
    let value = source.take(index)?;
    A::from_variant(value, host).map_err(|source| CallError::Conversion { index, source })
}

macro_rules! impl_method {
    ($($ty:ident $arg:ident $idx:tt),*) => {
        impl<T, F, R, $($ty,)*> Method<T, (ByMut, ($($ty,)*))> for F
        where
            T: 'static,
            F: Fn(&mut T, $($ty),*) -> R + Send + Sync + 'static,
            R: ToVariant + Reflect,
            $($ty: FromVariant + Reflect,)*
        {
            fn signature() -> Signature {
                Signature {
                    params: vec![$($ty::type_info()),*],
                    ret: R::type_info(),
                }
            }

            fn flags() -> MethodFlags {
                MethodFlags::NORMAL
            }

            #[allow(unused_variables)]
            fn into_invoker(self) -> Invoker {
                let f = self;
                Arc::new(
                    move |this: &mut dyn Any,
                          source: &mut dyn ArgSource,
                          host: &HostRef|
                          -> Result<Variant, CallError> {
                        let this = instance::<T>(this)?;
                        $(let $arg = arg::<$ty>(source, $idx, host)?;)*
                        Ok(f(this, $($arg),*).to_variant(host))
                    },
                )
            }
        }

        impl<T, F, R, $($ty,)*> Method<T, (ByRef, ($($ty,)*))> for F
        where
            T: 'static,
            F: Fn(&T, $($ty),*) -> R + Send + Sync + 'static,
            R: ToVariant + Reflect,
            $($ty: FromVariant + Reflect,)*
        {
            fn signature() -> Signature {
                Signature {
                    params: vec![$($ty::type_info()),*],
                    ret: R::type_info(),
                }
            }

            fn flags() -> MethodFlags {
                MethodFlags::NORMAL | MethodFlags::CONST
            }

            #[allow(unused_variables)]
            fn into_invoker(self) -> Invoker {
                let f = self;
                Arc::new(
                    move |this: &mut dyn Any,
                          source: &mut dyn ArgSource,
                          host: &HostRef|
                          -> Result<Variant, CallError> {
                        let this = instance::<T>(this)?;
                        $(let $arg = arg::<$ty>(source, $idx, host)?;)*
                        Ok(f(&*this, $($arg),*).to_variant(host))
                    },
                )
            }
        }

        impl<F, R, $($ty,)*> StaticMethod<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: ToVariant + Reflect,
            $($ty: FromVariant + Reflect,)*
        {
            fn signature() -> Signature {
                Signature {
                    params: vec![$($ty::type_info()),*],
                    ret: R::type_info(),
                }
            }

            #[allow(unused_variables)]
            fn into_invoker(self) -> Invoker {
                let f = self;
                Arc::new(
                    move |_this: &mut dyn Any,
                          source: &mut dyn ArgSource,
                          host: &HostRef|
                          -> Result<Variant, CallError> {
                        $(let $arg = arg::<$ty>(source, $idx, host)?;)*
                        Ok(f($($arg),*).to_variant(host))
                    },
                )
            }
        }

        impl<$($ty: Reflect,)*> SignalArgs for ($($ty,)*) {
            fn types() -> Vec<TypeInfo> {
                vec![$($ty::type_info()),*]
            }
        }
    };
}

impl_method!();
impl_method!(A a 0);
impl_method!(A a 0, B b 1);
impl_method!(A a 0, B b 1, C c 2);
impl_method!(A a 0, B b 1, C c 2, D d 3);
impl_method!(A a 0, B b 1, C c 2, D d 3, E e 4);
impl_method!(A a 0, B b 1, C c 2, D d 3, E e 4, G g 5);
impl_method!(A a 0, B b 1, C c 2, D d 3, E e 4, G g 5, H h 6);
impl_method!(A a 0, B b 1, C c 2, D d 3, E e 4, G g 5, H h 6, I i 7);
