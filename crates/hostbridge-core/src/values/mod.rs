//! Application-level wrappers for host reference types.
//!
//! Every wrapper holds exactly one host reference: cloning takes another
//! (`add_ref`), dropping gives it back (`release`). [`HostHandle::into_raw`]
//! hands the reference to whoever receives the raw handle instead.

mod callable;
mod containers;
mod object;
mod packed;
mod text;

pub use callable::{Callable, Signal};
pub use containers::{Array, Dictionary};
pub use object::Object;
pub use packed::{Packed, PackedElement};
pub use text::{Name, NodePath, Text};

use std::fmt;

use crate::error::ConversionError;
use crate::host::{HostRef, HostValue};
use crate::raw::RawHandle;

/// One counted reference to a host allocation.
pub struct HostHandle {
    raw: RawHandle,
    host: HostRef,
}

impl HostHandle {
    /// Allocate a payload; the new handle's single reference is ours.
    pub fn alloc(host: &HostRef, value: HostValue) -> Self {
        Self {
            raw: host.alloc(value),
            host: host.clone(),
        }
    }

    /// Take over a reference the caller owns.
    pub fn adopt(
        host: &HostRef,
        raw: RawHandle,
        expected: &'static str,
    ) -> Result<Self, ConversionError> {
        if raw.is_null() {
            return Err(ConversionError::NullHandle { expected });
        }
        if host.ref_count(raw).is_none() {
            return Err(ConversionError::StaleHandle { handle: raw.0 });
        }
        Ok(Self {
            raw,
            host: host.clone(),
        })
    }

    /// Take a new reference (+1) on a handle the caller keeps.
    pub fn duplicate(
        host: &HostRef,
        raw: RawHandle,
        expected: &'static str,
    ) -> Result<Self, ConversionError> {
        if raw.is_null() {
            return Err(ConversionError::NullHandle { expected });
        }
        if !host.add_ref(raw) {
            return Err(ConversionError::StaleHandle { handle: raw.0 });
        }
        Ok(Self {
            raw,
            host: host.clone(),
        })
    }

    #[inline]
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    #[inline]
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    pub fn read(&self) -> Result<HostValue, ConversionError> {
        self.host.read(self.raw)
    }

    pub fn write(&self, value: HostValue) -> Result<(), ConversionError> {
        self.host.write(self.raw, value)
    }

    /// Give up our reference without releasing it.
    pub fn into_raw(mut self) -> RawHandle {
        std::mem::replace(&mut self.raw, RawHandle::NULL)
    }
}

impl Clone for HostHandle {
    fn clone(&self) -> Self {
        self.host.add_ref(self.raw);
        Self {
            raw: self.raw,
            host: self.host.clone(),
        }
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            self.host.release(self.raw);
        }
    }
}

impl PartialEq for HostHandle {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for HostHandle {}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.raw.0)
    }
}

/// Declares a newtype over [`HostHandle`] with the shared constructors.
macro_rules! handle_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(pub(crate) $crate::values::HostHandle);

        impl $name {
            /// Take over a reference the caller owns.
            pub fn adopt(
                host: &$crate::host::HostRef,
                raw: $crate::raw::RawHandle,
            ) -> Result<Self, $crate::error::ConversionError> {
                $crate::values::HostHandle::adopt(host, raw, stringify!($name)).map(Self)
            }

            /// Take a new reference on a handle the caller keeps.
            pub fn duplicate(
                host: &$crate::host::HostRef,
                raw: $crate::raw::RawHandle,
            ) -> Result<Self, $crate::error::ConversionError> {
                $crate::values::HostHandle::duplicate(host, raw, stringify!($name)).map(Self)
            }

            #[inline]
            pub fn handle(&self) -> $crate::raw::RawHandle {
                self.0.raw()
            }

            /// Hand our reference to the receiver of the raw handle.
            #[inline]
            pub fn into_raw(self) -> $crate::raw::RawHandle {
                self.0.into_raw()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }
    };
}

pub(crate) use handle_wrapper;

pub(crate) fn unexpected(expected: &'static str, actual: &HostValue) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: actual.kind(),
    }
}
