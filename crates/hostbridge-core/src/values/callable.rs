//! Bound method and signal references.

use super::{HostHandle, handle_wrapper, unexpected};
use crate::error::ConversionError;
use crate::host::{HostRef, HostValue};
use crate::raw::RawHandle;

handle_wrapper!(
    /// A method bound to an object.
    Callable
);

impl Callable {
    pub fn new(host: &HostRef, object: RawHandle, method: &str) -> Self {
        Self(HostHandle::alloc(
            host,
            HostValue::Callable {
                object,
                method: method.to_string(),
            },
        ))
    }

    /// Target object and method name.
    pub fn target(&self) -> Result<(RawHandle, String), ConversionError> {
        match self.0.read()? {
            HostValue::Callable { object, method } => Ok((object, method)),
            other => Err(unexpected("Callable", &other)),
        }
    }
}

handle_wrapper!(
    /// A named signal on an object.
    Signal
);

impl Signal {
    pub fn new(host: &HostRef, object: RawHandle, name: &str) -> Self {
        Self(HostHandle::alloc(
            host,
            HostValue::Signal {
                object,
                name: name.to_string(),
            },
        ))
    }

    pub fn target(&self) -> Result<(RawHandle, String), ConversionError> {
        match self.0.read()? {
            HostValue::Signal { object, name } => Ok((object, name)),
            other => Err(unexpected("Signal", &other)),
        }
    }
}
