//! Managed host objects.
//!
//! Only refcounted objects are counted. Everything else (scene nodes,
//! extension instances) is owned by the host's object lifecycle and an
//! [`Object`] is just a view of it.

use std::fmt;

use crate::error::ConversionError;
use crate::host::HostRef;
use crate::raw::RawHandle;

pub struct Object {
    raw: RawHandle,
    host: HostRef,
    owned: bool,
}

impl Object {
    /// Create a new host object; we hold its first reference if refcounted.
    pub fn instantiate(host: &HostRef, class: &str, refcounted: bool) -> Self {
        Self {
            raw: host.object_new(class, refcounted),
            host: host.clone(),
            owned: refcounted,
        }
    }

    fn live(host: &HostRef, raw: RawHandle) -> Result<bool, ConversionError> {
        if raw.is_null() {
            return Err(ConversionError::NullHandle { expected: "Object" });
        }
        if host.object_class(raw).is_none() {
            return Err(ConversionError::StaleHandle { handle: raw.0 });
        }
        Ok(host.object_is_refcounted(raw))
    }

    /// Take over the caller's reference (refcounted objects only).
    pub fn adopt(host: &HostRef, raw: RawHandle) -> Result<Self, ConversionError> {
        let refcounted = Self::live(host, raw)?;
        Ok(Self {
            raw,
            host: host.clone(),
            owned: refcounted,
        })
    }

    /// View an object the caller keeps; refcounted objects get +1.
    pub fn view(host: &HostRef, raw: RawHandle) -> Result<Self, ConversionError> {
        let refcounted = Self::live(host, raw)?;
        if refcounted && !host.add_ref(raw) {
            return Err(ConversionError::StaleHandle { handle: raw.0 });
        }
        Ok(Self {
            raw,
            host: host.clone(),
            owned: refcounted,
        })
    }

    #[inline]
    pub fn handle(&self) -> RawHandle {
        self.raw
    }

    /// Whether this wrapper holds a counted reference.
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn class_name(&self) -> Option<String> {
        self.host.object_class(self.raw)
    }

    /// Hand our reference (if any) to the receiver of the raw handle.
    pub fn into_raw(mut self) -> RawHandle {
        std::mem::replace(&mut self.raw, RawHandle::NULL)
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        if self.owned {
            self.host.add_ref(self.raw);
        }
        Self {
            raw: self.raw,
            host: self.host.clone(),
            owned: self.owned,
        }
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        if self.owned && !self.raw.is_null() {
            self.host.release(self.raw);
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:#x})", self.raw.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostApi, LocalHost};
    use std::sync::Arc;

    #[test]
    fn refcounted_view_balances() {
        let local = Arc::new(LocalHost::new());
        let host: HostRef = local.clone();
        let raw = local.object_new("Resource", true);

        let view = Object::view(&host, raw).unwrap();
        assert!(view.is_owned());
        assert_eq!(local.ref_count(raw), Some(2));
        drop(view);
        assert_eq!(local.ref_count(raw), Some(1));
    }

    #[test]
    fn unmanaged_view_does_not_count() {
        let local = Arc::new(LocalHost::new());
        let host: HostRef = local.clone();
        let raw = local.object_new("Node", false);

        let view = Object::view(&host, raw).unwrap();
        assert!(!view.is_owned());
        let copy = view.clone();
        drop(view);
        drop(copy);
        assert_eq!(local.ref_count(raw), Some(1));
        assert_eq!(Object::adopt(&host, raw).unwrap().class_name().as_deref(), Some("Node"));
    }

    #[test]
    fn into_raw_transfers() {
        let local = Arc::new(LocalHost::new());
        let host: HostRef = local.clone();
        let obj = Object::instantiate(&host, "Resource", true);
        let raw = obj.into_raw();
        assert_eq!(local.ref_count(raw), Some(1));
    }

    #[test]
    fn null_object() {
        let host: HostRef = Arc::new(LocalHost::new());
        assert_eq!(
            Object::view(&host, RawHandle::NULL),
            Err(ConversionError::NullHandle { expected: "Object" })
        );
    }
}
