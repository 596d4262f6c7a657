//! Host arrays and dictionaries of variants.
//!
//! Elements live in the host as [`RawVariant`]s that own their handles.
//! Reading an element duplicates it; storing one transfers it.

use super::{HostHandle, handle_wrapper, unexpected};
use crate::error::ConversionError;
use crate::host::{HostRef, HostValue};
use crate::raw::RawVariant;
use crate::variant::Variant;

handle_wrapper!(
    /// Host array of variants.
    Array
);

impl Array {
    pub fn new(host: &HostRef) -> Self {
        Self(HostHandle::alloc(host, HostValue::Array(Vec::new())))
    }

    pub fn from_variants(host: &HostRef, items: impl IntoIterator<Item = Variant>) -> Self {
        let raw = items.into_iter().map(|item| item.into_raw(host)).collect();
        Self(HostHandle::alloc(host, HostValue::Array(raw)))
    }

    fn raw_items(&self) -> Result<Vec<RawVariant>, ConversionError> {
        match self.0.read()? {
            HostValue::Array(items) => Ok(items),
            other => Err(unexpected("Array", &other)),
        }
    }

    pub fn len(&self) -> Result<usize, ConversionError> {
        Ok(self.raw_items()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ConversionError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<Option<Variant>, ConversionError> {
        let host = self.0.host();
        self.raw_items()?
            .get(index)
            .map(|raw| Variant::duplicate_raw(host, *raw))
            .transpose()
    }

    pub fn push(&self, value: Variant) -> Result<(), ConversionError> {
        let mut items = self.raw_items()?;
        items.push(value.into_raw(self.0.host()));
        self.0.write(HostValue::Array(items))
    }

    /// Duplicate every element.
    pub fn to_vec(&self) -> Result<Vec<Variant>, ConversionError> {
        let host = self.0.host();
        self.raw_items()?
            .into_iter()
            .map(|raw| Variant::duplicate_raw(host, raw))
            .collect()
    }
}

handle_wrapper!(
    /// Host dictionary of variant keys and values.
    Dictionary
);

impl Dictionary {
    pub fn new(host: &HostRef) -> Self {
        Self(HostHandle::alloc(host, HostValue::Dictionary(Vec::new())))
    }

    fn raw_entries(&self) -> Result<Vec<(RawVariant, RawVariant)>, ConversionError> {
        match self.0.read()? {
            HostValue::Dictionary(entries) => Ok(entries),
            other => Err(unexpected("Dictionary", &other)),
        }
    }

    pub fn len(&self) -> Result<usize, ConversionError> {
        Ok(self.raw_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ConversionError> {
        Ok(self.len()? == 0)
    }

    /// Insert or replace. Keys compare by wire representation.
    pub fn insert(&self, key: Variant, value: Variant) -> Result<(), ConversionError> {
        let host = self.0.host();
        let mut entries = self.raw_entries()?;
        let key = key.into_raw(host);
        let value = value.into_raw(host);

        let mut released = Vec::new();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                // same handle as the stored key: drop the extra reference
                released.extend(key.owned_handle());
                released.extend(entry.1.owned_handle());
                entry.1 = value;
            }
            None => entries.push((key, value)),
        }
        self.0.write(HostValue::Dictionary(entries))?;
        for handle in released {
            host.release(handle);
        }
        Ok(())
    }

    pub fn get(&self, key: &Variant) -> Result<Option<Variant>, ConversionError> {
        for (k, v) in self.entries()? {
            if k == *key {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Duplicate every entry.
    pub fn entries(&self) -> Result<Vec<(Variant, Variant)>, ConversionError> {
        let host = self.0.host();
        self.raw_entries()?
            .into_iter()
            .map(|(k, v)| -> Result<_, ConversionError> {
                Ok((Variant::duplicate_raw(host, k)?, Variant::duplicate_raw(host, v)?))
            })
            .collect()
    }
}
