//! In-process host: a generational slot heap with reference counts.
//!
//! Used when the bridge is embedded without an external runtime, and by the
//! test suites to observe reference counts directly.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::sink::{
    ClassRegistration, ClassSink, ConstantRegistration, MethodRegistration,
    PropertyGroupRegistration, PropertyRegistration, SignalRegistration,
};
use super::{HostApi, HostValue};
use crate::error::ConversionError;
use crate::raw::RawHandle;

struct HeapSlot {
    generation: u32,
    value: Option<HostValue>,
    ref_count: u32,
}

/// Slots are reused after free with a bumped generation, so stale handles
/// are detected instead of aliasing a new allocation.
#[derive(Default)]
struct Heap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

impl Heap {
    fn allocate(&mut self, value: HostValue) -> RawHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.ref_count = 1;
            RawHandle::from_parts(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(value),
                ref_count: 1,
            });
            RawHandle::from_parts(index, 0)
        }
    }

    fn slot(&self, handle: RawHandle) -> Option<&HeapSlot> {
        let slot = self.slots.get(handle.index()? as usize)?;
        (slot.generation == handle.generation() && slot.value.is_some()).then_some(slot)
    }

    fn slot_mut(&mut self, handle: RawHandle) -> Option<&mut HeapSlot> {
        let slot = self.slots.get_mut(handle.index()? as usize)?;
        (slot.generation == handle.generation() && slot.value.is_some()).then_some(slot)
    }

    /// Free a live slot and hand back its payload.
    fn free(&mut self, handle: RawHandle) -> Option<HostValue> {
        let index = handle.index()?;
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take();
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        value
    }

    fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }
}

#[derive(Default)]
struct Registrations {
    classes: Vec<ClassRegistration>,
    methods: Vec<MethodRegistration>,
    property_groups: Vec<PropertyGroupRegistration>,
    properties: Vec<PropertyRegistration>,
    signals: Vec<SignalRegistration>,
    constants: Vec<ConstantRegistration>,
}

/// In-process [`HostApi`] and [`ClassSink`].
#[derive(Default)]
pub struct LocalHost {
    heap: Mutex<Heap>,
    registrations: Mutex<Registrations>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        lock(&self.heap).live()
    }

    pub fn registered_classes(&self) -> Vec<ClassRegistration> {
        lock(&self.registrations).classes.clone()
    }

    pub fn registered_methods(&self) -> Vec<MethodRegistration> {
        lock(&self.registrations).methods.clone()
    }

    pub fn registered_property_groups(&self) -> Vec<PropertyGroupRegistration> {
        lock(&self.registrations).property_groups.clone()
    }

    pub fn registered_properties(&self) -> Vec<PropertyRegistration> {
        lock(&self.registrations).properties.clone()
    }

    pub fn registered_signals(&self) -> Vec<SignalRegistration> {
        lock(&self.registrations).signals.clone()
    }

    pub fn registered_constants(&self) -> Vec<ConstantRegistration> {
        lock(&self.registrations).constants.clone()
    }

    /// Release everything a freed payload owned, outside the heap lock.
    fn release_nested(&self, freed: Option<HostValue>) {
        if let Some(value) = freed {
            for handle in value.owned_handles() {
                self.release(handle);
            }
        }
    }
}

impl HostApi for LocalHost {
    fn alloc(&self, value: HostValue) -> RawHandle {
        lock(&self.heap).allocate(value)
    }

    fn read(&self, handle: RawHandle) -> Result<HostValue, ConversionError> {
        lock(&self.heap)
            .slot(handle)
            .and_then(|slot| slot.value.clone())
            .ok_or(ConversionError::StaleHandle { handle: handle.0 })
    }

    fn write(&self, handle: RawHandle, value: HostValue) -> Result<(), ConversionError> {
        let mut heap = lock(&self.heap);
        let slot = heap
            .slot_mut(handle)
            .ok_or(ConversionError::StaleHandle { handle: handle.0 })?;
        slot.value = Some(value);
        Ok(())
    }

    fn add_ref(&self, handle: RawHandle) -> bool {
        match lock(&self.heap).slot_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    fn release(&self, handle: RawHandle) -> bool {
        let freed = {
            let mut heap = lock(&self.heap);
            let Some(slot) = heap.slot_mut(handle) else {
                return false;
            };
            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count > 0 {
                return false;
            }
            heap.free(handle)
        };
        self.release_nested(freed);
        true
    }

    fn ref_count(&self, handle: RawHandle) -> Option<u32> {
        lock(&self.heap).slot(handle).map(|slot| slot.ref_count)
    }

    fn object_new(&self, class: &str, refcounted: bool) -> RawHandle {
        self.alloc(HostValue::Object {
            class: class.to_string(),
            refcounted,
        })
    }

    fn object_class(&self, handle: RawHandle) -> Option<String> {
        match &lock(&self.heap).slot(handle)?.value {
            Some(HostValue::Object { class, .. }) => Some(class.clone()),
            _ => None,
        }
    }

    fn object_is_refcounted(&self, handle: RawHandle) -> bool {
        matches!(
            lock(&self.heap)
                .slot(handle)
                .and_then(|slot| slot.value.as_ref()),
            Some(HostValue::Object {
                refcounted: true,
                ..
            })
        )
    }

    fn object_destroy(&self, handle: RawHandle) {
        let freed = lock(&self.heap).free(handle);
        self.release_nested(freed);
    }
}

impl ClassSink for LocalHost {
    fn register_class(&self, class: ClassRegistration) {
        lock(&self.registrations).classes.push(class);
    }

    fn register_method(&self, method: MethodRegistration) {
        lock(&self.registrations).methods.push(method);
    }

    fn register_property_group(&self, group: PropertyGroupRegistration) {
        lock(&self.registrations).property_groups.push(group);
    }

    fn register_property(&self, property: PropertyRegistration) {
        lock(&self.registrations).properties.push(property);
    }

    fn register_signal(&self, signal: SignalRegistration) {
        lock(&self.registrations).signals.push(signal);
    }

    fn register_constant(&self, constant: ConstantRegistration) {
        lock(&self.registrations).constants.push(constant);
    }
}

impl fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = lock(&self.heap);
        f.debug_struct("LocalHost")
            .field("slot_count", &heap.slots.len())
            .field("free_count", &heap.free_list.len())
            .finish()
    }
}
