//! The frozen dispatch table and its builder.
//!
//! A [`Bridge`] is built once, single-threaded, by a [`BridgeBuilder`] and
//! then shared as `Arc<Bridge>`. After `build` the descriptor table never
//! changes; the only state that moves between calls is the instance tracker.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use log::{debug, error};

use hostbridge_core::{
    CallEnv, CallError, ClassSink, Descriptor, HostRef, InstanceTracker, MethodFlags, MethodId,
    Object, RawArgs, RawHandle, RawReturn, Reflect, RegistrationError, TypeSpec, Variant,
    VirtualSignature,
};
use hostbridge_registry::{ClassDb, CommittedClass, StagedClass, TypeRegistry};

use crate::class_builder::ClassBuilder;
use crate::extension::{ExtensionClass, hooks};

/// A live extension object: the host object plus the Rust value behind it.
pub struct ExtensionInstance {
    class: String,
    object: Object,
    data: Box<dyn Any + Send>,
}

impl ExtensionInstance {
    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Host handle of the backing object.
    #[inline]
    pub fn handle(&self) -> RawHandle {
        self.object.handle()
    }

    /// The Rust value, as the call paths expect it.
    #[inline]
    pub fn data_mut(&mut self) -> &mut dyn Any {
        &mut *self.data
    }

    pub fn downcast_ref<T: ExtensionClass>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    pub fn downcast_mut<T: ExtensionClass>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut()
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("class", &self.class)
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

pub struct Bridge {
    host: HostRef,
    classes: ClassDb,
    instances: InstanceTracker,
}

impl Bridge {
    pub fn builder(host: HostRef) -> BridgeBuilder {
        BridgeBuilder::new(host)
    }

    #[inline]
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    #[inline]
    pub fn classes(&self) -> &ClassDb {
        &self.classes
    }

    #[inline]
    pub fn instances(&self) -> &InstanceTracker {
        &self.instances
    }

    fn env(&self) -> CallEnv<'_> {
        CallEnv {
            host: &self.host,
            instances: &self.instances,
            classes: &self.classes,
        }
    }

    pub fn descriptor(&self, method: MethodId) -> Result<&Descriptor, CallError> {
        self.classes
            .descriptor(method)
            .ok_or(CallError::MethodNotFound { id: method })
    }

    /// Call through the raw transcoding path.
    ///
    /// `instance` is the extension value (`&mut ()` for static methods).
    /// Panics if `args` is shorter than the method's layout or `ret` is
    /// narrower than its return type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_raw(
        &self,
        instance: &mut dyn Any,
        method: MethodId,
        args: RawArgs<'_>,
        ret: &mut RawReturn<'_>,
    ) -> Result<(), CallError> {
        self.descriptor(method)?
            .call_raw(instance, args, ret, &self.env())
    }

    /// Call through the boxed path.
    ///
    /// Returns `None` for methods without a return value.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_boxed(
        &self,
        instance: &mut dyn Any,
        method: MethodId,
        args: &[Variant],
    ) -> Result<Option<Variant>, CallError> {
        self.descriptor(method)?
            .call_boxed(instance, args, &self.env())
    }

    /// Late-bound call: resolve `method` on `class` or an extension ancestor.
    pub fn call_by_name(
        &self,
        instance: &mut dyn Any,
        class: &str,
        method: &str,
        args: &[Variant],
    ) -> Result<Option<Variant>, CallError> {
        let descriptor = self.classes.find_method(class, method).ok_or_else(|| {
            CallError::MethodNotFoundByName {
                class: class.to_string(),
                method: method.to_string(),
            }
        })?;
        descriptor.call_boxed(instance, args, &self.env())
    }

    /// The override of virtual `method` that instances of `class` run.
    ///
    /// Searches `class` and its extension ancestors. `None` means the host
    /// keeps its own implementation. The returned id is called through
    /// [`call_raw`](Self::call_raw) like any other method.
    pub fn get_virtual(&self, class: &str, method: &str) -> Option<MethodId> {
        self.classes
            .find_method(class, method)
            .filter(|descriptor| descriptor.flags.contains(MethodFlags::VIRTUAL))
            .map(|descriptor| descriptor.id)
    }

    /// Create a host object and the Rust value behind it.
    pub fn instantiate(&self, class: &str) -> Result<ExtensionInstance, CallError> {
        let hooks = self
            .classes
            .hooks(class)
            .ok_or_else(|| CallError::UnknownClass {
                class: class.to_string(),
            })?;
        let object = Object::instantiate(&self.host, class, self.classes.is_refcounted(class));
        self.instances.track(object.handle());

        let mut data = (hooks.create)();
        (hooks.on_create)(&mut *data);
        debug!("instantiated {class} as {:#x}", object.handle().0);
        Ok(ExtensionInstance {
            class: class.to_string(),
            object,
            data,
        })
    }

    /// Run `on_free`, stop tracking the instance and release its object.
    pub fn free(&self, mut instance: ExtensionInstance) {
        if let Some(hooks) = self.classes.hooks(&instance.class) {
            (hooks.on_free)(&mut *instance.data);
        }
        let handle = instance.object.handle();
        self.instances.untrack(handle);
        if !instance.object.is_owned() {
            self.host.object_destroy(handle);
        }
        debug!("freed {} {:#x}", instance.class, handle.0);
    }

    pub fn notify(&self, instance: &mut ExtensionInstance, what: i32) {
        if let Some(hooks) = self.classes.hooks(&instance.class) {
            (hooks.notification)(&mut *instance.data, what);
        }
    }

    pub fn to_host_string(&self, instance: &ExtensionInstance) -> Option<String> {
        let hooks = self.classes.hooks(&instance.class)?;
        (hooks.to_string)(&*instance.data)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("methods", &self.classes.method_count())
            .field("live_instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

/// Collects host classes, type aliases and extension classes, then freezes
/// them into a [`Bridge`].
///
/// ```ignore
/// let mut builder = Bridge::builder(host.clone()).sink(sink);
/// builder
///     .alias::<Meters>(TypeSpec::new(WireType::Float))
///     .host_class("Node", "Object", &["get_name"])?
///     .host_virtual("Node", "_process", VirtualSignature::new([WireType::Float], None))?
///     .register::<Player>()?;
/// let bridge = builder.build();
/// ```
pub struct BridgeBuilder {
    host: HostRef,
    sink: Option<Arc<dyn ClassSink>>,
    types: TypeRegistry,
    classes: ClassDb,
}

impl BridgeBuilder {
    fn new(host: HostRef) -> Self {
        Self {
            host,
            sink: None,
            types: TypeRegistry::new(),
            classes: ClassDb::new(),
        }
    }

    /// Where committed classes are announced.
    pub fn sink(mut self, sink: Arc<dyn ClassSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Classify `T` as `spec` wherever it appears in a signature.
    pub fn alias<T: Reflect>(&mut self, spec: TypeSpec) -> &mut Self {
        self.types.register_alias::<T>(spec);
        self
    }

    /// Declare a host class that extension classes may derive from.
    pub fn host_class(
        &mut self,
        name: &str,
        parent: &str,
        methods: &[&str],
    ) -> Result<&mut Self, RegistrationError> {
        self.classes.add_host_class(name, parent, methods)?;
        Ok(self)
    }

    /// Declare a virtual method extension subclasses of `class` may
    /// override with [`ClassBuilder::virtual_method`].
    pub fn host_virtual(
        &mut self,
        class: &str,
        name: &str,
        signature: VirtualSignature,
    ) -> Result<&mut Self, RegistrationError> {
        self.classes.add_host_virtual(class, name, signature)?;
        Ok(self)
    }

    /// Build and commit every member of `T`.
    ///
    /// Either the whole class is committed and announced to the sink, or
    /// nothing is.
    pub fn register<T: ExtensionClass>(&mut self) -> Result<&mut Self, RegistrationError> {
        let parts = T::register(ClassBuilder::new(&mut self.types, &self.classes))?.finish();
        let committed = self.classes.commit(StagedClass {
            name: T::NAME.to_string(),
            parent: T::PARENT.to_string(),
            hooks: hooks::<T>(),
            methods: parts.methods,
            property_groups: parts.property_groups,
            properties: parts.properties,
            signals: parts.signals,
            constants: parts.constants,
        })?;
        if let Some(sink) = &self.sink {
            announce(sink.as_ref(), committed);
        }
        Ok(self)
    }

    /// [`register`](Self::register), aborting startup on failure.
    pub fn register_or_abort<T: ExtensionClass>(&mut self) -> &mut Self {
        if let Err(err) = self.register::<T>() {
            error!("failed to register {}: {err}", T::NAME);
            panic!("failed to register {}: {err}", T::NAME);
        }
        self
    }

    pub fn build(self) -> Arc<Bridge> {
        Arc::new(Bridge {
            host: self.host,
            classes: self.classes,
            instances: InstanceTracker::new(),
        })
    }
}

/// Hand a committed class to the sink.
///
/// A group covers every property announced after it, so ungrouped
/// properties go first and each group is followed by its own.
fn announce(sink: &dyn ClassSink, committed: CommittedClass) {
    sink.register_class(committed.class);
    for method in committed.methods {
        sink.register_method(method);
    }
    let (ungrouped, mut grouped): (Vec<_>, Vec<_>) = committed
        .properties
        .into_iter()
        .partition(|property| property.group.is_none());
    for property in ungrouped {
        sink.register_property(property);
    }
    for group in committed.property_groups {
        let (members, rest): (Vec<_>, Vec<_>) = grouped
            .into_iter()
            .partition(|property| property.group.as_deref() == Some(group.name.as_str()));
        grouped = rest;
        sink.register_property_group(group);
        for property in members {
            sink.register_property(property);
        }
    }
    for signal in committed.signals {
        sink.register_signal(signal);
    }
    for constant in committed.constants {
        sink.register_constant(constant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{
        ConversionError, FromVariant, HostApi, LocalHost, ToVariant, TypeInfo, WireType,
    };

    struct Gauge {
        level: i64,
        freed: bool,
    }

    impl Gauge {
        fn raise(&mut self, by: i64) -> i64 {
            self.level += by;
            self.level
        }
    }

    impl ExtensionClass for Gauge {
        const NAME: &'static str = "Gauge";
        const PARENT: &'static str = "RefCounted";

        fn create() -> Self {
            Gauge {
                level: 0,
                freed: false,
            }
        }

        fn register(
            class: ClassBuilder<'_, Self>,
        ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
            class.method("raise", Self::raise)
        }

        fn on_free(&mut self) {
            self.freed = true;
        }

        fn to_host_string(&self) -> Option<String> {
            Some(format!("<Gauge {}>", self.level))
        }
    }

    /// Lengths cross the boundary as plain floats.
    struct Meters(f64);

    impl Reflect for Meters {
        fn type_info() -> TypeInfo {
            TypeInfo::opaque::<Meters>()
        }
    }

    impl FromVariant for Meters {
        fn from_variant(value: Variant, _: &HostRef) -> Result<Self, ConversionError> {
            match value {
                Variant::Float(v) => Ok(Meters(v)),
                other => Err(ConversionError::TypeMismatch {
                    expected: "Float",
                    actual: other.type_name(),
                }),
            }
        }
    }

    impl ToVariant for Meters {
        fn to_variant(self, _: &HostRef) -> Variant {
            Variant::Float(self.0)
        }
    }

    struct Ticker {
        ticks: i64,
    }

    impl Ticker {
        fn process(&mut self, _delta: f64) {
            self.ticks += 1;
        }

        fn stretch(&self, by: Meters) -> Meters {
            Meters(by.0 * 2.0)
        }
    }

    impl ExtensionClass for Ticker {
        const NAME: &'static str = "Ticker";
        const PARENT: &'static str = "Node";

        fn create() -> Self {
            Ticker { ticks: 0 }
        }

        fn register(
            class: ClassBuilder<'_, Self>,
        ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
            class
                .virtual_method("_process", Self::process)?
                .method("stretch", Self::stretch)?
                .property_group("Debug", "debug_", |class| {
                    class.property_readonly("rate", |_: &Ticker| 60i64)
                })?
                .property(
                    "ticks",
                    |t: &Ticker| t.ticks,
                    |t: &mut Ticker, v: i64| t.ticks = v,
                )
        }
    }

    fn ticker_bridge() -> (Arc<LocalHost>, Arc<Bridge>) {
        let local = Arc::new(LocalHost::new());
        let mut builder = Bridge::builder(local.clone()).sink(local.clone());
        builder
            .alias::<Meters>(TypeSpec::new(WireType::Float))
            .host_class("Node", "Object", &["get_name"])
            .unwrap()
            .host_virtual(
                "Node",
                "_process",
                VirtualSignature::new([WireType::Float], None),
            )
            .unwrap()
            .register::<Ticker>()
            .unwrap();
        (local, builder.build())
    }

    fn bridge() -> (Arc<LocalHost>, Arc<Bridge>) {
        let local = Arc::new(LocalHost::new());
        let mut builder = Bridge::builder(local.clone()).sink(local.clone());
        builder.register::<Gauge>().unwrap();
        (local, builder.build())
    }

    #[test]
    fn registration_reaches_the_sink() {
        let (local, _bridge) = bridge();
        let classes = local.registered_classes();
        assert_eq!(classes.len(), 1);
        assert!(classes[0].refcounted);
        assert_eq!(local.registered_methods()[0].name, "raise");
    }

    #[test]
    fn instance_lifecycle() {
        let (local, bridge) = bridge();
        let mut gauge = bridge.instantiate("Gauge").unwrap();
        let handle = gauge.handle();
        assert!(bridge.instances().contains(handle));
        assert_eq!(local.ref_count(handle), Some(1));

        let id = MethodId::new("Gauge", "raise");
        let out = bridge
            .call_boxed(gauge.data_mut(), id, &[Variant::Int(3)])
            .unwrap();
        assert_eq!(out, Some(Variant::Int(3)));
        assert_eq!(bridge.to_host_string(&gauge).as_deref(), Some("<Gauge 3>"));

        bridge.free(gauge);
        assert!(!bridge.instances().contains(handle));
        assert_eq!(local.live_count(), 0);
    }

    #[test]
    fn unknown_class_and_method() {
        let (_local, bridge) = bridge();
        assert!(matches!(
            bridge.instantiate("Missing"),
            Err(CallError::UnknownClass { .. })
        ));
        assert!(matches!(
            bridge.instantiate("Object"),
            Err(CallError::UnknownClass { .. })
        ));

        let id = MethodId::new("Gauge", "missing");
        assert_eq!(
            bridge.call_boxed(&mut (), id, &[]),
            Err(CallError::MethodNotFound { id })
        );
        assert!(matches!(
            bridge.call_by_name(&mut (), "Gauge", "missing", &[]),
            Err(CallError::MethodNotFoundByName { .. })
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let local = Arc::new(LocalHost::new());
        let mut builder = Bridge::builder(local.clone()).sink(local.clone());
        builder.register::<Gauge>().unwrap();
        assert!(matches!(
            builder.register::<Gauge>(),
            Err(RegistrationError::DuplicateClass { .. })
        ));
        assert_eq!(local.registered_classes().len(), 1);
    }

    #[test]
    #[should_panic(expected = "failed to register")]
    fn register_or_abort_panics() {
        let local = Arc::new(LocalHost::new());
        let mut builder = Bridge::builder(local);
        builder
            .register_or_abort::<Gauge>()
            .register_or_abort::<Gauge>();
    }

    #[test]
    fn virtual_override_served_through_raw_path() {
        let (local, bridge) = ticker_bridge();
        let id = bridge.get_virtual("Ticker", "_process").unwrap();
        assert_eq!(id, MethodId::new("Ticker", "_process"));
        assert_eq!(bridge.get_virtual("Ticker", "stretch"), None);
        assert_eq!(bridge.get_virtual("Ticker", "_ready"), None);

        let method = &local.registered_methods()[0];
        assert_eq!(method.name, "_process");
        assert!(method.flags.contains(MethodFlags::VIRTUAL));

        let mut ticker = bridge.instantiate("Ticker").unwrap();
        let args = 0.016f64.to_ne_bytes();
        let mut ret = RawReturn::new(&mut []);
        bridge
            .call_raw(ticker.data_mut(), id, RawArgs::new(&args), &mut ret)
            .unwrap();
        bridge
            .call_raw(ticker.data_mut(), id, RawArgs::new(&args), &mut ret)
            .unwrap();
        assert_eq!(ticker.downcast_ref::<Ticker>().map(|t| t.ticks), Some(2));
        bridge.free(ticker);
        assert_eq!(local.live_count(), 0);
    }

    #[test]
    fn aliased_type_uses_its_wire_type() {
        let (_local, bridge) = ticker_bridge();
        let stretch = MethodId::new("Ticker", "stretch");
        assert_eq!(bridge.descriptor(stretch).unwrap().args[0].wire(), WireType::Float);

        let mut ticker = bridge.instantiate("Ticker").unwrap();
        let out = bridge
            .call_boxed(ticker.data_mut(), stretch, &[Variant::Float(1.5)])
            .unwrap();
        assert_eq!(out, Some(Variant::Float(3.0)));
        bridge.free(ticker);
    }

    #[test]
    fn grouped_properties_announced_after_their_group() {
        let (local, _bridge) = ticker_bridge();
        let properties = local.registered_properties();
        let names: Vec<_> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["ticks", "rate"]);
        assert_eq!(properties[1].group.as_deref(), Some("Debug"));

        let groups = local.registered_property_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].class, "Ticker");
        assert_eq!(groups[0].prefix, "debug_");
    }
}
