//! ClassBuilder for declaring the exported surface of an extension class.
//!
//! Every method handed to the builder is reflected, its parameter and return
//! types classified, and the result frozen into a [`Descriptor`] carrying both
//! call paths. Nothing reaches the class database until the whole class has
//! been built: the first error aborts the class.
//!
//! # Example
//!
//! ```ignore
//! fn register(
//!     class: ClassBuilder<'_, Player>,
//! ) -> Result<ClassBuilder<'_, Player>, RegistrationError> {
//!     class
//!         .method("jump", Player::jump)?
//!         .static_method("max_health", || 100i64)?
//!         .virtual_method("_process", Player::process)?
//!         .property("speed", |p: &Player| p.speed, |p: &mut Player, v: f64| p.speed = v)?
//!         .property_group("Combat", "", |class| {
//!             class.property_readonly("armor", |p: &Player| p.armor)
//!         })?
//!         .signal::<(i64,)>("damaged", &["amount"])?
//!         .constant("MAX_LIVES", 3)
//! }
//! ```

use std::marker::PhantomData;

use log::debug;

use hostbridge_core::{
    ArgLayout, ArgSpec, ConstantRegistration, Descriptor, FromVariant, MethodFlags, MethodId,
    PropertyGroupRegistration, PropertyRegistration, PropertyUsage, Reflect, RegistrationError,
    SignalRegistration, ToVariant, TypeInfo, TypeSpec, VirtualSignature,
};
use hostbridge_registry::{ClassDb, TypeRegistry};

use crate::call;
use crate::extension::ExtensionClass;
use crate::method::{ByMut, ByRef, Invoker, Method, SignalArgs, Signature, StaticMethod};

/// Names the lifecycle owns; never exported as methods.
pub const RESERVED_NAMES: &[&str] = &[
    "init",
    "on_create",
    "on_free",
    "on_register",
    "notification",
    "to_string",
];

/// Members collected for one class.
#[derive(Debug, Default)]
pub(crate) struct ClassParts {
    pub methods: Vec<Descriptor>,
    pub property_groups: Vec<PropertyGroupRegistration>,
    pub properties: Vec<PropertyRegistration>,
    pub signals: Vec<SignalRegistration>,
    pub constants: Vec<ConstantRegistration>,
}

/// Builder handed to [`ExtensionClass::register`].
///
/// # Type Parameters
///
/// - `'r`: borrow of the bridge builder's registries
/// - `T`: the class being registered
pub struct ClassBuilder<'r, T: ExtensionClass> {
    types: &'r mut TypeRegistry,
    classes: &'r ClassDb,
    parts: ClassParts,
    /// Group new properties are listed under.
    group: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: ExtensionClass> ClassBuilder<'r, T> {
    pub(crate) fn new(types: &'r mut TypeRegistry, classes: &'r ClassDb) -> Self {
        Self {
            types,
            classes,
            parts: ClassParts::default(),
            group: None,
            _marker: PhantomData,
        }
    }

    pub(crate) fn finish(self) -> ClassParts {
        self.parts
    }

    /// Register an instance method taking `&self` or `&mut self`.
    ///
    /// Methods with a reserved lifecycle name, or a name an ancestor class
    /// already defines, are skipped.
    pub fn method<M, Marker>(mut self, name: &str, f: M) -> Result<Self, RegistrationError>
    where
        M: Method<T, Marker>,
    {
        self.add(name, M::flags(), M::signature(), f.into_invoker())?;
        Ok(self)
    }

    /// Register a function called without an instance.
    pub fn static_method<M, Args>(mut self, name: &str, f: M) -> Result<Self, RegistrationError>
    where
        M: StaticMethod<Args>,
    {
        self.add(
            name,
            MethodFlags::NORMAL | MethodFlags::STATIC,
            M::signature(),
            f.into_invoker(),
        )?;
        Ok(self)
    }

    /// Override a virtual method declared by a host ancestor.
    ///
    /// The override's parameter and return wire types must match the
    /// declaration exactly. Unlike [`method`](Self::method), the inherited
    /// name is what makes the registration valid, so it is not skipped.
    pub fn virtual_method<M, Marker>(mut self, name: &str, f: M) -> Result<Self, RegistrationError>
    where
        M: Method<T, Marker>,
    {
        let Some(expected) = self.classes.find_virtual(T::PARENT, name).cloned() else {
            return Err(RegistrationError::UnknownVirtual {
                class: T::NAME.to_string(),
                method: name.to_string(),
            });
        };
        let descriptor = self.describe(
            name,
            M::flags() | MethodFlags::VIRTUAL,
            M::signature(),
            f.into_invoker(),
        )?;
        let actual = VirtualSignature::of(&descriptor.args, descriptor.ret.as_ref());
        if actual != expected {
            return Err(RegistrationError::VirtualMismatch {
                class: T::NAME.to_string(),
                method: name.to_string(),
                expected,
                actual,
            });
        }
        self.parts.methods.push(descriptor);
        Ok(self)
    }

    /// Register a read/write property backed by `get_<name>` and
    /// `set_<name>` methods.
    ///
    /// Both accessor names must be free: a reserved or inherited accessor
    /// name fails the class instead of being skipped.
    pub fn property<V, G, S>(
        self,
        name: &str,
        getter: G,
        setter: S,
    ) -> Result<Self, RegistrationError>
    where
        V: FromVariant + ToVariant + Reflect,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter_name = format!("set_{name}");
        self.check_accessor(&setter_name)?;
        let mut this = self.add_property::<V, G>(name, getter, PropertyUsage::default())?;
        this = this.method::<S, (ByMut, (V,))>(&setter_name, setter)?;
        if let Some(property) = this.parts.properties.last_mut() {
            property.setter = Some(setter_name);
        }
        Ok(this)
    }

    /// Register a property without a setter.
    pub fn property_readonly<V, G>(self, name: &str, getter: G) -> Result<Self, RegistrationError>
    where
        V: ToVariant + Reflect,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.add_property::<V, G>(
            name,
            getter,
            PropertyUsage::default() | PropertyUsage::READ_ONLY,
        )
    }

    /// List the properties `build` adds under an editor group.
    ///
    /// Reopening a group by name appends to it. Groups do not nest: an
    /// inner group applies until its closure returns.
    pub fn property_group(
        mut self,
        name: &str,
        prefix: &str,
        build: impl FnOnce(Self) -> Result<Self, RegistrationError>,
    ) -> Result<Self, RegistrationError> {
        if !self.parts.property_groups.iter().any(|g| g.name == name) {
            self.parts.property_groups.push(PropertyGroupRegistration {
                class: T::NAME.to_string(),
                name: name.to_string(),
                prefix: prefix.to_string(),
            });
        }
        let outer = self.group.replace(name.to_string());
        let mut this = build(self)?;
        this.group = outer;
        Ok(this)
    }

    /// Declare a signal with typed arguments.
    ///
    /// Missing argument names default to `arg<index>`.
    pub fn signal<A: SignalArgs>(
        mut self,
        name: &str,
        arg_names: &[&str],
    ) -> Result<Self, RegistrationError> {
        self.check_member(name)?;
        let mut args = Vec::new();
        for (index, info) in A::types().iter().enumerate() {
            let ty = self.classify_param(name, index, info)?;
            let arg_name = arg_names
                .get(index)
                .map_or_else(|| format!("arg{index}"), |n| n.to_string());
            args.push((
                arg_name,
                ArgSpec {
                    type_name: info.name,
                    ty,
                },
            ));
        }
        self.parts.signals.push(SignalRegistration {
            class: T::NAME.to_string(),
            name: name.to_string(),
            args,
        });
        Ok(self)
    }

    /// Declare an integer constant.
    pub fn constant(mut self, name: &str, value: i64) -> Result<Self, RegistrationError> {
        self.check_member(name)?;
        self.parts.constants.push(ConstantRegistration {
            class: T::NAME.to_string(),
            name: name.to_string(),
            value,
        });
        Ok(self)
    }

    fn add_property<V, G>(
        mut self,
        name: &str,
        getter: G,
        usage: PropertyUsage,
    ) -> Result<Self, RegistrationError>
    where
        V: ToVariant + Reflect,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.check_member(name)?;
        let getter_name = format!("get_{name}");
        self.check_accessor(&getter_name)?;
        let ty = self.classify_return(&getter_name, &V::type_info())?;
        let mut this = self.method::<G, (ByRef, ())>(&getter_name, getter)?;
        this.parts.properties.push(PropertyRegistration {
            class: T::NAME.to_string(),
            name: name.to_string(),
            wire: ty.wire,
            hint: ty.hint,
            usage,
            getter: getter_name,
            setter: None,
            group: this.group.clone(),
        });
        Ok(this)
    }

    fn check_member(&self, name: &str) -> Result<(), RegistrationError> {
        if RESERVED_NAMES.contains(&name) {
            return Err(RegistrationError::ReservedName {
                class: T::NAME.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_accessor(&self, method: &str) -> Result<(), RegistrationError> {
        self.check_member(method)?;
        if self.classes.ancestor_defines(T::PARENT, method) {
            return Err(RegistrationError::DuplicateMethod {
                class: T::NAME.to_string(),
                method: method.to_string(),
            });
        }
        Ok(())
    }

    fn classify_param(
        &mut self,
        method: &str,
        index: usize,
        info: &TypeInfo,
    ) -> Result<TypeSpec, RegistrationError> {
        self.types.classify(info).map_err(|err| match err {
            RegistrationError::Unclassifiable { type_name } => {
                RegistrationError::UnclassifiableParameter {
                    class: T::NAME.to_string(),
                    method: method.to_string(),
                    index,
                    type_name,
                }
            }
            other => other,
        })
    }

    fn classify_return(
        &mut self,
        method: &str,
        info: &TypeInfo,
    ) -> Result<TypeSpec, RegistrationError> {
        self.types.classify(info).map_err(|err| match err {
            RegistrationError::Unclassifiable { type_name } => {
                RegistrationError::UnclassifiableReturn {
                    class: T::NAME.to_string(),
                    method: method.to_string(),
                    type_name,
                }
            }
            other => other,
        })
    }

    fn add(
        &mut self,
        name: &str,
        flags: MethodFlags,
        signature: Signature,
        invoker: Invoker,
    ) -> Result<(), RegistrationError> {
        if RESERVED_NAMES.contains(&name) {
            debug!("{}: skipping lifecycle method {name}", T::NAME);
            return Ok(());
        }
        if self.classes.ancestor_defines(T::PARENT, name) {
            debug!("{}: skipping {name}, defined by an ancestor", T::NAME);
            return Ok(());
        }
        let descriptor = self.describe(name, flags, signature, invoker)?;
        self.parts.methods.push(descriptor);
        Ok(())
    }

    fn describe(
        &mut self,
        name: &str,
        flags: MethodFlags,
        signature: Signature,
        invoker: Invoker,
    ) -> Result<Descriptor, RegistrationError> {
        let mut args = Vec::with_capacity(signature.params.len());
        for (index, info) in signature.params.iter().enumerate() {
            let ty = self.classify_param(name, index, info)?;
            args.push(ArgSpec {
                type_name: info.name,
                ty,
            });
        }
        let ret = if signature.ret.is_unit() {
            None
        } else {
            let ty = self.classify_return(name, &signature.ret)?;
            Some(ArgSpec {
                type_name: signature.ret.name,
                ty,
            })
        };

        let layout = ArgLayout::new(args.iter().map(ArgSpec::width));
        debug!(
            "{}::{name}: {} args, {} byte layout",
            T::NAME,
            args.len(),
            layout.total()
        );
        Ok(Descriptor {
            class: T::NAME.to_string(),
            name: name.to_string(),
            id: MethodId::new(T::NAME, name),
            flags,
            boxed: call::boxed::entry(invoker.clone(), args.clone(), ret),
            raw: call::transcode::entry(invoker, args.clone(), ret, layout.clone()),
            args,
            ret,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{ConversionError, HostRef, Object, TypeHint, Variant, WireType};

    struct Widget {
        size: i64,
    }

    /// Converts fine, but the registry has no rule for it.
    struct NotExported;

    impl Reflect for NotExported {
        fn type_info() -> TypeInfo {
            TypeInfo::opaque::<NotExported>()
        }
    }

    impl FromVariant for NotExported {
        fn from_variant(_: Variant, _: &HostRef) -> Result<Self, ConversionError> {
            Ok(NotExported)
        }
    }

    impl ToVariant for NotExported {
        fn to_variant(self, _: &HostRef) -> Variant {
            Variant::Nil
        }
    }

    impl Widget {
        fn grow(&mut self, by: i64) -> i64 {
            self.size += by;
            self.size
        }

        fn reset(&mut self) {
            self.size = 0;
        }

        fn attach(&mut self, _to: Object, _label: String) {}
    }

    impl ExtensionClass for Widget {
        const NAME: &'static str = "Widget";

        fn create() -> Self {
            Widget { size: 1 }
        }
    }

    type Register =
        fn(ClassBuilder<'_, Widget>) -> Result<ClassBuilder<'_, Widget>, RegistrationError>;

    fn build(register: Register) -> Result<ClassParts, RegistrationError> {
        build_in(&ClassDb::new(), register)
    }

    fn build_in(classes: &ClassDb, register: Register) -> Result<ClassParts, RegistrationError> {
        let mut types = TypeRegistry::new();
        register(ClassBuilder::new(&mut types, classes)).map(ClassBuilder::finish)
    }

    /// Object with two overridable methods.
    fn with_virtuals() -> ClassDb {
        let mut classes = ClassDb::new();
        classes
            .add_host_virtual("Object", "_ready", VirtualSignature::new([], None))
            .unwrap();
        classes
            .add_host_virtual(
                "Object",
                "_input",
                VirtualSignature::new([WireType::Int], Some(WireType::Bool)),
            )
            .unwrap();
        classes
    }

    #[test]
    fn methods_become_descriptors() {
        let parts = build(|c| c.method("grow", Widget::grow)?.method("reset", Widget::reset))
            .unwrap();
        assert_eq!(parts.methods.len(), 2);

        let grow = &parts.methods[0];
        assert_eq!(grow.id, MethodId::new("Widget", "grow"));
        assert_eq!(grow.args.len(), 1);
        assert_eq!(grow.args[0].wire(), WireType::Int);
        assert_eq!(grow.ret.map(|r| r.wire()), Some(WireType::Int));
        assert_eq!(grow.layout.total(), 8);

        let reset = &parts.methods[1];
        assert!(reset.args.is_empty());
        assert!(reset.ret.is_none());
        assert_eq!(reset.return_width(), 0);
    }

    #[test]
    fn object_parameters_carry_class_hint() {
        let parts = build(|c| c.method("attach", Widget::attach)).unwrap();
        let attach = &parts.methods[0];
        assert_eq!(attach.args[0].wire(), WireType::Object);
        assert_eq!(
            attach.args[0].ty.hint,
            TypeHint::ObjectOf { class: "Object" }
        );
        assert_eq!(attach.args[1].wire(), WireType::String);
        assert_eq!(attach.layout.total(), 16);
    }

    #[test]
    fn lifecycle_and_inherited_names_skipped() {
        let parts = build(|c| {
            c.method("on_create", Widget::reset)?
                .method("to_string", |_: &Widget| String::new())?
                .method("get_class", |_: &Widget| 0i64)
        })
        .unwrap();
        assert!(parts.methods.is_empty());
    }

    #[test]
    fn unclassifiable_parameter_names_position() {
        let err = build(|c| c.method("bad", |_: &mut Widget, _: i64, _: NotExported| {}))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistrationError::UnclassifiableParameter {
                class: "Widget".to_string(),
                method: "bad".to_string(),
                index: 1,
                type_name: std::any::type_name::<NotExported>(),
            }
        );
    }

    #[test]
    fn unclassifiable_return() {
        let err = build(|c| c.method("bad", |_: &Widget| NotExported))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RegistrationError::UnclassifiableReturn { ref method, .. } if method == "bad"
        ));
    }

    #[test]
    fn static_methods_are_flagged() {
        let parts = build(|c| c.static_method("version", || 3i64)).unwrap();
        assert!(parts.methods[0].is_static());
    }

    #[test]
    fn properties_register_accessors() {
        let parts = build(|c| {
            c.property(
                "size",
                |w: &Widget| w.size,
                |w: &mut Widget, v: i64| w.size = v,
            )?
            .property_readonly("area", |w: &Widget| (w.size * w.size) as f64)
        })
        .unwrap();

        let names: Vec<_> = parts.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["get_size", "set_size", "get_area"]);

        let size = &parts.properties[0];
        assert_eq!(size.wire, WireType::Int);
        assert_eq!(size.getter, "get_size");
        assert_eq!(size.setter.as_deref(), Some("set_size"));

        let area = &parts.properties[1];
        assert_eq!(area.wire, WireType::Float);
        assert!(area.usage.contains(PropertyUsage::READ_ONLY));
        assert_eq!(area.setter, None);
    }

    #[test]
    fn signals_and_constants() {
        let parts = build(|c| {
            c.signal::<(i64, String)>("resized", &["size"])?
                .constant("MAX_SIZE", 64)
        })
        .unwrap();

        let resized = &parts.signals[0];
        assert_eq!(resized.args[0].0, "size");
        assert_eq!(resized.args[1].0, "arg1");
        assert_eq!(resized.args[1].1.wire(), WireType::String);
        assert_eq!(parts.constants[0].value, 64);
    }

    #[test]
    fn reserved_member_names_rejected() {
        let err = build(|c| c.constant("init", 1)).err().unwrap();
        assert!(matches!(err, RegistrationError::ReservedName { .. }));
    }

    #[test]
    fn inherited_accessor_names_rejected() {
        let err = build(|c| c.property_readonly("class", |_: &Widget| 7i64))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistrationError::DuplicateMethod {
                class: "Widget".to_string(),
                method: "get_class".to_string(),
            }
        );

        let mut classes = ClassDb::new();
        classes
            .add_host_virtual("Object", "set_size", VirtualSignature::new([], None))
            .unwrap();
        let err = build_in(&classes, |c| {
            c.property(
                "size",
                |w: &Widget| w.size,
                |w: &mut Widget, v: i64| w.size = v,
            )
        })
        .err()
        .unwrap();
        assert!(matches!(
            err,
            RegistrationError::DuplicateMethod { ref method, .. } if method == "set_size"
        ));
    }

    #[test]
    fn virtual_overrides_are_flagged() {
        let classes = with_virtuals();
        let parts = build_in(&classes, |c| {
            c.virtual_method("_ready", Widget::reset)?
                .virtual_method("_input", |_: &mut Widget, code: i64| code > 0)
        })
        .unwrap();
        assert_eq!(parts.methods.len(), 2);
        for method in &parts.methods {
            assert!(method.flags.contains(MethodFlags::VIRTUAL));
        }

        let parts = build_in(&classes, |c| c.method("_ready", Widget::reset)).unwrap();
        assert!(parts.methods.is_empty());
    }

    #[test]
    fn virtual_signature_mismatch() {
        let classes = with_virtuals();
        let err = build_in(&classes, |c| c.virtual_method("_input", Widget::grow))
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistrationError::VirtualMismatch {
                class: "Widget".to_string(),
                method: "_input".to_string(),
                expected: VirtualSignature::new([WireType::Int], Some(WireType::Bool)),
                actual: VirtualSignature::new([WireType::Int], Some(WireType::Int)),
            }
        );

        let err = build_in(&classes, |c| c.virtual_method("_process", Widget::reset))
            .err()
            .unwrap();
        assert!(matches!(err, RegistrationError::UnknownVirtual { .. }));
    }

    #[test]
    fn property_groups_tag_members() {
        let parts = build(|c| {
            c.property_group("Shape", "", |c| {
                c.property_readonly("area", |w: &Widget| (w.size * w.size) as f64)
            })?
            .property_readonly("volume", |w: &Widget| w.size)?
            .property_group("Shape", "", |c| c.property_readonly("depth", |_: &Widget| 1i64))
        })
        .unwrap();

        assert_eq!(parts.property_groups.len(), 1);
        assert_eq!(parts.property_groups[0].name, "Shape");
        let groups: Vec<_> = parts
            .properties
            .iter()
            .map(|p| p.group.as_deref())
            .collect();
        assert_eq!(groups, [Some("Shape"), None, Some("Shape")]);
    }
}
