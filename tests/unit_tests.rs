//! End-to-end tests for the bridge.
//!
//! Classes are registered through the public builder, then called the way a
//! host would: through packed raw buffers, boxed variants and the C ABI.

use std::ptr;
use std::sync::Arc;

use bytemuck::Pod;
use hostbridge::CallStatus;
use hostbridge::ffi::{
    hostbridge_call_raw, hostbridge_free, hostbridge_get_virtual, hostbridge_instantiate,
};
use hostbridge::hostbridge_core::{ArgMetadata, HostApi, MethodFlags, RawHandle, TypeInfo};
use hostbridge::prelude::*;

host_class!(
    /// Host scene node.
    pub struct Node: "Node"
);

/// Packs arguments back to back, the way the host lays out a call.
#[derive(Default)]
struct Args(Vec<u8>);

impl Args {
    fn push<T: Pod>(mut self, value: T) -> Self {
        self.0.extend_from_slice(bytemuck::bytes_of(&value));
        self
    }

    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// Test classes
// =============================================================================

#[derive(Default)]
struct Calculator {
    calls: u32,
    label: String,
}

impl Calculator {
    fn add(&mut self, a: i64, b: i64) -> i64 {
        self.calls += 1;
        a + b
    }

    fn greet(&self, name: String) -> String {
        format!("Hello, {name}")
    }

    fn hello(&self) -> String {
        self.greet("World".to_string())
    }

    fn echo(&self, text: Text) -> Text {
        text
    }

    fn wrap(&mut self, x: Object) -> Object {
        x
    }

    fn describe(&mut self, count: i64, name: String, ratio: f64) -> String {
        format!("{count}:{name}:{ratio}")
    }

    fn attach(&mut self, node: Node) -> bool {
        node.0.class_name().is_some()
    }

    fn find(&self, node: Option<Node>) -> bool {
        node.is_some()
    }

    fn check(&self, value: i64) -> Result<(), ErrorCode> {
        if value < 0 {
            Err(ErrorCode::ParameterRangeError)
        } else {
            Ok(())
        }
    }

    fn fail(&mut self) {
        panic!("calculator exploded");
    }
}

impl ExtensionClass for Calculator {
    const NAME: &'static str = "Calculator";
    const PARENT: &'static str = "RefCounted";

    fn create() -> Self {
        Calculator::default()
    }

    fn register(
        class: ClassBuilder<'_, Self>,
    ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
        class
            .method("add", Self::add)?
            .method("greet", Self::greet)?
            .method("hello", Self::hello)?
            .method("echo", Self::echo)?
            .method("wrap", Self::wrap)?
            .method("describe", Self::describe)?
            .method("attach", Self::attach)?
            .method("find", Self::find)?
            .method("check", Self::check)?
            .method("fail", Self::fail)?
            .static_method("square", |x: i64| x * x)?
            .property(
                "label",
                |c: &Calculator| c.label.clone(),
                |c: &mut Calculator, v: String| c.label = v,
            )?
            .property_readonly("calls", |c: &Calculator| i64::from(c.calls))?
            .signal::<(i64, i64)>("computed", &["a", "b"])?
            .constant("MAX_OPERANDS", 2)
    }
}

struct Unsupported;

impl Reflect for Unsupported {
    fn type_info() -> TypeInfo {
        TypeInfo::opaque::<Unsupported>()
    }
}

impl FromVariant for Unsupported {
    fn from_variant(_: Variant, _: &HostRef) -> Result<Self, ConversionError> {
        Ok(Unsupported)
    }
}

struct Broken;

impl ExtensionClass for Broken {
    const NAME: &'static str = "Broken";

    fn create() -> Self {
        Broken
    }

    fn register(
        class: ClassBuilder<'_, Self>,
    ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
        class
            .method("fine", |_: &mut Broken, a: i64| a)?
            .method("bad", |_: &mut Broken, _: i64, _: Unsupported| {})
    }
}

struct Sprite {
    ready: bool,
}

impl ExtensionClass for Sprite {
    const NAME: &'static str = "Sprite";
    const PARENT: &'static str = "Node";

    fn create() -> Self {
        Sprite { ready: false }
    }

    fn register(
        class: ClassBuilder<'_, Self>,
    ) -> Result<ClassBuilder<'_, Self>, RegistrationError> {
        class.virtual_method("_ready", |s: &mut Sprite| s.ready = true)
    }
}

struct Fixture {
    local: Arc<LocalHost>,
    host: HostRef,
    bridge: Arc<Bridge>,
}

fn fixture() -> Fixture {
    let local = Arc::new(LocalHost::new());
    let host: HostRef = local.clone();
    let mut builder = Bridge::builder(host.clone()).sink(local.clone());
    builder
        .host_class("Node", "Object", &["get_name"])
        .unwrap()
        .host_class("Resource", "RefCounted", &[])
        .unwrap()
        .register::<Calculator>()
        .unwrap();
    Fixture {
        local,
        host,
        bridge: builder.build(),
    }
}

fn id(method: &str) -> MethodId {
    MethodId::new("Calculator", method)
}

fn call_raw<R: Pod>(
    fx: &Fixture,
    instance: &mut ExtensionInstance,
    method: &str,
    args: &Args,
) -> R {
    let mut slot = vec![0u8; std::mem::size_of::<R>()];
    let mut ret = RawReturn::new(&mut slot);
    fx.bridge
        .call_raw(instance.data_mut(), id(method), RawArgs::new(args.bytes()), &mut ret)
        .unwrap();
    assert!(ret.written());
    ret.read()
}

// =============================================================================
// Raw Path Scenarios
// =============================================================================

#[test]
fn test_add_two_ints() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();

    let out: i64 = call_raw(&fx, &mut calc, "add", &Args::default().push(3i64).push(4i64));
    assert_eq!(out, 7);
    assert_eq!(calc.downcast_ref::<Calculator>().unwrap().calls, 1);

    fx.bridge.free(calc);
}

#[test]
fn test_greet_leaves_no_residual_reference() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let baseline = fx.local.live_count();

    let name = Text::new(&fx.host, "World").into_raw();
    let out: RawHandle = call_raw(&fx, &mut calc, "greet", &Args::default().push(name));

    // the argument was consumed, the result belongs to us
    assert_eq!(fx.local.ref_count(name), None);
    assert_eq!(fx.local.ref_count(out), Some(1));
    let greeting = Text::adopt(&fx.host, out).unwrap();
    assert_eq!(greeting.read().unwrap(), "Hello, World");
    drop(greeting);
    assert_eq!(fx.local.live_count(), baseline);

    fx.bridge.free(calc);
}

#[test]
fn test_zero_argument_greet_from_empty_buffer() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let baseline = fx.local.live_count();

    let mut slot = [0u8; 8];
    let mut ret = RawReturn::new(&mut slot);
    fx.bridge
        .call_raw(calc.data_mut(), id("hello"), RawArgs::empty(), &mut ret)
        .unwrap();
    let out: RawHandle = ret.read();

    assert_eq!(fx.local.ref_count(out), Some(1));
    let greeting = Text::adopt(&fx.host, out).unwrap();
    assert_eq!(greeting.read().unwrap(), "Hello, World");
    drop(greeting);
    assert_eq!(fx.local.live_count(), baseline);

    fx.bridge.free(calc);
}

#[test]
fn test_echoed_text_keeps_single_reference() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let baseline = fx.local.live_count();

    let text = Text::new(&fx.host, "echo").into_raw();
    let out: RawHandle = call_raw(&fx, &mut calc, "echo", &Args::default().push(text));

    // the caller's reference moved in and came straight back out
    assert_eq!(out, text);
    assert_eq!(fx.local.ref_count(out), Some(1));
    fx.host.release(out);
    assert_eq!(fx.local.live_count(), baseline);

    fx.bridge.free(calc);
}

#[test]
fn test_wrap_tracked_instance_is_lent() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let handle = calc.handle();
    assert_eq!(fx.local.ref_count(handle), Some(1));

    let out: RawHandle = call_raw(&fx, &mut calc, "wrap", &Args::default().push(handle));
    assert_eq!(out, handle);
    assert_eq!(fx.local.ref_count(handle), Some(1));
    assert!(fx.bridge.instances().contains(handle));

    fx.bridge.free(calc);
    assert_eq!(fx.local.live_count(), 0);
}

#[test]
fn test_wrap_untracked_object_transfers() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let resource = Object::instantiate(&fx.host, "Resource", true).into_raw();

    let out: RawHandle = call_raw(&fx, &mut calc, "wrap", &Args::default().push(resource));
    assert_eq!(out, resource);
    // ours plus the one handed back
    assert_eq!(fx.local.ref_count(resource), Some(2));

    fx.host.release(out);
    fx.host.release(resource);
    assert_eq!(fx.local.ref_count(resource), None);
    fx.bridge.free(calc);
}

#[test]
fn test_unclassifiable_parameter_registers_nothing() {
    let local = Arc::new(LocalHost::new());
    let mut builder = Bridge::builder(local.clone()).sink(local.clone());

    let err = builder.register::<Broken>().err().unwrap();
    assert_eq!(
        err,
        RegistrationError::UnclassifiableParameter {
            class: "Broken".to_string(),
            method: "bad".to_string(),
            index: 1,
            type_name: std::any::type_name::<Unsupported>(),
        }
    );
    assert!(err.to_string().contains("Broken::bad"));

    assert!(local.registered_classes().is_empty());
    assert!(local.registered_methods().is_empty());

    let bridge = builder.build();
    assert!(!bridge.classes().contains("Broken"));
    assert!(bridge.descriptor(MethodId::new("Broken", "fine")).is_err());
}

#[test]
fn test_mixed_arguments_at_prefix_offsets() {
    let fx = fixture();
    let descriptor = fx.bridge.descriptor(id("describe")).unwrap();
    assert_eq!(descriptor.layout.offset(0), 0);
    assert_eq!(descriptor.layout.offset(1), 8);
    assert_eq!(descriptor.layout.offset(2), 16);
    assert_eq!(descriptor.layout.total(), 24);

    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let name = Text::new(&fx.host, "x").into_raw();
    let args = Args::default().push(5i64).push(name).push(0.5f64);
    let out: RawHandle = call_raw(&fx, &mut calc, "describe", &args);

    let text = Text::adopt(&fx.host, out).unwrap();
    assert_eq!(text.read().unwrap(), "5:x:0.5");
    fx.bridge.free(calc);
}

#[test]
fn test_static_method_without_instance() {
    let fx = fixture();
    let args = Args::default().push(9i64);
    let mut slot = [0u8; 8];
    let mut ret = RawReturn::new(&mut slot);
    fx.bridge
        .call_raw(&mut (), id("square"), RawArgs::new(args.bytes()), &mut ret)
        .unwrap();
    assert_eq!(ret.read::<i64>(), 81);
}

#[test]
fn test_unit_return_never_writes() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let label = Text::new(&fx.host, "sum").into_raw();
    let args = Args::default().push(label);

    let mut ret = RawReturn::new(&mut []);
    fx.bridge
        .call_raw(calc.data_mut(), id("set_label"), RawArgs::new(args.bytes()), &mut ret)
        .unwrap();
    assert!(!ret.written());
    assert_eq!(calc.downcast_ref::<Calculator>().unwrap().label, "sum");
    fx.bridge.free(calc);
}

#[test]
fn test_error_code_returns_int() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let ok: i64 = call_raw(&fx, &mut calc, "check", &Args::default().push(1i64));
    assert_eq!(ok, 0);
    let err: i64 = call_raw(&fx, &mut calc, "check", &Args::default().push(-1i64));
    assert_eq!(err, i64::from(i32::from(ErrorCode::ParameterRangeError)));
    fx.bridge.free(calc);
}

#[test]
#[should_panic(expected = "layout mismatch")]
fn test_short_buffer_panics() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let args = Args::default().push(3i64);
    let _: i64 = call_raw(&fx, &mut calc, "add", &args);
}

#[test]
#[should_panic(expected = "layout mismatch")]
fn test_narrow_output_slot_panics() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let args = Args::default().push(3i64).push(4i64);
    let mut slot = [0u8; 4];
    let mut ret = RawReturn::new(&mut slot);
    let _ = fx
        .bridge
        .call_raw(calc.data_mut(), id("add"), RawArgs::new(args.bytes()), &mut ret);
}

#[test]
fn test_wrong_instance_type() {
    let fx = fixture();
    let args = Args::default().push(3i64).push(4i64);
    let mut slot = [0u8; 8];
    let mut ret = RawReturn::new(&mut slot);
    let mut other = 0u32;
    assert!(matches!(
        fx.bridge
            .call_raw(&mut other, id("add"), RawArgs::new(args.bytes()), &mut ret),
        Err(CallError::InstanceType { .. })
    ));
}

// =============================================================================
// Boxed Path
// =============================================================================

#[test]
fn test_boxed_add() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let out = fx
        .bridge
        .call_boxed(calc.data_mut(), id("add"), &[Variant::Int(3), Variant::Int(4)])
        .unwrap();
    assert_eq!(out, Some(Variant::Int(7)));
    fx.bridge.free(calc);
}

#[test]
fn test_boxed_count_and_type_errors() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();

    let err = fx
        .bridge
        .call_boxed(calc.data_mut(), id("add"), &[Variant::Int(3)])
        .unwrap_err();
    assert_eq!(
        err,
        CallError::ArgumentCount {
            expected: 2,
            actual: 1
        }
    );

    let err = fx
        .bridge
        .call_boxed(
            calc.data_mut(),
            id("add"),
            &[Variant::Int(3), Variant::Bool(true)],
        )
        .unwrap_err();
    assert_eq!(
        err,
        CallError::ArgumentType {
            index: 1,
            expected: WireType::Int,
            actual: WireType::Bool,
        }
    );
    assert_eq!(calc.downcast_ref::<Calculator>().unwrap().calls, 0);
    fx.bridge.free(calc);
}

#[test]
fn test_boxed_object_kind_checked() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();

    let node = Variant::Object(Object::instantiate(&fx.host, "Node", false));
    let out = fx
        .bridge
        .call_boxed(calc.data_mut(), id("attach"), &[node])
        .unwrap();
    assert_eq!(out, Some(Variant::Bool(true)));

    let resource = Variant::Object(Object::instantiate(&fx.host, "Resource", true));
    let err = fx
        .bridge
        .call_boxed(calc.data_mut(), id("attach"), &[resource])
        .unwrap_err();
    assert!(matches!(err, CallError::ObjectKind { index: 0, .. }));
    fx.bridge.free(calc);
}

#[test]
fn test_boxed_nullable_handle() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let out = fx
        .bridge
        .call_boxed(calc.data_mut(), id("find"), &[Variant::Nil])
        .unwrap();
    assert_eq!(out, Some(Variant::Bool(false)));

    let err = fx
        .bridge
        .call_boxed(calc.data_mut(), id("attach"), &[Variant::Nil])
        .unwrap_err();
    assert!(matches!(err, CallError::ArgumentType { .. }));
    fx.bridge.free(calc);
}

#[test]
fn test_boxed_no_value_sentinel() {
    let fx = fixture();
    let mut calc = fx.bridge.instantiate("Calculator").unwrap();
    let label = Variant::String(Text::new(&fx.host, "boxed"));
    let out = fx
        .bridge
        .call_by_name(calc.data_mut(), "Calculator", "set_label", &[label])
        .unwrap();
    assert_eq!(out, None);

    let out = fx
        .bridge
        .call_by_name(calc.data_mut(), "Calculator", "get_label", &[])
        .unwrap();
    let Some(Variant::String(text)) = out else {
        panic!("expected a string, got {out:?}");
    };
    assert_eq!(text.read().unwrap(), "boxed");
    fx.bridge.free(calc);
}

// =============================================================================
// Registration Surface
// =============================================================================

#[test]
fn test_sink_receives_every_member() {
    let fx = fixture();
    let classes = fx.local.registered_classes();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "Calculator");
    assert_eq!(classes[0].parent, "RefCounted");
    assert!(classes[0].refcounted);

    let methods = fx.local.registered_methods();
    let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
    for expected in ["add", "greet", "square", "get_label", "set_label", "get_calls"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
    let square = methods.iter().find(|m| m.name == "square").unwrap();
    assert!(square.flags.contains(MethodFlags::STATIC));

    let properties = fx.local.registered_properties();
    assert_eq!(properties.len(), 2);

    let signals = fx.local.registered_signals();
    assert_eq!(signals[0].name, "computed");
    assert_eq!(signals[0].args.len(), 2);

    let constants = fx.local.registered_constants();
    assert_eq!(constants[0].name, "MAX_OPERANDS");
    assert_eq!(constants[0].value, 2);
}

#[test]
fn test_registration_records_metadata() {
    let fx = fixture();
    let methods = fx.local.registered_methods();
    let add = methods.iter().find(|m| m.name == "add").unwrap();
    assert_eq!(add.id, id("add"));
    assert_eq!(add.args.len(), 2);
    assert_eq!(
        add.args[0].ty.meta,
        ArgMetadata::IntIsInt64
    );
    assert_eq!(add.ret.map(|r| r.wire()), Some(WireType::Int));
}

// =============================================================================
// C ABI
// =============================================================================

#[test]
fn test_ffi_round_trip() {
    let fx = fixture();
    let bridge = Arc::as_ptr(&fx.bridge);
    let instance = unsafe { hostbridge_instantiate(bridge, c"Calculator".as_ptr()) };
    assert!(!instance.is_null());

    let args = Args::default().push(20i64).push(22i64);
    let mut slot = [0u8; 8];
    let status = unsafe {
        hostbridge_call_raw(
            bridge,
            instance,
            id("add").as_u64(),
            args.bytes().as_ptr(),
            args.bytes().len(),
            slot.as_mut_ptr(),
            slot.len(),
        )
    };
    assert_eq!(status, CallStatus::Ok);
    assert_eq!(i64::from_ne_bytes(slot), 42);

    unsafe { hostbridge_free(bridge, instance) };
    assert_eq!(fx.local.live_count(), 0);
}

#[test]
fn test_ffi_reports_panics() {
    let fx = fixture();
    let bridge = Arc::as_ptr(&fx.bridge);
    let instance = unsafe { hostbridge_instantiate(bridge, c"Calculator".as_ptr()) };

    let status = unsafe {
        hostbridge_call_raw(
            bridge,
            instance,
            id("fail").as_u64(),
            ptr::null(),
            0,
            ptr::null_mut(),
            0,
        )
    };
    assert_eq!(status, CallStatus::Panicked);

    let status = unsafe {
        hostbridge_call_raw(
            bridge,
            instance,
            MethodId::new("Calculator", "nope").as_u64(),
            ptr::null(),
            0,
            ptr::null_mut(),
            0,
        )
    };
    assert_eq!(status, CallStatus::MethodNotFound);
    unsafe { hostbridge_free(bridge, instance) };
}

#[test]
fn test_ffi_unknown_class() {
    let fx = fixture();
    let instance = unsafe { hostbridge_instantiate(Arc::as_ptr(&fx.bridge), c"Nope".as_ptr()) };
    assert!(instance.is_null());
}

#[test]
fn test_ffi_virtual_override() {
    let local = Arc::new(LocalHost::new());
    let mut builder = Bridge::builder(local.clone());
    builder
        .host_class("Node", "Object", &[])
        .unwrap()
        .host_virtual("Node", "_ready", VirtualSignature::new([], None))
        .unwrap()
        .register::<Sprite>()
        .unwrap();
    let owned = builder.build();
    let bridge = Arc::as_ptr(&owned);
    let sprite = c"Sprite".as_ptr();

    let method = unsafe { hostbridge_get_virtual(bridge, sprite, c"_ready".as_ptr()) };
    assert_eq!(method, MethodId::new("Sprite", "_ready").as_u64());
    let missing = unsafe { hostbridge_get_virtual(bridge, sprite, c"_process".as_ptr()) };
    assert_eq!(missing, 0);

    let instance = unsafe { hostbridge_instantiate(bridge, sprite) };
    let (args, ret) = (ptr::null(), ptr::null_mut());
    let status = unsafe { hostbridge_call_raw(bridge, instance, method, args, 0, ret, 0) };
    assert_eq!(status, CallStatus::Ok);
    let ready = unsafe { &*instance }.downcast_ref::<Sprite>().map(|s| s.ready);
    assert_eq!(ready, Some(true));

    unsafe { hostbridge_free(bridge, instance) };
    assert_eq!(local.live_count(), 0);
}
