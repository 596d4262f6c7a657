//! Raw transcoding path.
//!
//! Arguments arrive packed back-to-back at the offsets of the descriptor's
//! [`ArgLayout`]. Each one is decoded through a single table keyed by wire
//! type, the method is invoked, and the result is encoded into the output
//! slot through the matching encode table.
//!
//! Ownership follows [`OwnershipClass`](hostbridge_core::OwnershipClass):
//!
//! - values are copied both ways
//! - transferred references are adopted on decode, borrowed references are
//!   duplicated; the wrapper's `Drop` releases either once the call is over,
//!   on return or on unwind
//! - returned references are handed to the host, the bridge keeps no claim
//! - a returned object the bridge tracks as a live extension instance is
//!   lent to the host instead of transferred
//!
//! A buffer shorter than the layout, or an output slot narrower than the
//! return type, is a broken host contract and panics.

use std::any::Any;
use std::sync::Arc;

use hostbridge_core::{
    ArgLayout, ArgSource, ArgSpec, Array, CallEnv, CallError, Callable, Color, ConversionError,
    DecodeRule, Dictionary, HostRef, Name, NodePath, Object, Packed, RawArgs, RawCallFn, RawHandle,
    RawReturn, RawVariant, Signal, Text, Variant, Vector2, Vector3, Vector4, WireType,
};

use crate::method::Invoker;

/// Decodes arguments lazily, in order, straight from the caller's buffer.
///
/// Transferred references that were never taken (because an earlier
/// argument failed) are adopted and released on drop.
pub(crate) struct RawArgSource<'a> {
    raw: RawArgs<'a>,
    layout: &'a ArgLayout,
    args: &'a [ArgSpec],
    host: &'a HostRef,
    next: usize,
}

impl<'a> RawArgSource<'a> {
    pub(crate) fn new(
        raw: RawArgs<'a>,
        layout: &'a ArgLayout,
        args: &'a [ArgSpec],
        host: &'a HostRef,
    ) -> Self {
        Self {
            raw,
            layout,
            args,
            host,
            next: 0,
        }
    }

    fn decode(&self, index: usize) -> Result<Variant, ConversionError> {
        decode(self.raw, self.layout.offset(index), &self.args[index], self.host)
    }
}

impl ArgSource for RawArgSource<'_> {
    fn take(&mut self, index: usize) -> Result<Variant, CallError> {
        if index >= self.args.len() {
            return Err(CallError::ArgumentCount {
                expected: index + 1,
                actual: self.args.len(),
            });
        }
        self.next = self.next.max(index + 1);
        self.decode(index)
            .map_err(|source| CallError::Conversion { index, source })
    }
}

impl Drop for RawArgSource<'_> {
    fn drop(&mut self) {
        for index in self.next..self.args.len() {
            if self.args[index].wire().ownership().decode_rule() == DecodeRule::Adopt {
                drop(self.decode(index));
            }
        }
    }
}

/// Read one argument at `offset`.
pub fn decode(
    raw: RawArgs<'_>,
    offset: usize,
    spec: &ArgSpec,
    host: &HostRef,
) -> Result<Variant, ConversionError> {
    let wire = spec.wire();
    let rule = wire.ownership().decode_rule();

    macro_rules! reference {
        ($variant:ident, $ty:ty) => {{
            let handle: RawHandle = raw.read(offset);
            Variant::$variant(match rule {
                DecodeRule::Adopt => <$ty>::adopt(host, handle)?,
                _ => <$ty>::duplicate(host, handle)?,
            })
        }};
    }

    let value = match wire {
        WireType::Nil => Variant::Nil,
        WireType::Bool => Variant::Bool(raw.read::<u8>(offset) != 0),
        WireType::Int => Variant::Int(spec.ty.meta.check_int(raw.read(offset))?),
        WireType::Float if spec.ty.meta.float_width() == 4 => {
            Variant::Float(f64::from(raw.read::<f32>(offset)))
        }
        WireType::Float => Variant::Float(raw.read(offset)),
        WireType::Vector2 => Variant::Vector2(raw.read(offset)),
        WireType::Vector2i => Variant::Vector2i(raw.read(offset)),
        WireType::Rect2 => Variant::Rect2(raw.read(offset)),
        WireType::Rect2i => Variant::Rect2i(raw.read(offset)),
        WireType::Vector3 => Variant::Vector3(raw.read(offset)),
        WireType::Vector3i => Variant::Vector3i(raw.read(offset)),
        WireType::Transform2D => Variant::Transform2D(raw.read(offset)),
        WireType::Vector4 => Variant::Vector4(raw.read(offset)),
        WireType::Vector4i => Variant::Vector4i(raw.read(offset)),
        WireType::Plane => Variant::Plane(raw.read(offset)),
        WireType::Quaternion => Variant::Quaternion(raw.read(offset)),
        WireType::Aabb => Variant::Aabb(raw.read(offset)),
        WireType::Basis => Variant::Basis(raw.read(offset)),
        WireType::Transform3D => Variant::Transform3D(raw.read(offset)),
        WireType::Projection => Variant::Projection(raw.read(offset)),
        WireType::Color => Variant::Color(raw.read(offset)),
        WireType::Rid => Variant::Rid(raw.read(offset)),
        WireType::String => reference!(String, Text),
        WireType::StringName => reference!(StringName, Name),
        WireType::NodePath => reference!(NodePath, NodePath),
        WireType::Callable => reference!(Callable, Callable),
        WireType::Signal => reference!(Signal, Signal),
        WireType::Dictionary => reference!(Dictionary, Dictionary),
        WireType::Array => reference!(Array, Array),
        WireType::PackedByteArray => reference!(PackedByteArray, Packed<u8>),
        WireType::PackedInt32Array => reference!(PackedInt32Array, Packed<i32>),
        WireType::PackedInt64Array => reference!(PackedInt64Array, Packed<i64>),
        WireType::PackedFloat32Array => reference!(PackedFloat32Array, Packed<f32>),
        WireType::PackedFloat64Array => reference!(PackedFloat64Array, Packed<f64>),
        WireType::PackedStringArray => reference!(PackedStringArray, Packed<String>),
        WireType::PackedVector2Array => reference!(PackedVector2Array, Packed<Vector2>),
        WireType::PackedVector3Array => reference!(PackedVector3Array, Packed<Vector3>),
        WireType::PackedColorArray => reference!(PackedColorArray, Packed<Color>),
        WireType::PackedVector4Array => reference!(PackedVector4Array, Packed<Vector4>),
        WireType::Object => {
            let handle: RawHandle = raw.read(offset);
            if handle.is_null() {
                Variant::Nil
            } else {
                Variant::Object(Object::view(host, handle)?)
            }
        }
        WireType::Variant => Variant::adopt_raw(host, raw.read::<RawVariant>(offset))?,
    };
    Ok(value)
}

/// Write a return value into the output slot.
pub fn encode(
    spec: &ArgSpec,
    value: Variant,
    out: &mut RawReturn<'_>,
    env: &CallEnv<'_>,
) -> Result<(), ConversionError> {
    let wire = spec.wire();
    if wire == WireType::Variant {
        let raw = match value {
            Variant::Object(object) if env.instances.contains(object.handle()) => {
                RawVariant::from_handle(WireType::Object, object.handle())
            }
            other => other.into_raw(env.host),
        };
        out.write(raw);
        return Ok(());
    }
    if wire == WireType::Object && value.is_nil() {
        out.write(RawHandle::NULL);
        return Ok(());
    }
    if value.wire_type() != wire {
        return Err(ConversionError::TypeMismatch {
            expected: wire.name(),
            actual: value.type_name(),
        });
    }

    match value {
        Variant::Nil => {}
        Variant::Bool(v) => out.write(u8::from(v)),
        Variant::Int(v) => out.write(v),
        Variant::Float(v) if spec.ty.meta.float_width() == 4 => out.write(v as f32),
        Variant::Float(v) => out.write(v),
        Variant::Vector2(v) => out.write(v),
        Variant::Vector2i(v) => out.write(v),
        Variant::Rect2(v) => out.write(v),
        Variant::Rect2i(v) => out.write(v),
        Variant::Vector3(v) => out.write(v),
        Variant::Vector3i(v) => out.write(v),
        Variant::Transform2D(v) => out.write(v),
        Variant::Vector4(v) => out.write(v),
        Variant::Vector4i(v) => out.write(v),
        Variant::Plane(v) => out.write(v),
        Variant::Quaternion(v) => out.write(v),
        Variant::Aabb(v) => out.write(v),
        Variant::Basis(v) => out.write(v),
        Variant::Transform3D(v) => out.write(v),
        Variant::Projection(v) => out.write(v),
        Variant::Color(v) => out.write(v),
        Variant::Rid(v) => out.write(v),
        Variant::String(v) => out.write(v.into_raw()),
        Variant::StringName(v) => out.write(v.into_raw()),
        Variant::NodePath(v) => out.write(v.into_raw()),
        Variant::Callable(v) => out.write(v.into_raw()),
        Variant::Signal(v) => out.write(v.into_raw()),
        Variant::Dictionary(v) => out.write(v.into_raw()),
        Variant::Array(v) => out.write(v.into_raw()),
        Variant::PackedByteArray(v) => out.write(v.into_raw()),
        Variant::PackedInt32Array(v) => out.write(v.into_raw()),
        Variant::PackedInt64Array(v) => out.write(v.into_raw()),
        Variant::PackedFloat32Array(v) => out.write(v.into_raw()),
        Variant::PackedFloat64Array(v) => out.write(v.into_raw()),
        Variant::PackedStringArray(v) => out.write(v.into_raw()),
        Variant::PackedVector2Array(v) => out.write(v.into_raw()),
        Variant::PackedVector3Array(v) => out.write(v.into_raw()),
        Variant::PackedColorArray(v) => out.write(v.into_raw()),
        Variant::PackedVector4Array(v) => out.write(v.into_raw()),
        Variant::Object(object) => {
            let handle = object.handle();
            if env.instances.contains(handle) {
                // lent: our wrapper's reference goes away, the host's stays
                out.write(handle);
                drop(object);
            } else {
                out.write(object.into_raw());
            }
        }
    }
    Ok(())
}

/// Build the raw entry point for one method.
pub(crate) fn entry(
    invoker: Invoker,
    args: Vec<ArgSpec>,
    ret: Option<ArgSpec>,
    layout: ArgLayout,
) -> RawCallFn {
    Arc::new(
        move |instance: &mut dyn Any,
              raw: RawArgs<'_>,
              out: &mut RawReturn<'_>,
              env: &CallEnv<'_>|
              -> Result<(), CallError> {
            if raw.len() < layout.total() {
                panic!(
                    "layout mismatch: {} byte argument buffer for a {} byte layout",
                    raw.len(),
                    layout.total()
                );
            }
            if let Some(spec) = ret
                && out.capacity() < spec.width()
            {
                panic!(
                    "layout mismatch: {} byte output slot for a {} byte {}",
                    out.capacity(),
                    spec.width(),
                    spec.wire()
                );
            }

            let value = {
                let mut source = RawArgSource::new(raw, &layout, &args, env.host);
                invoker(instance, &mut source, env.host)?
            };
            match ret {
                Some(spec) => encode(&spec, value, out, env).map_err(CallError::Return),
                None => Ok(()),
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{ArgMetadata, HostApi, InstanceTracker, LocalHost, Transform3D, TypeSpec};
    use hostbridge_registry::ClassDb;

    fn spec(ty: TypeSpec) -> ArgSpec {
        ArgSpec {
            type_name: "test",
            ty,
        }
    }

    fn setup() -> (Arc<LocalHost>, HostRef) {
        let local = Arc::new(LocalHost::new());
        let host: HostRef = local.clone();
        (local, host)
    }

    #[test]
    fn decodes_scalars_at_offsets() {
        let (_local, host) = setup();
        let mut buf = Vec::new();
        buf.push(1u8);
        buf.extend_from_slice(&(-3i64).to_ne_bytes());
        buf.extend_from_slice(&1.5f32.to_ne_bytes());

        let args = [
            spec(TypeSpec::new(WireType::Bool)),
            spec(TypeSpec::new(WireType::Int)),
            spec(TypeSpec::new(WireType::Float).with_meta(ArgMetadata::RealIsFloat)),
        ];
        let layout = ArgLayout::new(args.iter().map(ArgSpec::width));
        let raw = RawArgs::new(&buf);

        assert_eq!(
            decode(raw, layout.offset(0), &args[0], &host),
            Ok(Variant::Bool(true))
        );
        assert_eq!(
            decode(raw, layout.offset(1), &args[1], &host),
            Ok(Variant::Int(-3))
        );
        assert_eq!(
            decode(raw, layout.offset(2), &args[2], &host),
            Ok(Variant::Float(1.5))
        );
    }

    #[test]
    fn int_metadata_range_checked() {
        let (_local, host) = setup();
        let buf = 70_000i64.to_ne_bytes();
        let narrow = spec(TypeSpec::new(WireType::Int).with_meta(ArgMetadata::IntIsInt16));
        assert!(matches!(
            decode(RawArgs::new(&buf), 0, &narrow, &host),
            Err(ConversionError::IntegerOverflow { value: 70_000, .. })
        ));
    }

    #[test]
    fn aggregates_read_whole() {
        let (_local, host) = setup();
        let value = Transform3D {
            origin: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let buf = bytemuck::bytes_of(&value).to_vec();
        let arg = spec(TypeSpec::new(WireType::Transform3D));
        assert_eq!(
            decode(RawArgs::new(&buf), 0, &arg, &host),
            Ok(Variant::Transform3D(value))
        );
    }

    #[test]
    fn transferred_adopted_borrowed_duplicated() {
        let (local, host) = setup();
        let text = Text::new(&host, "owned by call").into_raw();
        let array = Array::new(&host).into_raw();

        let mut buf = Vec::new();
        buf.extend_from_slice(&text.0.to_ne_bytes());
        buf.extend_from_slice(&array.0.to_ne_bytes());
        let raw = RawArgs::new(&buf);

        let decoded = decode(raw, 0, &spec(TypeSpec::new(WireType::String)), &host).unwrap();
        assert_eq!(local.ref_count(text), Some(1));
        drop(decoded);
        assert_eq!(local.ref_count(text), None);

        let decoded = decode(raw, 8, &spec(TypeSpec::new(WireType::Array)), &host).unwrap();
        assert_eq!(local.ref_count(array), Some(2));
        drop(decoded);
        assert_eq!(local.ref_count(array), Some(1));
    }

    #[test]
    fn untaken_transfers_released_on_drop() {
        let (local, host) = setup();
        let text = Text::new(&host, "never taken").into_raw();
        let buf = text.0.to_ne_bytes();
        let args = [spec(TypeSpec::new(WireType::String))];
        let layout = ArgLayout::new([8]);

        drop(RawArgSource::new(RawArgs::new(&buf), &layout, &args, &host));
        assert_eq!(local.ref_count(text), None);
    }

    #[test]
    fn encode_rejects_mismatch() {
        let (_local, host) = setup();
        let instances = InstanceTracker::new();
        let classes = ClassDb::new();
        let env = CallEnv {
            host: &host,
            instances: &instances,
            classes: &classes,
        };
        let mut slot = [0u8; 8];
        let mut out = RawReturn::new(&mut slot);
        assert!(matches!(
            encode(
                &spec(TypeSpec::new(WireType::Int)),
                Variant::Bool(true),
                &mut out,
                &env
            ),
            Err(ConversionError::TypeMismatch { .. })
        ));
        assert!(!out.written());
    }

    #[test]
    fn encode_single_precision() {
        let (_local, host) = setup();
        let instances = InstanceTracker::new();
        let classes = ClassDb::new();
        let env = CallEnv {
            host: &host,
            instances: &instances,
            classes: &classes,
        };
        let mut slot = [0u8; 4];
        let mut out = RawReturn::new(&mut slot);
        let ret = spec(TypeSpec::new(WireType::Float).with_meta(ArgMetadata::RealIsFloat));
        encode(&ret, Variant::Float(0.25), &mut out, &env).unwrap();
        assert_eq!(out.read::<f32>(), 0.25);
    }

    #[test]
    fn variant_return_lends_tracked_object() {
        let (local, host) = setup();
        let instances = InstanceTracker::new();
        let classes = ClassDb::new();
        let env = CallEnv {
            host: &host,
            instances: &instances,
            classes: &classes,
        };
        let tracked = local.object_new("Gauge", true);
        instances.track(tracked);
        let untracked = local.object_new("Resource", true);
        let ret = spec(TypeSpec::new(WireType::Variant));

        let mut slot = [0u8; std::mem::size_of::<RawVariant>()];
        let mut out = RawReturn::new(&mut slot);
        let value = Variant::Object(Object::view(&host, tracked).unwrap());
        encode(&ret, value, &mut out, &env).unwrap();
        assert_eq!(out.read::<RawVariant>().owned_handle(), Some(tracked));
        assert_eq!(local.ref_count(tracked), Some(1));

        let mut out = RawReturn::new(&mut slot);
        let value = Variant::Object(Object::view(&host, untracked).unwrap());
        encode(&ret, value, &mut out, &env).unwrap();
        assert_eq!(out.read::<RawVariant>().owned_handle(), Some(untracked));
        assert_eq!(local.ref_count(untracked), Some(2));
        local.release(untracked);
    }
}
