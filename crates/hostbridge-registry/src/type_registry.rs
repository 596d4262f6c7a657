//! Maps Rust types to wire types.
//!
//! Rules are tried in priority order:
//!
//! 1. exact match on `TypeId` (builtins and user aliases)
//! 2. capability from the type's [`Shape`]: handles, signals, callables,
//!    nullable handles
//! 3. structure: lists become arrays, maps become dictionaries, ranged
//!    integers become ints with a range hint
//! 4. otherwise the type is unclassifiable
//!
//! Results are memoized per `TypeId`, so the same type always gets the same
//! answer.

use std::any::TypeId;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use hostbridge_core::{
    Aabb, ArgMetadata, Array, Basis, Color, Dictionary, ErrorCode, Name, NodePath, Packed, Plane,
    Projection, Quaternion, Rect2, Rect2i, Reflect, RegistrationError, Rid, Shape, Text,
    Transform2D, Transform3D, TypeHint, TypeInfo, TypeSpec, Variant, Vector2, Vector2i, Vector3,
    Vector3i, Vector4, Vector4i, WireType,
};

pub struct TypeRegistry {
    exact: FxHashMap<TypeId, TypeSpec>,
    memo: FxHashMap<TypeId, TypeSpec>,
}

impl TypeRegistry {
    /// A registry with every builtin rule.
    pub fn new() -> Self {
        let mut registry = Self {
            exact: FxHashMap::default(),
            memo: FxHashMap::default(),
        };
        registry.register_builtins();
        registry
    }

    fn exact<T: 'static>(&mut self, spec: TypeSpec) {
        self.exact.insert(TypeId::of::<T>(), spec);
    }

    fn register_builtins(&mut self) {
        use ArgMetadata as M;
        use WireType as W;

        self.exact::<bool>(TypeSpec::new(W::Bool));
        self.exact::<i8>(TypeSpec::new(W::Int).with_meta(M::IntIsInt8));
        self.exact::<i16>(TypeSpec::new(W::Int).with_meta(M::IntIsInt16));
        self.exact::<i32>(TypeSpec::new(W::Int).with_meta(M::IntIsInt32));
        self.exact::<i64>(TypeSpec::new(W::Int).with_meta(M::IntIsInt64));
        self.exact::<u8>(TypeSpec::new(W::Int).with_meta(M::IntIsUint8));
        self.exact::<u16>(TypeSpec::new(W::Int).with_meta(M::IntIsUint16));
        self.exact::<u32>(TypeSpec::new(W::Int).with_meta(M::IntIsUint32));
        self.exact::<u64>(TypeSpec::new(W::Int).with_meta(M::IntIsUint64));
        self.exact::<char>(TypeSpec::new(W::Int).with_meta(M::IntIsChar32));
        self.exact::<f32>(TypeSpec::new(W::Float).with_meta(M::RealIsFloat));
        self.exact::<f64>(TypeSpec::new(W::Float).with_meta(M::RealIsDouble));
        self.exact::<OrderedFloat<f64>>(TypeSpec::new(W::Float).with_meta(M::RealIsDouble));

        self.exact::<String>(TypeSpec::new(W::String));
        self.exact::<Text>(TypeSpec::new(W::String));
        self.exact::<Name>(TypeSpec::new(W::StringName));
        self.exact::<NodePath>(TypeSpec::new(W::NodePath));
        self.exact::<Array>(TypeSpec::new(W::Array));
        self.exact::<Dictionary>(TypeSpec::new(W::Dictionary));

        self.exact::<Packed<u8>>(TypeSpec::new(W::PackedByteArray));
        self.exact::<Packed<i32>>(TypeSpec::new(W::PackedInt32Array));
        self.exact::<Packed<i64>>(TypeSpec::new(W::PackedInt64Array));
        self.exact::<Packed<f32>>(TypeSpec::new(W::PackedFloat32Array));
        self.exact::<Packed<f64>>(TypeSpec::new(W::PackedFloat64Array));
        self.exact::<Packed<String>>(TypeSpec::new(W::PackedStringArray));
        self.exact::<Packed<Vector2>>(TypeSpec::new(W::PackedVector2Array));
        self.exact::<Packed<Vector3>>(TypeSpec::new(W::PackedVector3Array));
        self.exact::<Packed<Color>>(TypeSpec::new(W::PackedColorArray));
        self.exact::<Packed<Vector4>>(TypeSpec::new(W::PackedVector4Array));

        self.exact::<Vector2>(TypeSpec::new(W::Vector2));
        self.exact::<Vector2i>(TypeSpec::new(W::Vector2i));
        self.exact::<Rect2>(TypeSpec::new(W::Rect2));
        self.exact::<Rect2i>(TypeSpec::new(W::Rect2i));
        self.exact::<Vector3>(TypeSpec::new(W::Vector3));
        self.exact::<Vector3i>(TypeSpec::new(W::Vector3i));
        self.exact::<Transform2D>(TypeSpec::new(W::Transform2D));
        self.exact::<Vector4>(TypeSpec::new(W::Vector4));
        self.exact::<Vector4i>(TypeSpec::new(W::Vector4i));
        self.exact::<Plane>(TypeSpec::new(W::Plane));
        self.exact::<Quaternion>(TypeSpec::new(W::Quaternion));
        self.exact::<Aabb>(TypeSpec::new(W::Aabb));
        self.exact::<Basis>(TypeSpec::new(W::Basis));
        self.exact::<Transform3D>(TypeSpec::new(W::Transform3D));
        self.exact::<Projection>(TypeSpec::new(W::Projection));
        self.exact::<Color>(TypeSpec::new(W::Color));
        self.exact::<Rid>(TypeSpec::new(W::Rid));

        self.exact::<Variant>(TypeSpec::new(W::Variant));
        self.exact::<ErrorCode>(TypeSpec::new(W::Int));
        self.exact::<Result<(), ErrorCode>>(TypeSpec::new(W::Int));
    }

    /// Map a user type onto an existing wire representation.
    ///
    /// The type still needs `FromVariant`/`ToVariant` impls producing the
    /// matching variant.
    pub fn register_alias<T: Reflect>(&mut self, spec: TypeSpec) -> &mut Self {
        let id = TypeId::of::<T>();
        self.exact.insert(id, spec);
        self.memo.remove(&id);
        self
    }

    pub fn classify_type<T: Reflect>(&mut self) -> Result<TypeSpec, RegistrationError> {
        self.classify(&T::type_info())
    }

    pub fn classify(&mut self, info: &TypeInfo) -> Result<TypeSpec, RegistrationError> {
        if let Some(spec) = self.memo.get(&info.id) {
            return Ok(*spec);
        }
        let spec = self.classify_uncached(info)?;
        self.memo.insert(info.id, spec);
        Ok(spec)
    }

    fn classify_uncached(&mut self, info: &TypeInfo) -> Result<TypeSpec, RegistrationError> {
        if let Some(spec) = self.exact.get(&info.id) {
            return Ok(*spec);
        }

        match info.shape {
            Shape::Handle { class } => {
                Ok(TypeSpec::new(WireType::Object).with_hint(TypeHint::ObjectOf { class }))
            }
            Shape::Signal => Ok(TypeSpec::new(WireType::Signal)),
            Shape::Callable => Ok(TypeSpec::new(WireType::Callable)),
            Shape::Optional(inner) => {
                let spec = self.classify(&inner())?;
                if spec.wire != WireType::Object {
                    return Err(RegistrationError::NullableNonHandle {
                        type_name: info.name,
                    });
                }
                Ok(spec.nullable())
            }
            Shape::List(element) => {
                let element = self.classify(&element())?;
                Ok(TypeSpec::new(WireType::Array).with_hint(TypeHint::ArrayOf {
                    element: element.wire,
                    class: element.hint.object_class(),
                }))
            }
            Shape::Map(key, value) => {
                let key = self.classify(&key())?;
                let value = self.classify(&value())?;
                Ok(
                    TypeSpec::new(WireType::Dictionary).with_hint(TypeHint::DictionaryOf {
                        key: key.wire,
                        value: value.wire,
                    }),
                )
            }
            Shape::Ranged { min, max } => Ok(TypeSpec::new(WireType::Int)
                .with_meta(ArgMetadata::IntIsInt64)
                .with_hint(TypeHint::Range { min, max })),
            Shape::Opaque | Shape::Unit => Err(RegistrationError::Unclassifiable {
                type_name: info.name,
            }),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("exact_count", &self.exact.len())
            .field("memo_count", &self.memo.len())
            .finish()
    }
}
