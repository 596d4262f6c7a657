//! Boxed call path.
//!
//! Every argument carries its own wire type tag. Tags are checked against
//! the descriptor before anything is converted, so a wrong argument never
//! reaches the user's function. This path allocates and is meant for
//! late-bound calls.

use std::any::Any;
use std::sync::Arc;

use hostbridge_core::{ArgSource, ArgSpec, BoxedCallFn, CallEnv, CallError, Variant, WireType};
use hostbridge_registry::OBJECT_CLASS;

use crate::method::Invoker;

/// Owned argument slots, each taken at most once.
pub(crate) struct BoxedArgs {
    slots: Vec<Option<Variant>>,
}

impl BoxedArgs {
    pub(crate) fn new(values: &[Variant]) -> Self {
        Self {
            slots: values.iter().cloned().map(Some).collect(),
        }
    }
}

impl ArgSource for BoxedArgs {
    fn take(&mut self, index: usize) -> Result<Variant, CallError> {
        let actual = self.slots.len();
        self.slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(CallError::ArgumentCount {
                expected: index + 1,
                actual,
            })
    }
}

/// Whether a slot declared as `spec` takes a value tagged `actual`.
fn accepts(spec: &ArgSpec, value: &Variant) -> bool {
    let wire = spec.wire();
    wire == WireType::Variant || value.wire_type() == wire || (value.is_nil() && spec.ty.nullable)
}

/// Check count, tags and object classes of every argument.
pub fn check_arguments(
    args: &[ArgSpec],
    values: &[Variant],
    env: &CallEnv<'_>,
) -> Result<(), CallError> {
    if args.len() != values.len() {
        return Err(CallError::ArgumentCount {
            expected: args.len(),
            actual: values.len(),
        });
    }

    for (index, (spec, value)) in args.iter().zip(values).enumerate() {
        if !accepts(spec, value) {
            return Err(CallError::ArgumentType {
                index,
                expected: spec.wire(),
                actual: value.wire_type(),
            });
        }

        let (Variant::Object(object), Some(class)) = (value, spec.ty.hint.object_class()) else {
            continue;
        };
        if class == OBJECT_CLASS {
            continue;
        }
        let actual = object.class_name().unwrap_or_default();
        if !env.classes.is_subclass(&actual, class) {
            return Err(CallError::ObjectKind {
                index,
                expected: class.to_string(),
                actual,
            });
        }
    }
    Ok(())
}

/// Build the boxed entry point for one method.
pub(crate) fn entry(invoker: Invoker, args: Vec<ArgSpec>, ret: Option<ArgSpec>) -> BoxedCallFn {
    Arc::new(
        move |instance: &mut dyn Any,
              values: &[Variant],
              env: &CallEnv<'_>|
              -> Result<Option<Variant>, CallError> {
            check_arguments(&args, values, env)?;
            let mut source = BoxedArgs::new(values);
            let value = invoker(instance, &mut source, env.host)?;
            Ok(ret.map(|_| value))
        },
    )
}
