//! C ABI entry points the host calls through.
//!
//! Every trampoline catches panics from user methods, logs them and reports
//! [`CallStatus::Panicked`]; nothing unwinds across the boundary.

use std::any::Any;
use std::ffi::{CStr, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use log::error;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use hostbridge_core::{CallError, MethodId, RawArgs, RawReturn, RawVariant, Variant};

use crate::bridge::{Bridge, ExtensionInstance};

/// Outcome of a call, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum CallStatus {
    Ok = 0,
    MethodNotFound = 1,
    UnknownClass = 2,
    ArgumentCount = 3,
    ArgumentType = 4,
    ObjectKind = 5,
    InstanceType = 6,
    Conversion = 7,
    Return = 8,
    Panicked = 9,
    InvalidPointer = 10,
}

impl From<&CallError> for CallStatus {
    fn from(err: &CallError) -> Self {
        match err {
            CallError::MethodNotFound { .. } | CallError::MethodNotFoundByName { .. } => {
                CallStatus::MethodNotFound
            }
            CallError::UnknownClass { .. } => CallStatus::UnknownClass,
            CallError::ArgumentCount { .. } => CallStatus::ArgumentCount,
            CallError::ArgumentType { .. } => CallStatus::ArgumentType,
            CallError::ObjectKind { .. } => CallStatus::ObjectKind,
            CallError::InstanceType { .. } => CallStatus::InstanceType,
            CallError::Conversion { .. } => CallStatus::Conversion,
            CallError::Return(_) => CallStatus::Return,
            CallError::Panicked { .. } => CallStatus::Panicked,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `call`, turning errors and panics into a status.
fn trap(entry: &str, call: impl FnOnce() -> Result<(), CallError>) -> CallStatus {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => CallStatus::Ok,
        Ok(Err(err)) => CallStatus::from(&err),
        Err(payload) => {
            let err = CallError::Panicked {
                message: panic_message(&*payload),
            };
            error!("{entry}: {err}");
            CallStatus::Panicked
        }
    }
}

/// # Safety
///
/// `args` must point to `len` readable bytes, or be null with `len == 0`.
unsafe fn bytes<'a>(args: *const u8, len: usize) -> &'a [u8] {
    if args.is_null() {
        &[]
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { slice::from_raw_parts(args, len) }
    }
}

/// # Safety
///
/// `s` must be null or a valid C string that outlives `'a`.
unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

/// Call a method through the raw transcoding path.
///
/// `instance` may be null for static methods.
///
/// # Safety
///
/// - `bridge` must come from [`Bridge::build`] and outlive the call
/// - `instance` must be null or point to a live [`ExtensionInstance`] not
///   accessed elsewhere during the call
/// - `args` must point to `args_len` readable bytes and `ret` to `ret_len`
///   writable bytes (either may be null when its length is 0)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostbridge_call_raw(
    bridge: *const Bridge,
    instance: *mut ExtensionInstance,
    method: u64,
    args: *const u8,
    args_len: usize,
    ret: *mut u8,
    ret_len: usize,
) -> CallStatus {
    // SAFETY: pointers are valid per the function contract.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return CallStatus::InvalidPointer;
    };
    let args = unsafe { bytes(args, args_len) };
    let ret: &mut [u8] = if ret.is_null() {
        &mut []
    } else {
        unsafe { slice::from_raw_parts_mut(ret, ret_len) }
    };
    let instance = unsafe { instance.as_mut() };

    trap("hostbridge_call_raw", || {
        let mut unit = ();
        let this: &mut dyn Any = match instance {
            Some(instance) => instance.data_mut(),
            None => &mut unit,
        };
        bridge.call_raw(
            this,
            MethodId(method),
            RawArgs::new(args),
            &mut RawReturn::new(ret),
        )
    })
}

/// Call a method through the boxed path.
///
/// Arguments stay owned by the caller; the returned variant (written to
/// `ret` if non-null, `Nil` for no value) is owned by the caller.
///
/// # Safety
///
/// Same as [`hostbridge_call_raw`], with `args` pointing to `argc` variants
/// and `ret` to one writable variant.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostbridge_call_boxed(
    bridge: *const Bridge,
    instance: *mut ExtensionInstance,
    method: u64,
    args: *const RawVariant,
    argc: usize,
    ret: *mut RawVariant,
) -> CallStatus {
    // SAFETY: pointers are valid per the function contract.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return CallStatus::InvalidPointer;
    };
    let raw_args: &[RawVariant] = if args.is_null() {
        &[]
    } else {
        unsafe { slice::from_raw_parts(args, argc) }
    };
    let instance = unsafe { instance.as_mut() };
    let host = bridge.host();

    trap("hostbridge_call_boxed", || {
        let values = raw_args
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Variant::duplicate_raw(host, *raw)
                    .map_err(|source| CallError::Conversion { index, source })
            })
            .collect::<Result<Vec<_>, CallError>>()?;

        let mut unit = ();
        let this: &mut dyn Any = match instance {
            Some(instance) => instance.data_mut(),
            None => &mut unit,
        };
        let value = bridge.call_boxed(this, MethodId(method), &values)?;
        if !ret.is_null() {
            let raw = value.map_or(RawVariant::NIL, |value| value.into_raw(host));
            // SAFETY: `ret` is writable per the function contract.
            unsafe { ptr::write_unaligned(ret, raw) };
        }
        Ok(())
    })
}

/// Create an extension instance of the NUL-terminated class name.
///
/// Returns null if the class is unknown.
///
/// # Safety
///
/// `bridge` must come from [`Bridge::build`]; `class` must be a valid C
/// string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostbridge_instantiate(
    bridge: *const Bridge,
    class: *const c_char,
) -> *mut ExtensionInstance {
    // SAFETY: pointers are valid per the function contract.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return ptr::null_mut();
    };
    let Some(class) = (unsafe { c_str(class) }) else {
        return ptr::null_mut();
    };
    match bridge.instantiate(class) {
        Ok(instance) => Box::into_raw(Box::new(instance)),
        Err(err) => {
            error!("hostbridge_instantiate: {err}");
            ptr::null_mut()
        }
    }
}

/// Free an instance returned by [`hostbridge_instantiate`].
///
/// # Safety
///
/// `instance` must come from [`hostbridge_instantiate`] on the same bridge
/// and must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostbridge_free(bridge: *const Bridge, instance: *mut ExtensionInstance) {
    // SAFETY: pointers are valid per the function contract.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return;
    };
    if instance.is_null() {
        return;
    }
    let instance = unsafe { Box::from_raw(instance) };
    bridge.free(*instance);
}

/// Id of the extension override of a host virtual, for [`hostbridge_call_raw`].
///
/// Returns 0 when `class` does not override `method`, and the host should
/// run its own implementation.
///
/// # Safety
///
/// `bridge` must come from [`Bridge::build`]; `class` and `method` must be
/// valid C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostbridge_get_virtual(
    bridge: *const Bridge,
    class: *const c_char,
    method: *const c_char,
) -> u64 {
    // SAFETY: pointers are valid per the function contract.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return 0;
    };
    let (Some(class), Some(method)) = (unsafe { c_str(class) }, unsafe { c_str(method) }) else {
        return 0;
    };
    bridge
        .get_virtual(class, method)
        .map_or(0, MethodId::as_u64)
}
