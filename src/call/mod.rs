//! The two entry points stored on every descriptor.
//!
//! Both wrap the same [`Invoker`](crate::method::Invoker); they differ only
//! in where arguments come from and where the result goes.
//!
//! - [`boxed`]: self-describing [`Variant`](hostbridge_core::Variant)
//!   arguments, checked slot by slot
//! - [`transcode`]: a packed raw buffer laid out by the descriptor, decoded
//!   and encoded through the per-wire-type tables

pub mod boxed;
pub mod transcode;
