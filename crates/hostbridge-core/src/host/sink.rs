//! Records handed to the host's class database at registration.

use crate::descriptor::ArgSpec;
use crate::hints::{MethodFlags, PropertyUsage, TypeHint};
use crate::type_hash::MethodId;
use crate::wire::WireType;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRegistration {
    pub name: String,
    pub parent: String,
    pub refcounted: bool,
}

/// One method as the host sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRegistration {
    pub class: String,
    pub name: String,
    pub id: MethodId,
    pub args: Vec<ArgSpec>,
    pub ret: Option<ArgSpec>,
    pub flags: MethodFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRegistration {
    pub class: String,
    pub name: String,
    pub wire: WireType,
    pub hint: TypeHint,
    pub usage: PropertyUsage,
    pub getter: String,
    pub setter: Option<String>,
    /// Editor group the property is listed under.
    pub group: Option<String>,
}

/// Opens an editor group; properties announced after it belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyGroupRegistration {
    pub class: String,
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRegistration {
    pub class: String,
    pub name: String,
    pub args: Vec<(String, ArgSpec)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRegistration {
    pub class: String,
    pub name: String,
    pub value: i64,
}

/// The host's class database.
///
/// Receives a class only after every member of it was built successfully.
pub trait ClassSink: Send + Sync {
    fn register_class(&self, class: ClassRegistration);
    fn register_method(&self, method: MethodRegistration);
    fn register_property_group(&self, group: PropertyGroupRegistration);
    fn register_property(&self, property: PropertyRegistration);
    fn register_signal(&self, signal: SignalRegistration);
    fn register_constant(&self, constant: ConstantRegistration);
}
