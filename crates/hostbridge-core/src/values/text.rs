//! String-like host values.

use super::{HostHandle, handle_wrapper, unexpected};
use crate::error::ConversionError;
use crate::host::{HostRef, HostValue};

macro_rules! string_like {
    ($(#[$meta:meta])* $name:ident => $variant:ident) => {
        handle_wrapper!($(#[$meta])* $name);

        impl $name {
            /// Allocate a new host string.
            pub fn new(host: &HostRef, value: &str) -> Self {
                Self(HostHandle::alloc(host, HostValue::$variant(value.to_string())))
            }

            /// Copy the contents out of the host.
            pub fn read(&self) -> Result<String, ConversionError> {
                match self.0.read()? {
                    HostValue::$variant(value) => Ok(value),
                    other => Err(unexpected(stringify!($variant), &other)),
                }
            }
        }
    };
}

string_like!(
    /// Host-owned text.
    Text => String
);

string_like!(
    /// Interned host identifier.
    Name => StringName
);

string_like!(
    /// Path to a node in the host's scene tree.
    NodePath => NodePath
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use std::sync::Arc;

    #[test]
    fn text_round_trip() {
        let host: HostRef = Arc::new(LocalHost::new());
        let text = Text::new(&host, "hello");
        assert_eq!(text.read().unwrap(), "hello");

        let copy = text.clone();
        assert_eq!(copy, text);
        assert_eq!(host.ref_count(text.handle()), Some(2));
    }

    #[test]
    fn wrong_payload_kind() {
        let host: HostRef = Arc::new(LocalHost::new());
        let raw = host.alloc(HostValue::NodePath("a/b".into()));
        let text = Text::adopt(&host, raw).unwrap();
        assert_eq!(
            text.read(),
            Err(ConversionError::TypeMismatch {
                expected: "String",
                actual: "NodePath"
            })
        );
        let path = NodePath::duplicate(&host, raw).unwrap();
        assert_eq!(path.read().unwrap(), "a/b");
    }

    #[test]
    fn name_debug() {
        let host: HostRef = Arc::new(LocalHost::new());
        let name = Name::new(&host, "ready");
        assert!(format!("{name:?}").starts_with("Name(0x"));
    }
}
