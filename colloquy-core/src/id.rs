//! Typed ID wrappers for services, domains, sessions and topics.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Typed ID wrappers prevent mixing up a service name with a topic name.
/// These are just strings underneath; the protocol does not care what
/// the names look like, only that they compare exactly.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(ServiceId, "Stable identity of a registered service.");
typed_id!(DomainId, "Identity of a conversational domain.");
typed_id!(SessionId, "Unique identifier for a conversation session.");
typed_id!(Topic, "Name of a data slot in the turn envelope.");
