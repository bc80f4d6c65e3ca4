//! Strongly-typed identifiers for provider-issued and configured names.
//!
//! Unlike locally generated IDs, every identifier here originates outside
//! the process: endpoint ids come from operator configuration, while
//! organization and user ids are issued by the identity provider. They are
//! therefore thin wrappers over the strings they arrive as.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a strongly-typed ID wrapper around a string.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an ID.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

define_id!(
    /// Identifier of a configured identity-provider endpoint.
    ///
    /// Endpoint ids are domain names such as `login.example.com`.
    EndpointId
);

define_id!(
    /// Organization identifier issued by the identity provider.
    OrgId
);

define_id!(
    /// User identifier issued by the identity provider.
    UserId
);
