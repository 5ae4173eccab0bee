use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declares a string-backed identifier newtype.
///
/// Identifiers are opaque, compared byte-wise, and ordered lexically so they
/// can key `BTreeMap`s with deterministic iteration.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, rejecting empty or whitespace-only input.
            pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(TypeError::EmptyId);
                }
                Ok(Self(value))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
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
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Case identifier (e.g. `SAR-2023-001`). Unique and immutable.
    CaseId
);
string_id!(
    /// Customer reference the case is opened against.
    CustomerId
);
string_id!(
    /// Transaction identifier, unique within a case.
    TransactionId
);
string_id!(
    /// Typology identifier (e.g. `TYP-01`).
    TypologyId
);
string_id!(
    /// Narrative section identifier.
    SectionId
);

/// Audit event identifier (UUID v7, so ids sort by creation time).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Generate a new time-ordered event ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Short representation used in audit listings (`LOG-` + 8 hex chars).
    pub fn short_id(&self) -> String {
        let simple = self.0.simple().to_string();
        format!("LOG-{}", simple[simple.len() - 8..].to_uppercase())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.short_id())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
