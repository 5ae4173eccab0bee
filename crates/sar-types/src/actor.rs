use std::fmt;

use serde::{Deserialize, Serialize};

/// Who issued a command or produced an audit event.
///
/// Identity is opaque: the engine never authenticates actors, it only
/// records them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The engine itself (pipeline stages, automated ingestion).
    System,
    /// A named human user.
    User(String),
}

impl Actor {
    /// Convenience constructor for a named user.
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    /// Parse an opaque identity string; `system` (any case) or blank maps to
    /// [`Actor::System`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("system") {
            Self::System
        } else {
            Self::User(trimmed.to_string())
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_system_variants() {
        assert_eq!(Actor::parse("system"), Actor::System);
        assert_eq!(Actor::parse("SYSTEM"), Actor::System);
        assert_eq!(Actor::parse("  "), Actor::System);
    }

    #[test]
    fn parse_named_user() {
        assert_eq!(Actor::parse(" Sarah Jenkins "), Actor::user("Sarah Jenkins"));
    }

    #[test]
    fn display() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(Actor::user("Mike Ross").to_string(), "Mike Ross");
    }
}
