//! Identity types for battles, armies, units, models, and users

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a battle
    BattleId,
    "battle"
);

string_id!(
    /// Unique identifier for an army within a battle
    ArmyId,
    "army"
);

string_id!(
    /// Unique identifier for a unit within an army
    UnitId,
    "unit"
);

string_id!(
    /// Unique identifier for a model within a unit
    ModelId,
    "model"
);

string_id!(
    /// Identifier of the player (or system) performing an operation
    UserId,
    "user"
);

impl UserId {
    /// The system user, for automated engine actions
    pub fn system() -> Self {
        Self::new("system")
    }

    /// Check if this is the system user
    pub fn is_system(&self) -> bool {
        self.0 == "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", BattleId::new("b1")), "battle:b1");
        assert_eq!(format!("{}", UnitId::new("u7")), "unit:u7");
    }

    #[test]
    fn test_system_user() {
        assert!(UserId::system().is_system());
        assert!(!UserId::new("alice").is_system());
    }
}
