use core::fmt;

use serde::{Deserialize, Serialize};

/// Declares a string-backed identifier with value equality and ordering.
///
/// Identifiers are opaque: two ids are equal exactly when their strings are
/// equal, so composite keys built from them never collide the way
/// concatenated strings do.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Named forecast scenario, unique within a project.
    ScenarioKey
);

string_id!(
    /// Demand category forecast independently before consolidation.
    SectorName
);

string_id!(
    /// Forecasting method name, e.g. `SLR` or `MLR`.
    ModelId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(ScenarioKey::from("Base"), ScenarioKey::new("Base".to_string()));
        assert_ne!(SectorName::from("a_b"), SectorName::from("a-b"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ModelId::from("SLR")).unwrap();
        assert_eq!(json, "\"SLR\"");
        let back: ModelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "SLR");
    }
}
