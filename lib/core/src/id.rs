//! Strongly-typed identifiers for stored connections.
//!
//! A connection in the proxy service is addressed by the pair
//! (`ProviderConfigKey`, `ConnectionId`). Both are opaque strings chosen
//! outside this library, so the only validation is that they are non-empty
//! and carry no whitespace.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an identifier from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyError {
    /// The type of identifier that failed to parse.
    pub key_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.key_type, self.reason)
    }
}

impl std::error::Error for ParseKeyError {}

fn validate(key_type: &'static str, value: &str) -> Result<(), ParseKeyError> {
    if value.is_empty() {
        return Err(ParseKeyError {
            key_type,
            reason: "value is empty".to_string(),
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ParseKeyError {
            key_type,
            reason: format!("'{value}' contains whitespace"),
        });
    }
    Ok(())
}

/// Macro to generate a validated string identifier.
macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier, validating its contents.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is empty or contains whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, ParseKeyError> {
                let value = value.into();
                validate(stringify!($name), &value)?;
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseKeyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ParseKeyError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                Self::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_key!(
    /// Identifies which third-party API integration a connection belongs to
    /// (e.g. `google-mail`, `linkedin`).
    ProviderConfigKey
);

define_key!(
    /// Identifies one end user's authorized link to a provider.
    ConnectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_raw_value() {
        let key = ProviderConfigKey::new("google-mail").expect("valid key");
        assert_eq!(key.to_string(), "google-mail");
        assert_eq!(key.as_str(), "google-mail");
    }

    #[test]
    fn parse_valid() {
        let id: ConnectionId = "user-42".parse().expect("should parse");
        assert_eq!(id.as_ref(), "user-42");
    }

    #[test]
    fn parse_empty() {
        let err = ConnectionId::new("").unwrap_err();
        assert_eq!(err.key_type, "ConnectionId");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn parse_whitespace() {
        let err: ParseKeyError = "google mail".parse::<ProviderConfigKey>().unwrap_err();
        assert_eq!(err.key_type, "ProviderConfigKey");
        assert!(err.reason.contains("whitespace"));
    }

    #[test]
    fn deserialize_rejects_invalid() {
        let ok: ConnectionId = serde_json::from_str("\"c1\"").expect("deserialize");
        assert_eq!(ok.as_str(), "c1");

        let bad: Result<ConnectionId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn serializes_transparently() {
        let key = ProviderConfigKey::new("openai").expect("valid key");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"openai\"");
    }
}
