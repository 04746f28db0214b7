//! Configuration errors.

use crate::config::ENV_PREFIX;
use std::fmt;

/// A required input that was neither set explicitly nor in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    SecretKey,
    ConnectionId,
}

impl MissingInput {
    /// Name of the explicit configuration field.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::SecretKey => "secret_key",
            Self::ConnectionId => "connection_id",
        }
    }

    /// Name of the environment variable consulted as a fallback.
    #[must_use]
    pub fn env_var(self) -> String {
        format!("{ENV_PREFIX}_{}", self.field().to_ascii_uppercase())
    }
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` (or {})", self.field(), self.env_var())
    }
}

/// Errors raised while resolving client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required inputs are absent.
    MissingRequired { missing: Vec<MissingInput> },
    /// A value is present but unusable.
    InvalidValue { key: String, reason: String },
    /// The configuration sources could not be read.
    Load { reason: String },
    /// Configuration resolved, but no HTTP client could be built from it.
    ClientBuild { host: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { missing } => {
                write!(f, "missing required configuration: ")?;
                for (i, input) in missing.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{input}")?;
                }
                Ok(())
            }
            Self::InvalidValue { key, reason } => write!(f, "invalid value for {key}: {reason}"),
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::ClientBuild { host } => write!(f, "failed to build the HTTP client for {host}"),
        }
    }
}

impl std::error::Error for ConfigError {}
