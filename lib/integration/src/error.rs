//! Error types for the integration crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ProxyError`: failures reported by a `ConnectionProxy` implementation
//! - `IntegrationError`: failures of the integration base, usually wrapping
//!   a `ProxyError` as its cause

use crate::credential::CredentialType;
use conduit_core::{ConnectionId, ProviderConfigKey};
use std::fmt;

/// Errors from the proxy service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The proxy service has no connection for the pair.
    ConnectionNotFound {
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
    },
    /// The request could not be sent or the response could not be read.
    RequestFailed { reason: String },
    /// The proxy service or the upstream API answered with a non-2xx status.
    UpstreamStatus { status: u16, body: String },
    /// The response was not in the expected shape.
    InvalidResponse { reason: String },
    /// The HTTP client could not be constructed.
    ClientBuild { reason: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionNotFound {
                provider_config_key,
                connection_id,
            } => {
                write!(
                    f,
                    "no connection '{connection_id}' for provider '{provider_config_key}'"
                )
            }
            Self::RequestFailed { reason } => write!(f, "proxy request failed: {reason}"),
            Self::UpstreamStatus { status, body } => {
                if body.is_empty() {
                    write!(f, "upstream returned HTTP {status}")
                } else {
                    write!(f, "upstream returned HTTP {status}: {body}")
                }
            }
            Self::InvalidResponse { reason } => write!(f, "invalid proxy response: {reason}"),
            Self::ClientBuild { reason } => write!(f, "failed to build HTTP client: {reason}"),
        }
    }
}

impl std::error::Error for ProxyError {}

/// Errors from the credential-typed integration base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// No connection exists for the (provider, connection) pair.
    CredentialNotFound {
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
    },
    /// Fetching the connection failed for a reason other than absence.
    CredentialLookup {
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
    },
    /// The credential record carries a tag outside the four known variants.
    UnsupportedAuthType { auth_type: String },
    /// The credential is a known variant, but not the one the integration expects.
    CredentialMismatch {
        expected: CredentialType,
        actual: CredentialType,
    },
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialNotFound {
                provider_config_key,
                connection_id,
            } => {
                write!(
                    f,
                    "credentials not found for connection '{connection_id}' of provider '{provider_config_key}'"
                )
            }
            Self::CredentialLookup {
                provider_config_key,
                connection_id,
            } => {
                write!(
                    f,
                    "failed to fetch credentials for connection '{connection_id}' of provider '{provider_config_key}'"
                )
            }
            Self::UnsupportedAuthType { auth_type } => {
                write!(f, "Unsupported auth type: {auth_type}")
            }
            Self::CredentialMismatch { expected, actual } => {
                write!(f, "expected {expected} credentials, found {actual}")
            }
        }
    }
}

impl std::error::Error for IntegrationError {}
