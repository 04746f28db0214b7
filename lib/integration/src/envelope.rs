//! The `{success, data, message}` response envelope.
//!
//! Every public service method returns an [`ApiResponse`]. Consumers depend
//! on its JSON shape, so absent fields are omitted rather than serialized as
//! `null`.

use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of a service method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Service-specific payload (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable summary (present on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure description (present on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful envelope.
    #[must_use]
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
        }
    }

    /// Creates a failed envelope.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Wraps a fallible result.
    ///
    /// A failure is described by the report's current context only; the
    /// full report tree belongs in logs, not in the envelope.
    #[must_use]
    pub fn from_result<C>(result: Result<T, Report<C>>, message: impl Into<String>) -> Self
    where
        C: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match result {
            Ok(data) => Self::ok(data, message),
            Err(report) => Self::failure(report.current_context().to_string()),
        }
    }

    /// Maps the payload, keeping the rest of the envelope.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            error: self.error,
        }
    }
}
