//! The boundary to the external proxy service.
//!
//! Everything this library sends to a third-party API goes through a
//! [`ConnectionProxy`], which looks up stored connections and forwards
//! requests with the right credential injected.

use crate::credential::Credential;
use crate::error::ProxyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::{ConnectionId, ProviderConfigKey};
use rootcause::Report;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A stored connection as returned by the proxy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: ConnectionId,
    pub provider_config_key: ProviderConfigKey,
    /// Upstream provider name, when it differs from the config key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub credentials: Credential,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Creates a connection record with no metadata.
    #[must_use]
    pub fn new(
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        credentials: Credential,
    ) -> Self {
        Self {
            connection_id,
            provider_config_key,
            provider: None,
            credentials,
            metadata: None,
            created_at: None,
        }
    }

    /// Decodes a lookup response body for the requested pair.
    ///
    /// Only `credentials` is required. The identity always comes from the
    /// lookup itself, so bodies that omit or echo it decode the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if `credentials` is absent or malformed.
    pub fn from_lookup(
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        body: &str,
    ) -> Result<Self, serde_json::Error> {
        let body: LookupBody = serde_json::from_str(body)?;
        Ok(Self {
            connection_id,
            provider_config_key,
            provider: body.provider,
            credentials: body.credentials,
            metadata: body.metadata,
            created_at: body.created_at,
        })
    }
}

/// Wire shape of a connection lookup; everything but `credentials` is optional.
#[derive(Deserialize)]
struct LookupBody {
    #[serde(default)]
    provider: Option<String>,
    credentials: Credential,
    #[serde(default)]
    metadata: Option<JsonValue>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// HTTP methods the proxy service forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Returns the method name in upper case.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// A request as built by an integration method.
///
/// The provider key and connection id fields exist so callers can pass a
/// request through unchanged, but `Integration::proxy_request` always
/// overwrites them with the integration's own values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_key: Option<ProviderConfigKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
}

impl ProxyRequest {
    /// Creates a request for the given method and endpoint.
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            base_url_override: None,
            data: None,
            headers: BTreeMap::new(),
            params: Vec::new(),
            provider_config_key: None,
            connection_id: None,
        }
    }

    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    #[must_use]
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    #[must_use]
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, endpoint)
    }

    #[must_use]
    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, endpoint)
    }

    #[must_use]
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    /// Routes the request to a different upstream base URL.
    #[must_use]
    pub fn with_base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }

    /// Adds a header forwarded to the upstream API.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter. Repeated names are kept in order.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Binds the request to a connection, producing what is sent to the proxy.
    #[must_use]
    pub fn bind(
        self,
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
    ) -> ForwardedRequest {
        ForwardedRequest {
            provider_config_key,
            connection_id,
            method: self.method,
            endpoint: self.endpoint,
            base_url_override: self.base_url_override,
            data: self.data,
            headers: self.headers,
            params: self.params,
        }
    }
}

/// A request bound to a connection, ready for the proxy service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedRequest {
    pub provider_config_key: ProviderConfigKey,
    pub connection_id: ConnectionId,
    pub method: HttpMethod,
    pub endpoint: String,
    pub base_url_override: Option<String>,
    pub data: Option<JsonValue>,
    pub headers: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
}

/// The upstream response relayed by the proxy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body; `null` when the upstream sent nothing.
    pub data: JsonValue,
}

impl ProxyResponse {
    /// Creates a 200 response with the given body.
    #[must_use]
    pub fn ok(data: JsonValue) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            data,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidResponse`] if the body has a different shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Report<ProxyError>> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            ProxyError::InvalidResponse {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Access to the external proxy service.
///
/// Implementations must be safe to share across tasks; integrations hold
/// them behind an `Arc`.
#[async_trait]
pub trait ConnectionProxy: Send + Sync {
    /// Fetches the stored connection, including its credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ConnectionNotFound`] if no connection exists for
    /// the pair, or another `ProxyError` if the lookup fails.
    async fn get_connection(
        &self,
        provider_config_key: &ProviderConfigKey,
        connection_id: &ConnectionId,
    ) -> Result<Connection, Report<ProxyError>>;

    /// Forwards a request to the upstream API.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx upstream status.
    async fn proxy(&self, request: ForwardedRequest) -> Result<ProxyResponse, Report<ProxyError>>;
}
