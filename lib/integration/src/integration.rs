//! The credential-typed integration base.
//!
//! An [`Integration`] binds a service name, a provider config key and a
//! connection id to a shared [`ConnectionProxy`]. Its type parameter is a
//! [`CredentialKind`], which fixes what [`Integration::get_auth_token`]
//! returns. Nothing is cached: every call goes back to the proxy service.

use crate::credential::Credential;
use crate::error::{IntegrationError, ProxyError};
use crate::proxy::{ConnectionProxy, ProxyRequest, ProxyResponse};
use crate::token::{CredentialKind, extract_token};
use conduit_core::{ConnectionId, ProviderConfigKey};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of [`Integration::validate_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
        }
    }
}

/// A service integration bound to one stored connection.
pub struct Integration<K: CredentialKind> {
    service_name: String,
    provider_config_key: ProviderConfigKey,
    connection_id: ConnectionId,
    proxy: Arc<dyn ConnectionProxy>,
    kind: PhantomData<fn() -> K>,
}

impl<K: CredentialKind> Integration<K> {
    /// Creates an integration. All fields are fixed for its lifetime.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        proxy: Arc<dyn ConnectionProxy>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            provider_config_key,
            connection_id,
            proxy,
            kind: PhantomData,
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn provider_config_key(&self) -> &ProviderConfigKey {
        &self.provider_config_key
    }

    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Fetches the raw credential record for this connection.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::CredentialNotFound`] if the proxy service
    /// has no such connection, or [`IntegrationError::CredentialLookup`] with
    /// the proxy error as its cause for any other failure.
    #[instrument(skip(self), fields(service = %self.service_name, provider = %self.provider_config_key, connection = %self.connection_id))]
    pub async fn get_conn_credentials(&self) -> Result<Credential, Report<IntegrationError>> {
        match self
            .proxy
            .get_connection(&self.provider_config_key, &self.connection_id)
            .await
        {
            Ok(connection) => {
                debug!(auth_type = connection.credentials.auth_type(), "fetched credentials");
                Ok(connection.credentials)
            }
            Err(report) => {
                let context = match report.current_context() {
                    ProxyError::ConnectionNotFound { .. } => IntegrationError::CredentialNotFound {
                        provider_config_key: self.provider_config_key.clone(),
                        connection_id: self.connection_id.clone(),
                    },
                    _ => IntegrationError::CredentialLookup {
                        provider_config_key: self.provider_config_key.clone(),
                        connection_id: self.connection_id.clone(),
                    },
                };
                Err(report).context(context)
            }
        }
    }

    /// Returns the connection's authentication token, narrowed to `K`.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures from [`Self::get_conn_credentials`], and
    /// returns [`IntegrationError::UnsupportedAuthType`] for an unknown tag or
    /// [`IntegrationError::CredentialMismatch`] for a different known variant.
    pub async fn get_auth_token(&self) -> Result<K::Token, Report<IntegrationError>> {
        let credential = self.get_conn_credentials().await?;
        let token = extract_token(&credential).and_then(K::narrow)?;
        Ok(token)
    }

    /// Checks that the connection has the fields its credential type needs.
    ///
    /// Never fails: lookup errors are reported in the returned status.
    #[instrument(skip(self), fields(service = %self.service_name, connection = %self.connection_id))]
    pub async fn validate_connection(&self) -> ConnectionStatus {
        let checked = match self.get_conn_credentials().await {
            Ok(credential) => credential.check_required_fields(),
            Err(report) => Err(report.current_context().to_string()),
        };

        match checked {
            Ok(()) => ConnectionStatus::valid(),
            Err(reason) => {
                warn!(%reason, "connection is not valid");
                ConnectionStatus::invalid(reason)
            }
        }
    }

    /// Forwards a request through the proxy service on this connection.
    ///
    /// Any provider key or connection id already on the request is replaced
    /// with this integration's own.
    ///
    /// # Errors
    ///
    /// Proxy and upstream failures are returned unchanged.
    #[instrument(skip(self, request), fields(service = %self.service_name, method = %request.method, endpoint = %request.endpoint))]
    pub async fn proxy_request(
        &self,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, Report<ProxyError>> {
        let forwarded = request.bind(self.provider_config_key.clone(), self.connection_id.clone());
        let response = self.proxy.proxy(forwarded).await?;
        debug!(status = response.status, "proxy call completed");
        Ok(response)
    }
}

impl<K: CredentialKind> Clone for Integration<K> {
    fn clone(&self) -> Self {
        Self {
            service_name: self.service_name.clone(),
            provider_config_key: self.provider_config_key.clone(),
            connection_id: self.connection_id.clone(),
            proxy: Arc::clone(&self.proxy),
            kind: PhantomData,
        }
    }
}

impl<K: CredentialKind> fmt::Debug for Integration<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integration")
            .field("service_name", &self.service_name)
            .field("provider_config_key", &self.provider_config_key)
            .field("connection_id", &self.connection_id)
            .field("kind", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}
