//! The `Conduit` facade.

use crate::config::{ClientConfig, ProviderKeys, ResolvedConfig};
use crate::error::ConfigError;
use crate::http::HttpConnectionProxy;
use conduit_core::ConnectionId;
use conduit_integration::{ConnectionProxy, ConnectionStatus};
use conduit_services::{
    GmailIntegration, LinkedInIntegration, OpenAiIntegration, ServiceIntegration,
    SheetsIntegration,
};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Every service integration, bound to one connection and one proxy.
#[derive(Debug, Clone)]
pub struct Conduit {
    gmail: GmailIntegration,
    sheets: SheetsIntegration,
    linkedin: LinkedInIntegration,
    openai: OpenAiIntegration,
}

impl Conduit {
    /// Resolves `config` against the process environment and connects over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if resolution fails or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Report<ConfigError>> {
        let resolved = config.resolve_from_process_env()?;
        let host = resolved.host.clone();
        Self::from_resolved(resolved).context(ConfigError::ClientBuild { host })
    }

    /// Connects over HTTP using already resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`conduit_integration::ProxyError::ClientBuild`] if the HTTP
    /// client cannot be built.
    pub fn from_resolved(
        config: ResolvedConfig,
    ) -> Result<Self, Report<conduit_integration::ProxyError>> {
        let proxy = HttpConnectionProxy::new(&config)?;
        info!(host = %config.host, connection = %config.connection_id, "conduit client ready");
        Ok(Self::with_proxy(
            config.connection_id,
            Arc::new(proxy),
            config.provider_keys,
        ))
    }

    /// Wires the integrations to an arbitrary proxy.
    #[must_use]
    pub fn with_proxy(
        connection_id: ConnectionId,
        proxy: Arc<dyn ConnectionProxy>,
        keys: ProviderKeys,
    ) -> Self {
        Self {
            gmail: GmailIntegration::new(keys.gmail, connection_id.clone(), Arc::clone(&proxy)),
            sheets: SheetsIntegration::new(keys.sheets, connection_id.clone(), Arc::clone(&proxy)),
            linkedin: LinkedInIntegration::new(
                keys.linkedin,
                connection_id.clone(),
                Arc::clone(&proxy),
            ),
            openai: OpenAiIntegration::new(keys.openai, connection_id, proxy),
        }
    }

    #[must_use]
    pub fn gmail(&self) -> &GmailIntegration {
        &self.gmail
    }

    #[must_use]
    pub fn sheets(&self) -> &SheetsIntegration {
        &self.sheets
    }

    #[must_use]
    pub fn linkedin(&self) -> &LinkedInIntegration {
        &self.linkedin
    }

    #[must_use]
    pub fn openai(&self) -> &OpenAiIntegration {
        &self.openai
    }

    /// Validates every service's connection concurrently.
    pub async fn validate_all(&self) -> BTreeMap<&'static str, ConnectionStatus> {
        let (gmail, sheets, linkedin, openai) = tokio::join!(
            self.gmail.validate_connection(),
            self.sheets.validate_connection(),
            self.linkedin.validate_connection(),
            self.openai.validate_connection(),
        );
        BTreeMap::from([
            (GmailIntegration::SERVICE_NAME, gmail),
            (SheetsIntegration::SERVICE_NAME, sheets),
            (LinkedInIntegration::SERVICE_NAME, linkedin),
            (OpenAiIntegration::SERVICE_NAME, openai),
        ])
    }
}
