//! Client configuration.
//!
//! Explicit values always win. Anything left unset is read from `CONDUIT_*`
//! environment variables through the `config` crate, and resolution happens
//! once, up front, so nothing downstream ever looks at the environment.

use crate::error::{ConfigError, MissingInput};
use conduit_core::{ConnectionId, ProviderConfigKey, Result};
use conduit_services::{
    GmailIntegration, LinkedInIntegration, OpenAiIntegration, ServiceIntegration,
    SheetsIntegration,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;

/// Prefix of the environment variables consulted during resolution.
pub const ENV_PREFIX: &str = "CONDUIT";

/// Proxy service host used when none is configured.
pub const DEFAULT_HOST: &str = "https://api.nango.dev";

/// Per-service provider config keys that replace the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderKeyOverrides {
    #[serde(default)]
    pub gmail: Option<String>,
    #[serde(default)]
    pub sheets: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
}

/// Explicitly supplied configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Secret key for the proxy service.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Connection every service integration is bound to.
    #[serde(default)]
    pub connection_id: Option<String>,
    /// Proxy service base URL.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub provider_keys: ProviderKeyOverrides,
}

/// What the environment may contribute, as seen through `CONDUIT_*`.
#[derive(Debug, Default, Deserialize)]
struct EnvConfig {
    secret_key: Option<String>,
    connection_id: Option<String>,
    host: Option<String>,
    gmail_provider_config_key: Option<String>,
    sheets_provider_config_key: Option<String>,
    linkedin_provider_config_key: Option<String>,
    openai_provider_config_key: Option<String>,
}

/// The provider config key each service integration uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderKeys {
    pub gmail: ProviderConfigKey,
    pub sheets: ProviderConfigKey,
    pub linkedin: ProviderConfigKey,
    pub openai: ProviderConfigKey,
}

impl ProviderKeys {
    /// The built-in key for every service.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the built-in keys are valid identifiers.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_overrides(&ProviderKeyOverrides::default())
    }

    /// Applies overrides on top of the built-in keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if an override is not a valid key.
    pub fn from_overrides(overrides: &ProviderKeyOverrides) -> Result<Self, ConfigError> {
        Ok(Self {
            gmail: provider_key(
                "gmail",
                overrides.gmail.clone(),
                GmailIntegration::DEFAULT_PROVIDER_CONFIG_KEY,
            )?,
            sheets: provider_key(
                "sheets",
                overrides.sheets.clone(),
                SheetsIntegration::DEFAULT_PROVIDER_CONFIG_KEY,
            )?,
            linkedin: provider_key(
                "linkedin",
                overrides.linkedin.clone(),
                LinkedInIntegration::DEFAULT_PROVIDER_CONFIG_KEY,
            )?,
            openai: provider_key(
                "openai",
                overrides.openai.clone(),
                OpenAiIntegration::DEFAULT_PROVIDER_CONFIG_KEY,
            )?,
        })
    }
}

fn provider_key(
    service: &str,
    value: Option<String>,
    default: &str,
) -> Result<ProviderConfigKey, ConfigError> {
    let value = non_blank(value).unwrap_or_else(|| default.to_string());
    let key = ProviderConfigKey::new(value).map_err(|e| ConfigError::InvalidValue {
        key: format!("provider_keys.{service}"),
        reason: e.to_string(),
    })?;
    Ok(key)
}

/// Fully resolved configuration.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub secret_key: SecretString,
    pub connection_id: ConnectionId,
    /// Proxy service base URL without a trailing slash.
    pub host: String,
    pub provider_keys: ProviderKeys,
}

impl ClientConfig {
    #[must_use]
    pub fn new(secret_key: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret_key.into()),
            connection_id: Some(connection_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Resolves against the given environment map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] naming every required input
    /// that is neither set explicitly nor present in `env`, and
    /// [`ConfigError::InvalidValue`] for values that do not parse.
    pub fn resolve(self, env: HashMap<String, String>) -> Result<ResolvedConfig, ConfigError> {
        let env = load_env(env)?;

        let secret_key = non_blank(self.secret_key).or_else(|| non_blank(env.secret_key));
        let connection_id = non_blank(self.connection_id).or_else(|| non_blank(env.connection_id));

        let (Some(secret_key), Some(connection_id)) = (secret_key.clone(), connection_id.clone())
        else {
            let mut missing = Vec::new();
            if secret_key.is_none() {
                missing.push(MissingInput::SecretKey);
            }
            if connection_id.is_none() {
                missing.push(MissingInput::ConnectionId);
            }
            return Err(ConfigError::MissingRequired { missing }.into());
        };

        let connection_id =
            ConnectionId::new(connection_id).map_err(|e| ConfigError::InvalidValue {
                key: "connection_id".to_string(),
                reason: e.to_string(),
            })?;

        let host = non_blank(self.host)
            .or_else(|| non_blank(env.host))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        if !(host.starts_with("https://") || host.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "host".to_string(),
                reason: format!("'{host}' is not an http(s) URL"),
            }
            .into());
        }

        let overrides = ProviderKeyOverrides {
            gmail: non_blank(self.provider_keys.gmail)
                .or_else(|| non_blank(env.gmail_provider_config_key)),
            sheets: non_blank(self.provider_keys.sheets)
                .or_else(|| non_blank(env.sheets_provider_config_key)),
            linkedin: non_blank(self.provider_keys.linkedin)
                .or_else(|| non_blank(env.linkedin_provider_config_key)),
            openai: non_blank(self.provider_keys.openai)
                .or_else(|| non_blank(env.openai_provider_config_key)),
        };

        Ok(ResolvedConfig {
            secret_key: SecretString::from(secret_key),
            connection_id,
            host: host.trim_end_matches('/').to_string(),
            provider_keys: ProviderKeys::from_overrides(&overrides)?,
        })
    }

    /// Resolves against the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub fn resolve_from_process_env(self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve(std::env::vars().collect())
    }
}

fn load_env(env: HashMap<String, String>) -> Result<EnvConfig, ConfigError> {
    let source: config::Map<String, String> = env.into_iter().collect();
    let loaded = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).source(Some(source)))
        .build()
        .and_then(|built| built.try_deserialize::<EnvConfig>())
        .map_err(|e| ConfigError::Load {
            reason: e.to_string(),
        })?;
    Ok(loaded)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
