//! Credential records as stored by the proxy service.
//!
//! A credential is a tagged union keyed by its `type` field. Records with a
//! tag this library does not understand are kept as
//! [`Credential::Unsupported`] so that fetching them succeeds and only token
//! extraction fails. Secrets never appear in `Debug` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

const REDACTED: &str = "<redacted>";

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { REDACTED }
}

/// The four credential shapes understood by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    /// OAuth 2.0 bearer token.
    #[serde(rename = "OAUTH2")]
    OAuth2,
    /// OAuth 1.0a token pair.
    #[serde(rename = "OAUTH1")]
    OAuth1,
    /// Username and password.
    #[serde(rename = "BASIC")]
    Basic,
    /// Opaque API key.
    #[serde(rename = "API_KEY")]
    ApiKey,
}

impl CredentialType {
    /// Returns the wire tag used in the `type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OAuth2 => "OAUTH2",
            Self::OAuth1 => "OAUTH1",
            Self::Basic => "BASIC",
            Self::ApiKey => "API_KEY",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.0 credential fields.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Credentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Provider response the token was minted from, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<JsonValue>,
}

impl OAuth2Credentials {
    /// Creates OAuth2 credentials holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Returns true if the token carries an expiry at or before `now`.
    ///
    /// Informational only: nothing in this crate refreshes tokens.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

impl fmt::Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Credentials")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// OAuth 1.0a credential fields.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth1Credentials {
    #[serde(default)]
    pub oauth_token: String,
    #[serde(default)]
    pub oauth_token_secret: String,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("oauth_token", &redact(&self.oauth_token))
            .field("oauth_token_secret", &redact(&self.oauth_token_secret))
            .finish()
    }
}

/// Basic authentication fields.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// API key fields.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyCredentials {
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
}

impl fmt::Debug for ApiKeyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyCredentials")
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// A credential record, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    OAuth2(OAuth2Credentials),
    OAuth1(OAuth1Credentials),
    Basic(BasicCredentials),
    ApiKey(ApiKeyCredentials),
    /// A record whose tag is none of the four known variants.
    Unsupported {
        auth_type: String,
        fields: Map<String, JsonValue>,
    },
}

impl Credential {
    /// Creates OAuth2 credentials.
    #[must_use]
    pub fn oauth2(access_token: impl Into<String>) -> Self {
        Self::OAuth2(OAuth2Credentials::new(access_token))
    }

    /// Creates OAuth1 credentials.
    #[must_use]
    pub fn oauth1(oauth_token: impl Into<String>, oauth_token_secret: impl Into<String>) -> Self {
        Self::OAuth1(OAuth1Credentials {
            oauth_token: oauth_token.into(),
            oauth_token_secret: oauth_token_secret.into(),
        })
    }

    /// Creates basic auth credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic(BasicCredentials {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Creates API key credentials.
    #[must_use]
    pub fn api_key(api_key: impl Into<String>) -> Self {
        Self::ApiKey(ApiKeyCredentials {
            api_key: api_key.into(),
        })
    }

    /// Returns the credential type, or `None` for an unsupported tag.
    #[must_use]
    pub fn credential_type(&self) -> Option<CredentialType> {
        match self {
            Self::OAuth2(_) => Some(CredentialType::OAuth2),
            Self::OAuth1(_) => Some(CredentialType::OAuth1),
            Self::Basic(_) => Some(CredentialType::Basic),
            Self::ApiKey(_) => Some(CredentialType::ApiKey),
            Self::Unsupported { .. } => None,
        }
    }

    /// Returns the wire tag of this record, including unsupported ones.
    #[must_use]
    pub fn auth_type(&self) -> &str {
        match self {
            Self::Unsupported { auth_type, .. } => auth_type,
            known => known
                .credential_type()
                .map_or("", CredentialType::as_str),
        }
    }

    /// Checks that the fields required by the active variant are non-empty.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason naming what is missing.
    pub fn check_required_fields(&self) -> Result<(), String> {
        match self {
            Self::OAuth2(c) if c.access_token.is_empty() => Err("Missing access token".to_string()),
            Self::OAuth1(c) if c.oauth_token.is_empty() => Err("Missing OAuth token".to_string()),
            Self::Basic(c) if c.username.is_empty() || c.password.is_empty() => {
                Err("Missing username or password".to_string())
            }
            Self::ApiKey(c) if c.api_key.is_empty() => Err("Missing API key".to_string()),
            Self::Unsupported { auth_type, .. } => Err(format!("Unsupported auth type: {auth_type}")),
            _ => Ok(()),
        }
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            Self::OAuth2(c) => serde_json::to_value(c),
            Self::OAuth1(c) => serde_json::to_value(c),
            Self::Basic(c) => serde_json::to_value(c),
            Self::ApiKey(c) => serde_json::to_value(c),
            Self::Unsupported { fields, .. } => Ok(JsonValue::Object(fields.clone())),
        }
        .map_err(serde::ser::Error::custom)?;

        let mut map = match body {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(
            "type".to_string(),
            JsonValue::String(self.auth_type().to_string()),
        );
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, JsonValue>::deserialize(deserializer)?;
        let auth_type = match fields.get("type") {
            Some(JsonValue::String(tag)) => tag.clone(),
            Some(other) => other.to_string(),
            None => return Err(serde::de::Error::missing_field("type")),
        };

        let parsed = match auth_type.as_str() {
            "OAUTH2" => serde_json::from_value(JsonValue::Object(fields)).map(Self::OAuth2),
            "OAUTH1" => serde_json::from_value(JsonValue::Object(fields)).map(Self::OAuth1),
            "BASIC" => serde_json::from_value(JsonValue::Object(fields)).map(Self::Basic),
            "API_KEY" => serde_json::from_value(JsonValue::Object(fields)).map(Self::ApiKey),
            _ => {
                fields.remove("type");
                return Ok(Self::Unsupported { auth_type, fields });
            }
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
