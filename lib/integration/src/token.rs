//! Authentication tokens and compile-time credential kinds.
//!
//! [`extract_token`] is the single exhaustive match over credential variants.
//! Each [`CredentialKind`] narrows that match to one variant, so an
//! integration declared as `Integration<OAuth2>` gets a `String` back from
//! `get_auth_token()` while `Integration<Basic>` gets a [`BasicAuth`].

use crate::credential::{Credential, CredentialType};
use crate::error::IntegrationError;
use serde::Serialize;
use std::fmt;

/// Username and password pair returned for basic-auth connections.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authentication material of a connection, whatever its variant.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// OAuth2 bearer access token.
    OAuth2(String),
    /// OAuth1 token; the secret stays on the credential record.
    OAuth1(String),
    /// Basic-auth pair.
    Basic(BasicAuth),
    /// Raw API key.
    ApiKey(String),
}

impl AuthToken {
    /// Returns the credential type this token was extracted from.
    #[must_use]
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::OAuth2(_) => CredentialType::OAuth2,
            Self::OAuth1(_) => CredentialType::OAuth1,
            Self::Basic(_) => CredentialType::Basic,
            Self::ApiKey(_) => CredentialType::ApiKey,
        }
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(pair) => f.debug_tuple("Basic").field(pair).finish(),
            other => write!(f, "{}(<redacted>)", other.credential_type()),
        }
    }
}

/// Extracts the authentication token from a credential record.
///
/// # Errors
///
/// Returns [`IntegrationError::UnsupportedAuthType`] if the record's tag is
/// none of the four known variants.
pub fn extract_token(credential: &Credential) -> Result<AuthToken, IntegrationError> {
    match credential {
        Credential::OAuth2(c) => Ok(AuthToken::OAuth2(c.access_token.clone())),
        Credential::OAuth1(c) => Ok(AuthToken::OAuth1(c.oauth_token.clone())),
        Credential::Basic(c) => Ok(AuthToken::Basic(BasicAuth {
            username: c.username.clone(),
            password: c.password.clone(),
        })),
        Credential::ApiKey(c) => Ok(AuthToken::ApiKey(c.api_key.clone())),
        Credential::Unsupported { auth_type, .. } => Err(IntegrationError::UnsupportedAuthType {
            auth_type: auth_type.clone(),
        }),
    }
}

/// A credential shape an integration declares at compile time.
pub trait CredentialKind: Send + Sync + 'static {
    /// What `get_auth_token()` returns for this kind.
    type Token: Send;

    /// The credential type this kind expects, or `None` if it accepts any.
    fn expected() -> Option<CredentialType>;

    /// Narrows an extracted token to this kind.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::CredentialMismatch`] if the token is of a
    /// different variant.
    fn narrow(token: AuthToken) -> Result<Self::Token, IntegrationError>;
}

fn mismatch(expected: CredentialType, token: &AuthToken) -> IntegrationError {
    IntegrationError::CredentialMismatch {
        expected,
        actual: token.credential_type(),
    }
}

macro_rules! string_kind {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl CredentialKind for $name {
            type Token = String;

            fn expected() -> Option<CredentialType> {
                Some(CredentialType::$variant)
            }

            fn narrow(token: AuthToken) -> Result<String, IntegrationError> {
                match token {
                    AuthToken::$variant(value) => Ok(value),
                    other => Err(mismatch(CredentialType::$variant, &other)),
                }
            }
        }
    };
}

string_kind!(
    /// OAuth 2.0 connections; the token is the bearer access token.
    OAuth2,
    OAuth2
);

string_kind!(
    /// OAuth 1.0a connections; the token is `oauth_token`.
    OAuth1,
    OAuth1
);

string_kind!(
    /// API key connections; the token is the key itself.
    ApiKey,
    ApiKey
);

/// Basic-auth connections; the token is the username/password pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Basic;

impl CredentialKind for Basic {
    type Token = BasicAuth;

    fn expected() -> Option<CredentialType> {
        Some(CredentialType::Basic)
    }

    fn narrow(token: AuthToken) -> Result<BasicAuth, IntegrationError> {
        match token {
            AuthToken::Basic(pair) => Ok(pair),
            other => Err(mismatch(CredentialType::Basic, &other)),
        }
    }
}

/// Connections whose credential shape is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnyCredential;

impl CredentialKind for AnyCredential {
    type Token = AuthToken;

    fn expected() -> Option<CredentialType> {
        None
    }

    fn narrow(token: AuthToken) -> Result<AuthToken, IntegrationError> {
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_each_variant() {
        assert_eq!(
            extract_token(&Credential::oauth2("tok")).expect("oauth2"),
            AuthToken::OAuth2("tok".to_string())
        );
        assert_eq!(
            extract_token(&Credential::oauth1("t", "s")).expect("oauth1"),
            AuthToken::OAuth1("t".to_string())
        );
        assert_eq!(
            extract_token(&Credential::basic("u", "p")).expect("basic"),
            AuthToken::Basic(BasicAuth {
                username: "u".to_string(),
                password: "p".to_string(),
            })
        );
        assert_eq!(
            extract_token(&Credential::api_key("k")).expect("api key"),
            AuthToken::ApiKey("k".to_string())
        );
    }

    #[test]
    fn extract_unsupported() {
        let cred = Credential::Unsupported {
            auth_type: "UNKNOWN_TAG".to_string(),
            fields: serde_json::Map::new(),
        };
        let err = extract_token(&cred).unwrap_err();
        assert_eq!(
            err,
            IntegrationError::UnsupportedAuthType {
                auth_type: "UNKNOWN_TAG".to_string()
            }
        );
    }

    #[test]
    fn narrow_matching_kind() {
        let token = extract_token(&Credential::api_key("k")).expect("api key");
        let key: String = ApiKey::narrow(token).expect("narrow");
        assert_eq!(key, "k");

        let token = extract_token(&Credential::basic("u", "p")).expect("basic");
        let pair = Basic::narrow(token).expect("narrow");
        assert_eq!(pair.username, "u");
    }

    #[test]
    fn narrow_mismatched_kind() {
        let token = extract_token(&Credential::basic("u", "p")).expect("basic");
        let err = OAuth2::narrow(token).unwrap_err();
        assert_eq!(
            err,
            IntegrationError::CredentialMismatch {
                expected: CredentialType::OAuth2,
                actual: CredentialType::Basic,
            }
        );
    }

    #[test]
    fn any_credential_passes_through() {
        let token = extract_token(&Credential::oauth1("t", "s")).expect("oauth1");
        assert_eq!(AnyCredential::narrow(token.clone()).expect("narrow"), token);
        assert_eq!(AnyCredential::expected(), None);
    }

    #[test]
    fn debug_hides_token_values() {
        let debug = format!("{:?}", AuthToken::OAuth2("tok123".to_string()));
        assert_eq!(debug, "OAUTH2(<redacted>)");
    }
}
