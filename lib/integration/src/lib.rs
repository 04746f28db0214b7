//! Credential-typed integration base for conduit.
//!
//! This crate provides:
//!
//! - **Credentials**: the tagged union of OAuth2, OAuth1, Basic and API key records
//! - **Credential kinds**: compile-time narrowing of what `get_auth_token()` returns
//! - **Integration**: the base every service integration is built on
//! - **Proxy seam**: the `ConnectionProxy` trait and its request/response types
//! - **Envelope**: the `{success, data, message}` shape returned to callers

pub mod credential;
pub mod envelope;
pub mod error;
pub mod integration;
pub mod memory;
pub mod proxy;
pub mod token;

pub use credential::{
    ApiKeyCredentials, BasicCredentials, Credential, CredentialType, OAuth1Credentials,
    OAuth2Credentials,
};
pub use envelope::ApiResponse;
pub use error::{IntegrationError, ProxyError};
pub use integration::{ConnectionStatus, Integration};
pub use memory::InMemoryProxy;
pub use proxy::{
    Connection, ConnectionProxy, ForwardedRequest, HttpMethod, ProxyRequest, ProxyResponse,
};
pub use token::{
    AnyCredential, ApiKey, AuthToken, Basic, BasicAuth, CredentialKind, OAuth1, OAuth2,
    extract_token,
};
