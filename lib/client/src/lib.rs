//! Client entry point for conduit.
//!
//! Resolves configuration (explicit values first, `CONDUIT_*` environment
//! variables second), talks to the proxy service over HTTP, and exposes every
//! service integration through the [`Conduit`] facade.

pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::Conduit;
pub use config::{ClientConfig, ProviderKeyOverrides, ProviderKeys, ResolvedConfig};
pub use error::{ConfigError, MissingInput};
pub use http::HttpConnectionProxy;
