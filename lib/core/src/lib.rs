//! Core types shared by every conduit crate.
//!
//! This crate provides the `Result` alias used across the workspace and the
//! validated identifiers that address a stored connection in the proxy
//! service.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConnectionId, ParseKeyError, ProviderConfigKey};
