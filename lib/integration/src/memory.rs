//! An in-memory [`ConnectionProxy`] for tests.
//!
//! Serves connections from a map and proxy responses from a queue, and
//! records every forwarded request so tests can assert on what was sent.

use crate::credential::Credential;
use crate::error::ProxyError;
use crate::proxy::{Connection, ConnectionProxy, ForwardedRequest, ProxyResponse};
use async_trait::async_trait;
use conduit_core::{ConnectionId, ProviderConfigKey};
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    connections: HashMap<(ProviderConfigKey, ConnectionId), Connection>,
    lookup_failure: Option<ProxyError>,
    responses: VecDeque<Result<ProxyResponse, ProxyError>>,
    requests: Vec<ForwardedRequest>,
}

/// A proxy that never touches the network.
#[derive(Default)]
pub struct InMemoryProxy {
    state: Mutex<State>,
}

impl InMemoryProxy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a connection, replacing any previous one for the same pair.
    pub fn insert_connection(&self, connection: Connection) {
        let pair = (
            connection.provider_config_key.clone(),
            connection.connection_id.clone(),
        );
        self.state().connections.insert(pair, connection);
    }

    /// Stores a connection built from just its credentials.
    pub fn insert_credentials(
        &self,
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        credentials: Credential,
    ) {
        self.insert_connection(Connection::new(
            provider_config_key,
            connection_id,
            credentials,
        ));
    }

    /// Makes every subsequent connection lookup fail with `error`.
    pub fn fail_lookups_with(&self, error: ProxyError) {
        self.state().lookup_failure = Some(error);
    }

    /// Queues the response for the next proxied request.
    pub fn push_response(&self, response: ProxyResponse) {
        self.state().responses.push_back(Ok(response));
    }

    /// Queues a failure for the next proxied request.
    pub fn push_error(&self, error: ProxyError) {
        self.state().responses.push_back(Err(error));
    }

    /// Returns every request forwarded so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ForwardedRequest> {
        self.state().requests.clone()
    }

    /// Returns the most recently forwarded request.
    #[must_use]
    pub fn last_request(&self) -> Option<ForwardedRequest> {
        self.state().requests.last().cloned()
    }
}

#[async_trait]
impl ConnectionProxy for InMemoryProxy {
    async fn get_connection(
        &self,
        provider_config_key: &ProviderConfigKey,
        connection_id: &ConnectionId,
    ) -> Result<Connection, Report<ProxyError>> {
        let state = self.state();
        if let Some(error) = &state.lookup_failure {
            return Err(error.clone().into());
        }
        state
            .connections
            .get(&(provider_config_key.clone(), connection_id.clone()))
            .cloned()
            .ok_or_else(|| {
                ProxyError::ConnectionNotFound {
                    provider_config_key: provider_config_key.clone(),
                    connection_id: connection_id.clone(),
                }
                .into()
            })
    }

    async fn proxy(&self, request: ForwardedRequest) -> Result<ProxyResponse, Report<ProxyError>> {
        let mut state = self.state();
        state.requests.push(request);
        match state.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => Ok(ProxyResponse::ok(JsonValue::Object(serde_json::Map::new()))),
        }
    }
}
