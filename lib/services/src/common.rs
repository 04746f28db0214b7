//! Plumbing shared by every service integration.

use async_trait::async_trait;
use conduit_integration::{
    ApiResponse, ConnectionStatus, CredentialKind, Integration, ProxyError, ProxyRequest,
};
use rootcause::Report;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// Common surface of the service integrations.
#[async_trait]
pub trait ServiceIntegration: Send + Sync {
    /// The credential shape this service's connections carry.
    type Kind: CredentialKind;

    /// Name used in logs and in the facade's status map.
    const SERVICE_NAME: &'static str;

    /// Provider config key used when none is configured.
    const DEFAULT_PROVIDER_CONFIG_KEY: &'static str;

    /// Base URL of the upstream API, sent as the proxy's base URL override.
    const BASE_URL: &'static str;

    /// Returns the underlying integration base.
    fn integration(&self) -> &Integration<Self::Kind>;

    /// Checks the stored connection for this service.
    async fn validate_connection(&self) -> ConnectionStatus {
        self.integration().validate_connection().await
    }
}

/// Sends a request to the service's upstream and decodes the response body.
pub(crate) async fn call<S, T>(service: &S, request: ProxyRequest) -> Result<T, Report<ProxyError>>
where
    S: ServiceIntegration,
    T: DeserializeOwned,
{
    let request = request.with_base_url_override(S::BASE_URL);
    let response = service.integration().proxy_request(request).await?;
    response.json()
}

/// Encodes an outgoing request body. A failure here means nothing was sent.
pub(crate) fn request_body<T: Serialize>(value: &T) -> Result<JsonValue, Report<ProxyError>> {
    let body = serde_json::to_value(value).map_err(|e| ProxyError::RequestFailed {
        reason: format!("failed to encode request: {e}"),
    })?;
    Ok(body)
}

/// Wraps a call result in the response envelope, logging failures.
pub(crate) fn respond<T>(
    service: &'static str,
    operation: &'static str,
    result: Result<T, Report<ProxyError>>,
    message: &str,
) -> ApiResponse<T> {
    match &result {
        Ok(_) => debug!(service, operation, "call succeeded"),
        Err(report) => warn!(service, operation, error = %report.current_context(), "call failed"),
    }
    ApiResponse::from_result(result, message)
}

/// Percent-encodes one path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("float is NaN"))
        }
    }

    #[test]
    fn request_body_failure_is_request_failed() {
        let err = request_body(&Unencodable).expect_err("cannot encode");
        assert_eq!(
            err.current_context(),
            &ProxyError::RequestFailed {
                reason: "failed to encode request: float is NaN".to_string(),
            }
        );
        assert_eq!(
            err.current_context().to_string(),
            "proxy request failed: failed to encode request: float is NaN"
        );
    }

    #[test]
    fn request_body_encodes() {
        let body = request_body(&serde_json::json!({"model": "gpt-4o-mini"})).expect("encodes");
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn segment_encoding() {
        assert_eq!(segment("Sheet1!A1:B2"), "Sheet1%21A1%3AB2");
        assert_eq!(segment("My Sheet"), "My%20Sheet");
        assert_eq!(segment("abc123"), "abc123");
    }
}
