//! HTTP implementation of [`ConnectionProxy`] against the proxy service.

use crate::config::ResolvedConfig;
use async_trait::async_trait;
use conduit_core::{ConnectionId, ProviderConfigKey};
use conduit_integration::{
    Connection, ConnectionProxy, ForwardedRequest, HttpMethod, ProxyError, ProxyResponse,
};
use reqwest::{Client, Method, Request, StatusCode};
use rootcause::Report;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the proxy service over HTTPS, authenticating with the secret key.
pub struct HttpConnectionProxy {
    client: Client,
    host: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for HttpConnectionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnectionProxy")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn request_failed(e: reqwest::Error) -> ProxyError {
    ProxyError::RequestFailed {
        reason: e.to_string(),
    }
}

impl HttpConnectionProxy {
    /// Creates a proxy client for the resolved host and secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ResolvedConfig) -> Result<Self, Report<ProxyError>> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProxyError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            host: config.host.clone(),
            secret_key: SecretString::from(config.secret_key.expose_secret().to_owned()),
        })
    }

    /// Builds the connection lookup request without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::RequestFailed`] if the URL is malformed.
    pub fn build_connection_request(
        &self,
        provider_config_key: &ProviderConfigKey,
        connection_id: &ConnectionId,
    ) -> Result<Request, Report<ProxyError>> {
        let url = format!(
            "{}/connection/{}",
            self.host,
            urlencoding::encode(connection_id.as_str())
        );
        let request = self
            .client
            .get(url)
            .bearer_auth(self.secret_key.expose_secret())
            .query(&[("provider_config_key", provider_config_key.as_str())])
            .build()
            .map_err(request_failed)?;
        Ok(request)
    }

    /// Builds the forwarded proxy request without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::RequestFailed`] if the URL or a header is malformed.
    pub fn build_proxy_request(&self, request: &ForwardedRequest) -> Result<Request, Report<ProxyError>> {
        let url = format!(
            "{}/proxy/{}",
            self.host,
            request.endpoint.trim_start_matches('/')
        );
        let mut builder = self
            .client
            .request(method(request.method), url)
            .bearer_auth(self.secret_key.expose_secret())
            .header("Provider-Config-Key", request.provider_config_key.as_str())
            .header("Connection-Id", request.connection_id.as_str());
        if let Some(base_url) = &request.base_url_override {
            builder = builder.header("Base-Url-Override", base_url.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }
        let built = builder.build().map_err(request_failed)?;
        Ok(built)
    }
}

/// Reads a response body as JSON, falling back to a JSON string for
/// non-JSON bodies and `null` for empty ones.
fn parse_body(text: &str) -> JsonValue {
    if text.trim().is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

#[async_trait]
impl ConnectionProxy for HttpConnectionProxy {
    #[instrument(skip(self), fields(provider = %provider_config_key, connection = %connection_id))]
    async fn get_connection(
        &self,
        provider_config_key: &ProviderConfigKey,
        connection_id: &ConnectionId,
    ) -> Result<Connection, Report<ProxyError>> {
        let request = self.build_connection_request(provider_config_key, connection_id)?;
        let response = self.client.execute(request).await.map_err(request_failed)?;
        let status = response.status();
        debug!(status = status.as_u16(), "connection lookup answered");

        if status == StatusCode::NOT_FOUND {
            return Err(ProxyError::ConnectionNotFound {
                provider_config_key: provider_config_key.clone(),
                connection_id: connection_id.clone(),
            }
            .into());
        }
        let text = response.text().await.map_err(request_failed)?;
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let connection = Connection::from_lookup(
            provider_config_key.clone(),
            connection_id.clone(),
            &text,
        )
        .map_err(|e| ProxyError::InvalidResponse {
            reason: format!("connection record: {e}"),
        })?;
        Ok(connection)
    }

    #[instrument(skip(self, request), fields(method = %request.method, endpoint = %request.endpoint, provider = %request.provider_config_key))]
    async fn proxy(&self, request: ForwardedRequest) -> Result<ProxyResponse, Report<ProxyError>> {
        let built = self.build_proxy_request(&request)?;
        let response = self.client.execute(built).await.map_err(request_failed)?;
        let status = response.status();
        debug!(status = status.as_u16(), "proxy answered");

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(request_failed)?;

        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        Ok(ProxyResponse {
            status: status.as_u16(),
            headers,
            data: parse_body(&text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use conduit_integration::ProxyRequest;
    use serde_json::json;
    use std::collections::HashMap;

    fn proxy() -> HttpConnectionProxy {
        let config = ClientConfig::new("s1", "c1")
            .resolve(HashMap::new())
            .expect("resolves");
        HttpConnectionProxy::new(&config).expect("client builds")
    }

    /// Serves one canned HTTP response on a local port and hands back the
    /// request head it received.
    async fn serve_once(
        status_line: &'static str,
        headers: &'static [(&'static str, &'static str)],
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local listener");
        let host = format!("http://{}", listener.local_addr().expect("local addr"));

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut chunk = [0_u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.expect("read request");
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
            }

            let mut response = format!("HTTP/1.1 {status_line}\r\n");
            for (name, value) in headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ));
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.expect("shutdown");
            String::from_utf8_lossy(&received).into_owned()
        });

        (host, handle)
    }

    fn local_proxy(host: &str) -> HttpConnectionProxy {
        let config = ClientConfig::new("s1", "c1")
            .with_host(host)
            .resolve(HashMap::new())
            .expect("resolves");
        HttpConnectionProxy::new(&config).expect("client builds")
    }

    fn pair() -> (ProviderConfigKey, ConnectionId) {
        (
            ProviderConfigKey::new("google-mail").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
        )
    }

    #[tokio::test]
    async fn lookup_404_is_connection_not_found() {
        let (host, server) = serve_once("404 Not Found", &[], r#"{"error":"unknown_connection"}"#).await;
        let (key, id) = pair();

        let err = local_proxy(&host)
            .get_connection(&key, &id)
            .await
            .expect_err("404");

        assert_eq!(
            err.current_context(),
            &ProxyError::ConnectionNotFound {
                provider_config_key: key,
                connection_id: id,
            }
        );
        let head = server.await.expect("server task");
        assert!(head.starts_with("GET /connection/c1?provider_config_key=google-mail HTTP/1.1"));
        assert!(head.to_ascii_lowercase().contains("authorization: bearer s1"));
    }

    #[tokio::test]
    async fn lookup_500_is_upstream_status() {
        let (host, server) = serve_once("500 Internal Server Error", &[], "boom").await;
        let (key, id) = pair();

        let err = local_proxy(&host)
            .get_connection(&key, &id)
            .await
            .expect_err("500");

        assert_eq!(
            err.current_context(),
            &ProxyError::UpstreamStatus {
                status: 500,
                body: "boom".to_string(),
            }
        );
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn lookup_decodes_credentials_only_body() {
        let (host, server) = serve_once(
            "200 OK",
            &[("Content-Type", "application/json")],
            r#"{"credentials":{"type":"OAUTH2","access_token":"tok123"}}"#,
        )
        .await;
        let (key, id) = pair();

        let connection = local_proxy(&host)
            .get_connection(&key, &id)
            .await
            .expect("lookup succeeds");

        assert_eq!(connection.provider_config_key, key);
        assert_eq!(connection.connection_id, id);
        assert_eq!(connection.credentials.auth_type(), "OAUTH2");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn proxy_201_keeps_headers_and_empty_body() {
        let (host, server) = serve_once("201 Created", &[("X-RestLi-Id", "urn:li:share:2")], "").await;
        let (key, id) = pair();

        let response = local_proxy(&host)
            .proxy(ProxyRequest::get("/v2/ugcPosts").bind(key, id))
            .await
            .expect("201 is success");

        assert_eq!(response.status, 201);
        assert_eq!(response.data, JsonValue::Null);
        assert_eq!(
            response.headers.get("x-restli-id").map(String::as_str),
            Some("urn:li:share:2")
        );
        let head = server.await.expect("server task");
        assert!(head.starts_with("GET /proxy/v2/ugcPosts HTTP/1.1"));
        let head = head.to_ascii_lowercase();
        assert!(head.contains("provider-config-key: google-mail"));
        assert!(head.contains("connection-id: c1"));
    }

    #[tokio::test]
    async fn proxy_text_body_becomes_json_string() {
        let (host, server) = serve_once("200 OK", &[("Content-Type", "text/plain")], "pong").await;
        let (key, id) = pair();

        let response = local_proxy(&host)
            .proxy(ProxyRequest::get("/ping").bind(key, id))
            .await
            .expect("200");

        assert_eq!(response.data, json!("pong"));
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn proxy_non_2xx_is_upstream_status() {
        let (host, server) = serve_once("502 Bad Gateway", &[], "upstream down").await;
        let (key, id) = pair();

        let err = local_proxy(&host)
            .proxy(ProxyRequest::get("/v1/models").bind(key, id))
            .await
            .expect_err("502");

        assert_eq!(
            err.current_context(),
            &ProxyError::UpstreamStatus {
                status: 502,
                body: "upstream down".to_string(),
            }
        );
        server.await.expect("server task");
    }

    fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn connection_request_shape() {
        let request = proxy()
            .build_connection_request(
                &ProviderConfigKey::new("google-mail").expect("valid key"),
                &ConnectionId::new("c1").expect("valid id"),
            )
            .expect("builds");

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://api.nango.dev/connection/c1?provider_config_key=google-mail"
        );
        assert_eq!(header(&request, "authorization"), Some("Bearer s1"));
    }

    #[test]
    fn proxy_request_shape() {
        let forwarded = ProxyRequest::post("/gmail/v1/users/me/messages/send")
            .with_base_url_override("https://gmail.googleapis.com")
            .with_header("X-Custom", "yes")
            .with_param("alt", "json")
            .with_data(json!({"raw": "abc"}))
            .bind(
                ProviderConfigKey::new("google-mail").expect("valid key"),
                ConnectionId::new("c1").expect("valid id"),
            );

        let request = proxy().build_proxy_request(&forwarded).expect("builds");

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.nango.dev/proxy/gmail/v1/users/me/messages/send?alt=json"
        );
        assert_eq!(header(&request, "authorization"), Some("Bearer s1"));
        assert_eq!(header(&request, "provider-config-key"), Some("google-mail"));
        assert_eq!(header(&request, "connection-id"), Some("c1"));
        assert_eq!(
            header(&request, "base-url-override"),
            Some("https://gmail.googleapis.com")
        );
        assert_eq!(header(&request, "x-custom"), Some("yes"));
        assert_eq!(header(&request, "content-type"), Some("application/json"));

        let body = request.body().and_then(|b| b.as_bytes()).expect("buffered body");
        let body: JsonValue = serde_json::from_slice(body).expect("json body");
        assert_eq!(body, json!({"raw": "abc"}));
    }

    #[test]
    fn get_without_extras() {
        let forwarded = ProxyRequest::get("v1/models").bind(
            ProviderConfigKey::new("openai").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
        );
        let request = proxy().build_proxy_request(&forwarded).expect("builds");

        assert_eq!(request.url().as_str(), "https://api.nango.dev/proxy/v1/models");
        assert!(request.headers().get("base-url-override").is_none());
        assert!(request.body().is_none());
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(""), JsonValue::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("plain text"), json!("plain text"));
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", proxy());
        assert!(rendered.contains("api.nango.dev"));
        assert!(!rendered.contains("s1"));
    }
}
