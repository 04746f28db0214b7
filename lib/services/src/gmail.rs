//! Gmail integration.

use crate::common::{ServiceIntegration, call, respond, segment};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use conduit_core::{ConnectionId, ProviderConfigKey};
use conduit_integration::{ApiResponse, ConnectionProxy, Integration, OAuth2, ProxyRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// An outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Sender override; Gmail uses the account address when absent.
    #[serde(default)]
    pub from: Option<String>,
    pub subject: String,
    pub body: String,
    /// Send `body` as HTML instead of plain text.
    #[serde(default)]
    pub html: bool,
    /// Thread to reply into.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl EmailMessage {
    /// Creates a plain-text message to a single recipient.
    #[must_use]
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    #[must_use]
    pub fn with_bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    #[must_use]
    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }

    #[must_use]
    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Renders the message as RFC 2822 text with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeader`] if an address or the subject contains a
    /// line break, which would start a new header line.
    pub fn to_rfc2822(&self) -> Result<String, InvalidHeader> {
        let mut headers = Vec::new();
        if let Some(from) = &self.from {
            headers.push(format!("From: {}", single_line("from", from)?));
        }
        headers.push(format!("To: {}", address_list("to", &self.to)?));
        if !self.cc.is_empty() {
            headers.push(format!("Cc: {}", address_list("cc", &self.cc)?));
        }
        if !self.bcc.is_empty() {
            headers.push(format!("Bcc: {}", address_list("bcc", &self.bcc)?));
        }
        let subject = single_line("subject", &self.subject)?;
        headers.push(format!("Subject: {}", encode_header(subject)));
        headers.push("MIME-Version: 1.0".to_string());
        let content_type = if self.html { "text/html" } else { "text/plain" };
        headers.push(format!("Content-Type: {content_type}; charset=\"UTF-8\""));

        Ok(format!("{}\r\n\r\n{}", headers.join("\r\n"), self.body))
    }

    /// Returns the message in the base64url form Gmail's `raw` field expects.
    ///
    /// # Errors
    ///
    /// See [`Self::to_rfc2822`].
    pub fn to_raw(&self) -> Result<String, InvalidHeader> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_rfc2822()?))
    }
}

/// A header value that would break out of its header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHeader {
    pub field: &'static str,
}

impl fmt::Display for InvalidHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "email header '{}' must not contain line breaks", self.field)
    }
}

impl std::error::Error for InvalidHeader {}

fn single_line<'a>(field: &'static str, value: &'a str) -> Result<&'a str, InvalidHeader> {
    if value.contains(['\r', '\n']) {
        return Err(InvalidHeader { field });
    }
    Ok(value)
}

fn address_list(field: &'static str, addresses: &[String]) -> Result<String, InvalidHeader> {
    for address in addresses {
        single_line(field, address)?;
    }
    Ok(addresses.join(", "))
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// Filters for listing messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMessagesQuery {
    /// Gmail search syntax, e.g. `from:alice is:unread`.
    pub query: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
    pub label_ids: Vec<String>,
}

impl ListMessagesQuery {
    fn apply(&self, mut request: ProxyRequest) -> ProxyRequest {
        if let Some(query) = &self.query {
            request = request.with_param("q", query);
        }
        if let Some(max) = self.max_results {
            request = request.with_param("maxResults", max);
        }
        if let Some(token) = &self.page_token {
            request = request.with_param("pageToken", token);
        }
        for label in &self.label_ids {
            request = request.with_param("labelIds", label);
        }
        request
    }
}

/// Identifiers returned after sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// A message reference as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// One page of message references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// The mailbox profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailProfile {
    pub email_address: String,
    #[serde(default)]
    pub messages_total: Option<u64>,
    #[serde(default)]
    pub threads_total: Option<u64>,
    #[serde(default)]
    pub history_id: Option<String>,
}

/// Gmail over an OAuth2 connection.
#[derive(Debug, Clone)]
pub struct GmailIntegration {
    integration: Integration<OAuth2>,
}

impl ServiceIntegration for GmailIntegration {
    type Kind = OAuth2;

    const SERVICE_NAME: &'static str = "gmail";
    const DEFAULT_PROVIDER_CONFIG_KEY: &'static str = "google-mail";
    const BASE_URL: &'static str = "https://gmail.googleapis.com";

    fn integration(&self) -> &Integration<OAuth2> {
        &self.integration
    }
}

impl GmailIntegration {
    #[must_use]
    pub fn new(
        provider_config_key: ProviderConfigKey,
        connection_id: ConnectionId,
        proxy: Arc<dyn ConnectionProxy>,
    ) -> Self {
        Self {
            integration: Integration::new(
                Self::SERVICE_NAME,
                provider_config_key,
                connection_id,
                proxy,
            ),
        }
    }

    /// Sends an email from the connected mailbox.
    pub async fn send_email(&self, message: &EmailMessage) -> ApiResponse<SentMessage> {
        let raw = match message.to_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    service = Self::SERVICE_NAME,
                    operation = "send_email",
                    error = %e,
                    "message rejected"
                );
                return ApiResponse::failure(e.to_string());
            }
        };
        let mut body = json!({ "raw": raw });
        if let Some(thread_id) = &message.thread_id {
            body["threadId"] = json!(thread_id);
        }
        let request = ProxyRequest::post("/gmail/v1/users/me/messages/send").with_data(body);
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "send_email", result, "Email sent successfully")
    }

    /// Lists message references matching the query.
    pub async fn list_messages(&self, query: &ListMessagesQuery) -> ApiResponse<MessageList> {
        let request = query.apply(ProxyRequest::get("/gmail/v1/users/me/messages"));
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "list_messages", result, "Messages retrieved successfully")
    }

    /// Fetches one full message.
    pub async fn get_message(&self, message_id: &str) -> ApiResponse<JsonValue> {
        let request = ProxyRequest::get(format!(
            "/gmail/v1/users/me/messages/{}",
            segment(message_id)
        ))
        .with_param("format", "full");
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "get_message", result, "Message retrieved successfully")
    }

    /// Fetches the mailbox profile.
    pub async fn get_profile(&self) -> ApiResponse<GmailProfile> {
        let request = ProxyRequest::get("/gmail/v1/users/me/profile");
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "get_profile", result, "Profile retrieved successfully")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_integration::{HttpMethod, InMemoryProxy, ProxyError, ProxyResponse};

    fn gmail(proxy: &Arc<InMemoryProxy>) -> GmailIntegration {
        GmailIntegration::new(
            ProviderConfigKey::new("google-mail").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
            Arc::clone(proxy) as Arc<dyn ConnectionProxy>,
        )
    }

    #[test]
    fn rfc2822_rendering() {
        let message = EmailMessage::new("bob@example.com", "Hello", "Hi Bob")
            .with_cc("carol@example.com")
            .with_from("alice@example.com");
        let text = message.to_rfc2822().expect("renders");

        assert!(text.starts_with("From: alice@example.com\r\nTo: bob@example.com\r\n"));
        assert!(text.contains("Cc: carol@example.com\r\n"));
        assert!(!text.contains("Bcc:"));
        assert!(text.contains("Content-Type: text/plain; charset=\"UTF-8\""));
        assert!(text.ends_with("\r\n\r\nHi Bob"));
    }

    #[test]
    fn raw_is_unpadded_base64url() {
        let message = EmailMessage::new("bob@example.com", "Hi?", "é>>?").html();
        let raw = message.to_raw().expect("renders");
        assert!(!raw.contains('='));
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));

        let decoded = URL_SAFE_NO_PAD.decode(&raw).expect("decode");
        let text = String::from_utf8(decoded).expect("utf8");
        assert!(text.contains("text/html"));
        assert!(text.ends_with("é>>?"));
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let text = EmailMessage::new("a@example.com", "Café", "x")
            .to_rfc2822()
            .expect("renders");
        assert!(text.contains("Subject: =?UTF-8?B?Q2Fmw6k=?="));
    }

    #[test]
    fn line_breaks_in_headers_are_rejected() {
        let injected = EmailMessage::new("bob@example.com", "Hi\r\nBcc: eve@example.net", "x");
        assert_eq!(
            injected.to_rfc2822(),
            Err(InvalidHeader { field: "subject" })
        );

        let injected = EmailMessage::new("bob@example.com", "Hi", "x")
            .with_cc("carol@example.com\nBcc: eve@example.net");
        assert_eq!(injected.to_raw(), Err(InvalidHeader { field: "cc" }));

        let injected = EmailMessage::new("bob@example.com", "Hi", "x").with_from("alice\r@example.com");
        assert_eq!(injected.to_rfc2822(), Err(InvalidHeader { field: "from" }));
    }

    #[test]
    fn line_breaks_in_body_are_kept() {
        let text = EmailMessage::new("bob@example.com", "Hi", "line one\r\nline two")
            .to_rfc2822()
            .expect("renders");
        assert!(text.ends_with("\r\n\r\nline one\r\nline two"));
    }

    #[tokio::test]
    async fn send_email_refuses_injected_header() {
        let proxy = Arc::new(InMemoryProxy::new());
        let message = EmailMessage {
            to: vec!["bob@example.com\r\nBcc: eve@example.net".to_string()],
            subject: "Hello".to_string(),
            body: "Hi".to_string(),
            ..EmailMessage::default()
        };

        let response = gmail(&proxy).send_email(&message).await;

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("email header 'to' must not contain line breaks")
        );
        assert!(proxy.requests().is_empty());
    }

    #[tokio::test]
    async fn send_email_posts_raw_message() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(
            json!({"id": "m1", "threadId": "t1", "labelIds": ["SENT"]}),
        ));

        let message = EmailMessage::new("bob@example.com", "Hello", "Hi").in_thread("t1");
        let response = gmail(&proxy).send_email(&message).await;

        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("Email sent successfully"));
        let sent = response.data.expect("data");
        assert_eq!(sent.id, "m1");
        assert_eq!(sent.label_ids, ["SENT"]);

        let request = proxy.last_request().expect("request");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.endpoint, "/gmail/v1/users/me/messages/send");
        assert_eq!(request.base_url_override.as_deref(), Some("https://gmail.googleapis.com"));
        let data = request.data.expect("body");
        assert_eq!(data["raw"], json!(message.to_raw().expect("renders")));
        assert_eq!(data["threadId"], json!("t1"));
    }

    #[tokio::test]
    async fn list_messages_forwards_filters() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "messages": [{"id": "m1", "threadId": "t1"}],
            "nextPageToken": "p2",
            "resultSizeEstimate": 1
        })));

        let query = ListMessagesQuery {
            query: Some("is:unread".to_string()),
            max_results: Some(5),
            page_token: None,
            label_ids: vec!["INBOX".to_string()],
        };
        let response = gmail(&proxy).list_messages(&query).await;
        let list = response.data.expect("data");
        assert_eq!(list.messages.len(), 1);
        assert_eq!(list.next_page_token.as_deref(), Some("p2"));

        let request = proxy.last_request().expect("request");
        assert_eq!(
            request.params,
            vec![
                ("q".to_string(), "is:unread".to_string()),
                ("maxResults".to_string(), "5".to_string()),
                ("labelIds".to_string(), "INBOX".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn get_message_encodes_id() {
        let proxy = Arc::new(InMemoryProxy::new());
        let response = gmail(&proxy).get_message("abc/def").await;
        assert!(response.success);
        let request = proxy.last_request().expect("request");
        assert_eq!(request.endpoint, "/gmail/v1/users/me/messages/abc%2Fdef");
    }

    #[tokio::test]
    async fn upstream_failure_becomes_failed_envelope() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_error(ProxyError::UpstreamStatus {
            status: 401,
            body: "invalid_grant".to_string(),
        });

        let response = gmail(&proxy).get_profile().await;
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(
            response.error.as_deref(),
            Some("upstream returned HTTP 401: invalid_grant")
        );
    }

    #[tokio::test]
    async fn unexpected_body_becomes_failed_envelope() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({"unexpected": true})));

        let response = gmail(&proxy).get_profile().await;
        assert!(!response.success);
        assert!(response.error.expect("error").starts_with("invalid proxy response"));
    }
}
