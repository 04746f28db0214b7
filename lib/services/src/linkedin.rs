//! LinkedIn integration.

use crate::common::{ServiceIntegration, call, respond};
use conduit_core::{ConnectionId, ProviderConfigKey};
use conduit_integration::{ApiResponse, ConnectionProxy, Integration, OAuth2, ProxyRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// The OpenID Connect profile of the connected member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInProfile {
    /// Member identifier; the author URN is `urn:li:person:{sub}`.
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl LinkedInProfile {
    /// Returns the URN to use as a post author.
    #[must_use]
    pub fn person_urn(&self) -> String {
        format!("urn:li:person:{}", self.sub)
    }
}

/// Who can see a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostVisibility {
    #[default]
    Public,
    Connections,
}

/// A text post to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    /// Author URN, e.g. `urn:li:person:abc123`.
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub visibility: PostVisibility,
}

impl PostRequest {
    #[must_use]
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            visibility: PostVisibility::default(),
        }
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: PostVisibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Identifier of a published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreated {
    /// Share URN; absent if the API returned neither body nor header id.
    pub id: Option<String>,
}

/// LinkedIn over an OAuth2 connection.
#[derive(Debug, Clone)]
pub struct LinkedInIntegration {
    integration: Integration<OAuth2>,
}

impl ServiceIntegration for LinkedInIntegration {
    type Kind = OAuth2;

    const SERVICE_NAME: &'static str = "linkedin";
    const DEFAULT_PROVIDER_CONFIG_KEY: &'static str = "linkedin";
    const BASE_URL: &'static str = "https://api.linkedin.com";

    fn integration(&self) -> &Integration<OAuth2> {
        &self.integration
    }
}

impl LinkedInIntegration {
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

    /// Fetches the connected member's profile.
    pub async fn get_profile(&self) -> ApiResponse<LinkedInProfile> {
        let request = ProxyRequest::get("/v2/userinfo");
        let result = call(self, request).await;
        respond(Self::SERVICE_NAME, "get_profile", result, "Profile retrieved successfully")
    }

    /// Publishes a text post.
    pub async fn create_post(&self, post: &PostRequest) -> ApiResponse<PostCreated> {
        let request = ProxyRequest::post("/v2/ugcPosts")
            .with_base_url_override(Self::BASE_URL)
            .with_header("X-Restli-Protocol-Version", "2.0.0")
            .with_data(json!({
                "author": post.author,
                "lifecycleState": "PUBLISHED",
                "specificContent": {
                    "com.linkedin.ugc.ShareContent": {
                        "shareCommentary": { "text": post.text },
                        "shareMediaCategory": "NONE"
                    }
                },
                "visibility": {
                    "com.linkedin.ugc.MemberNetworkVisibility": post.visibility
                }
            }));

        // The share id arrives in the body or, for 201s with no body, in a header.
        let result = self.integration.proxy_request(request).await.map(|response| {
            let id = response
                .data
                .get("id")
                .and_then(|id| id.as_str())
                .map(str::to_string)
                .or_else(|| {
                    response
                        .headers
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case("x-restli-id"))
                        .map(|(_, value)| value.clone())
                });
            PostCreated { id }
        });
        respond(Self::SERVICE_NAME, "create_post", result, "Post created successfully")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_integration::{InMemoryProxy, ProxyResponse};
    use std::collections::BTreeMap;

    fn linkedin(proxy: &Arc<InMemoryProxy>) -> LinkedInIntegration {
        LinkedInIntegration::new(
            ProviderConfigKey::new("linkedin").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
            Arc::clone(proxy) as Arc<dyn ConnectionProxy>,
        )
    }

    #[tokio::test]
    async fn profile_and_urn() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "sub": "abc123",
            "name": "Ada Lovelace",
            "email": "ada@example.com"
        })));

        let response = linkedin(&proxy).get_profile().await;
        let profile = response.data.expect("data");
        assert_eq!(profile.person_urn(), "urn:li:person:abc123");
        assert_eq!(profile.given_name, None);
        assert_eq!(
            proxy.last_request().expect("request").endpoint,
            "/v2/userinfo"
        );
    }

    #[tokio::test]
    async fn create_post_builds_ugc_payload() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({"id": "urn:li:share:1"})));

        let post = PostRequest::new("urn:li:person:abc123", "Hello")
            .with_visibility(PostVisibility::Connections);
        let response = linkedin(&proxy).create_post(&post).await;
        assert_eq!(response.data.expect("data").id.as_deref(), Some("urn:li:share:1"));

        let request = proxy.last_request().expect("request");
        assert_eq!(
            request.headers.get("X-Restli-Protocol-Version").map(String::as_str),
            Some("2.0.0")
        );
        let body = request.data.expect("body");
        assert_eq!(body["author"], json!("urn:li:person:abc123"));
        assert_eq!(
            body["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"],
            json!("CONNECTIONS")
        );
        assert_eq!(
            body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
            json!("Hello")
        );
    }

    #[tokio::test]
    async fn default_visibility_is_public() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({"id": "urn:li:share:3"})));

        linkedin(&proxy)
            .create_post(&PostRequest::new("urn:li:person:abc123", "Hello"))
            .await;

        let body = proxy.last_request().expect("request").data.expect("body");
        assert_eq!(
            body["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"],
            json!("PUBLIC")
        );
        assert_eq!(
            serde_json::from_value::<PostVisibility>(json!("CONNECTIONS")).expect("decodes"),
            PostVisibility::Connections
        );
    }

    #[tokio::test]
    async fn create_post_reads_id_header() {
        let proxy = Arc::new(InMemoryProxy::new());
        let mut headers = BTreeMap::new();
        headers.insert("X-RestLi-Id".to_string(), "urn:li:share:2".to_string());
        proxy.push_response(ProxyResponse {
            status: 201,
            headers,
            data: serde_json::Value::Null,
        });

        let response = linkedin(&proxy)
            .create_post(&PostRequest::new("urn:li:person:x", "Hi"))
            .await;
        assert_eq!(response.data.expect("data").id.as_deref(), Some("urn:li:share:2"));
    }
}
