//! OpenAI integration.
//!
//! Unlike the Google and LinkedIn services this one runs over an API key
//! connection, so `integration().get_auth_token()` yields the raw key.

use crate::common::{ServiceIntegration, call, request_body, respond};
use conduit_core::{ConnectionId, ProviderConfigKey};
use conduit_integration::{ApiKey, ApiResponse, ConnectionProxy, Integration, ProxyRequest};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::sync::Arc;

/// The role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in a chat completion request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    /// Empty when the model answered with a refusal or tool calls only.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Creates a request with a single user message.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: None,
            max_tokens: None,
        }
    }

    /// Puts a system prompt in front of the conversation.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(system));
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A chat completion response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Returns the content of the first choice, if any.
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.message.content.as_str())
    }
}

/// A model available to the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<Model>,
}

#[derive(Deserialize)]
struct EmbeddingList {
    data: Vec<Embedding>,
}

#[derive(Deserialize)]
struct Embedding {
    embedding: Vec<f32>,
}

/// OpenAI over an API key connection.
#[derive(Debug, Clone)]
pub struct OpenAiIntegration {
    integration: Integration<ApiKey>,
}

impl ServiceIntegration for OpenAiIntegration {
    type Kind = ApiKey;

    const SERVICE_NAME: &'static str = "openai";
    const DEFAULT_PROVIDER_CONFIG_KEY: &'static str = "openai";
    const BASE_URL: &'static str = "https://api.openai.com";

    fn integration(&self) -> &Integration<ApiKey> {
        &self.integration
    }
}

impl OpenAiIntegration {
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

    /// Generates a chat completion.
    pub async fn chat_completion(&self, request: &ChatRequest) -> ApiResponse<ChatCompletion> {
        let result = match request_body(request) {
            Ok(body) => call(self, ProxyRequest::post("/v1/chat/completions").with_data(body)).await,
            Err(report) => Err(report),
        };
        respond(
            Self::SERVICE_NAME,
            "chat_completion",
            result,
            "Chat completion generated successfully",
        )
    }

    /// Lists the models the key can use.
    pub async fn list_models(&self) -> ApiResponse<Vec<Model>> {
        let result = call::<_, ModelList>(self, ProxyRequest::get("/v1/models"))
            .await
            .map(|list| list.data);
        respond(Self::SERVICE_NAME, "list_models", result, "Models retrieved successfully")
    }

    /// Embeds each input string, returning vectors in input order.
    pub async fn create_embedding(&self, model: &str, input: &[String]) -> ApiResponse<Vec<Vec<f32>>> {
        let request = ProxyRequest::post("/v1/embeddings").with_data(json!({
            "model": model,
            "input": input,
        }));
        let result = call::<_, EmbeddingList>(self, request)
            .await
            .map(|list| list.data.into_iter().map(|e| e.embedding).collect());
        respond(
            Self::SERVICE_NAME,
            "create_embedding",
            result,
            "Embeddings created successfully",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_integration::{Credential, InMemoryProxy, ProxyResponse};

    fn openai(proxy: &Arc<InMemoryProxy>) -> OpenAiIntegration {
        OpenAiIntegration::new(
            ProviderConfigKey::new("openai").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
            Arc::clone(proxy) as Arc<dyn ConnectionProxy>,
        )
    }

    #[test]
    fn request_builder() {
        let request = ChatRequest::new("gpt-4o-mini", "Hello")
            .with_system("Be brief.")
            .with_temperature(0.2)
            .with_max_tokens(64);

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[1], ChatMessage::user("Hello"));

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["messages"][0]["role"], json!("system"));
        assert_eq!(json["max_tokens"], json!(64));
    }

    #[tokio::test]
    async fn chat_completion_round_trip() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })));

        let response = openai(&proxy)
            .chat_completion(&ChatRequest::new("gpt-4o-mini", "Hello"))
            .await;
        let completion = response.data.expect("data");
        assert_eq!(completion.first_content(), Some("Hi!"));
        assert_eq!(completion.usage.expect("usage").total_tokens, 7);

        let request = proxy.last_request().expect("request");
        assert_eq!(request.endpoint, "/v1/chat/completions");
        assert_eq!(request.base_url_override.as_deref(), Some("https://api.openai.com"));
        assert!(request.data.expect("body").get("temperature").is_none());
    }

    #[tokio::test]
    async fn null_content_decodes_as_empty() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "id": "chatcmpl-2",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "refusal": "I can't help with that."
                },
                "finish_reason": "stop"
            }]
        })));

        let response = openai(&proxy)
            .chat_completion(&ChatRequest::new("gpt-4o-mini", "Hello"))
            .await;

        assert!(response.success);
        let completion = response.data.expect("data");
        assert_eq!(completion.first_content(), Some(""));
        assert_eq!(completion.choices[0].message.role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn list_models_unwraps_data() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "object": "list",
            "data": [{"id": "gpt-4o", "owned_by": "openai"}, {"id": "o3"}]
        })));

        let models = openai(&proxy).list_models().await.data.expect("data");
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["gpt-4o", "o3"]);
    }

    #[tokio::test]
    async fn embeddings_in_order() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.push_response(ProxyResponse::ok(json!({
            "data": [{"embedding": [0.5, 1.0]}, {"embedding": [0.25]}]
        })));

        let vectors = openai(&proxy)
            .create_embedding("text-embedding-3-small", &["a".to_string(), "b".to_string()])
            .await
            .data
            .expect("data");
        assert_eq!(vectors, vec![vec![0.5, 1.0], vec![0.25]]);
    }

    #[tokio::test]
    async fn api_key_token_through_service() {
        let proxy = Arc::new(InMemoryProxy::new());
        proxy.insert_credentials(
            ProviderConfigKey::new("openai").expect("valid key"),
            ConnectionId::new("c1").expect("valid id"),
            Credential::api_key("sk-test"),
        );

        let service = openai(&proxy);
        assert_eq!(service.integration().get_auth_token().await.unwrap(), "sk-test");
        assert!(service.validate_connection().await.is_valid);
    }
}
