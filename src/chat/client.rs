use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;

use crate::config::ChatConfig;
use crate::error::{AppError, UpstreamError};

/// External completion API, injected into the chat service so tests can
/// substitute a mock and the process owns exactly one configured client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, message: &str) -> Result<String, UpstreamError>;
}

/// OpenRouter-style chat completions client.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterClient {
    pub fn new(config: &ChatConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl CompletionApi for OpenRouterClient {
    async fn complete(&self, message: &str) -> Result<String, UpstreamError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": message }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| UpstreamError::Completion(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "completion API returned an error");
            return Err(UpstreamError::Completion(format!("status {}: {}", status, body)));
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Completion(format!("malformed response: {}", e)))?;

        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Completion("response contained no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> ChatConfig {
        ChatConfig {
            api_url: url,
            api_key: "test_key".into(),
            model: "test-model".into(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "hello there" } }
                ]
            })))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::new(&test_config(format!("{}/chat/completions", server.uri())))
                .unwrap();
        let reply = client.complete("hi").await.unwrap();
        assert_eq!(reply, "hello there");
    }

    #[tokio::test]
    async fn test_complete_wraps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::new(&test_config(format!("{}/chat/completions", server.uri())))
                .unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Completion(_)));
    }

    #[tokio::test]
    async fn test_complete_wraps_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::new(&test_config(format!("{}/chat/completions", server.uri())))
                .unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Completion(_)));
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client =
            OpenRouterClient::new(&test_config(format!("{}/chat/completions", server.uri())))
                .unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Completion(_)));
    }
}
