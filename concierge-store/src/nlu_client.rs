use async_trait::async_trait;
use concierge_core::{CollaboratorError, CollaboratorResult, NluClient, NluRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::app_config::NluConfig;
use crate::backend::transport_error;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// NLU collaborator backed by an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: NluConfig,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(config: NluConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config, timeout })
    }

    pub fn build_request(&self, request: &NluRequest) -> ChatRequest {
        let system = format!(
            "{}\n\nCollected so far (JSON):\n{}",
            request.instructions, request.state
        );
        ChatRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_text.clone(),
                },
            ],
        }
    }
}

#[async_trait]
impl NluClient for ChatCompletionsClient {
    async fn complete(&self, request: &NluRequest) -> CollaboratorResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(task = ?request.task, model = %self.config.model, "nlu request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| transport_error("nlu", self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "nlu request rejected");
            return Err(CollaboratorError::Rejected {
                service: "nlu",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::UnexpectedResponse {
                service: "nlu",
                detail: e.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::UnexpectedResponse {
                service: "nlu",
                detail: "no choices in completion".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::NluTask;
    use concierge_shared::Masked;
    use serde_json::json;

    fn client() -> ChatCompletionsClient {
        ChatCompletionsClient::new(
            NluConfig {
                base_url: "https://api.openai.com/v1/".to_string(),
                api_key: Masked::new("sk-test".to_string()),
                model: "gpt-4o".to_string(),
                max_tokens: 512,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_request_carries_instructions_state_and_text() {
        let request = NluRequest {
            task: NluTask::ProductSelection,
            instructions: "Pick a product.".to_string(),
            user_text: "arrival please".to_string(),
            state: json!({"product_type": null}),
        };

        let chat = client().build_request(&request);

        assert_eq!(chat.model, "gpt-4o");
        assert_eq!(chat.max_tokens, 512);
        assert_eq!(chat.messages.len(), 2);
        assert!(chat.messages[0].content.starts_with("Pick a product."));
        assert!(chat.messages[0].content.contains("\"product_type\":null"));
        assert_eq!(chat.messages[1].role, "user");
        assert_eq!(chat.messages[1].content, "arrival please");
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"message\": \"hi\"}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"message\": \"hi\"}");
    }
}
