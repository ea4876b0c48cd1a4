use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{api_error, http_client, CompletionGateway, GatewayError};
use crate::transcript::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.to_string(),
        }
    }
}

fn build_request(messages: &[ChatMessage], model: &str) -> ClaudeRequest {
    let system = messages
        .iter()
        .find(|m| m.role == ChatRole::System && !m.content.is_empty())
        .map(|m| m.content.clone());

    ClaudeRequest {
        model: model.to_string(),
        max_tokens: 4096,
        system,
        messages: messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| ClaudeMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect(),
    }
}

#[async_trait]
impl CompletionGateway for ClaudeClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&build_request(messages, model))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        claude_response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or(GatewayError::EmptyResponse)
    }
}
