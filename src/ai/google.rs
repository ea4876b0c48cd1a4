use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{api_error, http_client, CompletionGateway, GatewayError};
use crate::transcript::{ChatMessage, ChatRole};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";

#[derive(Serialize)]
struct GooglePart {
    text: String,
}

#[derive(Serialize)]
struct GoogleContent {
    role: &'static str,
    parts: Vec<GooglePart>,
}

#[derive(Serialize)]
struct GoogleSystemInstruction {
    parts: Vec<GooglePart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GoogleSystemInstruction>,
    contents: Vec<GoogleContent>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GoogleResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GoogleResponseContent {
    #[serde(default)]
    parts: Vec<GoogleResponsePart>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleResponseContent>,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn build_request(messages: &[ChatMessage]) -> GoogleRequest {
    let system: Vec<GooglePart> = messages
        .iter()
        .filter(|m| m.role == ChatRole::System && !m.content.is_empty())
        .map(|m| GooglePart { text: m.content.clone() })
        .collect();

    // Gemini calls the assistant side "model"
    let contents = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
                ChatRole::System => return None,
            };
            Some(GoogleContent {
                role,
                parts: vec![GooglePart { text: m.content.clone() }],
            })
        })
        .collect();

    GoogleRequest {
        system_instruction: (!system.is_empty()).then_some(GoogleSystemInstruction { parts: system }),
        contents,
        generation_config: GenerationConfig {
            temperature: 0.7,
            max_output_tokens: 2000,
        },
    }
}

fn extract_text(response: GoogleResponse) -> Result<String, GatewayError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Parse("no candidates in response".to_string()))?;
    let content = candidate
        .content
        .ok_or_else(|| GatewayError::Parse("candidate has no content".to_string()))?;
    content
        .parts
        .into_iter()
        .find_map(|p| p.text)
        .ok_or(GatewayError::EmptyResponse)
}

#[async_trait]
impl CompletionGateway for GoogleClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&build_request(messages))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        extract_text(body)
    }
}
