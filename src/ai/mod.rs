pub mod claude;
pub mod google;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::provider::Provider;
use crate::transcript::ChatMessage;

pub use claude::ClaudeClient;
pub use google::GoogleClient;
pub use openai::OpenAIClient;

/// Upper bound for a single completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("no text found in response")]
    EmptyResponse,

    #[error("unexpected response format: {0}")]
    Parse(String),
}

/// Turns a transcript into the model's next reply.
///
/// Implementations receive the whole transcript (system preamble first) on
/// every call, since none of the providers keep conversation state server side.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, GatewayError>;
}

type GatewayFactory = Box<dyn Fn(&str) -> Arc<dyn CompletionGateway> + Send + Sync>;

/// Gateway constructors keyed by provider.
///
/// Adding a provider means registering a factory here; nothing else in the
/// application branches on the provider.
#[derive(Default)]
pub struct GatewayRegistry {
    factories: HashMap<Provider, GatewayFactory>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Provider::Google, |key| Arc::new(GoogleClient::new(key)));
        registry.register(Provider::Claude, |key| Arc::new(ClaudeClient::new(key)));
        registry.register(Provider::OpenAI, |key| Arc::new(OpenAIClient::new(key)));
        registry
    }

    pub fn register<F>(&mut self, provider: Provider, factory: F)
    where
        F: Fn(&str) -> Arc<dyn CompletionGateway> + Send + Sync + 'static,
    {
        self.factories.insert(provider, Box::new(factory));
    }

    pub fn connect(&self, provider: Provider, credential: &str) -> Option<Arc<dyn CompletionGateway>> {
        self.factories.get(&provider).map(|factory| factory(credential))
    }
}

/// Shared HTTP client configuration for all providers.
fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read an error body, preferring the provider's `error.message` field.
async fn api_error(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    GatewayError::Api { status, message }
}
