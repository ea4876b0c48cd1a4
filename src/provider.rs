//! Providers and the catalog of models each one offers.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Google,
    Claude,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" | "gemini" => Some(Provider::Google),
            "claude" | "anthropic" => Some(Provider::Claude),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Google, Provider::Claude, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Google => "Google (Gemini)",
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    /// Environment variables checked for a credential before the config file.
    pub fn env_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Provider::Claude => &["ANTHROPIC_API_KEY"],
            Provider::OpenAI => &["OPENAI_API_KEY"],
        }
    }

    /// Where to obtain a key, shown on the API key screen.
    pub fn key_help(&self) -> &'static [&'static str] {
        match self {
            Provider::Google => &[
                "Get your API key from Google AI Studio:",
                "https://aistudio.google.com/",
                "1. Create a free account",
                "2. Go to API Keys section",
                "3. Create a new API key",
            ],
            Provider::Claude => &[
                "Create a key in the Anthropic console:",
                "https://console.anthropic.com/",
            ],
            Provider::OpenAI => &[
                "Create a key in the OpenAI dashboard:",
                "https://platform.openai.com/api-keys",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

const GOOGLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.0-flash-lite",
        display_name: "Gemini 2.0 Flash-Lite",
        description: "Cost-effective model for simple tasks",
    },
    ModelInfo {
        id: "gemini-1.5-pro",
        display_name: "Gemini 1.5 Pro",
        description: "Google's versatile model with long context",
    },
    ModelInfo {
        id: "gemini-1.5-flash",
        display_name: "Gemini 1.5 Flash",
        description: "Faster, more efficient Google model",
    },
];

const CLAUDE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-sonnet-4-20250514",
        display_name: "Claude Sonnet 4",
        description: "Balanced model for everyday work",
    },
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        display_name: "Claude 3.5 Sonnet",
        description: "Strong reasoning at moderate cost",
    },
    ModelInfo {
        id: "claude-3-5-haiku-20241022",
        display_name: "Claude 3.5 Haiku",
        description: "Fastest Claude model",
    },
];

const OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o",
        display_name: "GPT-4o",
        description: "Flagship multimodal model",
    },
    ModelInfo {
        id: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        description: "Small, fast and inexpensive",
    },
    ModelInfo {
        id: "gpt-4-turbo",
        display_name: "GPT-4 Turbo",
        description: "Previous generation high-end model",
    },
];

pub fn providers() -> Vec<Provider> {
    Provider::all()
}

pub fn models(provider: Provider) -> &'static [ModelInfo] {
    match provider {
        Provider::Google => GOOGLE_MODELS,
        Provider::Claude => CLAUDE_MODELS,
        Provider::OpenAI => OPENAI_MODELS,
    }
}

pub fn model_info(provider: Provider, model_id: &str) -> Option<&'static ModelInfo> {
    models(provider).iter().find(|m| m.id == model_id)
}

pub fn is_valid_model(provider: Provider, model_id: &str) -> bool {
    model_info(provider, model_id).is_some()
}

pub fn default_model(provider: Provider) -> &'static str {
    models(provider).first().map(|m| m.id).unwrap_or_default()
}
