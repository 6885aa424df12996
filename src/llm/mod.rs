pub mod gemini;
pub mod openai;

use crate::assembler::AssembledPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply shown to the user whenever a provider call fails for any reason.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the transcript. Never mutated after it is appended.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    /// Set when `content` is the apology that replaced a failed call.
    #[serde(default)]
    pub fallback: bool,
}

/// Unified LLM provider enum. Dispatches to the generation API or an
/// OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    Groq(openai::OpenAiConfig),
    OpenAi(openai::OpenAiConfig),
}

impl Provider {
    pub fn gemini(api_key: String) -> Self {
        Provider::Gemini(gemini::GeminiConfig::new(api_key))
    }

    pub fn groq(api_key: String) -> Self {
        Provider::Groq(openai::OpenAiConfig::groq(api_key))
    }

    pub fn openai(api_key: String) -> Self {
        Provider::OpenAi(openai::OpenAiConfig::openai(api_key))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::Groq(_) => "groq",
            Provider::OpenAi(_) => "openai",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini(config) => &config.model,
            Provider::Groq(config) | Provider::OpenAi(config) => &config.model,
        }
    }

    /// Send the payload once and return the raw outcome.
    pub async fn try_chat(&self, payload: &AssembledPayload) -> Result<ChatResponse, LlmError> {
        let prompt = payload.render();
        tracing::debug!(provider = self.name(), prompt_len = prompt.len(), "dispatching payload");
        match self {
            Provider::Gemini(config) => gemini::chat(config, &prompt).await,
            Provider::Groq(config) | Provider::OpenAi(config) => {
                openai::chat(config, &prompt).await
            }
        }
    }

    /// Send the payload once. Failures are logged and replaced by [`APOLOGY`]
    /// so the transcript stays coherent.
    pub async fn chat(&self, payload: &AssembledPayload) -> ChatResponse {
        match self.try_chat(payload).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    provider = self.name(),
                    model = self.model(),
                    error = %err,
                    "provider request failed"
                );
                ChatResponse {
                    content: APOLOGY.to_string(),
                    model: self.model().to_string(),
                    fallback: true,
                }
            }
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        match self {
            Provider::Gemini(config) => gemini::fetch_models(config).await,
            Provider::Groq(config) => openai::fetch_models(config, "Groq").await,
            Provider::OpenAi(config) => openai::fetch_models(config, "OpenAI").await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}
