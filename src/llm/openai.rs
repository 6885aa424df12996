use super::{ChatResponse, LlmError, ModelInfo};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "compound-beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Fixed instruction sent as the first message of every request.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful multilingual assistant. You can analyze and \
answer questions about uploaded files, summarize web search results, and read content scraped from \
web pages. When referencing files, mention their names explicitly.";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiConfig {
    pub fn groq(api_key: String) -> Self {
        Self {
            api_key,
            base_url: GROQ_BASE_URL.to_string(),
            model: DEFAULT_GROQ_MODEL.to_string(),
        }
    }

    pub fn openai(api_key: String) -> Self {
        Self {
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModel>,
}

#[derive(Deserialize)]
struct OpenAiModel {
    id: String,
}

fn build_request<'a>(config: &'a OpenAiConfig, prompt: &str) -> OpenAiRequest<'a> {
    OpenAiRequest {
        model: &config.model,
        messages: vec![
            OpenAiMessage {
                role: "system".into(),
                content: Some(SYSTEM_INSTRUCTION.into()),
            },
            OpenAiMessage {
                role: "user".into(),
                content: Some(prompt.into()),
            },
        ],
    }
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let data: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::Parse("response has no choice content".into()))
}

pub async fn chat(config: &OpenAiConfig, prompt: &str) -> Result<ChatResponse, LlmError> {
    let client = Client::new();
    let body = build_request(config, prompt);

    let mut req = client
        .post(format!("{}/chat/completions", config.base_url))
        .header("Content-Type", "application/json")
        .json(&body);

    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let resp = req.send().await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let text = resp.text().await?;
    let content = parse_response(&text)?;

    Ok(ChatResponse {
        content,
        model: config.model.clone(),
        fallback: false,
    })
}

/// Fetch available models from an OpenAI-compatible `/models` endpoint.
pub async fn fetch_models(config: &OpenAiConfig, provider: &str) -> Result<Vec<ModelInfo>, LlmError> {
    let client = Client::new();
    let mut req = client.get(format!("{}/models", config.base_url));
    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let resp = req.send().await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: format!("Failed to fetch {} models: {}", provider, text),
        });
    }

    let text = resp.text().await?;
    let list: OpenAiModelList =
        serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;

    Ok(list
        .data
        .into_iter()
        .map(|m| ModelInfo {
            name: m.id.clone(),
            id: m.id,
            provider: provider.to_string(),
        })
        .collect())
}
