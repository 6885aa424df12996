use super::{ChatResponse, LlmError, ModelInfo};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub generation: GenerationParams,
}

impl GeminiConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generation: GenerationParams::default(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationParams,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    display_name: Option<String>,
}

/// The whole prompt travels as a single text part of a single content block.
fn build_request(config: &GeminiConfig, prompt: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: Some(prompt.to_string()),
            }],
        }],
        generation_config: config.generation,
    }
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let data: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| LlmError::Parse("response has no candidate text".into()))
}

pub async fn chat(config: &GeminiConfig, prompt: &str) -> Result<ChatResponse, LlmError> {
    let client = Client::new();
    let body = build_request(config, prompt);

    let resp = client
        .post(format!(
            "{}/models/{}:generateContent",
            config.base_url, config.model
        ))
        .query(&[("key", config.api_key.as_str())])
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

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

pub async fn fetch_models(config: &GeminiConfig) -> Result<Vec<ModelInfo>, LlmError> {
    let client = Client::new();
    let resp = client
        .get(format!("{}/models", config.base_url))
        .query(&[("key", config.api_key.as_str())])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: format!("Failed to fetch Gemini models: {}", text),
        });
    }

    let text = resp.text().await?;
    let list: GeminiModelList =
        serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;

    Ok(list
        .models
        .into_iter()
        .map(|m| {
            let id = m
                .name
                .strip_prefix("models/")
                .unwrap_or(&m.name)
                .to_string();
            ModelInfo {
                name: m.display_name.unwrap_or_else(|| id.clone()),
                id,
                provider: "Gemini".into(),
            }
        })
        .collect())
}
