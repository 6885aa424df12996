//! Configuration: `.env` file, environment variables and persisted settings.

use crate::db::Database;
use crate::llm::gemini::{self, GeminiConfig};
use crate::llm::openai::{self, OpenAiConfig};
use crate::llm::Provider;
use crate::upload::UploadPolicy;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATA_DIR: &str = ".polyglot-assistant";

pub const SETTING_LANGUAGE: &str = "language";
pub const SETTING_PROVIDER: &str = "provider";
pub const SETTING_MEMORY: &str = "memory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Groq,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub gemini: GeminiConfig,
    pub groq: OpenAiConfig,
    pub openai: OpenAiConfig,
    pub upload: UploadPolicy,
    pub language: String,
    pub memory_enabled: bool,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq,
            gemini: GeminiConfig::new(String::new()),
            groq: OpenAiConfig::groq(String::new()),
            openai: OpenAiConfig::openai(String::new()),
            upload: UploadPolicy::default(),
            language: "en".to_string(),
            memory_enabled: false,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load `.env` (if present) and resolve from the process environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env from: {}", path.display()),
            Err(e) if e.not_found() => tracing::debug!("no .env file found"),
            Err(e) => tracing::warn!(error = %e, "failed to read .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve every key through `lookup`. Unset or invalid values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("ASSISTANT_PROVIDER") {
            match value.parse() {
                Ok(kind) => config.provider = kind,
                Err(e) => tracing::warn!("{e}; keeping {}", config.provider.as_str()),
            }
        }

        if let Some(key) = get("GEMINI_API_KEY") {
            config.gemini.api_key = key;
        }
        config.gemini.base_url = get("GEMINI_BASE_URL").unwrap_or_else(|| gemini::BASE_URL.into());
        config.gemini.model = get("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.into());

        if let Some(key) = get("GROQ_API_KEY") {
            config.groq.api_key = key;
        }
        config.groq.base_url = get("GROQ_BASE_URL").unwrap_or_else(|| openai::GROQ_BASE_URL.into());
        config.groq.model = get("GROQ_MODEL").unwrap_or_else(|| openai::DEFAULT_GROQ_MODEL.into());

        if let Some(key) = get("OPENAI_API_KEY") {
            config.openai.api_key = key;
        }
        config.openai.base_url =
            get("OPENAI_BASE_URL").unwrap_or_else(|| openai::OPENAI_BASE_URL.into());
        config.openai.model =
            get("OPENAI_MODEL").unwrap_or_else(|| openai::DEFAULT_OPENAI_MODEL.into());

        if let Some(language) = get("ASSISTANT_LANGUAGE") {
            config.language = language.trim().to_lowercase();
        }
        if let Some(flag) = get("ASSISTANT_MEMORY").as_deref().and_then(parse_flag) {
            config.memory_enabled = flag;
        }

        if let Some(value) = get("ASSISTANT_MAX_UPLOAD_MB") {
            let bytes = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|mb| *mb > 0)
                .and_then(|mb| mb.checked_mul(1024 * 1024));
            match bytes {
                Some(bytes) => config.upload.max_file_bytes = bytes,
                None => tracing::warn!("invalid ASSISTANT_MAX_UPLOAD_MB {value:?}; keeping default"),
            }
        }
        if let Some(list) = get("ASSISTANT_ALLOWED_EXTENSIONS") {
            let allowed: Vec<String> = list
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !allowed.is_empty() {
                config.upload.allowed_extensions = Some(allowed);
            }
        }
        if let Some(flag) = get("ASSISTANT_EXTRACT_DOCUMENTS").as_deref().and_then(parse_flag) {
            config.upload.extract_documents = flag;
        }

        if let Some(dir) = get("ASSISTANT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Apply settings persisted by earlier runs. They win over the environment.
    pub fn apply_settings(&mut self, db: &Database) -> rusqlite::Result<()> {
        if let Some(language) = db.get_setting(SETTING_LANGUAGE)? {
            self.language = language;
        }
        if let Some(provider) = db.get_setting(SETTING_PROVIDER)? {
            match provider.parse() {
                Ok(kind) => self.provider = kind,
                Err(e) => tracing::warn!("ignoring persisted setting: {e}"),
            }
        }
        if let Some(flag) = db.get_setting(SETTING_MEMORY)?.as_deref().and_then(parse_flag) {
            self.memory_enabled = flag;
        }
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        match self.provider {
            ProviderKind::Gemini => Provider::Gemini(self.gemini.clone()),
            ProviderKind::Groq => Provider::Groq(self.groq.clone()),
            ProviderKind::OpenAi => Provider::OpenAi(self.openai.clone()),
        }
    }
}
