//! Merges chat turns, file context and search text into one prompt.

use crate::file_store::{ContentKind, FileContextUnit};
use crate::llm::ChatTurn;

/// Words that, in the latest user message, select the file-aware route.
pub const FILE_KEYWORDS: &[&str] = &["file", "document", "uploaded"];

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("tr", "Turkish"),
    ("ur", "Urdu"),
    ("hi", "Hindi"),
    ("zh", "Chinese"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("ar", "Arabic"),
];

const FILES_HEADER: &str = "Context from uploaded files:";
const SEARCH_HEADER: &str = "Web search results:";

/// Map a language code to its display name. Unknown codes fall back to English.
pub fn language_name(code: &str) -> &'static str {
    let code = code.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("English")
}

pub fn language_directive(code: &str) -> String {
    let name = language_name(code);
    format!(
        "Please respond in {name} language. If the response contains any text, ensure it is properly formatted in {name}."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    FileAware,
}

/// Keyword heuristic: the file-aware route needs at least one displayed
/// upload and one of [`FILE_KEYWORDS`] anywhere in the message.
pub fn select_route(displayed: &[FileContextUnit], message: &str) -> Route {
    if displayed.is_empty() {
        return Route::Chat;
    }
    let lower = message.to_lowercase();
    if FILE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Route::FileAware
    } else {
        Route::Chat
    }
}

/// Provider-agnostic prompt. Built per dispatch and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledPayload {
    pub transcript_text: String,
    pub file_context_text: Option<String>,
    pub search_context_text: Option<String>,
    pub language_directive: Option<String>,
}

impl AssembledPayload {
    pub fn from_turns(turns: &[ChatTurn]) -> Self {
        Self {
            transcript_text: format_transcript(turns),
            ..Self::default()
        }
    }

    /// Flatten into the single text block both backends receive.
    pub fn render(&self) -> String {
        let mut out = self.transcript_text.clone();
        if let Some(directive) = &self.language_directive {
            push_block(&mut out, &format!("system: {directive}"));
        }
        if let Some(files) = &self.file_context_text {
            push_block(&mut out, &format!("{FILES_HEADER}\n{files}"));
        }
        if let Some(search) = &self.search_context_text {
            push_block(&mut out, &format!("{SEARCH_HEADER}\n{search}"));
        }
        out
    }
}

fn push_block(out: &mut String, block: &str) {
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block);
}

pub fn assemble(
    turns: &[ChatTurn],
    files: &[FileContextUnit],
    search_text: Option<&str>,
    language: Option<&str>,
) -> AssembledPayload {
    AssembledPayload {
        transcript_text: format_transcript(turns),
        file_context_text: (!files.is_empty()).then(|| format_files(files)),
        search_context_text: search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        language_directive: language.map(language_directive),
    }
}

fn format_transcript(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_files(files: &[FileContextUnit]) -> String {
    files
        .iter()
        .map(format_file)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_file(unit: &FileContextUnit) -> String {
    let size = format_kb(unit.size_bytes);
    // Binary payloads are summarized; the base64 body stays out of the prompt.
    let content = match unit.kind {
        ContentKind::Binary => format!("[Binary content - {}, {} omitted]", unit.mime_type, size),
        ContentKind::Text | ContentKind::Document => unit.content.clone(),
    };
    format!(
        "File: {}\nType: {}\nSize: {}\nContent: {}\n---\n",
        unit.name, unit.mime_type, size, content
    )
}

pub fn format_kb(size_bytes: u64) -> String {
    format!("{:.1} KB", size_bytes as f64 / 1024.0)
}
