//! Web search by delegation: the provider is asked to act as a search engine
//! and its summary is returned as plain text. No index is queried.

use crate::assembler::{language_name, AssembledPayload};
use crate::llm::{ChatTurn, LlmError, Provider};

/// Shown in place of a summary when the search fails.
pub const SEARCH_APOLOGY: &str = "I couldn't complete the search. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("search failed: {0}")]
    Dispatch(#[from] LlmError),
}

fn instruction(language: &str) -> String {
    format!(
        "You are a search engine assistant. For the following search query, provide relevant, \
factual information in {} language. Format your response as if showing search results, including:\n\
- A brief summary of the topic\n\
- Key facts and details\n\
- Any relevant dates or statistics\n\
- Common questions people ask about this topic\n\
Keep the response informative but concise.",
        language_name(language)
    )
}

pub fn build_payload(query: &str, language: &str) -> AssembledPayload {
    AssembledPayload::from_turns(&[
        ChatTurn::system(instruction(language)),
        ChatTurn::user(format!("Search query: {}", query.trim())),
    ])
}

/// Unlike [`Provider::chat`], failures are returned to the caller.
pub async fn search_web(
    provider: &Provider,
    query: &str,
    language: &str,
) -> Result<String, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let response = provider.try_chat(&build_payload(query, language)).await?;
    tracing::info!(
        provider = provider.name(),
        summary_len = response.content.len(),
        "search summary received"
    );
    Ok(response.content)
}
