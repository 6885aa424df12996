//! Session controller: owns the transcript, the displayed upload list, the
//! file context store and the conversation memory, and is their only writer.

use crate::assembler::{self, Route};
use crate::db::Database;
use crate::file_store::{FileContextStore, FileContextUnit};
use crate::llm::{ChatTurn, ModelInfo, LlmError, Provider, Role};
use crate::memory::ConversationMemory;
use crate::search::{self, SEARCH_APOLOGY};
use crate::upload::{IngestError, Normalizer, UploadedFile};

pub const LISTENING_NOTICE: &str = "Listening... Speak now.";
pub const VOICE_APOLOGY: &str =
    "I'm sorry, I encountered an error with voice recognition. Please try typing your message instead.";
pub const SEARCH_PREFIX: &str = "🔍 Search: ";

/// Failure reported by the speech recognizer.
#[derive(Debug, thiserror::Error)]
#[error("voice recognition failed: {0}")]
pub struct RecognitionError(pub String);

/// Outcome of one upload batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Names committed to the store, in batch order.
    pub committed: Vec<String>,
    /// The failure that stopped the batch, if any.
    pub error: Option<IngestError>,
}

struct History {
    db: Database,
    conversation_id: String,
}

pub struct Session {
    provider: Provider,
    normalizer: Normalizer,
    language: String,
    transcript: Vec<ChatTurn>,
    displayed: Vec<FileContextUnit>,
    store: FileContextStore,
    memory: ConversationMemory,
    memory_enabled: bool,
    listening: bool,
    history: Option<History>,
}

impl Session {
    pub fn new(provider: Provider, normalizer: Normalizer) -> Self {
        Self {
            provider,
            normalizer,
            language: "en".to_string(),
            transcript: Vec::new(),
            displayed: Vec::new(),
            store: FileContextStore::new(),
            memory: ConversationMemory::default(),
            memory_enabled: false,
            listening: false,
            history: None,
        }
    }

    /// Persist user and assistant turns into a fresh conversation of `db`.
    pub fn with_history(mut self, db: Database) -> rusqlite::Result<Self> {
        let conversation = db.create_conversation(
            "Chat session",
            Some(self.provider.name()),
            Some(self.language.as_str()),
        )?;
        self.history = Some(History {
            db,
            conversation_id: conversation.id,
        });
        Ok(self)
    }

    pub fn with_language(mut self, code: &str) -> Self {
        self.set_language(code);
        self
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Files shown to the user. Independent of the context store.
    pub fn uploaded_files(&self) -> &[FileContextUnit] {
        &self.displayed
    }

    pub fn file_store(&self) -> &FileContextStore {
        &self.store
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory_enabled
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn database(&self) -> Option<&Database> {
        self.history.as_ref().map(|h| &h.db)
    }

    pub fn set_language(&mut self, code: &str) {
        self.language = code.trim().to_lowercase();
    }

    pub fn set_provider(&mut self, provider: Provider) {
        tracing::info!(provider = provider.name(), model = provider.model(), "provider selected");
        self.provider = provider;
    }

    /// Turning memory off forgets everything remembered so far.
    pub fn set_memory_enabled(&mut self, enabled: bool) {
        self.memory_enabled = enabled;
        if !enabled {
            self.memory.reset();
        }
    }

    /// Send a user message and return the assistant's reply. Blank messages
    /// are ignored.
    pub async fn send_message(&mut self, message: &str) -> Option<String> {
        if message.trim().is_empty() {
            return None;
        }
        Some(self.dispatch(message, None).await)
    }

    /// Like [`Session::send_message`], with a search summary for the message
    /// attached as extra context. A failed search only drops that section.
    pub async fn send_grounded(&mut self, message: &str) -> Option<String> {
        if message.trim().is_empty() {
            return None;
        }
        let summary = match search::search_web(&self.provider, message, &self.language).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "grounding search failed; sending without it");
                None
            }
        };
        Some(self.dispatch(message, summary.as_deref()).await)
    }

    async fn dispatch(&mut self, message: &str, search_text: Option<&str>) -> String {
        let user_turn = ChatTurn::user(message);
        self.push(user_turn.clone(), true);

        let context: Vec<ChatTurn> = if self.memory_enabled {
            self.memory.append(user_turn);
            self.memory.window()
        } else {
            vec![user_turn]
        };

        let route = assembler::select_route(&self.displayed, message);
        let files: &[FileContextUnit] = match route {
            Route::FileAware => self.store.snapshot(),
            Route::Chat => &[],
        };
        tracing::info!(
            route = ?route,
            context_turns = context.len(),
            files = files.len(),
            "assembling request"
        );
        let payload = assembler::assemble(&context, files, search_text, Some(&self.language));

        let response = self.provider.chat(&payload).await;
        let assistant_turn = ChatTurn::assistant(response.content.clone());
        if self.memory_enabled {
            self.memory.append(assistant_turn.clone());
        }
        self.push(assistant_turn, true);
        response.content
    }

    /// Ingest a batch one file at a time. Each file is committed as soon as
    /// it is read; the first failure stops the batch and earlier files stay.
    pub async fn upload(&mut self, files: Vec<UploadedFile>) -> UploadReport {
        let mut report = UploadReport::default();

        for file in &files {
            match self.normalizer.ingest(file).await {
                Ok(unit) => {
                    tracing::info!(name = %unit.name, kind = ?unit.kind, "file committed");
                    report.committed.push(unit.name.clone());
                    self.displayed.push(unit.clone());
                    self.store.add_many([unit]);
                }
                Err(e) => {
                    tracing::warn!(name = e.file_name(), error = %e, "upload batch aborted");
                    report.error = Some(e);
                    break;
                }
            }
        }

        if !report.committed.is_empty() {
            self.push(
                ChatTurn::assistant(format!(
                    "Successfully processed {} file(s): {}",
                    report.committed.len(),
                    report.committed.join(", ")
                )),
                false,
            );
        }
        if let Some(e) = &report.error {
            self.push(
                ChatTurn::assistant(format!("Error processing files: {e}")),
                false,
            );
        }
        report
    }

    /// Hide a file from the displayed list. The context store keeps it.
    pub fn remove_file(&mut self, name: &str) {
        self.displayed.retain(|f| f.name != name);
        self.push(ChatTurn::system(format!("File removed: {name}")), false);
    }

    pub fn clear_files(&mut self) {
        self.store.clear();
        self.displayed.clear();
        self.push(
            ChatTurn::system("All uploaded files have been cleared."),
            false,
        );
    }

    pub async fn search(&mut self, query: &str) -> String {
        self.push(ChatTurn::user(format!("{SEARCH_PREFIX}{query}")), true);
        let reply = match search::search_web(&self.provider, query, &self.language).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "search failed");
                SEARCH_APOLOGY.to_string()
            }
        };
        self.push(ChatTurn::assistant(reply.clone()), true);
        reply
    }

    /// Show the ephemeral listening notice while the recognizer runs.
    pub fn start_listening(&mut self) {
        if !self.listening {
            self.transcript.push(ChatTurn::system(LISTENING_NOTICE));
            self.listening = true;
        }
    }

    /// Drop the listening notice and handle the recognizer's result. Spoken
    /// text goes through exactly the same path as typed text.
    pub async fn finish_listening(
        &mut self,
        result: Result<String, RecognitionError>,
    ) -> Option<String> {
        if self.listening {
            if let Some(pos) = self
                .transcript
                .iter()
                .rposition(|t| t.role == Role::System && t.content == LISTENING_NOTICE)
            {
                self.transcript.remove(pos);
            }
            self.listening = false;
        }

        match result {
            Ok(text) => self.send_message(&text).await,
            Err(e) => {
                tracing::warn!(error = %e, "voice input failed");
                self.push(ChatTurn::assistant(VOICE_APOLOGY), false);
                Some(VOICE_APOLOGY.to_string())
            }
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.provider.list_models().await
    }

    fn push(&mut self, turn: ChatTurn, persist: bool) {
        if persist {
            if let Some(history) = &self.history {
                if let Err(e) =
                    history
                        .db
                        .add_message(&history.conversation_id, turn.role.as_str(), &turn.content)
                {
                    tracing::warn!(error = %e, "failed to persist message");
                }
            }
        }
        self.transcript.push(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::openai::OpenAiConfig;
    use crate::llm::APOLOGY;

    fn make_session() -> Session {
        // Unreachable backend: every dispatch falls back to the apology.
        let mut config = OpenAiConfig::groq("key".into());
        config.base_url = "http://127.0.0.1:9".into();
        Session::new(Provider::Groq(config), Normalizer::default())
    }

    fn text_file(name: &str, content: &str) -> UploadedFile {
        UploadedFile::from_bytes(name, "text/plain", content.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn upload_commits_to_both_lists() {
        let mut session = make_session();
        let report = session
            .upload(vec![text_file("a.txt", "alpha"), text_file("b.txt", "beta")])
            .await;

        assert_eq!(report.committed, vec!["a.txt", "b.txt"]);
        assert!(report.error.is_none());
        assert_eq!(session.uploaded_files().len(), 2);
        assert_eq!(session.file_store().len(), 2);
        assert_eq!(
            session.transcript().last().unwrap().content,
            "Successfully processed 2 file(s): a.txt, b.txt"
        );
    }

    #[tokio::test]
    async fn failure_stops_batch_without_rollback() {
        let mut session = make_session();
        let report = session
            .upload(vec![
                text_file("a.txt", "alpha"),
                UploadedFile::from_bytes("bad.txt", "text/plain", vec![0xff, 0xfe]),
                text_file("c.txt", "gamma"),
            ])
            .await;

        assert_eq!(report.committed, vec!["a.txt"]);
        assert!(matches!(report.error, Some(IngestError::ReadFailure { .. })));
        let names: Vec<_> = session.file_store().snapshot().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt"]);

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].content.starts_with("Error processing files: Failed to read file: bad.txt"));
    }

    #[tokio::test]
    async fn remove_only_hides_from_display() {
        let mut session = make_session();
        session.upload(vec![text_file("a.txt", "alpha")]).await;
        session.remove_file("a.txt");

        assert!(session.uploaded_files().is_empty());
        assert_eq!(session.file_store().len(), 1);
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, "File removed: a.txt");
    }

    #[tokio::test]
    async fn clear_resets_store_and_display() {
        let mut session = make_session();
        session.upload(vec![text_file("a.txt", "alpha")]).await;
        session.upload(vec![text_file("a.txt", "again")]).await;
        assert_eq!(session.file_store().len(), 2);

        session.clear_files();
        assert!(session.file_store().is_empty());
        assert!(session.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_yields_apology() {
        let mut session = make_session();
        let reply = session.send_message("hello").await.unwrap();
        assert_eq!(reply, APOLOGY);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1], ChatTurn::assistant(APOLOGY));
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let mut session = make_session();
        assert_eq!(session.send_message("   ").await, None);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn disabling_memory_resets_window() {
        let mut session = make_session();
        session.set_memory_enabled(true);
        session.send_message("one").await;
        session.send_message("two").await;
        assert_eq!(session.memory().window().len(), 4);

        session.set_memory_enabled(false);
        assert!(session.memory().window().is_empty());
        session.set_memory_enabled(true);
        assert!(session.memory().window().is_empty());
    }

    #[tokio::test]
    async fn memory_off_does_not_accumulate() {
        let mut session = make_session();
        session.send_message("one").await;
        assert!(session.memory().window().is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_replaced() {
        let mut session = make_session();
        let reply = session.search("rust").await;
        assert_eq!(reply, SEARCH_APOLOGY);
        assert_eq!(session.transcript()[0].content, "🔍 Search: rust");
    }

    #[tokio::test]
    async fn listening_notice_is_trimmed() {
        let mut session = make_session();
        session.start_listening();
        session.start_listening();
        assert_eq!(session.transcript(), &[ChatTurn::system(LISTENING_NOTICE)]);

        let reply = session
            .finish_listening(Err(RecognitionError("no microphone".into())))
            .await;
        assert_eq!(reply.as_deref(), Some(VOICE_APOLOGY));
        assert_eq!(session.transcript(), &[ChatTurn::assistant(VOICE_APOLOGY)]);
    }

    #[tokio::test]
    async fn recognized_text_is_sent_like_typed_input() {
        let mut session = make_session();
        session.start_listening();
        session.finish_listening(Ok("hola".into())).await;

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0], ChatTurn::user("hola"));
        assert_eq!(transcript[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn history_persists_exchanges_only() {
        let db = Database::open_in_memory().unwrap();
        let mut session = make_session().with_history(db).unwrap();
        session.upload(vec![text_file("a.txt", "alpha")]).await;
        session.remove_file("a.txt");
        session.send_message("hi").await;

        let recent = session.database().unwrap().recent_messages(10).unwrap();
        let roles: Vec<_> = recent.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert_eq!(recent[0].content, "hi");
    }
}
