pub mod assembler;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod file_store;
pub mod llm;
pub mod memory;
pub mod search;
pub mod session;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use assembler::{assemble, AssembledPayload, Route};
pub use config::Config;
pub use db::Database;
pub use file_store::{ContentKind, FileContextStore, FileContextUnit};
pub use llm::{ChatResponse, ChatTurn, LlmError, Provider, Role, APOLOGY};
pub use memory::ConversationMemory;
pub use session::{RecognitionError, Session, UploadReport};
pub use upload::{IngestError, Normalizer, UploadPolicy, UploadedFile};
