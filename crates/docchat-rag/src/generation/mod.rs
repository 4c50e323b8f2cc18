//! Answer generation: Ollama client, prompt assembly and the document-only orchestrator

pub mod conversation;
pub mod ollama;
pub mod orchestrator;
pub mod prompt;

pub use conversation::ConversationStore;
pub use ollama::{ChatMessage, OllamaClient};
pub use orchestrator::{AnswerOrchestrator, NOT_COVERED_REPLY, NO_DOCUMENTS_REPLY};
pub use prompt::{PromptBuilder, SYSTEM_INSTRUCTION};
