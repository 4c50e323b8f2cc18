//! Document-only answering
//!
//! Retrieval gates generation: with nothing relevant retrieved the
//! generation service is never called and a fixed refusal is returned.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::retrieval::Retriever;
use crate::storage::DocumentRegistry;
use crate::types::{ChatResponse, Conversation, Turn};

use super::conversation::ConversationStore;
use super::prompt::PromptBuilder;

/// Reply when the registry holds no documents
pub const NO_DOCUMENTS_REPLY: &str = "I can only answer questions based on the documents provided. \
No documents have been uploaded yet. Please upload documents first in the Documents tab.";

/// Reply when nothing retrieved clears the similarity threshold
pub const NOT_COVERED_REPLY: &str = "I can only answer questions based on the documents provided. \
The information needed to answer this question is not available in the provided documents. \
Please ask questions related to the uploaded documents.";

/// Answer orchestrator: retrieval, refusal gate, generation, history
pub struct AnswerOrchestrator {
    registry: Arc<DocumentRegistry>,
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmProvider>,
    conversations: Arc<ConversationStore>,
    max_history_turns: usize,
}

impl AnswerOrchestrator {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmProvider>,
        conversations: Arc<ConversationStore>,
        max_history_turns: usize,
    ) -> Self {
        Self {
            registry,
            retriever,
            llm,
            conversations,
            max_history_turns,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    /// Answer one user turn
    ///
    /// The conversation stays locked for the whole turn. A failed turn
    /// leaves it untouched, and a conversation with no recorded turns is
    /// dropped again.
    pub async fn respond(&self, conversation_id: Option<&str>, user_text: &str) -> Result<ChatResponse> {
        let mut conversation = self.conversations.checkout(conversation_id).await;
        let result = self.answer(&mut conversation, user_text).await;

        if result.is_err() && conversation.turns.is_empty() {
            let id = conversation.id.clone();
            drop(conversation);
            self.conversations.discard_if_empty(&id);
        }
        result
    }

    async fn answer(&self, conversation: &mut Conversation, user_text: &str) -> Result<ChatResponse> {
        let conversation_id = conversation.id.clone();

        if self.registry.is_empty()? {
            tracing::info!("No documents registered; refusing ({})", conversation_id);
            conversation.record(
                Turn::user(user_text),
                Turn::assistant(NO_DOCUMENTS_REPLY, Vec::new()),
            );
            return Ok(ChatResponse {
                response: NO_DOCUMENTS_REPLY.to_string(),
                conversation_id,
                sources: Vec::new(),
            });
        }

        let retrieved = self.retriever.retrieve(user_text).await?;
        if retrieved.is_empty() {
            tracing::info!(
                "Nothing cleared threshold {}; refusing ({})",
                self.retriever.similarity_threshold(),
                conversation_id
            );
            conversation.record(
                Turn::user(user_text),
                Turn::assistant(NOT_COVERED_REPLY, Vec::new()),
            );
            return Ok(ChatResponse {
                response: NOT_COVERED_REPLY.to_string(),
                conversation_id,
                sources: Vec::new(),
            });
        }

        let sources = retrieved.filenames();
        let request = PromptBuilder::build_request(
            conversation.recent(self.max_history_turns),
            &retrieved,
            user_text,
        );

        let answer = self.llm.generate(&request).await.map_err(|e| match e {
            Error::GenerationUnavailable(_) => e,
            other => Error::GenerationUnavailable(other.to_string()),
        })?;

        tracing::info!(
            "Answered from {} fragments across {} documents ({})",
            retrieved.len(),
            sources.len(),
            conversation_id
        );

        conversation.record(
            Turn::user(user_text),
            Turn::assistant(answer.clone(), sources.clone()),
        );

        Ok(ChatResponse {
            response: answer,
            conversation_id,
            sources,
        })
    }
}
