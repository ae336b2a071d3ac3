//! Prompt assembly and answer generation.
//!
//! Two templates, selected by [`AnswerMode`]:
//!
//! - **RAG**: a system message binding the model to the retrieved context
//!   (and telling it to say so when the context does not contain the
//!   answer), the prior turns, then the question.
//! - **General**: a plain assistant system message, the prior turns, then
//!   the question.
//!
//! Either way the model is called exactly once and its text is returned
//! unchanged. The composer keeps no state between calls.

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::models::{ChatMessage, ConversationTurn, ScoredChunk};

const RAG_SYSTEM_PROMPT: &str = "You are an expert assistant. Your task is to provide a detailed \
and comprehensive answer to the user's question based *only* on the following retrieved context. \
Synthesize the information, explain key concepts, and include relevant details from the text. \
If the answer is not present in the context, state that you cannot answer based on the provided \
document.";

const GENERAL_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's question based on the conversation history.";

/// Which template to use.
#[derive(Debug, Clone, Copy)]
pub enum AnswerMode<'c> {
    /// Answer from retrieved chunks only, in retrieval order.
    Rag(&'c [ScoredChunk]),
    General,
}

pub struct AnswerComposer<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> AnswerComposer<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Build the prompt for `mode` and return the model's raw reply.
    pub async fn answer(
        &self,
        mode: AnswerMode<'_>,
        history: &[ConversationTurn],
        question: &str,
    ) -> Result<String> {
        let messages = build_messages(mode, history, question);
        self.model.generate(&messages).await
    }
}

/// Assemble the full message list for `mode`.
pub fn build_messages(
    mode: AnswerMode<'_>,
    history: &[ConversationTurn],
    question: &str,
) -> Vec<ChatMessage> {
    let system = match mode {
        AnswerMode::Rag(chunks) => format!(
            "{}\n\nContext:\n{}",
            RAG_SYSTEM_PROMPT,
            format_context(chunks)
        ),
        AnswerMode::General => GENERAL_SYSTEM_PROMPT.to_string(),
    };

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(question));
    messages
}

/// Join chunk texts with blank lines, in the order given.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    fn chunk(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk_id: text.to_string(),
            namespace: "doc".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_general_layout() {
        let history = vec![ConversationTurn::User("Hi".into())];
        let msgs = build_messages(AnswerMode::General, &history, "What's 2+2?");
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, MessageRole::System);
        assert!(!msgs[0].content.contains("Context:"));
        assert_eq!(msgs[1], ChatMessage::user("Hi"));
        assert_eq!(msgs[2], ChatMessage::user("What's 2+2?"));
    }

    #[test]
    fn test_rag_layout_keeps_retrieval_order() {
        let chunks = vec![chunk("second in doc"), chunk("first in doc")];
        let history = vec![
            ConversationTurn::User("Hello".into()),
            ConversationTurn::Assistant("Hi there".into()),
        ];
        let msgs = build_messages(AnswerMode::Rag(&chunks), &history, "Summarize");
        assert_eq!(msgs.len(), 4);
        assert!(msgs[0].content.contains("*only*"));
        assert!(msgs[0]
            .content
            .ends_with("Context:\nsecond in doc\n\nfirst in doc"));
        assert_eq!(msgs[2], ChatMessage::assistant("Hi there"));
        assert_eq!(msgs[3].content, "Summarize");
    }

    #[test]
    fn test_rag_with_empty_context_still_instructs_refusal() {
        let msgs = build_messages(AnswerMode::Rag(&[]), &[], "Anything?");
        assert!(msgs[0].content.contains("cannot answer"));
        assert!(msgs[0].content.ends_with("Context:\n"));
    }
}
