//! Chat sessions persisted in the video store.

use super::ChatError;
use crate::llm::Message;
use crate::video_store::{ChatMessage, ChatRole, ChatSession, VideoStore};
use std::sync::Arc;
use tracing::debug;

const MAX_TRANSCRIPT_MESSAGES: usize = 1000;

pub struct ConversationMemory {
    store: Arc<dyn VideoStore>,
    history_limit: usize,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn VideoStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    /// Resume a session by id, or start a new one when no id is given.
    pub fn open_session(
        &self,
        session_id: Option<&str>,
        video_id: Option<i64>,
    ) -> Result<ChatSession, ChatError> {
        match session_id {
            Some(id) => self
                .store
                .get_chat_session(id)?
                .ok_or_else(|| ChatError::SessionNotFound(id.to_string())),
            None => {
                let session = self.store.create_chat_session(video_id)?;
                debug!("Started chat session {} (video {:?})", session.id, video_id);
                Ok(session)
            }
        }
    }

    /// Previous turns of a session as LLM messages, oldest first.
    pub fn history(&self, session_id: &str) -> Result<Vec<Message>, ChatError> {
        if self.history_limit == 0 {
            return Ok(Vec::new());
        }
        let messages = self
            .store
            .get_recent_chat_messages(session_id, self.history_limit)?;
        Ok(messages
            .into_iter()
            .map(|m| match m.role {
                ChatRole::User => Message::user(m.content),
                ChatRole::Assistant => Message::assistant(m.content),
            })
            .collect())
    }

    pub fn record_exchange(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        frame_ids: &[i64],
    ) -> Result<(), ChatError> {
        self.store
            .append_chat_message(session_id, ChatRole::User, question, &[])?;
        self.store
            .append_chat_message(session_id, ChatRole::Assistant, answer, frame_ids)?;
        Ok(())
    }

    /// Transcript of a session, up to the last thousand messages.
    pub fn transcript(
        &self,
        session_id: &str,
    ) -> Result<(ChatSession, Vec<ChatMessage>), ChatError> {
        let session = self
            .store
            .get_chat_session(session_id)?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        let messages = self.store.get_recent_chat_messages(session_id, MAX_TRANSCRIPT_MESSAGES)?;
        Ok((session, messages))
    }
}
