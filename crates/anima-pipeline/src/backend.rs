//! The reasoning-backend boundary.
//!
//! The pipeline suspends at a correction round by awaiting one explicit
//! async call: hand the correction block to the backend, get a fresh reply
//! back. How the backend is queried is someone else's concern.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use anima_core::types::ConversationId;

use crate::error::BackendError;
use crate::types::CorrectionMessage;

/// External reasoning step consulted during correction rounds.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Submit a correction block for a conversation and return the
    /// backend's next reply, which re-enters the action extractor.
    async fn correct(
        &self,
        conversation: &ConversationId,
        correction: &CorrectionMessage,
    ) -> Result<String, BackendError>;
}

/// Backend that replays a queue of canned replies.
///
/// Used by the offline mode of the `anima` binary and throughout the test
/// suites; an empty queue reports `Exhausted`.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// Queue another reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn correct(
        &self,
        _conversation: &ConversationId,
        _correction: &CorrectionMessage,
    ) -> Result<String, BackendError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(BackendError::Exhausted)
    }
}
