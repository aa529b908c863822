//! Per-conversation turn processing.
//!
//! Each conversation gets its own worker task fed by a queue: turns from
//! the same conversation run strictly in order (a correction loop finishes
//! before the next turn starts), while distinct conversations run
//! concurrently with no ordering between them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anima_core::types::ConversationId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::turn::TurnPipeline;
use crate::types::{MessageOrigin, TurnReport};

struct TurnJob {
    origin: MessageOrigin,
    reply: String,
    done: oneshot::Sender<TurnReport>,
}

/// Routes model replies to per-conversation sequential workers.
pub struct ConversationRouter {
    pipeline: Arc<TurnPipeline>,
    workers: Mutex<HashMap<ConversationId, mpsc::UnboundedSender<TurnJob>>>,
}

impl ConversationRouter {
    pub fn new(pipeline: Arc<TurnPipeline>) -> Self {
        Self {
            pipeline,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Queue one model reply for its conversation. The returned receiver
    /// resolves with the turn report once the conversation's worker gets
    /// to it; dropping the receiver does not cancel processing.
    pub fn submit(&self, origin: MessageOrigin, reply: String) -> oneshot::Receiver<TurnReport> {
        let (done, receiver) = oneshot::channel();
        let job = TurnJob {
            origin: origin.clone(),
            reply,
            done,
        };

        let sender = self.worker_for(&origin.conversation);
        if sender.send(job).is_err() {
            // The worker exited (shutdown raced the submit); the receiver
            // resolves as closed and the caller sees the turn was dropped.
            warn!(conversation = %origin.conversation, "Turn dropped: conversation worker gone");
        }
        receiver
    }

    /// Number of conversations with a live worker.
    pub fn active_conversations(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Detach every conversation worker: queued turns drain, then the
    /// workers exit. A later submit starts a fresh worker.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock().unwrap();
        debug!(count = workers.len(), "Shutting down conversation workers");
        // Dropping the senders closes each queue; workers finish whatever
        // is already queued and exit.
        workers.clear();
    }

    fn worker_for(&self, conversation: &ConversationId) -> mpsc::UnboundedSender<TurnJob> {
        let mut workers = self.workers.lock().unwrap();
        if let Some(sender) = workers.get(conversation) {
            return sender.clone();
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        workers.insert(conversation.clone(), sender.clone());

        let pipeline = Arc::clone(&self.pipeline);
        let key = conversation.clone();
        tokio::spawn(async move {
            run_worker(pipeline, key, receiver).await;
        });

        sender
    }
}

async fn run_worker(
    pipeline: Arc<TurnPipeline>,
    conversation: ConversationId,
    mut jobs: mpsc::UnboundedReceiver<TurnJob>,
) {
    debug!(conversation = %conversation, "Conversation worker started");
    while let Some(job) = jobs.recv().await {
        let report = pipeline.process_reply(&job.origin, &job.reply).await;
        // The submitter may have stopped waiting; the work still happened.
        let _ = job.done.send(report);
    }
    debug!(conversation = %conversation, "Conversation worker stopped");
}
