//! Conversation client for the natural-language-to-SQL agent ("space").
//!
//! Opens conversations, submits follow-ups, and polls messages until they
//! reach a terminal status.
//!
//! # Endpoints
//!
//! | Method | Path (under `/api/2.0/genie/spaces/{space_id}`) |
//! |--------|------|
//! | `POST` | `/start-conversation` |
//! | `POST` | `/conversations/{conversation_id}/messages` |
//! | `GET`  | `/conversations/{conversation_id}/messages/{message_id}` |
//! | `GET`  | `/conversations/{conversation_id}/messages/{message_id}/attachments/{attachment_id}/query-result` |
//!
//! # Polling
//!
//! [`ConversationClient::wait_for_completion`] re-fetches the message every
//! poll interval (3s by default) until the status is `COMPLETED`, `FAILED`, or
//! `CANCELLED`. Each non-terminal poll is reported through the configured
//! [`PollReporter`]. A deadline, when set, turns an endless wait into
//! [`GenieError::Timeout`].
//!
//! `FAILED` and `CANCELLED` are returned as ordinary messages, not errors:
//! callers must check [`Answer::status`].

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::error::{GenieError, Result};
use crate::models::{FollowUpResponse, Message, MessageStatus, StartConversationResponse};
use crate::progress::{NoProgress, PollEvent, PollReporter};
use crate::shape::{interpret_message, AgentReply};
use crate::transport::Transport;

/// Outcome of [`ConversationClient::ask`].
#[derive(Debug, Clone)]
pub struct Answer {
    pub conversation_id: String,
    pub message_id: String,
    pub status: MessageStatus,
    /// `None` for FAILED/CANCELLED messages and for completed messages with
    /// no recognizable attachment.
    pub reply: Option<AgentReply>,
    pub message: Message,
}

impl Answer {
    pub fn is_completed(&self) -> bool {
        self.status == MessageStatus::Completed
    }
}

#[derive(Clone)]
pub struct ConversationClient {
    transport: Transport,
    space_id: String,
    poll_interval: Duration,
    deadline: Option<Duration>,
    reporter: Arc<dyn PollReporter>,
    locks: ConversationLocks,
}

impl ConversationClient {
    pub fn new(transport: Transport, space_id: &str) -> Self {
        Self {
            transport,
            space_id: space_id.to_string(),
            poll_interval: Duration::from_secs(3),
            deadline: None,
            reporter: Arc::new(NoProgress),
            locks: ConversationLocks::default(),
        }
    }

    pub fn from_config(config: &Config, transport: Transport) -> Self {
        Self::new(transport, &config.workspace.space_id)
            .with_poll_interval(config.polling.message_interval())
            .with_deadline(config.polling.message_deadline())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PollReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn space_path(&self) -> String {
        format!("/api/2.0/genie/spaces/{}", self.space_id)
    }

    /// Open a new conversation with `question` as its first message.
    pub async fn start(&self, question: &str) -> Result<StartConversationResponse> {
        let question = require_question(question)?;
        let path = format!("{}/start-conversation", self.space_path());
        let started: StartConversationResponse =
            self.transport.post(&path, &json!({ "content": question })).await?;
        tracing::info!(
            conversation_id = %started.conversation_id,
            message_id = %started.message_id,
            "conversation started"
        );
        Ok(started)
    }

    /// Submit a follow-up question in an existing conversation.
    ///
    /// The server decides whether `conversation_id` is still valid.
    pub async fn follow_up(&self, conversation_id: &str, question: &str) -> Result<String> {
        let question = require_question(question)?;
        if conversation_id.trim().is_empty() {
            return Err(GenieError::InvalidInput(
                "conversation id must not be empty".to_string(),
            ));
        }
        let path = format!(
            "{}/conversations/{}/messages",
            self.space_path(),
            conversation_id
        );
        let resp: FollowUpResponse =
            self.transport.post(&path, &json!({ "content": question })).await?;
        tracing::info!(conversation_id, message_id = %resp.message_id, "follow-up submitted");
        Ok(resp.message_id)
    }

    pub async fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<Message> {
        let path = format!(
            "{}/conversations/{}/messages/{}",
            self.space_path(),
            conversation_id,
            message_id
        );
        self.transport.get(&path).await
    }

    /// Fetch the stored result of a query attachment.
    pub async fn query_result(
        &self,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Value> {
        let path = format!(
            "{}/conversations/{}/messages/{}/attachments/{}/query-result",
            self.space_path(),
            conversation_id,
            message_id,
            attachment_id
        );
        self.transport.get(&path).await
    }

    /// Poll until the message reaches a terminal status.
    pub async fn wait_for_completion(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Message> {
        let started = Instant::now();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            let message = self.get_message(conversation_id, message_id).await?;
            if message.status.is_terminal() {
                tracing::info!(
                    conversation_id,
                    message_id,
                    status = %message.status,
                    polls = attempt,
                    "message finished"
                );
                return Ok(message);
            }

            self.reporter.report(PollEvent::Message {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                status: message.status.to_string(),
                attempt,
            });

            if let Some(deadline) = self.deadline {
                if started.elapsed() + self.poll_interval > deadline {
                    return Err(GenieError::Timeout {
                        what: format!("message {}", message_id),
                        secs: deadline.as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Ask a question: start a new conversation when `conversation_id` is
    /// `None`, otherwise follow up in it. Waits for the terminal message and
    /// interprets its attachments.
    ///
    /// Concurrent asks against the same conversation are serialized.
    pub async fn ask(&self, question: &str, conversation_id: Option<&str>) -> Result<Answer> {
        let (conversation_id, message_id, _guard) = match conversation_id {
            None => {
                let started = self.start(question).await?;
                let guard = self.locks.acquire(&started.conversation_id).await;
                (started.conversation_id, started.message_id, guard)
            }
            Some(id) => {
                let guard = self.locks.acquire(id).await;
                let message_id = self.follow_up(id, question).await?;
                (id.to_string(), message_id, guard)
            }
        };

        let message = self.wait_for_completion(&conversation_id, &message_id).await?;
        let reply = interpret_message(&message);

        Ok(Answer {
            conversation_id,
            message_id,
            status: message.status.clone(),
            reply,
            message,
        })
    }
}

fn require_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(GenieError::InvalidInput(
            "question must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Per-conversation async locks, so two asks on one conversation never
/// interleave their submit and poll phases.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
