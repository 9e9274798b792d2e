//! End-to-end question answering.
//!
//! ```text
//! question ──▶ ConversationClient::ask ──▶ AgentReply
//!                                           │
//!                  text ◀───────────────────┤
//!                                           ▼ query
//!                               StatementExecutor::execute
//!                                           │
//!                                           ▼
//!                                ResultShaper::shape ──▶ ShapedResponse
//! ```
//!
//! Transport failures while talking to the agent propagate as errors.
//! Anything that goes wrong after the agent produced SQL (missing warehouse,
//! failed statement, timeout) becomes an error shape, so the caller always
//! has something to display.

use serde::Serialize;

use crate::config::Config;
use crate::conversation::ConversationClient;
use crate::error::Result;
use crate::models::MessageStatus;
use crate::shape::{AgentReply, ResultShaper, ShapedResponse};
use crate::statement::StatementExecutor;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub conversation_id: String,
    pub message_id: String,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<AgentReply>,
    /// `None` when the agent message ended FAILED or CANCELLED.
    pub response: Option<ShapedResponse>,
}

pub struct Pipeline {
    conversation: ConversationClient,
    executor: StatementExecutor,
    shaper: ResultShaper,
    warehouse_id: Option<String>,
    statement_timeout_secs: u64,
}

impl Pipeline {
    pub fn new(
        conversation: ConversationClient,
        executor: StatementExecutor,
        shaper: ResultShaper,
    ) -> Self {
        Self {
            conversation,
            executor,
            shaper,
            warehouse_id: None,
            statement_timeout_secs: 30,
        }
    }

    pub fn from_config(
        config: &Config,
        conversation: ConversationClient,
        executor: StatementExecutor,
    ) -> Self {
        let mut pipeline = Self::new(conversation, executor, ResultShaper::default());
        pipeline.warehouse_id = config.workspace.warehouse_id.clone();
        pipeline.statement_timeout_secs = config.polling.statement_timeout_secs;
        pipeline
    }

    pub fn with_warehouse(mut self, warehouse_id: &str, timeout_secs: u64) -> Self {
        self.warehouse_id = Some(warehouse_id.to_string());
        self.statement_timeout_secs = timeout_secs;
        self
    }

    pub fn conversation(&self) -> &ConversationClient {
        &self.conversation
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    pub fn warehouse_id(&self) -> Option<&str> {
        self.warehouse_id.as_deref()
    }

    pub fn statement_timeout_secs(&self) -> u64 {
        self.statement_timeout_secs
    }

    pub async fn respond(
        &self,
        question: &str,
        conversation_id: Option<&str>,
    ) -> Result<PipelineOutcome> {
        let answer = self.conversation.ask(question, conversation_id).await?;

        let response = if answer.is_completed() {
            Some(match &answer.reply {
                Some(AgentReply::Text { message }) => ShapedResponse::text(question, message),
                Some(AgentReply::Query {
                    message,
                    description,
                    ..
                }) => self.run_query(question, message, description.as_deref()).await,
                None => ShapedResponse::error(
                    question,
                    "the agent returned neither a text answer nor a query",
                ),
            })
        } else {
            tracing::info!(status = %answer.status, "agent message did not complete");
            None
        };

        Ok(PipelineOutcome {
            conversation_id: answer.conversation_id,
            message_id: answer.message_id,
            status: answer.status,
            reply: answer.reply,
            response,
        })
    }

    async fn run_query(&self, question: &str, sql: &str, description: Option<&str>) -> ShapedResponse {
        let Some(warehouse_id) = self.warehouse_id.as_deref() else {
            return ShapedResponse::error(question, "no warehouse configured to execute the query");
        };
        match self
            .executor
            .execute(warehouse_id, sql, self.statement_timeout_secs)
            .await
        {
            Ok(result) => self.shaper.shape(question, &result, description),
            Err(e) => {
                tracing::warn!(error = %e, "query execution failed");
                ShapedResponse::error(question, &e.to_string())
            }
        }
    }
}
