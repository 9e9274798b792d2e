//! SQL statement execution on a compute warehouse.
//!
//! Statements are submitted with inline, JSON-array results and a server-side
//! wait. If the statement is still `PENDING`/`RUNNING` when the submit call
//! returns, the status endpoint is polled every second.
//!
//! Two bounds apply:
//! - server side: `wait_timeout` plus `on_wait_timeout = CANCEL`;
//! - client side: the whole call, submission included, must finish within
//!   `timeout_secs` or it fails with [`GenieError::Timeout`].
//!
//! Statement failures and transport errors surface as
//! [`GenieError::QueryExecution`].

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{GenieError, Result};
use crate::models::{ResultChunk, StatementResponse, StatementResult, StatementState};
use crate::progress::{NoProgress, PollEvent, PollReporter};
use crate::transport::Transport;

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

/// Largest server-side wait the statement API accepts.
const MAX_SERVER_WAIT_SECS: u64 = 50;
/// Smallest non-zero server-side wait the statement API accepts.
const MIN_SERVER_WAIT_SECS: u64 = 5;
/// Headroom on top of the server-side wait before the submit request gives up.
const SUBMIT_MARGIN_SECS: u64 = 10;

#[derive(Clone)]
pub struct StatementExecutor {
    transport: Transport,
    poll_interval: Duration,
    reporter: Arc<dyn PollReporter>,
}

impl StatementExecutor {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_secs(1),
            reporter: Arc::new(NoProgress),
        }
    }

    pub fn from_config(config: &Config, transport: Transport) -> Self {
        Self::new(transport).with_poll_interval(config.polling.statement_interval())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PollReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run `sql` on `warehouse_id` and return its manifest and rows.
    pub async fn execute(
        &self,
        warehouse_id: &str,
        sql: &str,
        timeout_secs: u64,
    ) -> Result<StatementResult> {
        if timeout_secs == 0 {
            return Err(GenieError::InvalidInput(
                "statement timeout must be positive".to_string(),
            ));
        }
        if sql.trim().is_empty() {
            return Err(GenieError::InvalidInput(
                "statement must not be empty".to_string(),
            ));
        }

        let budget = Duration::from_secs(timeout_secs);
        match tokio::time::timeout(budget, self.run(warehouse_id, sql, timeout_secs)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(warehouse_id, timeout_secs, "statement timed out locally");
                Err(GenieError::Timeout {
                    what: "SQL statement".to_string(),
                    secs: timeout_secs,
                })
            }
        }
    }

    async fn run(&self, warehouse_id: &str, sql: &str, timeout_secs: u64) -> Result<StatementResult> {
        let server_wait = server_wait_secs(timeout_secs);
        let body = json!({
            "statement": sql,
            "warehouse_id": warehouse_id,
            "wait_timeout": format!("{}s", server_wait),
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
            "on_wait_timeout": "CANCEL",
        });

        let started = Instant::now();
        let path = format!("{}/", STATEMENTS_PATH);
        let submitted: Result<StatementResponse> = if server_wait > 0 {
            let hold = Duration::from_secs(server_wait + SUBMIT_MARGIN_SECS);
            self.transport.post_with_timeout(&path, &body, hold).await
        } else {
            self.transport.post(&path, &body).await
        };
        let mut response = submitted.map_err(wrap_failure)?;

        loop {
            match response.status.state {
                StatementState::Succeeded => return self.collect(response).await,
                StatementState::Failed => {
                    let message = response
                        .status
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(GenieError::QueryExecution(message));
                }
                StatementState::Canceled => {
                    return Err(GenieError::QueryExecution(
                        "statement was canceled".to_string(),
                    ))
                }
                StatementState::Closed | StatementState::Unknown => {
                    return Err(GenieError::QueryExecution(format!(
                        "statement ended in unexpected state {:?}",
                        response.status.state
                    )))
                }
                StatementState::Pending | StatementState::Running => {}
            }

            let statement_id = response
                .statement_id
                .clone()
                .ok_or_else(|| GenieError::missing_key("statement_id", "statement status"))?;

            self.reporter.report(PollEvent::Statement {
                statement_id: statement_id.clone(),
                state: format!("{:?}", response.status.state).to_uppercase(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });

            tokio::time::sleep(self.poll_interval).await;
            response = self.status(&statement_id).await?;
        }
    }

    /// Current status (and inline result, once succeeded) of a statement.
    pub async fn status(&self, statement_id: &str) -> Result<StatementResponse> {
        self.transport
            .get(&format!("{}/{}", STATEMENTS_PATH, statement_id))
            .await
            .map_err(wrap_failure)
    }

    async fn collect(&self, response: StatementResponse) -> Result<StatementResult> {
        let statement_id = response.statement_id.unwrap_or_default();
        let manifest = response
            .manifest
            .ok_or_else(|| GenieError::missing_key("manifest", "succeeded statement"))?;

        let mut rows = Vec::new();
        let mut next = None;
        if let Some(data) = response.result {
            rows.extend(data.data_array.unwrap_or_default());
            next = data.next_chunk_internal_link;
        }

        // Results larger than one inline chunk are paged.
        while let Some(link) = next {
            let chunk: ResultChunk = self.transport.get(&link).await.map_err(wrap_failure)?;
            rows.extend(chunk.data_array.unwrap_or_default());
            next = chunk.next_chunk_internal_link;
        }

        let width = manifest.schema.columns.len();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(GenieError::MalformedResponse(format!(
                "row {} has {} values but the manifest has {} columns",
                index,
                row.len(),
                width
            )));
        }

        tracing::info!(statement_id = %statement_id, rows = rows.len(), "statement succeeded");
        Ok(StatementResult {
            statement_id,
            manifest,
            rows,
        })
    }
}

/// Server-side wait: 0 (asynchronous) below the API minimum, otherwise the
/// budget capped at the API maximum.
fn server_wait_secs(timeout_secs: u64) -> u64 {
    if timeout_secs < MIN_SERVER_WAIT_SECS {
        0
    } else {
        timeout_secs.min(MAX_SERVER_WAIT_SECS)
    }
}

fn wrap_failure(e: GenieError) -> GenieError {
    match e {
        GenieError::Transport { .. } => GenieError::QueryExecution(e.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_wait_bounds() {
        assert_eq!(server_wait_secs(1), 0);
        assert_eq!(server_wait_secs(4), 0);
        assert_eq!(server_wait_secs(5), 5);
        assert_eq!(server_wait_secs(30), 30);
        assert_eq!(server_wait_secs(600), 50);
    }

    #[test]
    fn transport_errors_become_execution_errors() {
        let wrapped = wrap_failure(GenieError::Transport {
            status: Some(400),
            url: "http://w/api/2.0/sql/statements/".into(),
            message: "INVALID_PARAMETER_VALUE: bad warehouse".into(),
        });
        match wrapped {
            GenieError::QueryExecution(msg) => assert!(msg.contains("bad warehouse")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            wrap_failure(GenieError::MalformedResponse("x".into())),
            GenieError::MalformedResponse(_)
        ));
    }

    #[tokio::test]
    async fn zero_timeout_rejected() {
        let transport = Transport::new("http://127.0.0.1:9", "t", Duration::from_secs(1)).unwrap();
        let err = StatementExecutor::new(transport)
            .execute("wh", "SELECT 1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GenieError::InvalidInput(_)));
    }
}
