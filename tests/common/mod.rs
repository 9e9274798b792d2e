//! In-process mock of the workspace agent and statement APIs.
//!
//! Message and statement responses are scripted: each GET returns the next
//! entry, and the last entry repeats once the script is exhausted.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use genie_harness::conversation::ConversationClient;
use genie_harness::statement::StatementExecutor;
use genie_harness::transport::Transport;

pub const SPACE_ID: &str = "space-1";
pub const TOKEN: &str = "test-token";

#[derive(Default)]
pub struct MockState {
    /// Successive bodies for GET message; `id`/`conversation_id` are filled in.
    pub message_script: Vec<Value>,
    pub message_polls: usize,
    /// First entry answers the submit, the rest answer status polls.
    pub statement_script: Vec<Value>,
    pub statement_calls: usize,
    /// How long the submit call is held open before answering.
    pub submit_delay: Option<Duration>,
    /// Result chunks by chunk index.
    pub chunks: HashMap<String, Value>,
    pub query_result: Value,
    /// (label, body) for every POST received.
    pub posts: Vec<(String, Value)>,
    pub last_authorization: Option<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

pub async fn spawn(state: MockState) -> (String, Shared) {
    let shared = Arc::new(Mutex::new(state));
    let app = Router::new()
        .route(
            "/api/2.0/genie/spaces/{space}/start-conversation",
            post(start_conversation),
        )
        .route(
            "/api/2.0/genie/spaces/{space}/conversations/{conv}/messages",
            post(follow_up),
        )
        .route(
            "/api/2.0/genie/spaces/{space}/conversations/{conv}/messages/{msg}",
            get(get_message),
        )
        .route(
            "/api/2.0/genie/spaces/{space}/conversations/{conv}/messages/{msg}/attachments/{att}/query-result",
            get(query_result),
        )
        .route("/api/2.0/sql/statements/", post(submit_statement))
        .route("/api/2.0/sql/statements/{id}", get(statement_status))
        .route(
            "/api/2.0/sql/statements/{id}/result/chunks/{index}",
            get(result_chunk),
        )
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), shared)
}

pub fn transport(base_url: &str) -> Transport {
    transport_with_timeout(base_url, Duration::from_secs(5))
}

pub fn transport_with_timeout(base_url: &str, request_timeout: Duration) -> Transport {
    Transport::new(base_url, TOKEN, request_timeout).unwrap()
}

/// Conversation client with a fast poll interval.
pub fn conversation_client(base_url: &str) -> ConversationClient {
    ConversationClient::new(transport(base_url), SPACE_ID)
        .with_poll_interval(Duration::from_millis(10))
}

pub fn executor(base_url: &str) -> StatementExecutor {
    StatementExecutor::new(transport(base_url)).with_poll_interval(Duration::from_millis(10))
}

pub fn message(status: &str, attachments: Value) -> Value {
    json!({ "status": status, "attachments": attachments })
}

pub fn text_message(content: &str) -> Value {
    message("COMPLETED", json!([{ "attachment_id": "att-t", "text": { "content": content } }]))
}

pub fn query_message(sql: &str, description: &str) -> Value {
    message(
        "COMPLETED",
        json!([{
            "attachment_id": "att-q",
            "query": { "query": sql, "description": description }
        }]),
    )
}

pub fn running_statement(id: &str) -> Value {
    json!({ "statement_id": id, "status": { "state": "RUNNING" } })
}

pub fn succeeded_statement(id: &str, columns: &[&str], rows: Value) -> Value {
    let columns: Vec<Value> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "name": name, "type_name": "STRING", "position": i }))
        .collect();
    json!({
        "statement_id": id,
        "status": { "state": "SUCCEEDED" },
        "manifest": {
            "schema": { "column_count": columns.len(), "columns": columns },
            "total_row_count": rows.as_array().map(|r| r.len()).unwrap_or(0)
        },
        "result": { "data_array": rows }
    })
}

fn scripted(script: &[Value], index: usize) -> Value {
    script
        .get(index.min(script.len().saturating_sub(1)))
        .cloned()
        .unwrap_or(Value::Null)
}

async fn start_conversation(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut st = state.lock().unwrap();
    st.last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    st.posts.push(("start".to_string(), body));
    Json(json!({
        "conversation_id": "conv-1",
        "message_id": "msg-1",
        "conversation": { "id": "conv-1" }
    }))
}

async fn follow_up(
    State(state): State<Shared>,
    Path((_space, conv)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if conv == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "conversation missing does not exist"
            })),
        )
            .into_response();
    }
    let mut st = state.lock().unwrap();
    st.posts.push((format!("follow_up:{}", conv), body));
    Json(json!({ "message_id": "msg-2", "conversation_id": conv })).into_response()
}

async fn get_message(
    State(state): State<Shared>,
    Path((_space, conv, msg)): Path<(String, String, String)>,
) -> Json<Value> {
    let mut st = state.lock().unwrap();
    let mut body = scripted(&st.message_script, st.message_polls);
    st.message_polls += 1;
    body["id"] = json!(msg);
    body["conversation_id"] = json!(conv);
    Json(body)
}

async fn query_result(State(state): State<Shared>) -> Json<Value> {
    Json(state.lock().unwrap().query_result.clone())
}

async fn submit_statement(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let (response, delay) = {
        let mut st = state.lock().unwrap();
        st.posts.push(("statement".to_string(), body));
        st.statement_calls = 1;
        (scripted(&st.statement_script, 0), st.submit_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Json(response)
}

async fn statement_status(
    State(state): State<Shared>,
    Path(_id): Path<String>,
) -> Json<Value> {
    let mut st = state.lock().unwrap();
    let response = scripted(&st.statement_script, st.statement_calls);
    st.statement_calls += 1;
    Json(response)
}

async fn result_chunk(
    State(state): State<Shared>,
    Path((_id, index)): Path<(String, String)>,
) -> Response {
    match state.lock().unwrap().chunks.get(&index) {
        Some(chunk) => Json(chunk.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
