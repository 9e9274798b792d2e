//! Wire types for the agent conversation API and the SQL statement API.
//!
//! Messages and statements are owned by the remote service. The client only
//! ever holds snapshots obtained by re-fetching, so nothing here is mutated
//! after deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row keyed by column name.
pub type Record = Map<String, Value>;

// ============ Conversations ============

/// Response of `POST .../start-conversation`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartConversationResponse {
    pub conversation_id: String,
    pub message_id: String,
}

/// Response of `POST .../conversations/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowUpResponse {
    pub message_id: String,
}

/// Message lifecycle status.
///
/// In-flight labels are server-defined, so anything that is not one of the
/// three terminal states is kept verbatim in [`MessageStatus::InProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageStatus {
    Completed,
    Failed,
    Cancelled,
    InProgress(String),
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::InProgress(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageStatus::Completed => "COMPLETED",
            MessageStatus::Failed => "FAILED",
            MessageStatus::Cancelled => "CANCELLED",
            MessageStatus::InProgress(label) => label,
        }
    }
}

impl From<String> for MessageStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "COMPLETED" => MessageStatus::Completed,
            "FAILED" => MessageStatus::Failed,
            "CANCELLED" => MessageStatus::Cancelled,
            _ => MessageStatus::InProgress(s),
        }
    }
}

impl From<MessageStatus> for String {
    fn from(s: MessageStatus) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "message_id")]
    pub id: String,
    pub conversation_id: String,
    pub status: MessageStatus,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Message {
    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or_default()
    }
}

/// Raw attachment as sent by the server. Use [`Attachment::kind`] to
/// interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, alias = "id")]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub text: Option<TextAttachment>,
    #[serde(default)]
    pub query: Option<QueryAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAttachment {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttachment {
    pub query: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub query_result_metadata: Option<Value>,
}

/// Interpreted attachment variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentKind<'a> {
    Text {
        content: &'a str,
    },
    Query {
        sql: &'a str,
        description: Option<&'a str>,
        metadata: Option<&'a Value>,
        attachment_id: Option<&'a str>,
    },
    Unrecognized,
}

impl Attachment {
    /// First recognized variant wins: text is checked before query.
    pub fn kind(&self) -> AttachmentKind<'_> {
        if let Some(text) = &self.text {
            return AttachmentKind::Text {
                content: &text.content,
            };
        }
        if let Some(query) = &self.query {
            return AttachmentKind::Query {
                sql: &query.query,
                description: query.description.as_deref(),
                metadata: query.query_result_metadata.as_ref(),
                attachment_id: self.attachment_id.as_deref(),
            };
        }
        AttachmentKind::Unrecognized
    }
}

// ============ Statements ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

impl StatementState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatementState::Pending | StatementState::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<StatementError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Statement status payload returned by submit and by status polling.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementResponse {
    #[serde(default)]
    pub statement_id: Option<String>,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<Manifest>,
    #[serde(default)]
    pub result: Option<ResultData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub total_row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub column_count: Option<usize>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub position: Option<usize>,
}

impl Manifest {
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub data_array: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub next_chunk_internal_link: Option<String>,
}

/// A follow-on page of an inline result.
pub type ResultChunk = ResultData;

/// Completed statement: schema plus rows aligned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementResult {
    pub statement_id: String,
    pub manifest: Manifest,
    pub rows: Vec<Vec<Value>>,
}

impl StatementResult {
    /// Zip column names with each row's positional values.
    pub fn records(&self) -> Vec<Record> {
        let names = self.manifest.column_names();
        self.rows
            .iter()
            .map(|row| {
                names
                    .iter()
                    .zip(row.iter())
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect()
            })
            .collect()
    }
}
