//! Terminal output for the `genie` CLI.
//!
//! Results go to stdout; status banners are colored with `colored`, which
//! honors `NO_COLOR` and non-TTY output.

use colored::Colorize;

use crate::models::{AttachmentKind, Message, MessageStatus, StatementResult};

pub fn render_message(message: &Message) -> String {
    let mut out = String::new();
    match &message.status {
        MessageStatus::Completed => {
            for attachment in message.attachments() {
                match attachment.kind() {
                    AttachmentKind::Text { content } => {
                        out.push_str(&format!("\n{}\n{}\n", "Response:".green(), content));
                    }
                    AttachmentKind::Query {
                        sql,
                        description,
                        metadata,
                        ..
                    } => {
                        out.push_str(&format!(
                            "\n{}\n{}\n",
                            "Query description:".green(),
                            description.unwrap_or("(none)")
                        ));
                        out.push_str(&format!("\n{}\n{}\n", "SQL query:".green(), sql));
                        if let Some(meta) = metadata {
                            out.push_str(&format!("\n{}\n{}\n", "Query metadata:".green(), meta));
                        }
                    }
                    AttachmentKind::Unrecognized => {}
                }
            }
        }
        MessageStatus::Failed => {
            out.push_str(&format!("\n{}\n", "Genie response failed!".red()));
        }
        MessageStatus::Cancelled => {
            out.push_str(&format!("\n{}\n", "Genie conversation was cancelled!".red()));
        }
        MessageStatus::InProgress(status) => {
            out.push_str(&format!(
                "\n{} {}\n",
                "Unexpected Genie response status:".red(),
                status
            ));
        }
    }
    out
}

pub fn print_message(message: &Message) {
    // Finish the in-place progress line first.
    eprintln!();
    print!("{}", render_message(message));
}

/// Column names, then one tab-separated line per row.
pub fn render_table(result: &StatementResult) -> String {
    let mut out = String::new();
    out.push_str(&result.manifest.column_names().join("\t"));
    out.push('\n');
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "NULL".to_string(),
                other => other.to_string(),
            })
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", result.rows.len()));
    out
}
