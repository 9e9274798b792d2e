//! Poll-status reporting.
//!
//! While a message or statement is in flight, every poll surfaces its current
//! status so the operator can see that something is happening. Progress is
//! emitted on **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event emitted by a polling loop.
#[derive(Clone, Debug, PartialEq)]
pub enum PollEvent {
    /// Agent message still in flight.
    Message {
        conversation_id: String,
        message_id: String,
        status: String,
        attempt: u64,
    },
    /// SQL statement still pending or running.
    Statement {
        statement_id: String,
        state: String,
        elapsed_ms: u64,
    },
}

/// Receives poll events. Implementations write to stderr (human or JSON).
pub trait PollReporter: Send + Sync {
    fn report(&self, event: PollEvent);
}

/// Human-friendly progress on stderr, redrawn in place:
/// "waiting for response, status: EXECUTING_QUERY".
pub struct StderrProgress;

impl PollReporter for StderrProgress {
    fn report(&self, event: PollEvent) {
        let line = match &event {
            PollEvent::Message { status, attempt, .. } => {
                format!("\r\x1b[Kwaiting for response, status: {} (poll {})", status, attempt)
            }
            PollEvent::Statement {
                statement_id,
                state,
                elapsed_ms,
            } => format!(
                "\r\x1b[Kstatement {}  {}  {}",
                statement_id,
                state,
                format_elapsed(*elapsed_ms)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PollReporter for JsonProgress {
    fn report(&self, event: PollEvent) {
        let obj = match &event {
            PollEvent::Message {
                conversation_id,
                message_id,
                status,
                attempt,
            } => serde_json::json!({
                "event": "poll",
                "kind": "message",
                "conversation_id": conversation_id,
                "message_id": message_id,
                "status": status,
                "attempt": attempt
            }),
            PollEvent::Statement {
                statement_id,
                state,
                elapsed_ms,
            } => serde_json::json!({
                "event": "poll",
                "kind": "statement",
                "statement_id": statement_id,
                "state": state,
                "elapsed_ms": elapsed_ms
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PollReporter for NoProgress {
    fn report(&self, _event: PollEvent) {}
}

fn format_elapsed(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{}.{}s", ms / 1000, (ms % 1000) / 100)
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn PollReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
