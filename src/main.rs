//! # Genie CLI (`genie`)
//!
//! Ask a workspace's natural-language-to-SQL agent questions from the
//! terminal, run SQL on a warehouse, and serve the same pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! genie --config ./config/genie.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `genie start -q "<question>"` | Start a conversation and print the reply |
//! | `genie followup -q "<question>"` | Follow up in the saved (or given) conversation |
//! | `genie ask --question "<question>"` | Ask, run the generated SQL, print the shaped result |
//! | `genie sql --statement "<sql>"` | Run a statement on the warehouse |
//! | `genie profile <changeset_id>` | Live editor profile from OpenStreetMap |
//! | `genie serve` | Start the HTTP API |
//! | `genie completions <shell>` | Print a shell completion script |
//!
//! Workspace settings may also come from `DATABRICKS_*` environment
//! variables or a `.env` file.

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use genie_harness::config::{self, Config};
use genie_harness::conversation::ConversationClient;
use genie_harness::display;
use genie_harness::models::Message;
use genie_harness::osm::{self, OsmClient};
use genie_harness::pipeline::{Pipeline, PipelineOutcome};
use genie_harness::progress::{PollReporter, ProgressMode};
use genie_harness::server;
use genie_harness::session::SessionStore;
use genie_harness::statement::StatementExecutor;
use genie_harness::transport::Transport;

/// Genie CLI: talk to a workspace's natural-language-to-SQL agent.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/genie.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "genie",
    about = "Ask a Databricks Genie space questions and run the SQL it produces",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/genie.toml")]
    config: PathBuf,

    /// Poll progress on stderr: human, json, or off.
    ///
    /// Defaults to human when stderr is a terminal, off otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new conversation and wait for the agent's reply.
    Start {
        /// The opening question.
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Ask a follow-up question in an existing conversation.
    ///
    /// Uses `--conv_id` when given, otherwise the saved session.
    Followup {
        /// The follow-up question.
        #[arg(short, long)]
        question: Option<String>,

        /// Conversation to continue.
        #[arg(short = 'c', long = "conv_id")]
        conv_id: Option<String>,
    },

    /// Ask a question, execute the generated SQL, and print the shaped result as JSON.
    ///
    /// Continues the saved conversation unless `--new` is given.
    Ask {
        #[arg(short, long)]
        question: Option<String>,

        /// Start a fresh conversation instead of continuing the saved one.
        #[arg(long)]
        new: bool,
    },

    /// Run a SQL statement on the configured warehouse.
    Sql {
        #[arg(short, long)]
        statement: String,

        /// Client-side timeout in seconds (defaults to `[polling].statement_timeout_secs`).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Build a live editor profile from a changeset id via the public OpenStreetMap API.
    Profile {
        changeset_id: String,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const QUESTION_WARNING: &str = "Please provide a question with --question.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    // Commands that don't require workspace credentials
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "genie", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Profile { changeset_id } => {
            let cfg = config::parse_config(&cli.config)?;
            run_profile(&cfg, changeset_id).await?;
            return Ok(());
        }
        Commands::Start { question }
        | Commands::Followup { question, .. }
        | Commands::Ask { question, .. } => {
            require_arg(question.clone(), QUESTION_WARNING);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let reporter: Arc<dyn PollReporter> = Arc::from(progress.reporter());
    let transport = Transport::from_config(&cfg)?;
    let session = SessionStore::new(&cfg.session.path);

    match cli.command {
        Commands::Start { question } => {
            let question = require_arg(question, QUESTION_WARNING);
            let client =
                ConversationClient::from_config(&cfg, transport).with_reporter(reporter);

            let started = client.start(&question).await?;
            session.save(&started.conversation_id)?;
            println!("Conversation ID: {}", started.conversation_id);

            let message = client
                .wait_for_completion(&started.conversation_id, &started.message_id)
                .await?;
            display::print_message(&message);
        }
        Commands::Followup { question, conv_id } => {
            let question = require_arg(question, QUESTION_WARNING);
            let conv_id = match conv_id.filter(|c| !c.trim().is_empty()) {
                Some(id) => id,
                None => require_arg(
                    session.load()?,
                    "No conversation ID provided or saved. Start a new conversation first.",
                ),
            };
            let client =
                ConversationClient::from_config(&cfg, transport).with_reporter(reporter);

            let message_id = client.follow_up(&conv_id, &question).await?;
            let message = client.wait_for_completion(&conv_id, &message_id).await?;
            display::print_message(&message);
            session.save(&conv_id)?;
        }
        Commands::Ask { question, new } => {
            let question = require_arg(question, QUESTION_WARNING);
            let conv_id = if new { None } else { session.load()? };

            let conversation = ConversationClient::from_config(&cfg, transport.clone())
                .with_reporter(reporter.clone());
            let executor = StatementExecutor::from_config(&cfg, transport).with_reporter(reporter);
            let pipeline = Pipeline::from_config(&cfg, conversation, executor);

            let outcome = pipeline.respond(&question, conv_id.as_deref()).await?;
            session.save(&outcome.conversation_id)?;
            eprintln!();

            match &outcome.response {
                Some(response) => println!("{}", serde_json::to_string_pretty(response)?),
                None => display::print_message(&message_stub(&outcome)),
            }
        }
        Commands::Sql { statement, timeout } => {
            let warehouse_id = cfg.warehouse_id()?;
            let timeout = timeout.unwrap_or(cfg.polling.statement_timeout_secs);
            let executor = StatementExecutor::from_config(&cfg, transport).with_reporter(reporter);

            let result = executor.execute(warehouse_id, &statement, timeout).await?;
            eprintln!();
            print!("{}", display::render_table(&result));
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Profile { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Unwraps a required input, or warns and exits with status 1.
fn require_arg(value: Option<String>, warning: &str) -> String {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => {
            eprintln!("{}", warning.yellow());
            std::process::exit(1);
        }
    }
}

/// Terminal status notice for an ask that produced no shaped response.
fn message_stub(outcome: &PipelineOutcome) -> Message {
    Message {
        id: outcome.message_id.clone(),
        conversation_id: outcome.conversation_id.clone(),
        status: outcome.status.clone(),
        attachments: None,
        error: None,
    }
}

async fn run_profile(cfg: &Config, changeset_id: &str) -> anyhow::Result<()> {
    let client = OsmClient::new(
        &cfg.osm.base_url,
        Duration::from_secs(cfg.polling.request_timeout_secs),
    )?;
    match client.live_profile(changeset_id).await {
        Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
        Err(e) => {
            tracing::warn!(error = %e, changeset_id, "live profile fetch failed");
            println!("{}", osm::describe_error(&e).red());
        }
    }
    Ok(())
}
