//! # Genie Harness
//!
//! A client for a workspace's natural-language-to-SQL agent ("Genie space")
//! and its SQL warehouse.
//!
//! A question goes to the agent, which answers with text or with generated
//! SQL. Generated SQL is executed on the warehouse and the rows are shaped
//! into a response a map/profile/chart front-end can render directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Conversation │──▶│  Statement   │──▶│    Shape     │
//! │ start/poll   │   │ submit/poll  │   │ classify+map │
//! └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!        │                                     │
//!        └──────────────┬──────────────────────┘
//!                       ▼
//!            ┌──────────────────┐
//!            │     Pipeline     │
//!            └────┬────────┬────┘
//!                 ▼        ▼
//!           ┌────────┐ ┌────────┐
//!           │  CLI   │ │  HTTP  │
//!           │(genie) │ │ (axum) │
//!           └────────┘ └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! genie start -q "How many changesets were flagged last week?"
//! genie followup -q "Only in Germany"
//! genie ask --question "Show suspicious edits on a map"
//! genie serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration + environment overrides |
//! | [`error`] | Error taxonomy |
//! | [`transport`] | Authenticated JSON over HTTP |
//! | [`models`] | Wire types |
//! | [`progress`] | Poll-status reporting |
//! | [`conversation`] | Agent conversation client |
//! | [`statement`] | SQL statement executor |
//! | [`classify`] | Question intent classification |
//! | [`shape`] | Message interpretation and result shaping |
//! | [`pipeline`] | Ask → execute → shape |
//! | [`session`] | Saved conversation id |
//! | [`osm`] | Live OpenStreetMap editor profile |
//! | [`display`] | Terminal rendering |
//! | [`server`] | HTTP API |

pub mod classify;
pub mod config;
pub mod conversation;
pub mod display;
pub mod error;
pub mod models;
pub mod osm;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod session;
pub mod shape;
pub mod statement;
pub mod transport;
