//! # docqa client
//!
//! A command-line client for a document question-answering service. Users
//! upload documents or ingest web pages, then ask questions and watch the
//! answers stream in.
//!
//! The session logic (transcript, inventory synchronization, gating) lives in
//! the `docqa-core` crate; this crate adds the HTTP transport, configuration,
//! logging and the `docqa` binary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐   ┌─────────┐
//! │   CLI    │──▶│   Session    │──▶│ HttpTransport │──▶│ service │
//! │ (docqa)  │   │ (docqa-core) │   │   (reqwest)   │   │  HTTP   │
//! └──────────┘   └──────────────┘   └───────────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa upload ./leaflet.pdf
//! docqa files
//! docqa ask "What is the recommended dose?"
//! docqa chat --entertainment
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`http`] | HTTP transport and session construction |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`ask`] | `ask` and `chat` commands |
//! | [`files`] | Document inventory commands |
//! | [`ingest`] | Web page ingestion |

pub mod ask;
pub mod config;
pub mod files;
pub mod http;
pub mod ingest;
pub mod logging;
