//! # docqa core
//!
//! Shared, WASM-safe logic for the docqa client: the data model, the
//! transport trait, the streaming message assembler, the session transcript,
//! the optimistic inventory synchronizer and the submission gate.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. Everything is executor-agnostic `async`.
//!
//! ```text
//!  question ──▶ Session ──▶ Transport::submit_question ──▶ fragments
//!                 │                                          │
//!                 │            ┌─────────── assemble ◀───────┘
//!                 ▼            ▼
//!             Transcript ◀── snapshots
//!
//!  delete/clear/upload ──▶ InventorySync ──▶ Transport ──▶ optimistic update
//!                                 │                          + best-effort refresh
//!                                 ▼
//!                            gating::can_submit
//! ```

pub mod assembler;
pub mod error;
pub mod gating;
pub mod inventory;
pub mod models;
pub mod session;
pub mod transcript;
pub mod transport;
pub mod web;

pub use error::{SessionError, TransportError, FALLBACK_MESSAGE};
pub use session::{ExchangeOutcome, Session};
