//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.0 and HTTP/1.1 subset the document
//! API is served over. Every response closes its connection; the one
//! exception is the chunked comet feed, which stays open on its own
//! heartbeat cadence.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: the per-connection state machine and the
//!   `Dispatcher` contract the route table plugs into
//! - **`parser`**: request-line, path and header-field parsing
//! - **`request`**: parsed request representation
//! - **`response`**: the status table and the dispatcher-facing reply
//! - **`output`**: response-body producers and collaborator traits
//! - **`writer`**: header serialization and the per-producer body writers
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌──────────────┐
//!        │  ReadHeaders │ ← One header line at a time
//!        └──────┬───────┘
//!               │ Blank line, request parsed
//!               ▼
//!        ┌──────────────┐
//!        │   ReadBody   │ ← Exactly Content-Length bytes (skipped if none)
//!        └──────┬───────┘
//!               │ Body complete
//!               ▼
//!        ┌──────────────┐
//!        │   Dispatch   │ ← Route table picks status, installs producer
//!        └──────┬───────┘
//!               │ Reply ready (default body synthesized if empty)
//!               ▼
//!        ┌──────────────┐
//!        │  WriteHeader │ ← Status line + headers (HEAD stops here)
//!        └──────┬───────┘
//!               │
//!               ▼
//!        ┌──────────────┐
//!        │  WriteBody   │ ← Producer drained, then close
//!        └──────────────┘
//! ```
//!
//! Protocol errors at any read state answer 400 and close; I/O errors and
//! idle timeouts tear the connection down immediately.

pub mod connection;
pub mod output;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
