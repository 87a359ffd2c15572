//! Warehouse communication module.
//!
//! The warehouse is an external SQL engine reached only through an
//! asynchronous statement protocol: submit, poll until terminal, fetch.
//! This module provides the protocol types and the client that carries
//! them to the data-api sidecar over NDJSON stdin/stdout.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │              Query Executor (Rust + Tokio)            │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │               DataApiClient (Async)             │  │
//! │  │  - Spawns the sidecar as a child process        │  │
//! │  │  - NDJSON protocol over stdin/stdout            │  │
//! │  │  - Request IDs for concurrent correlation       │  │
//! │  └─────────────────────────────────────────────────┘  │
//! │                 stdin │ stdout (NDJSON)               │
//! └───────────────────────┼───────────────────────────────┘
//!                         ▼
//! ┌───────────────────────────────────────────────────────┐
//! │          Data-API Sidecar → Managed Warehouse         │
//! └───────────────────────────────────────────────────────┘
//! ```

mod client;
mod error;
pub mod protocol;

pub use client::{DataApiClient, StatementApi};
pub use error::{WarehouseError, WarehouseResult};
