//! # Quarry Gateway
//!
//! Query execution and access-control gateway for a natural-language-to-SQL
//! agent system. An external orchestration agent turns user questions into
//! action invocations; this crate validates and routes them, enforces
//! per-user schema ACLs, runs the SQL against the warehouse's asynchronous
//! statement protocol, and encodes results under a bounded envelope.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Action Invocation (agent runtime)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [gateway]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Validate apiPath + properties → typed route request   │
//! └─────────────────────────────────────────────────────────┘
//!           │                  │                  │
//!           ▼                  ▼                  ▼
//! ┌───────────────┐  ┌─────────────────┐  ┌──────────────┐
//! │ SchemaIntro-  │  │  QueryExecutor  │  │ AclResolver  │
//! │ spector       │─▶│  (ACL → submit  │◀─│ (static map) │
//! │ (catalog walk)│  │  → poll → fetch)│  └──────────────┘
//! └───────────────┘  └─────────────────┘
//!                          │
//!                          ▼ [warehouse]
//! ┌─────────────────────────────────────────────────────────┐
//! │  DataApiClient → data-api sidecar → managed warehouse   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod acl;
pub mod config;
pub mod decode;
pub mod executor;
pub mod gateway;
pub mod schema;
pub mod sql;
pub mod warehouse;

pub use acl::{AclEntry, AclResolver, StaticAclResolver};
pub use decode::{DecodeError, ResultRow};
pub use executor::{PollPolicy, QueryError, QueryExecutor};
pub use gateway::{ActionInvocation, ActionResponse, Gateway, GatewayError};
pub use schema::{SchemaIntrospector, TableSchemaEntry};
pub use warehouse::{DataApiClient, StatementApi, WarehouseError, WarehouseResult};
