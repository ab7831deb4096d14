//! # Stardrop Common Crate
//!
//! Shared domain model and collaborator abstractions for the Stardrop
//! task-to-earn backend.
//!
//! ## Modules
//! - `types`: domain entities (users, tasks, transactions, withdrawals)
//! - `error`: error taxonomy shared across the workspace
//! - `config`: configuration management
//! - `store`: `Store` trait definition (persistence abstraction)
//! - `mem_store`: in-memory implementation for tests and development
//! - `pg_store`: Postgres implementation (sqlx)
//! - `verifier`: channel-membership verification abstraction
//! - `notifier`: fire-and-forget notification abstraction
//!
//! ## Persistence Architecture
//! ```text
//! ┌─────────────────┐
//! │     Store       │  <- Abstract trait
//! └────────┬────────┘
//!          │
//!    ┌─────┴──────┐
//!    │            │
//! ┌──▼────┐  ┌────▼───────┐
//! │PgStore│  │MemoryStore │
//! └───────┘  └────────────┘
//! ```

pub mod config;
pub mod error;
pub mod mem_store;
pub mod notifier;
pub mod pg_store;
pub mod store;
pub mod types;
pub mod verifier;

pub use config::Config;
pub use error::{EngineError, NotifyError, StoreError, VerifierError};
pub use mem_store::MemoryStore;
pub use notifier::{Notifier, NotifyEvent, NullNotifier, RecordingNotifier};
pub use pg_store::PgStore;
pub use store::{LedgerEntry, Store};
pub use types::*;
pub use verifier::{MembershipVerifier, MockVerifier};
