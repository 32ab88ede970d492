//! Admission coordinator
//!
//! The single entry point into the matching core. Validates boundary input,
//! owns the shared collaborators (product books, audit log, publisher,
//! relationship registry, latency monitor, user manager), stamps admission
//! timelines, and dispatches into the per-instrument books.
//!
//! Multiple admission threads may process distinct instruments
//! concurrently; within one instrument the book's lock serializes all
//! mutation, and the audit chain totally orders events across instruments.

pub mod config;
pub mod coordinator;
pub mod users;

pub use config::{ConfigError, EngineConfig, SinkKind};
pub use coordinator::{Exchange, OrderLink, OrderRequest, QuoteRequest, SetupError};
pub use users::UserManager;
