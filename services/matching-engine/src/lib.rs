//! Per-instrument continuous double-auction matching
//!
//! Price-time priority matching with advanced order semantics layered on
//! top: fill-or-kill gating, one-cancels-other linkage, and self-trade
//! prevention.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced
//! - `try_trade` always leaves the book uncrossed
//! - Every fill, cancel, and trade produces an audit event in causal order
//! - Volume conservation on every tradable

pub mod book;
pub mod error;
pub mod fok;
pub mod manager;
pub mod product_book;
pub mod registry;
pub mod stp;

pub use book::{BookSide, Fill, PriceLevel};
pub use error::EngineError;
pub use manager::ProductManager;
pub use product_book::{BookDeps, FillDelivery, NoopDelivery, ProductBook};
pub use registry::{OrderRelationship, OrderRelationshipRegistry, RegistryStats};
pub use stp::{StpConfig, StpMode, TraderIdExtractor, UserIdExtractor};
