//! Canteen Ledger Core
//!
//! Append-only cafeteria order/payment ledger with manager-confirmed
//! payment reconciliation.
//!
//! # Architecture
//!
//! - **Ledger Store**: durable, append-only orders and confirmed payments,
//!   partitioned per client; balances always derive from it fresh
//! - **Pending-Payment Queue**: FIFO of unconfirmed payment claims, ordered
//!   by claim time
//! - **Reconciliation Engine**: the only writer path; turns client actions
//!   into ledger state and resolves claims into permanent payment records
//! - **Single Writer**: all mutations serialize through one actor task, which
//!   is what makes claim confirmation exactly-once under concurrent access
//!
//! # Invariants
//!
//! - Balance exactness: `balance == Σ line_total − Σ confirmed amount`,
//!   decimal-exact, for every interleaving of operations
//! - Append-only: orders and confirmed payments are never modified or deleted
//! - Exactly-once: a pending claim becomes at most one ledger payment
//! - Partial-failure tolerance: one unreadable row never aborts a listing or
//!   a balance aggregate

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod menu;
pub mod metrics;
pub mod notify;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::{AccessPolicy, Reconciler, SingleManager};
pub use error::{Error, Result};
pub use menu::{Menu, MenuItem};
pub use metrics::Metrics;
pub use notify::{BufferedSink, NotificationSink, TracingSink};
pub use storage::Storage;
pub use types::{
    BalanceStatus, Client, ClientBalance, ClientId, ClientSummary, FleetSummary, OrderEntry,
    PaymentEntry, PendingPayment,
};
