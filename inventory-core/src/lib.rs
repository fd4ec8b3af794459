//! Stockbook Inventory Core
//!
//! Append-only stock ledger with replay-based quantity reconstruction and
//! cost valuation for a single-user desktop deployment.
//!
//! # Architecture
//!
//! - **Log Replay**: Stock is never stored; it is reconstructed from the
//!   ordered transaction log on every query
//! - **Serialized Writes**: Mutations per `(company, collection)` run
//!   strictly in arrival order through an in-process queue
//! - **Physical Floors**: A stocktake entry is an authoritative floor as
//!   of its position; earlier entries are superseded
//! - **Ephemeral Valuation**: FIFO layers are rebuilt per query and never
//!   persisted
//!
//! # Invariants
//!
//! - Append-only: transactions are never modified or deleted
//! - One movement per event: a tracking number links a provisional note
//!   to its final voucher so stock moves exactly once
//! - Replay order: `(date, seq)` totally orders every company's log
//! - `ABSOLUTE` mode appears on `PHYSICAL` entries and nowhere else

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod posting;
pub mod profit;
pub mod queue;
pub mod stock;
pub mod store;
pub mod types;
pub mod valuation;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{InventoryLedger, PostingReceipt};
pub use store::LedgerStore;
pub use types::{
    CountLine, FifoLayer, JournalLine, JournalRole, MovementLine, StockKey, TrackingNumber,
    TrackingStatus, Transaction, TxMode, Voucher, VoucherBody, VoucherType,
};
