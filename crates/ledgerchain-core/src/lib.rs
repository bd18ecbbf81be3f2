//! `ledgerchain-core` — the transaction/block data model, canonical JSON
//! serialization, Merkle folding, and the shared error type for the
//! supply-chain proof-of-work ledger.
//!
//! This crate has no notion of a running chain, a database, or a key
//! store — it is pure data plus pure functions, consumed by every other
//! `ledgerchain-*` crate.

pub mod block;
pub mod canonical;
pub mod constants;
pub mod error;
pub mod merkle;
pub mod records;
pub mod transaction;
pub mod types;

pub use block::{Block, BlockIdentity};
pub use error::{LedgerError, LedgerResult};
pub use records::{BatchRef, KeyRecord};
pub use transaction::{Transaction, TransactionDraft};
pub use types::{HexString, JsonMap, Stage, TransactionType};
