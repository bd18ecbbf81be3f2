//! `ledgerchain-consensus` — the block state machine and chain engine:
//! admission, sealing, difficulty adjustment and chain validation.
//! Depends on `ledgerchain-store` for persistence and
//! `ledgerchain-keystore` for validator signing, but owns no I/O of its
//! own beyond calling through those two.

pub mod block;
pub mod engine;

pub use block::BlockBuilder;
pub use engine::{AdmissionOutcome, ChainEngine, EngineConfig};
