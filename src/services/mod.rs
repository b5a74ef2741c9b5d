//! Core services
//!
//! Leaf-first: the wallet ledger owns balance mutation, the escrow engine
//! composes ledger postings, the match engine and dispute resolver drive the
//! escrow engine, and the ranking calculator is a pure function applied at
//! completion.

pub mod dispute;
pub mod escrow;
pub mod matches;
pub mod ranking;
pub mod wallet;

pub use dispute::DisputeResolver;
pub use escrow::{compute_pot, EscrowEngine};
pub use matches::MatchEngine;
pub use ranking::{elo_update, RankingService};
pub use wallet::{Reference, WalletLedger};
