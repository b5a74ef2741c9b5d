//! Data models, one file per entity
//!
//! Rows own their row-level diesel operations; services compose them inside
//! transactions.

pub mod dispute;
pub mod escrow;
pub mod matches;
pub mod ranking;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use dispute::{Dispute, DisputeEvidence, DisputeResolution, DisputeStatus};
pub use escrow::{EscrowAccount, EscrowStatus};
pub use matches::{Match, MatchParticipant, MatchResult, MatchStatus, MatchType};
pub use ranking::Ranking;
pub use transaction::{Transaction, TransactionFilter, TransactionKind, TransactionStatus};
pub use user::User;
