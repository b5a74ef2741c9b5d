//! Core engine for a real-money 1v1 matchmaking platform.
//!
//! Players stake cash, play a best-of-N series, and the winner takes the
//! pooled stake minus the platform fee. The crate owns the four subsystems
//! where money can go wrong — the wallet ledger, the escrow engine, the
//! match state machine and the dispute resolver — plus the ELO calculator
//! consumed at match completion. HTTP routing, authentication and the
//! concrete payment processor live outside; the processor is reached only
//! through the [`gateway::PaymentGateway`] trait.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod schema;
pub mod services;
pub mod telemetry;

pub use config::CoreConfig;
pub use db::DbPool;
pub use error::{CoreError, CoreResult};
