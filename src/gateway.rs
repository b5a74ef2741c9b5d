//! Payment gateway abstraction
//!
//! The core never talks to a processor directly. Deposits and withdrawals
//! only update internal bookkeeping synchronously; the actual money movement
//! is eventually confirmed by a follow-up call from the request layer
//! (webhook, reconciliation job). No database lock is ever held across a
//! gateway call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;

/// Intent created at the processor for an inbound deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositIntent {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

/// Result of an outbound transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: String,
    pub amount_cents: i64,
    pub status: String,
}

/// External payment processor capability
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_deposit_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: serde_json::Value,
    ) -> CoreResult<DepositIntent>;

    async fn create_external_transfer(
        &self,
        amount_cents: i64,
        destination: &str,
        metadata: serde_json::Value,
    ) -> CoreResult<TransferResult>;
}

/// In-process gateway that always succeeds. Backs tests and local
/// development; production wires a real processor behind the trait.
#[derive(Debug, Default, Clone)]
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_deposit_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        _metadata: serde_json::Value,
    ) -> CoreResult<DepositIntent> {
        Ok(DepositIntent {
            intent_id: format!("pi_stub_{}", Uuid::new_v4().simple()),
            client_secret: Some(format!("secret_{}", Uuid::new_v4().simple())),
            amount_cents,
            currency: currency.to_string(),
            status: "requires_payment_method".to_string(),
        })
    }

    async fn create_external_transfer(
        &self,
        amount_cents: i64,
        _destination: &str,
        _metadata: serde_json::Value,
    ) -> CoreResult<TransferResult> {
        Ok(TransferResult {
            transfer_id: format!("tr_stub_{}", Uuid::new_v4().simple()),
            amount_cents,
            status: "pending".to_string(),
        })
    }
}
