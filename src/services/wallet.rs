//! Wallet ledger service
//!
//! Single point of truth for balance mutation. Every debit/credit runs the
//! read-check-write-append sequence inside one immediate transaction, so
//! concurrent postings against the same wallet serialize on the database
//! write lock and the idempotency-key lookup happens-before the insert.
//!
//! Deposits and withdrawals are eventually consistent with the payment
//! gateway: the ledger only books internal state synchronously and never
//! holds a database transaction across a gateway call.

use std::sync::Arc;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::db::{with_conn, DbPool};
use crate::error::{CoreError, CoreResult};
use crate::gateway::{DepositIntent, PaymentGateway};
use crate::models::transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionKind, TransactionStatus,
};
use crate::models::wallet::Wallet;

/// Link from a ledger entry back to the entity that caused it
#[derive(Debug, Clone)]
pub struct Reference {
    pub entity_id: String,
    pub entity_type: String,
}

impl Reference {
    pub fn to_match(match_id: &str) -> Self {
        Self {
            entity_id: match_id.to_string(),
            entity_type: "match".to_string(),
        }
    }
}

/// One balance mutation, ready to apply on a connection
#[derive(Debug, Clone)]
pub(crate) struct Posting {
    pub user_id: String,
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub idempotency_key: Option<String>,
    pub reference: Option<Reference>,
    pub description: Option<String>,
    pub currency: String,
}

fn attach_metadata(new_txn: &mut NewTransaction, posting: &Posting) {
    new_txn.idempotency_key = posting.idempotency_key.clone();
    new_txn.description = posting.description.clone();
    if let Some(reference) = &posting.reference {
        new_txn.reference_id = Some(reference.entity_id.clone());
        new_txn.reference_type = Some(reference.entity_type.clone());
    }
}

/// Apply a debit on the given connection. Caller provides the transaction
/// boundary; replaying an idempotency key returns the stored row unchanged.
pub(crate) fn post_debit(conn: &mut SqliteConnection, posting: &Posting) -> CoreResult<Transaction> {
    if posting.amount_cents <= 0 {
        return Err(CoreError::validation_field(
            "Debit amount must be positive",
            "amount_cents",
        ));
    }

    if let Some(key) = &posting.idempotency_key {
        if let Some(existing) = Transaction::find_by_idempotency_key(conn, key)? {
            return Ok(existing);
        }
    }

    let wallet = Wallet::find_by_user(conn, &posting.user_id)?
        .ok_or_else(|| CoreError::not_found("Wallet", &posting.user_id))?;

    if !wallet.has_sufficient_balance(posting.amount_cents) {
        return Err(CoreError::insufficient_balance(
            posting.amount_cents,
            wallet.balance_cents,
        ));
    }

    let balance_before = wallet.balance_cents;
    let balance_after = balance_before - posting.amount_cents;
    wallet.save_balances(
        conn,
        balance_after,
        wallet.pending_cents,
        wallet.total_deposited_cents,
        wallet.total_withdrawn_cents,
    )?;

    let mut new_txn = NewTransaction::new(
        &posting.user_id,
        &wallet.id,
        posting.kind,
        TransactionStatus::Completed,
        -posting.amount_cents,
        balance_before,
        balance_after,
    );
    attach_metadata(&mut new_txn, posting);
    let txn = Transaction::create(conn, new_txn)?;

    info!(
        user_id = %posting.user_id,
        amount_cents = posting.amount_cents,
        kind = posting.kind.as_str(),
        balance_after = balance_after,
        "Wallet debited"
    );
    Ok(txn)
}

/// Apply a credit on the given connection. Creates the wallet on first use.
pub(crate) fn post_credit(conn: &mut SqliteConnection, posting: &Posting) -> CoreResult<Transaction> {
    if posting.amount_cents <= 0 {
        return Err(CoreError::validation_field(
            "Credit amount must be positive",
            "amount_cents",
        ));
    }

    if let Some(key) = &posting.idempotency_key {
        if let Some(existing) = Transaction::find_by_idempotency_key(conn, key)? {
            return Ok(existing);
        }
    }

    let wallet = Wallet::get_or_create(conn, &posting.user_id, &posting.currency)?;

    let balance_before = wallet.balance_cents;
    let balance_after = balance_before + posting.amount_cents;
    wallet.save_balances(
        conn,
        balance_after,
        wallet.pending_cents,
        wallet.total_deposited_cents,
        wallet.total_withdrawn_cents,
    )?;

    let mut new_txn = NewTransaction::new(
        &posting.user_id,
        &wallet.id,
        posting.kind,
        TransactionStatus::Completed,
        posting.amount_cents,
        balance_before,
        balance_after,
    );
    attach_metadata(&mut new_txn, posting);
    let txn = Transaction::create(conn, new_txn)?;

    info!(
        user_id = %posting.user_id,
        amount_cents = posting.amount_cents,
        kind = posting.kind.as_str(),
        balance_after = balance_after,
        "Wallet credited"
    );
    Ok(txn)
}

/// Balance mutation and transaction-trail service
#[derive(Clone)]
pub struct WalletLedger {
    pool: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    config: CoreConfig,
}

impl WalletLedger {
    pub fn new(pool: DbPool, gateway: Arc<dyn PaymentGateway>, config: CoreConfig) -> Self {
        Self {
            pool,
            gateway,
            config,
        }
    }

    /// Entry point before any financial action: wallets are created lazily
    /// and never deleted
    pub async fn get_or_create_wallet(&self, user_id: Uuid) -> CoreResult<Wallet> {
        let user = user_id.to_string();
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            Ok(Wallet::get_or_create(conn, &user, &currency)?)
        })
        .await
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> CoreResult<Wallet> {
        let user = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            Wallet::find_by_user(conn, &user)?.ok_or_else(|| CoreError::not_found("Wallet", &user))
        })
        .await
    }

    /// Debit the user's available balance. Idempotent under key replay.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        kind: TransactionKind,
        idempotency_key: Option<String>,
        reference: Option<Reference>,
    ) -> CoreResult<Transaction> {
        let posting = Posting {
            user_id: user_id.to_string(),
            amount_cents,
            kind,
            idempotency_key,
            reference,
            description: None,
            currency: self.config.currency.clone(),
        };
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| post_debit(conn, &posting))
        })
        .await
    }

    /// Credit the user's available balance. Idempotent under key replay.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        kind: TransactionKind,
        idempotency_key: Option<String>,
        reference: Option<Reference>,
    ) -> CoreResult<Transaction> {
        let posting = Posting {
            user_id: user_id.to_string(),
            amount_cents,
            kind,
            idempotency_key,
            reference,
            description: None,
            currency: self.config.currency.clone(),
        };
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| post_credit(conn, &posting))
        })
        .await
    }

    /// Newest-first transaction history; `before` is the created_at of the
    /// last row already seen
    pub async fn history(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
        limit: i64,
        before: Option<NaiveDateTime>,
    ) -> CoreResult<Vec<Transaction>> {
        let user = user_id.to_string();
        let limit = limit.clamp(1, 100);
        with_conn(&self.pool, move |conn| {
            Ok(Transaction::history(conn, &user, &filter, limit, before)?)
        })
        .await
    }

    /// Start a deposit: create a processor intent and book a PENDING
    /// transaction. The balance moves only when the gateway confirms.
    pub async fn initiate_deposit(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        idempotency_key: String,
    ) -> CoreResult<(DepositIntent, Transaction)> {
        if amount_cents < self.config.min_deposit_cents {
            return Err(CoreError::validation_field(
                format!(
                    "Minimum deposit is ${:.2}",
                    self.config.min_deposit_cents as f64 / 100.0
                ),
                "amount_cents",
            ));
        }
        if amount_cents > self.config.max_deposit_cents {
            return Err(CoreError::validation_field(
                format!(
                    "Maximum deposit is ${:.2}",
                    self.config.max_deposit_cents as f64 / 100.0
                ),
                "amount_cents",
            ));
        }

        let key = idempotency_key.clone();
        let existing = with_conn(&self.pool, move |conn| {
            Ok(Transaction::find_by_idempotency_key(conn, &key)?)
        })
        .await?;
        if existing.is_some() {
            return Err(CoreError::conflict(
                "IDEMPOTENCY_CONFLICT",
                "Duplicate idempotency key",
            ));
        }

        let wallet = self.get_or_create_wallet(user_id).await?;

        let intent = self
            .gateway
            .create_deposit_intent(
                amount_cents,
                &self.config.currency,
                serde_json::json!({
                    "user_id": user_id.to_string(),
                    "idempotency_key": idempotency_key.clone(),
                }),
            )
            .await?;

        let intent_id = intent.intent_id.clone();
        let user = user_id.to_string();
        let txn = with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                // Re-check under the write lock: a concurrent initiate with
                // the same key must not book a second row
                if Transaction::find_by_idempotency_key(conn, &idempotency_key)?.is_some() {
                    return Err(CoreError::conflict(
                        "IDEMPOTENCY_CONFLICT",
                        "Duplicate idempotency key",
                    ));
                }
                let mut new_txn = NewTransaction::new(
                    &user,
                    &wallet.id,
                    TransactionKind::Deposit,
                    TransactionStatus::Pending,
                    amount_cents,
                    wallet.balance_cents,
                    wallet.balance_cents + amount_cents,
                );
                new_txn.idempotency_key = Some(idempotency_key);
                new_txn.external_id = Some(intent_id);
                new_txn.description =
                    Some(format!("Deposit of ${:.2}", amount_cents as f64 / 100.0));
                Ok(Transaction::create(conn, new_txn)?)
            })
        })
        .await?;

        Ok((intent, txn))
    }

    /// Settle a deposit after the gateway reports the intent succeeded.
    /// Replaying a confirmed intent is a no-op.
    pub async fn confirm_deposit(&self, user_id: Uuid, intent_id: &str) -> CoreResult<Transaction> {
        let user = user_id.to_string();
        let intent = intent_id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let txn = Transaction::find_by_external_id(conn, &intent)?
                    .ok_or_else(|| CoreError::not_found("Transaction", &intent))?;

                if txn.status == TransactionStatus::Completed.as_str() {
                    return Ok(txn);
                }
                if txn.status != TransactionStatus::Pending.as_str() {
                    return Err(CoreError::business(
                        "INVALID_TRANSACTION_STATE",
                        format!("Deposit cannot be confirmed from status {}", txn.status),
                    ));
                }
                if txn.user_id != user {
                    return Err(CoreError::Authorization(
                        "Deposit belongs to another user".to_string(),
                    ));
                }

                let wallet = Wallet::find_by_user(conn, &user)?
                    .ok_or_else(|| CoreError::not_found("Wallet", &user))?;

                let balance_before = wallet.balance_cents;
                let balance_after = balance_before + txn.amount_cents;
                wallet.save_balances(
                    conn,
                    balance_after,
                    wallet.pending_cents,
                    wallet.total_deposited_cents + txn.amount_cents,
                    wallet.total_withdrawn_cents,
                )?;
                Transaction::finalize(conn, &txn.id, balance_before, balance_after)?;

                info!(
                    user_id = %user,
                    amount_cents = txn.amount_cents,
                    intent_id = %intent,
                    "Deposit confirmed"
                );
                Ok(Transaction::find_by_id(conn, &txn.id)?
                    .ok_or_else(|| CoreError::not_found("Transaction", &txn.id))?)
            })
        })
        .await
    }

    /// Move funds from available to pending and ask the gateway for an
    /// external transfer. The transfer settles asynchronously via
    /// `confirm_withdrawal` / `fail_withdrawal`.
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        destination: &str,
        idempotency_key: String,
    ) -> CoreResult<Transaction> {
        if amount_cents < self.config.min_withdrawal_cents {
            return Err(CoreError::validation_field(
                format!(
                    "Minimum withdrawal is ${:.2}",
                    self.config.min_withdrawal_cents as f64 / 100.0
                ),
                "amount_cents",
            ));
        }

        let key_check = idempotency_key.clone();
        let existing = with_conn(&self.pool, move |conn| {
            Ok(Transaction::find_by_idempotency_key(conn, &key_check)?)
        })
        .await?;
        if existing.is_some() {
            return Err(CoreError::conflict(
                "IDEMPOTENCY_CONFLICT",
                "Duplicate idempotency key",
            ));
        }

        // Book the hold first; the gateway call happens outside the lock
        let user = user_id.to_string();
        let key = idempotency_key.clone();
        let txn = with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                if Transaction::find_by_idempotency_key(conn, &key)?.is_some() {
                    return Err(CoreError::conflict(
                        "IDEMPOTENCY_CONFLICT",
                        "Duplicate idempotency key",
                    ));
                }
                let wallet = Wallet::find_by_user(conn, &user)?
                    .ok_or_else(|| CoreError::not_found("Wallet", &user))?;
                if !wallet.has_sufficient_balance(amount_cents) {
                    return Err(CoreError::insufficient_balance(
                        amount_cents,
                        wallet.balance_cents,
                    ));
                }

                let balance_before = wallet.balance_cents;
                let balance_after = balance_before - amount_cents;
                wallet.save_balances(
                    conn,
                    balance_after,
                    wallet.pending_cents + amount_cents,
                    wallet.total_deposited_cents,
                    wallet.total_withdrawn_cents,
                )?;

                let mut new_txn = NewTransaction::new(
                    &user,
                    &wallet.id,
                    TransactionKind::Withdrawal,
                    TransactionStatus::Processing,
                    -amount_cents,
                    balance_before,
                    balance_after,
                );
                new_txn.idempotency_key = Some(key);
                new_txn.description = Some(format!(
                    "Withdrawal request: ${:.2}",
                    amount_cents as f64 / 100.0
                ));
                Ok(Transaction::create(conn, new_txn)?)
            })
        })
        .await?;

        match self
            .gateway
            .create_external_transfer(
                amount_cents,
                destination,
                serde_json::json!({
                    "user_id": user_id.to_string(),
                    "transaction_id": txn.id.clone(),
                }),
            )
            .await
        {
            Ok(transfer) => {
                let txn_id = txn.id.clone();
                let transfer_id = transfer.transfer_id.clone();
                with_conn(&self.pool, move |conn| {
                    Transaction::set_status(
                        conn,
                        &txn_id,
                        TransactionStatus::Processing,
                        Some(&transfer_id),
                    )?;
                    Ok(Transaction::find_by_id(conn, &txn_id)?
                        .ok_or_else(|| CoreError::not_found("Transaction", &txn_id))?)
                })
                .await
            }
            Err(err) => {
                warn!(
                    user_id = %user_id,
                    transaction_id = %txn.id,
                    error = %err,
                    "External transfer failed, rolling back withdrawal hold"
                );
                self.fail_withdrawal(user_id, &txn.id).await?;
                Err(err)
            }
        }
    }

    /// Settle a withdrawal after the external transfer lands
    pub async fn confirm_withdrawal(
        &self,
        user_id: Uuid,
        transaction_id: &str,
    ) -> CoreResult<Transaction> {
        let user = user_id.to_string();
        let txn_id = transaction_id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let txn = load_processing_withdrawal(conn, &txn_id, &user)?;
                let amount = -txn.amount_cents;

                let wallet = Wallet::find_by_user(conn, &user)?
                    .ok_or_else(|| CoreError::not_found("Wallet", &user))?;
                wallet.save_balances(
                    conn,
                    wallet.balance_cents,
                    wallet.pending_cents - amount,
                    wallet.total_deposited_cents,
                    wallet.total_withdrawn_cents + amount,
                )?;
                Transaction::set_status(conn, &txn.id, TransactionStatus::Completed, None)?;

                info!(user_id = %user, transaction_id = %txn.id, "Withdrawal completed");
                Ok(Transaction::find_by_id(conn, &txn.id)?
                    .ok_or_else(|| CoreError::not_found("Transaction", &txn.id))?)
            })
        })
        .await
    }

    /// Roll a failed external transfer back into the available balance
    pub async fn fail_withdrawal(
        &self,
        user_id: Uuid,
        transaction_id: &str,
    ) -> CoreResult<Transaction> {
        let user = user_id.to_string();
        let txn_id = transaction_id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let txn = load_processing_withdrawal(conn, &txn_id, &user)?;
                let amount = -txn.amount_cents;

                let wallet = Wallet::find_by_user(conn, &user)?
                    .ok_or_else(|| CoreError::not_found("Wallet", &user))?;
                wallet.save_balances(
                    conn,
                    wallet.balance_cents + amount,
                    wallet.pending_cents - amount,
                    wallet.total_deposited_cents,
                    wallet.total_withdrawn_cents,
                )?;
                Transaction::set_status(conn, &txn.id, TransactionStatus::Failed, None)?;

                warn!(user_id = %user, transaction_id = %txn.id, "Withdrawal failed, funds returned");
                Ok(Transaction::find_by_id(conn, &txn.id)?
                    .ok_or_else(|| CoreError::not_found("Transaction", &txn.id))?)
            })
        })
        .await
    }
}

fn load_processing_withdrawal(
    conn: &mut SqliteConnection,
    txn_id: &str,
    user_id: &str,
) -> CoreResult<Transaction> {
    let txn = Transaction::find_by_id(conn, txn_id)?
        .ok_or_else(|| CoreError::not_found("Transaction", txn_id))?;
    if txn.user_id != user_id {
        return Err(CoreError::Authorization(
            "Withdrawal belongs to another user".to_string(),
        ));
    }
    if txn.kind != TransactionKind::Withdrawal.as_str() {
        return Err(CoreError::business(
            "INVALID_TRANSACTION_STATE",
            "Transaction is not a withdrawal",
        ));
    }
    if txn.status != TransactionStatus::Processing.as_str() {
        return Err(CoreError::business(
            "INVALID_TRANSACTION_STATE",
            format!("Withdrawal cannot be settled from status {}", txn.status),
        ));
    }
    Ok(txn)
}
