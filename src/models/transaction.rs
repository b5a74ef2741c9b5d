//! Immutable ledger entries
//!
//! One row per balance mutation, with before/after snapshots. Rows are never
//! edited after completion; corrections append a reversal as a new row.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::transactions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    MatchEntry,
    MatchWin,
    MatchRefund,
    EscrowLock,
    EscrowRelease,
    DisputeHold,
    DisputePayout,
    DisputeRefund,
    PlatformFee,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::MatchEntry => "MATCH_ENTRY",
            Self::MatchWin => "MATCH_WIN",
            Self::MatchRefund => "MATCH_REFUND",
            Self::EscrowLock => "ESCROW_LOCK",
            Self::EscrowRelease => "ESCROW_RELEASE",
            Self::DisputeHold => "DISPUTE_HOLD",
            Self::DisputePayout => "DISPUTE_PAYOUT",
            Self::DisputeRefund => "DISPUTE_REFUND",
            Self::PlatformFee => "PLATFORM_FEE",
            Self::Adjustment => "ADJUSTMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Reversed => "REVERSED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = transactions)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub kind: String,
    pub status: String,
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub external_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub processed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub kind: String,
    pub status: String,
    pub amount_cents: i64,
    pub balance_before_cents: i64,
    pub balance_after_cents: i64,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub external_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub processed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl NewTransaction {
    pub fn new(
        user_id: &str,
        wallet_id: &str,
        kind: TransactionKind,
        status: TransactionStatus,
        amount_cents: i64,
        balance_before_cents: i64,
        balance_after_cents: i64,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            wallet_id: wallet_id.to_string(),
            kind: kind.as_str().to_string(),
            status: status.as_str().to_string(),
            amount_cents,
            balance_before_cents,
            balance_after_cents,
            reference_id: None,
            reference_type: None,
            external_id: None,
            idempotency_key: None,
            description: None,
            processed_at: if status == TransactionStatus::Completed {
                Some(now)
            } else {
                None
            },
            created_at: now,
        }
    }
}

/// Optional filters for the transaction history query
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

impl Transaction {
    pub fn create(conn: &mut SqliteConnection, new_txn: NewTransaction) -> Result<Transaction> {
        diesel::insert_into(transactions::table)
            .values(&new_txn)
            .execute(conn)
            .context("Failed to insert transaction")?;

        transactions::table
            .filter(transactions::id.eq(new_txn.id))
            .first(conn)
            .context("Failed to retrieve created transaction")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, txn_id: &str) -> Result<Option<Transaction>> {
        transactions::table
            .filter(transactions::id.eq(txn_id))
            .first(conn)
            .optional()
            .context("Failed to query transaction")
    }

    pub fn find_by_external_id(
        conn: &mut SqliteConnection,
        external_id: &str,
    ) -> Result<Option<Transaction>> {
        transactions::table
            .filter(transactions::external_id.eq(external_id))
            .first(conn)
            .optional()
            .context("Failed to query transaction by external id")
    }

    pub fn find_by_idempotency_key(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<Transaction>> {
        transactions::table
            .filter(transactions::idempotency_key.eq(key))
            .first(conn)
            .optional()
            .context("Failed to query transaction by idempotency key")
    }

    /// Newest-first history for a user. `before` is the creation timestamp of
    /// the last row the caller already has; rows strictly older are returned.
    pub fn history(
        conn: &mut SqliteConnection,
        user_id: &str,
        filter: &TransactionFilter,
        limit: i64,
        before: Option<NaiveDateTime>,
    ) -> Result<Vec<Transaction>> {
        let mut query = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .into_boxed();

        if let Some(kind) = filter.kind {
            query = query.filter(transactions::kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(transactions::status.eq(status.as_str()));
        }
        if let Some(cursor) = before {
            query = query.filter(transactions::created_at.lt(cursor));
        }

        query
            .order(transactions::created_at.desc())
            .limit(limit)
            .load(conn)
            .context("Failed to load transaction history")
    }

    /// Move a pending/processing row to a settled status
    pub fn set_status(
        conn: &mut SqliteConnection,
        txn_id: &str,
        status: TransactionStatus,
        external_id: Option<&str>,
    ) -> Result<()> {
        let processed_at = matches!(
            status,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
        .then(|| chrono::Utc::now().naive_utc());

        let target = transactions::table.filter(transactions::id.eq(txn_id));
        match external_id {
            Some(ext) => diesel::update(target)
                .set((
                    transactions::status.eq(status.as_str()),
                    transactions::processed_at.eq(processed_at),
                    transactions::external_id.eq(ext),
                ))
                .execute(conn),
            None => diesel::update(target)
                .set((
                    transactions::status.eq(status.as_str()),
                    transactions::processed_at.eq(processed_at),
                ))
                .execute(conn),
        }
        .context("Failed to update transaction status")?;
        Ok(())
    }

    /// Settle a pending row, writing the actual balance snapshots taken at
    /// settlement time. Only legal before the row reaches COMPLETED.
    pub fn finalize(
        conn: &mut SqliteConnection,
        txn_id: &str,
        balance_before_cents: i64,
        balance_after_cents: i64,
    ) -> Result<()> {
        diesel::update(transactions::table.filter(transactions::id.eq(txn_id)))
            .set((
                transactions::status.eq(TransactionStatus::Completed.as_str()),
                transactions::balance_before_cents.eq(balance_before_cents),
                transactions::balance_after_cents.eq(balance_after_cents),
                transactions::processed_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .execute(conn)
            .context("Failed to finalize transaction")?;
        Ok(())
    }

    /// Signed sum of all completed entries for a user; equals the wallet
    /// balance when the ledger is consistent
    pub fn completed_sum(conn: &mut SqliteConnection, user_id: &str) -> Result<i64> {
        let amounts: Vec<i64> = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::status.eq(TransactionStatus::Completed.as_str()))
            .select(transactions::amount_cents)
            .load(conn)
            .context("Failed to sum transactions")?;
        Ok(amounts.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_ledger_vocabulary() {
        assert_eq!(TransactionKind::EscrowLock.as_str(), "ESCROW_LOCK");
        assert_eq!(TransactionKind::DisputePayout.as_str(), "DISPUTE_PAYOUT");
        assert_eq!(TransactionKind::MatchRefund.as_str(), "MATCH_REFUND");
    }
}
