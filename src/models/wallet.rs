//! Wallet model: per-user balance row
//!
//! Balance mutation never happens here directly; the ledger service owns the
//! read-check-write-append sequence and calls `save_balances` inside its
//! transaction.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::wallets;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = wallets)]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub balance_cents: i64,
    pub pending_cents: i64,
    pub total_deposited_cents: i64,
    pub total_withdrawn_cents: i64,
    pub currency: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = wallets)]
pub struct NewWallet {
    pub id: String,
    pub user_id: String,
    pub balance_cents: i64,
    pub pending_cents: i64,
    pub total_deposited_cents: i64,
    pub total_withdrawn_cents: i64,
    pub currency: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewWallet {
    pub fn zero(user_id: &str, currency: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            balance_cents: 0,
            pending_cents: 0,
            total_deposited_cents: 0,
            total_withdrawn_cents: 0,
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Wallet {
    pub fn create(conn: &mut SqliteConnection, new_wallet: NewWallet) -> Result<Wallet> {
        diesel::insert_into(wallets::table)
            .values(&new_wallet)
            .execute(conn)
            .context("Failed to insert wallet")?;

        wallets::table
            .filter(wallets::id.eq(new_wallet.id))
            .first(conn)
            .context("Failed to retrieve created wallet")
    }

    pub fn find_by_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<Wallet>> {
        wallets::table
            .filter(wallets::user_id.eq(user_id))
            .first(conn)
            .optional()
            .context("Failed to query wallet by user")
    }

    /// Fetch the wallet for a user, creating a zero-balance one on first use
    pub fn get_or_create(
        conn: &mut SqliteConnection,
        user_id: &str,
        currency: &str,
    ) -> Result<Wallet> {
        if let Some(wallet) = Self::find_by_user(conn, user_id)? {
            return Ok(wallet);
        }
        Self::create(conn, NewWallet::zero(user_id, currency))
    }

    /// Persist new balance figures for this wallet row
    pub fn save_balances(
        &self,
        conn: &mut SqliteConnection,
        balance_cents: i64,
        pending_cents: i64,
        total_deposited_cents: i64,
        total_withdrawn_cents: i64,
    ) -> Result<()> {
        diesel::update(wallets::table.filter(wallets::id.eq(&self.id)))
            .set((
                wallets::balance_cents.eq(balance_cents),
                wallets::pending_cents.eq(pending_cents),
                wallets::total_deposited_cents.eq(total_deposited_cents),
                wallets::total_withdrawn_cents.eq(total_withdrawn_cents),
                wallets::updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .execute(conn)
            .context("Failed to update wallet balances")?;
        Ok(())
    }

    pub fn has_sufficient_balance(&self, amount_cents: i64) -> bool {
        self.balance_cents >= amount_cents
    }
}
