//! Escrow account model
//!
//! One row per match, created at ACCEPTED. The terminal transitions are
//! status-guarded UPDATEs: zero rows affected means another caller already
//! moved the account, so a retried release can never pay out twice.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::escrow_accounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Locked,
    Held,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Held => "HELD",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = escrow_accounts)]
pub struct EscrowAccount {
    pub id: String,
    pub match_id: String,
    pub total_amount_cents: i64,
    pub player1_amount_cents: i64,
    pub player2_amount_cents: i64,
    pub platform_fee_cents: i64,
    pub status: String,
    pub locked_at: NaiveDateTime,
    pub held_at: Option<NaiveDateTime>,
    pub released_at: Option<NaiveDateTime>,
    pub released_to: Option<String>,
    pub refunded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = escrow_accounts)]
pub struct NewEscrowAccount {
    pub id: String,
    pub match_id: String,
    pub total_amount_cents: i64,
    pub player1_amount_cents: i64,
    pub player2_amount_cents: i64,
    pub platform_fee_cents: i64,
    pub status: String,
    pub locked_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewEscrowAccount {
    pub fn locked(
        match_id: &str,
        player1_amount_cents: i64,
        player2_amount_cents: i64,
        platform_fee_cents: i64,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            total_amount_cents: player1_amount_cents + player2_amount_cents - platform_fee_cents,
            player1_amount_cents,
            player2_amount_cents,
            platform_fee_cents,
            status: EscrowStatus::Locked.as_str().to_string(),
            locked_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

impl EscrowAccount {
    pub fn create(conn: &mut SqliteConnection, new_escrow: NewEscrowAccount) -> Result<EscrowAccount> {
        diesel::insert_into(escrow_accounts::table)
            .values(&new_escrow)
            .execute(conn)
            .context("Failed to insert escrow account")?;

        escrow_accounts::table
            .filter(escrow_accounts::id.eq(new_escrow.id))
            .first(conn)
            .context("Failed to retrieve created escrow account")
    }

    pub fn find_by_match(
        conn: &mut SqliteConnection,
        match_id: &str,
    ) -> Result<Option<EscrowAccount>> {
        escrow_accounts::table
            .filter(escrow_accounts::match_id.eq(match_id))
            .first(conn)
            .optional()
            .context("Failed to query escrow account by match")
    }

    /// LOCKED -> HELD. Returns false when the account was not LOCKED.
    pub fn mark_held(conn: &mut SqliteConnection, escrow_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().naive_utc();
        let affected = diesel::update(
            escrow_accounts::table
                .filter(escrow_accounts::id.eq(escrow_id))
                .filter(escrow_accounts::status.eq(EscrowStatus::Locked.as_str())),
        )
        .set((
            escrow_accounts::status.eq(EscrowStatus::Held.as_str()),
            escrow_accounts::held_at.eq(now),
            escrow_accounts::updated_at.eq(now),
        ))
        .execute(conn)
        .context("Failed to hold escrow account")?;
        Ok(affected == 1)
    }

    /// Terminal transition to RELEASED, admissible only from `from` states.
    /// Returns false when the account was in none of them.
    pub fn mark_released(
        conn: &mut SqliteConnection,
        escrow_id: &str,
        released_to: Option<&str>,
        from: &[EscrowStatus],
    ) -> Result<bool> {
        let now = chrono::Utc::now().naive_utc();
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let affected = diesel::update(
            escrow_accounts::table
                .filter(escrow_accounts::id.eq(escrow_id))
                .filter(escrow_accounts::status.eq_any(from_strs)),
        )
        .set((
            escrow_accounts::status.eq(EscrowStatus::Released.as_str()),
            escrow_accounts::released_at.eq(now),
            escrow_accounts::released_to.eq(released_to),
            escrow_accounts::updated_at.eq(now),
        ))
        .execute(conn)
        .context("Failed to release escrow account")?;
        Ok(affected == 1)
    }

    /// Terminal transition to REFUNDED, admissible only from `from` states
    pub fn mark_refunded(
        conn: &mut SqliteConnection,
        escrow_id: &str,
        from: &[EscrowStatus],
    ) -> Result<bool> {
        let now = chrono::Utc::now().naive_utc();
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let affected = diesel::update(
            escrow_accounts::table
                .filter(escrow_accounts::id.eq(escrow_id))
                .filter(escrow_accounts::status.eq_any(from_strs)),
        )
        .set((
            escrow_accounts::status.eq(EscrowStatus::Refunded.as_str()),
            escrow_accounts::refunded_at.eq(now),
            escrow_accounts::updated_at.eq(now),
        ))
        .execute(conn)
        .context("Failed to refund escrow account")?;
        Ok(affected == 1)
    }

    pub fn is_locked(&self) -> bool {
        self.status == EscrowStatus::Locked.as_str()
    }

    pub fn is_held(&self) -> bool {
        self.status == EscrowStatus::Held.as_str()
    }
}
