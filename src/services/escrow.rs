//! Escrow engine
//!
//! Temporary custody of both players' stakes. Each debit/credit is keyed by
//! match and player slot, so a retried lock or release completes the missing
//! postings without double-charging, and the terminal transition is a
//! status-guarded UPDATE so an account pays out at most once.

use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::db::{with_conn, DbPool};
use crate::error::{CoreError, CoreResult};
use crate::models::escrow::{EscrowAccount, EscrowStatus, NewEscrowAccount};
use crate::models::transaction::TransactionKind;

use super::wallet::{post_credit, post_debit, Posting, Reference};

/// Integer fee math, computed once at match creation and carried unchanged
/// through lock and release so rounding can never skew the totals.
///
/// Returns `(total_pot_cents, platform_fee_cents)` for a two-player match.
pub fn compute_pot(stake_cents: i64, fee_percent: i64) -> (i64, i64) {
    let combined = stake_cents * 2;
    let fee = combined * fee_percent / 100;
    (combined - fee, fee)
}

fn invalid_state(status: &str) -> CoreError {
    CoreError::business(
        "INVALID_ESCROW_STATE",
        format!("Escrow cannot be moved from status {status}"),
    )
}

fn stake_posting(
    user_id: &str,
    amount_cents: i64,
    kind: TransactionKind,
    key: String,
    match_id: &str,
    description: String,
    currency: &str,
) -> Posting {
    Posting {
        user_id: user_id.to_string(),
        amount_cents,
        kind,
        idempotency_key: Some(key),
        reference: Some(Reference::to_match(match_id)),
        description: Some(description),
        currency: currency.to_string(),
    }
}

/// Lock both stakes on the given connection; idempotent per match
pub(crate) fn lock_on(
    conn: &mut SqliteConnection,
    match_id: &str,
    player1_id: &str,
    player2_id: &str,
    stake_cents: i64,
    platform_fee_cents: i64,
    currency: &str,
) -> CoreResult<EscrowAccount> {
    if let Some(existing) = EscrowAccount::find_by_match(conn, match_id)? {
        return Ok(existing);
    }

    for (slot, player) in [(1, player1_id), (2, player2_id)] {
        post_debit(
            conn,
            &stake_posting(
                player,
                stake_cents,
                TransactionKind::EscrowLock,
                format!("escrow_lock_{match_id}_player{slot}"),
                match_id,
                format!("Escrow lock for match {match_id}"),
                currency,
            ),
        )?;
    }

    let escrow = EscrowAccount::create(
        conn,
        NewEscrowAccount::locked(match_id, stake_cents, stake_cents, platform_fee_cents),
    )?;

    info!(
        match_id = %match_id,
        total_cents = escrow.total_amount_cents,
        fee_cents = platform_fee_cents,
        "Escrow locked"
    );
    Ok(escrow)
}

/// Credit the full pot to the winner, then claim the terminal RELEASED state
pub(crate) fn release_on(
    conn: &mut SqliteConnection,
    match_id: &str,
    winner_id: &str,
    kind: TransactionKind,
    key_prefix: &str,
    from: &[EscrowStatus],
    currency: &str,
) -> CoreResult<EscrowAccount> {
    let escrow = EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))?;

    if !from.iter().any(|s| escrow.status == s.as_str()) {
        return Err(invalid_state(&escrow.status));
    }

    post_credit(
        conn,
        &stake_posting(
            winner_id,
            escrow.total_amount_cents,
            kind,
            format!("{key_prefix}_{match_id}_{winner_id}"),
            match_id,
            format!(
                "Match win payout: ${:.2}",
                escrow.total_amount_cents as f64 / 100.0
            ),
            currency,
        ),
    )?;

    if !EscrowAccount::mark_released(conn, &escrow.id, Some(winner_id), from)? {
        return Err(invalid_state(&escrow.status));
    }

    info!(
        match_id = %match_id,
        winner_id = %winner_id,
        amount_cents = escrow.total_amount_cents,
        "Escrow released to winner"
    );
    EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))
}

/// Return each player's original stake, then claim the terminal REFUNDED state
pub(crate) fn refund_on(
    conn: &mut SqliteConnection,
    match_id: &str,
    player1_id: &str,
    player2_id: &str,
    kind: TransactionKind,
    key_prefix: &str,
    from: &[EscrowStatus],
    currency: &str,
) -> CoreResult<EscrowAccount> {
    let escrow = EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))?;

    if !from.iter().any(|s| escrow.status == s.as_str()) {
        return Err(invalid_state(&escrow.status));
    }

    let refunds = [
        (1, player1_id, escrow.player1_amount_cents),
        (2, player2_id, escrow.player2_amount_cents),
    ];
    for (slot, player, amount) in refunds {
        post_credit(
            conn,
            &stake_posting(
                player,
                amount,
                kind,
                format!("{key_prefix}_{match_id}_player{slot}"),
                match_id,
                format!("Match refund: ${:.2}", amount as f64 / 100.0),
                currency,
            ),
        )?;
    }

    if !EscrowAccount::mark_refunded(conn, &escrow.id, from)? {
        return Err(invalid_state(&escrow.status));
    }

    info!(match_id = %match_id, "Escrow refunded to both players");
    EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))
}

/// Dispute payout splitting the pot evenly; an odd cent stays with the
/// platform (documented in DESIGN.md)
pub(crate) fn split_on(
    conn: &mut SqliteConnection,
    match_id: &str,
    player1_id: &str,
    player2_id: &str,
    currency: &str,
) -> CoreResult<EscrowAccount> {
    let escrow = EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))?;

    if !escrow.is_held() {
        return Err(invalid_state(&escrow.status));
    }

    let half = escrow.total_amount_cents / 2;
    for (slot, player) in [(1, player1_id), (2, player2_id)] {
        post_credit(
            conn,
            &stake_posting(
                player,
                half,
                TransactionKind::DisputePayout,
                format!("dispute_split_{match_id}_player{slot}"),
                match_id,
                format!("Dispute split payout: ${:.2}", half as f64 / 100.0),
                currency,
            ),
        )?;
    }

    if !EscrowAccount::mark_released(conn, &escrow.id, None, &[EscrowStatus::Held])? {
        return Err(invalid_state(&escrow.status));
    }

    info!(match_id = %match_id, half_cents = half, "Escrow split between players");
    EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))
}

/// Freeze a LOCKED account while a dispute is open
pub(crate) fn hold_on(conn: &mut SqliteConnection, match_id: &str) -> CoreResult<EscrowAccount> {
    let escrow = EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))?;

    if !EscrowAccount::mark_held(conn, &escrow.id)? {
        return Err(invalid_state(&escrow.status));
    }

    info!(match_id = %match_id, "Escrow held for dispute");
    EscrowAccount::find_by_match(conn, match_id)?
        .ok_or_else(|| CoreError::not_found("Escrow", match_id))
}

/// Custody of two players' stakes for the duration of a match
#[derive(Clone)]
pub struct EscrowEngine {
    pool: DbPool,
    config: CoreConfig,
}

impl EscrowEngine {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self { pool, config }
    }

    /// Debit both players and open a LOCKED escrow account. Retried calls
    /// never double-charge: debits are keyed per match and player slot, and
    /// an existing account is returned as-is.
    pub async fn lock_funds(
        &self,
        match_id: Uuid,
        player1_id: Uuid,
        player2_id: Uuid,
        stake_cents: i64,
        platform_fee_cents: i64,
    ) -> CoreResult<EscrowAccount> {
        let (m, p1, p2) = (
            match_id.to_string(),
            player1_id.to_string(),
            player2_id.to_string(),
        );
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                lock_on(conn, &m, &p1, &p2, stake_cents, platform_fee_cents, &currency)
            })
        })
        .await
    }

    /// Pay the full pot to the winner. Single-fire: a second call either
    /// replays the idempotent credit or fails with INVALID_ESCROW_STATE.
    pub async fn release_to_winner(
        &self,
        match_id: Uuid,
        winner_id: Uuid,
    ) -> CoreResult<EscrowAccount> {
        let (m, w) = (match_id.to_string(), winner_id.to_string());
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                release_on(
                    conn,
                    &m,
                    &w,
                    TransactionKind::EscrowRelease,
                    "escrow_release",
                    &[EscrowStatus::Locked],
                    &currency,
                )
            })
        })
        .await
    }

    /// Return both stakes; legal from LOCKED or HELD
    pub async fn refund_match(
        &self,
        match_id: Uuid,
        player1_id: Uuid,
        player2_id: Uuid,
    ) -> CoreResult<EscrowAccount> {
        let (m, p1, p2) = (
            match_id.to_string(),
            player1_id.to_string(),
            player2_id.to_string(),
        );
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                refund_on(
                    conn,
                    &m,
                    &p1,
                    &p2,
                    TransactionKind::MatchRefund,
                    "escrow_refund",
                    &[EscrowStatus::Locked, EscrowStatus::Held],
                    &currency,
                )
            })
        })
        .await
    }

    /// LOCKED -> HELD; ordinary release and refund stop acting on the
    /// account until a dispute resolution settles it
    pub async fn hold_for_dispute(&self, match_id: Uuid) -> CoreResult<EscrowAccount> {
        let m = match_id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| hold_on(conn, &m))
        })
        .await
    }

    pub async fn get_by_match(&self, match_id: Uuid) -> CoreResult<Option<EscrowAccount>> {
        let m = match_id.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(EscrowAccount::find_by_match(conn, &m)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pot_math_uses_integer_fee() {
        // 2 x 500 at 10% -> fee 100, pot 900
        assert_eq!(compute_pot(500, 10), (900, 100));
        // 2 x 101 at 10% -> combined 202, fee floor(20.2) = 20
        assert_eq!(compute_pot(101, 10), (182, 20));
        // Zero fee keeps the full pot
        assert_eq!(compute_pot(250, 0), (500, 0));
    }

    #[test]
    fn pot_invariant_holds_for_all_stakes() {
        for stake in [100, 333, 9_999, 100_000] {
            for fee_percent in [0, 5, 10, 25] {
                let (total, fee) = compute_pot(stake, fee_percent);
                assert_eq!(total, stake + stake - fee);
                assert!(fee >= 0 && total > 0);
            }
        }
    }
}
