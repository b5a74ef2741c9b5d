//! Match state machine
//!
//! CREATED -> ACCEPTED -> IN_PROGRESS -> COMPLETED | CANCELLED, with the
//! DISPUTED branch driven by the dispute resolver. Every transition runs in
//! one immediate transaction: the status is re-checked under the write lock,
//! the money movement happens through the escrow engine's idempotent
//! postings, and the status flip commits last, so a failed escrow call never
//! leaves the match half-transitioned.

use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::db::{with_conn, DbPool};
use crate::error::{CoreError, CoreResult};
use crate::models::escrow::{EscrowAccount, EscrowStatus};
use crate::models::matches::{
    Match, MatchParticipant, MatchResult, MatchStatus, MatchType, NewMatch,
};
use crate::models::transaction::TransactionKind;
use crate::models::user::User;

use super::escrow::{compute_pot, lock_on, refund_on, release_on};
use super::ranking::apply_match_on;

fn invalid_match_state(status: &str) -> CoreError {
    CoreError::business(
        "INVALID_MATCH_STATE",
        format!("Match cannot be moved from status {status}"),
    )
}

fn load_match(conn: &mut SqliteConnection, match_id: &str) -> CoreResult<Match> {
    Match::find_by_id(conn, match_id)?.ok_or_else(|| CoreError::not_found("Match", match_id))
}

fn load_active_user(conn: &mut SqliteConnection, user_id: &str) -> CoreResult<User> {
    let user =
        User::find_by_id(conn, user_id)?.ok_or_else(|| CoreError::not_found("User", user_id))?;
    if !user.is_active {
        return Err(CoreError::business(
            "USER_INACTIVE",
            "User account is not active",
        ));
    }
    Ok(user)
}

fn require_participant(participants: &[MatchParticipant], user_id: &str, role: &str) -> CoreResult<()> {
    if !participants.iter().any(|p| p.user_id == user_id) {
        return Err(CoreError::business(
            "NOT_PARTICIPANT",
            format!("{role} is not a participant of this match"),
        ));
    }
    Ok(())
}

/// Drives the lifecycle of a wagered contest
#[derive(Clone)]
pub struct MatchEngine {
    pool: DbPool,
    config: CoreConfig,
}

impl MatchEngine {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self { pool, config }
    }

    /// Open a match and seat the creator as team 1
    pub async fn create_match(
        &self,
        match_type: MatchType,
        stake_cents: i64,
        created_by: Uuid,
        game_type: Option<String>,
        best_of: i32,
    ) -> CoreResult<Match> {
        if stake_cents < self.config.min_stake_cents {
            return Err(CoreError::validation_field(
                format!(
                    "Stake must be at least ${:.2}",
                    self.config.min_stake_cents as f64 / 100.0
                ),
                "stake_cents",
            ));
        }
        if stake_cents > self.config.max_stake_cents {
            return Err(CoreError::validation_field(
                format!(
                    "Stake cannot exceed ${:.2}",
                    self.config.max_stake_cents as f64 / 100.0
                ),
                "stake_cents",
            ));
        }
        if !(1..=7).contains(&best_of) {
            return Err(CoreError::validation_field(
                "Best of must be between 1 and 7",
                "best_of",
            ));
        }
        if best_of % 2 == 0 {
            return Err(CoreError::validation_field(
                "Best of must be an odd number",
                "best_of",
            ));
        }

        // Fee math happens exactly once, here; lock and release carry it
        let (total_pot_cents, platform_fee_cents) =
            compute_pot(stake_cents, self.config.platform_fee_percent);

        let creator = created_by.to_string();
        let match_type_str = match_type.as_str().to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                load_active_user(conn, &creator)?;

                let now = chrono::Utc::now().naive_utc();
                let created = Match::create(
                    conn,
                    NewMatch {
                        id: Uuid::new_v4().to_string(),
                        match_type: match_type_str,
                        status: MatchStatus::Created.as_str().to_string(),
                        stake_cents,
                        total_pot_cents,
                        platform_fee_cents,
                        game_type,
                        best_of,
                        created_by: creator.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                )?;
                MatchParticipant::add(conn, &created.id, &creator, 1)?;

                info!(
                    match_id = %created.id,
                    created_by = %creator,
                    stake_cents = stake_cents,
                    best_of = best_of,
                    "Match created"
                );
                Ok(created)
            })
        })
        .await
    }

    /// Join as the opponent: seats team 2, locks both stakes in escrow and
    /// flips the match to ACCEPTED, all in one unit
    pub async fn accept_match(&self, match_id: Uuid, user_id: Uuid) -> CoreResult<Match> {
        let m = match_id.to_string();
        let acceptor = user_id.to_string();
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let row = load_match(conn, &m)?;
                if !row.can_be_accepted() {
                    return Err(invalid_match_state(&row.status));
                }
                if row.created_by == acceptor {
                    return Err(CoreError::business(
                        "CANNOT_ACCEPT_OWN_MATCH",
                        "Cannot accept your own match",
                    ));
                }
                load_active_user(conn, &acceptor)?;

                MatchParticipant::add(conn, &m, &acceptor, 2)?;
                lock_on(
                    conn,
                    &m,
                    &row.created_by,
                    &acceptor,
                    row.stake_cents,
                    row.platform_fee_cents,
                    &currency,
                )?;
                Match::set_accepted(conn, &m, &acceptor)?;

                info!(match_id = %m, accepted_by = %acceptor, "Match accepted");
                load_match(conn, &m)
            })
        })
        .await
    }

    /// Both players are ready; only a participant may start
    pub async fn start_match(&self, match_id: Uuid, user_id: Uuid) -> CoreResult<Match> {
        let m = match_id.to_string();
        let user = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let row = load_match(conn, &m)?;
                if !row.can_be_started() {
                    return Err(invalid_match_state(&row.status));
                }
                let participants = MatchParticipant::for_match(conn, &m)?;
                require_participant(&participants, &user, "User")?;

                Match::set_started(conn, &m)?;
                info!(match_id = %m, started_by = %user, "Match started");
                load_match(conn, &m)
            })
        })
        .await
    }

    /// Record the series outcome, settle escrow and update both rankings.
    ///
    /// `game_results` holds the winner of each game, in game order, and must
    /// have exactly `best_of` entries; the declared match winner must have a
    /// strict majority of them.
    pub async fn complete_match(
        &self,
        match_id: Uuid,
        winner_id: Uuid,
        game_results: Vec<Uuid>,
        reported_by: Uuid,
    ) -> CoreResult<(Match, Vec<MatchResult>)> {
        let m = match_id.to_string();
        let winner = winner_id.to_string();
        let reporter = reported_by.to_string();
        let game_winners: Vec<String> = game_results.iter().map(|id| id.to_string()).collect();
        let currency = self.config.currency.clone();
        let k_factor = self.config.elo_k_factor;
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let row = load_match(conn, &m)?;
                if !row.can_be_completed() {
                    return Err(invalid_match_state(&row.status));
                }

                let participants = MatchParticipant::for_match(conn, &m)?;
                if participants.len() != 2 {
                    return Err(CoreError::business(
                        "INVALID_MATCH",
                        "Match must have exactly 2 participants",
                    ));
                }
                require_participant(&participants, &reporter, "Reporter")?;
                if !participants.iter().any(|p| p.user_id == winner) {
                    return Err(CoreError::business(
                        "INVALID_WINNER",
                        "Winner must be a participant",
                    ));
                }

                if game_winners.len() != row.best_of as usize {
                    return Err(CoreError::validation_field(
                        format!("Must provide {} game results", row.best_of),
                        "game_results",
                    ));
                }

                let mut winner_wins = 0;
                for (index, game_winner) in game_winners.iter().enumerate() {
                    if !participants.iter().any(|p| &p.user_id == game_winner) {
                        return Err(CoreError::validation_field(
                            format!("Game {} winner must be a participant", index + 1),
                            "game_results",
                        ));
                    }
                    if game_winner == &winner {
                        winner_wins += 1;
                    }
                }

                let required_wins = row.best_of / 2 + 1;
                if winner_wins < required_wins {
                    return Err(CoreError::validation_field(
                        format!("Winner must win at least {required_wins} games"),
                        "game_results",
                    ));
                }

                for (index, game_winner) in game_winners.iter().enumerate() {
                    MatchResult::record(conn, &m, index as i32 + 1, game_winner, &reporter)?;
                }

                // Money first: if the escrow release fails, the whole
                // transaction rolls back and the match stays IN_PROGRESS
                release_on(
                    conn,
                    &m,
                    &winner,
                    TransactionKind::EscrowRelease,
                    "escrow_release",
                    &[EscrowStatus::Locked],
                    &currency,
                )?;

                apply_match_on(
                    conn,
                    &participants[0].user_id,
                    &participants[1].user_id,
                    &winner,
                    k_factor,
                    row.total_pot_cents,
                )?;

                Match::set_completed(conn, &m, &winner)?;

                info!(match_id = %m, winner_id = %winner, "Match completed");
                let updated = load_match(conn, &m)?;
                let results = MatchResult::for_match(conn, &m)?;
                Ok((updated, results))
            })
        })
        .await
    }

    /// Cancel an open match. The creator may always cancel; the opponent
    /// only once the match is ACCEPTED. Refunds escrow when one exists.
    pub async fn cancel_match(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> CoreResult<Match> {
        let m = match_id.to_string();
        let user = user_id.to_string();
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let row = load_match(conn, &m)?;
                if !row.can_be_cancelled() {
                    return Err(invalid_match_state(&row.status));
                }

                let participants = MatchParticipant::for_match(conn, &m)?;
                if row.created_by != user {
                    let is_participant = participants.iter().any(|p| p.user_id == user);
                    if !row.status_is(MatchStatus::Accepted) || !is_participant {
                        return Err(CoreError::Authorization(
                            "Only the match creator can cancel".to_string(),
                        ));
                    }
                }

                if let Some(_escrow) = EscrowAccount::find_by_match(conn, &m)? {
                    if participants.len() == 2 {
                        refund_on(
                            conn,
                            &m,
                            &participants[0].user_id,
                            &participants[1].user_id,
                            TransactionKind::MatchRefund,
                            "escrow_refund",
                            &[EscrowStatus::Locked, EscrowStatus::Held],
                            &currency,
                        )?;
                    }
                }

                Match::set_cancelled(conn, &m, &user, reason.as_deref())?;
                info!(match_id = %m, cancelled_by = %user, "Match cancelled");
                load_match(conn, &m)
            })
        })
        .await
    }

    pub async fn get_match(&self, match_id: Uuid) -> CoreResult<Match> {
        let m = match_id.to_string();
        with_conn(&self.pool, move |conn| load_match(conn, &m)).await
    }

    pub async fn participants(&self, match_id: Uuid) -> CoreResult<Vec<MatchParticipant>> {
        let m = match_id.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(MatchParticipant::for_match(conn, &m)?)
        })
        .await
    }

    /// Matches waiting for an opponent, newest first
    pub async fn list_open_matches(&self, limit: i64) -> CoreResult<Vec<Match>> {
        let limit = limit.clamp(1, 100);
        with_conn(&self.pool, move |conn| {
            Ok(Match::list_by_status(conn, MatchStatus::Created, limit)?)
        })
        .await
    }
}
