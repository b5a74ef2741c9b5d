//! Dispute resolution
//!
//! The only path that can move escrowed funds outside the match state
//! machine's ordinary completion and cancellation transitions. Resolution is
//! admin-gated and settles the HELD escrow according to the chosen outcome.

use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::db::{with_conn, DbPool};
use crate::error::{CoreError, CoreResult};
use crate::models::dispute::{
    Dispute, DisputeEvidence, DisputeResolution, DisputeStatus, NewDispute,
};
use crate::models::escrow::{EscrowAccount, EscrowStatus};
use crate::models::matches::{Match, MatchParticipant, MatchStatus};
use crate::models::transaction::TransactionKind;
use crate::models::user::User;

use super::escrow::{hold_on, refund_on, release_on, split_on};

fn invalid_dispute_state(status: &str) -> CoreError {
    CoreError::business(
        "INVALID_DISPUTE_STATE",
        format!("Dispute cannot be moved from status {status}"),
    )
}

fn load_dispute(conn: &mut SqliteConnection, dispute_id: &str) -> CoreResult<Dispute> {
    Dispute::find_by_id(conn, dispute_id)?
        .ok_or_else(|| CoreError::not_found("Dispute", dispute_id))
}

fn require_admin(conn: &mut SqliteConnection, user_id: &str) -> CoreResult<User> {
    let user =
        User::find_by_id(conn, user_id)?.ok_or_else(|| CoreError::not_found("User", user_id))?;
    if !user.is_admin() {
        return Err(CoreError::Authorization(
            "Dispute administration requires the admin role".to_string(),
        ));
    }
    Ok(user)
}

/// Admin override path over matches and their escrow
#[derive(Clone)]
pub struct DisputeResolver {
    pool: DbPool,
    config: CoreConfig,
}

impl DisputeResolver {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self { pool, config }
    }

    /// File a dispute against an IN_PROGRESS or COMPLETED match. Flags the
    /// match DISPUTED and freezes a LOCKED escrow; one dispute per match.
    pub async fn create_dispute(
        &self,
        match_id: Uuid,
        created_by: Uuid,
        reason: &str,
        description: &str,
    ) -> CoreResult<Dispute> {
        if reason.trim().is_empty() {
            return Err(CoreError::validation_field("Reason is required", "reason"));
        }

        let m = match_id.to_string();
        let filer = created_by.to_string();
        let reason = reason.to_string();
        let description = description.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let row = Match::find_by_id(conn, &m)?
                    .ok_or_else(|| CoreError::not_found("Match", &m))?;

                let participants = MatchParticipant::for_match(conn, &m)?;
                if !participants.iter().any(|p| p.user_id == filer) {
                    return Err(CoreError::business(
                        "NOT_PARTICIPANT",
                        "Only match participants can create disputes",
                    ));
                }
                if !row.can_be_disputed() {
                    return Err(CoreError::business(
                        "INVALID_MATCH_STATE",
                        format!("Cannot dispute match in status {}", row.status),
                    ));
                }
                if Dispute::find_by_match(conn, &m)?.is_some() {
                    return Err(CoreError::conflict(
                        "DUPLICATE_DISPUTE",
                        "Dispute already exists for this match",
                    ));
                }

                let dispute =
                    Dispute::create(conn, NewDispute::pending(&m, &filer, &reason, &description))?;

                Match::transition(
                    conn,
                    &m,
                    &[MatchStatus::InProgress, MatchStatus::Completed],
                    MatchStatus::Disputed,
                )?;

                // A completed match has already released its escrow; only a
                // still-LOCKED account gets frozen
                if let Some(escrow) = EscrowAccount::find_by_match(conn, &m)? {
                    if escrow.is_locked() {
                        hold_on(conn, &m)?;
                    }
                }

                info!(dispute_id = %dispute.id, match_id = %m, filed_by = %filer, "Dispute created");
                Ok(dispute)
            })
        })
        .await
    }

    /// Admin takes the case: PENDING -> UNDER_REVIEW
    pub async fn start_review(&self, dispute_id: Uuid, reviewer: Uuid) -> CoreResult<Dispute> {
        let d = dispute_id.to_string();
        let reviewer = reviewer.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                require_admin(conn, &reviewer)?;
                let dispute = load_dispute(conn, &d)?;
                if !Dispute::mark_under_review(conn, &d)? {
                    return Err(invalid_dispute_state(&dispute.status));
                }
                info!(dispute_id = %d, reviewer = %reviewer, "Dispute under review");
                load_dispute(conn, &d)
            })
        })
        .await
    }

    /// Settle the dispute. Funds move only when the match's escrow is HELD:
    /// a winner resolution releases the pot, SPLIT pays each player half,
    /// REFUND_BOTH returns the stakes, NO_ACTION leaves balances untouched.
    pub async fn resolve_dispute(
        &self,
        dispute_id: Uuid,
        resolved_by: Uuid,
        resolution: DisputeResolution,
        notes: Option<String>,
    ) -> CoreResult<Dispute> {
        let d = dispute_id.to_string();
        let resolver = resolved_by.to_string();
        let currency = self.config.currency.clone();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                require_admin(conn, &resolver)?;

                let dispute = load_dispute(conn, &d)?;
                if !dispute.can_be_resolved() {
                    return Err(invalid_dispute_state(&dispute.status));
                }

                let m = dispute.match_id.clone();
                Match::find_by_id(conn, &m)?.ok_or_else(|| CoreError::not_found("Match", &m))?;

                let participants = MatchParticipant::for_match(conn, &m)?;
                if participants.len() != 2 {
                    return Err(CoreError::business(
                        "INVALID_MATCH",
                        "Match must have exactly 2 participants",
                    ));
                }
                let player1 = participants[0].user_id.clone();
                let player2 = participants[1].user_id.clone();

                let escrow = EscrowAccount::find_by_match(conn, &m)?;
                if escrow.map_or(false, |e| e.is_held()) {
                    match resolution {
                        DisputeResolution::Player1Wins => {
                            release_on(
                                conn,
                                &m,
                                &player1,
                                TransactionKind::DisputePayout,
                                "dispute_payout",
                                &[EscrowStatus::Held],
                                &currency,
                            )?;
                        }
                        DisputeResolution::Player2Wins => {
                            release_on(
                                conn,
                                &m,
                                &player2,
                                TransactionKind::DisputePayout,
                                "dispute_payout",
                                &[EscrowStatus::Held],
                                &currency,
                            )?;
                        }
                        DisputeResolution::Split => {
                            split_on(conn, &m, &player1, &player2, &currency)?;
                        }
                        DisputeResolution::RefundBoth => {
                            refund_on(
                                conn,
                                &m,
                                &player1,
                                &player2,
                                TransactionKind::DisputeRefund,
                                "dispute_refund",
                                &[EscrowStatus::Held],
                                &currency,
                            )?;
                        }
                        DisputeResolution::NoAction => {}
                    }
                }

                if !Dispute::mark_closed(
                    conn,
                    &d,
                    DisputeStatus::Resolved,
                    Some(resolution),
                    &resolver,
                    notes.as_deref(),
                )? {
                    return Err(invalid_dispute_state(&dispute.status));
                }

                info!(
                    dispute_id = %d,
                    match_id = %m,
                    resolution = resolution.as_str(),
                    resolved_by = %resolver,
                    "Dispute resolved"
                );
                load_dispute(conn, &d)
            })
        })
        .await
    }

    /// Close the dispute without touching funds. A HELD escrow stays held
    /// for the reconciliation path.
    pub async fn dismiss_dispute(
        &self,
        dispute_id: Uuid,
        dismissed_by: Uuid,
        notes: Option<String>,
    ) -> CoreResult<Dispute> {
        let d = dispute_id.to_string();
        let resolver = dismissed_by.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                require_admin(conn, &resolver)?;
                let dispute = load_dispute(conn, &d)?;
                if !Dispute::mark_closed(
                    conn,
                    &d,
                    DisputeStatus::Dismissed,
                    None,
                    &resolver,
                    notes.as_deref(),
                )? {
                    return Err(invalid_dispute_state(&dispute.status));
                }
                info!(dispute_id = %d, dismissed_by = %resolver, "Dispute dismissed");
                load_dispute(conn, &d)
            })
        })
        .await
    }

    /// Attach evidence while the dispute is still open; participants only
    pub async fn add_evidence(
        &self,
        dispute_id: Uuid,
        submitted_by: Uuid,
        evidence_type: &str,
        content: Option<String>,
        file_url: Option<String>,
    ) -> CoreResult<DisputeEvidence> {
        if content.is_none() && file_url.is_none() {
            return Err(CoreError::validation(
                "Evidence needs content or a file URL",
            ));
        }

        let d = dispute_id.to_string();
        let submitter = submitted_by.to_string();
        let evidence_type = evidence_type.to_string();
        with_conn(&self.pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let dispute = load_dispute(conn, &d)?;
                if !dispute.can_be_resolved() {
                    return Err(CoreError::business(
                        "INVALID_DISPUTE_STATE",
                        "Evidence can only be added to an open dispute",
                    ));
                }

                let participants = MatchParticipant::for_match(conn, &dispute.match_id)?;
                if !participants.iter().any(|p| p.user_id == submitter) {
                    return Err(CoreError::business(
                        "NOT_PARTICIPANT",
                        "Only match participants can submit evidence",
                    ));
                }

                Ok(DisputeEvidence::add(
                    conn,
                    &d,
                    &submitter,
                    &evidence_type,
                    content.as_deref(),
                    file_url.as_deref(),
                )?)
            })
        })
        .await
    }

    pub async fn get_dispute(
        &self,
        dispute_id: Uuid,
    ) -> CoreResult<(Dispute, Vec<DisputeEvidence>)> {
        let d = dispute_id.to_string();
        with_conn(&self.pool, move |conn| {
            let dispute = load_dispute(conn, &d)?;
            let evidence = DisputeEvidence::for_dispute(conn, &d)?;
            Ok((dispute, evidence))
        })
        .await
    }
}
