//! Dispute and evidence models

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{dispute_evidence, disputes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    Pending,
    UnderReview,
    Resolved,
    Dismissed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Resolved => "RESOLVED",
            Self::Dismissed => "DISMISSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeResolution {
    Player1Wins,
    Player2Wins,
    Split,
    RefundBoth,
    NoAction,
}

impl DisputeResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player1Wins => "PLAYER1_WINS",
            Self::Player2Wins => "PLAYER2_WINS",
            Self::Split => "SPLIT",
            Self::RefundBoth => "REFUND_BOTH",
            Self::NoAction => "NO_ACTION",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = disputes)]
pub struct Dispute {
    pub id: String,
    pub match_id: String,
    pub created_by: String,
    pub status: String,
    pub reason: String,
    pub description: String,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolution_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = disputes)]
pub struct NewDispute {
    pub id: String,
    pub match_id: String,
    pub created_by: String,
    pub status: String,
    pub reason: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewDispute {
    pub fn pending(match_id: &str, created_by: &str, reason: &str, description: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            created_by: created_by.to_string(),
            status: DisputeStatus::Pending.as_str().to_string(),
            reason: reason.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = dispute_evidence)]
pub struct DisputeEvidence {
    pub id: String,
    pub dispute_id: String,
    pub submitted_by: String,
    pub evidence_type: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dispute_evidence)]
pub struct NewDisputeEvidence {
    pub id: String,
    pub dispute_id: String,
    pub submitted_by: String,
    pub evidence_type: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub submitted_at: NaiveDateTime,
}

impl Dispute {
    pub fn create(conn: &mut SqliteConnection, new_dispute: NewDispute) -> Result<Dispute> {
        diesel::insert_into(disputes::table)
            .values(&new_dispute)
            .execute(conn)
            .context("Failed to insert dispute")?;

        disputes::table
            .filter(disputes::id.eq(new_dispute.id))
            .first(conn)
            .context("Failed to retrieve created dispute")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, dispute_id: &str) -> Result<Option<Dispute>> {
        disputes::table
            .filter(disputes::id.eq(dispute_id))
            .first(conn)
            .optional()
            .context("Failed to query dispute")
    }

    pub fn find_by_match(conn: &mut SqliteConnection, match_id: &str) -> Result<Option<Dispute>> {
        disputes::table
            .filter(disputes::match_id.eq(match_id))
            .first(conn)
            .optional()
            .context("Failed to query dispute by match")
    }

    /// PENDING -> UNDER_REVIEW; false when the dispute was not PENDING
    pub fn mark_under_review(conn: &mut SqliteConnection, dispute_id: &str) -> Result<bool> {
        let affected = diesel::update(
            disputes::table
                .filter(disputes::id.eq(dispute_id))
                .filter(disputes::status.eq(DisputeStatus::Pending.as_str())),
        )
        .set((
            disputes::status.eq(DisputeStatus::UnderReview.as_str()),
            disputes::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)
        .context("Failed to move dispute under review")?;
        Ok(affected == 1)
    }

    /// Terminal transition; guarded on the open statuses so a dispute is
    /// settled at most once
    pub fn mark_closed(
        conn: &mut SqliteConnection,
        dispute_id: &str,
        status: DisputeStatus,
        resolution: Option<DisputeResolution>,
        resolved_by: &str,
        notes: Option<&str>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().naive_utc();
        let open = [
            DisputeStatus::Pending.as_str(),
            DisputeStatus::UnderReview.as_str(),
        ];
        let affected = diesel::update(
            disputes::table
                .filter(disputes::id.eq(dispute_id))
                .filter(disputes::status.eq_any(open)),
        )
        .set((
            disputes::status.eq(status.as_str()),
            disputes::resolution.eq(resolution.map(|r| r.as_str())),
            disputes::resolved_by.eq(resolved_by),
            disputes::resolved_at.eq(now),
            disputes::resolution_notes.eq(notes),
            disputes::updated_at.eq(now),
        ))
        .execute(conn)
        .context("Failed to close dispute")?;
        Ok(affected == 1)
    }

    pub fn can_be_resolved(&self) -> bool {
        self.status == DisputeStatus::Pending.as_str()
            || self.status == DisputeStatus::UnderReview.as_str()
    }
}

impl DisputeEvidence {
    pub fn add(
        conn: &mut SqliteConnection,
        dispute_id: &str,
        submitted_by: &str,
        evidence_type: &str,
        content: Option<&str>,
        file_url: Option<&str>,
    ) -> Result<DisputeEvidence> {
        let new_evidence = NewDisputeEvidence {
            id: Uuid::new_v4().to_string(),
            dispute_id: dispute_id.to_string(),
            submitted_by: submitted_by.to_string(),
            evidence_type: evidence_type.to_string(),
            content: content.map(|s| s.to_string()),
            file_url: file_url.map(|s| s.to_string()),
            submitted_at: chrono::Utc::now().naive_utc(),
        };
        diesel::insert_into(dispute_evidence::table)
            .values(&new_evidence)
            .execute(conn)
            .context("Failed to insert dispute evidence")?;

        dispute_evidence::table
            .filter(dispute_evidence::id.eq(new_evidence.id))
            .first(conn)
            .context("Failed to retrieve created evidence")
    }

    pub fn for_dispute(
        conn: &mut SqliteConnection,
        dispute_id: &str,
    ) -> Result<Vec<DisputeEvidence>> {
        dispute_evidence::table
            .filter(dispute_evidence::dispute_id.eq(dispute_id))
            .order(dispute_evidence::submitted_at.asc())
            .load(conn)
            .context("Failed to load dispute evidence")
    }
}
