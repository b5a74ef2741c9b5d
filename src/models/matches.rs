//! Match, participant and game-result models

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{match_participants, match_results, matches};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Created,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Disputed => "DISPUTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    QuickDuel,
    Ranked,
    DirectChallenge,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickDuel => "QUICK_DUEL",
            Self::Ranked => "RANKED",
            Self::DirectChallenge => "DIRECT_CHALLENGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUICK_DUEL" => Some(Self::QuickDuel),
            "RANKED" => Some(Self::Ranked),
            "DIRECT_CHALLENGE" => Some(Self::DirectChallenge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: String,
    pub match_type: String,
    pub status: String,
    pub stake_cents: i64,
    pub total_pot_cents: i64,
    pub platform_fee_cents: i64,
    pub game_type: Option<String>,
    pub best_of: i32,
    pub created_by: String,
    pub accepted_by: Option<String>,
    pub winner_id: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatch {
    pub id: String,
    pub match_type: String,
    pub status: String,
    pub stake_cents: i64,
    pub total_pot_cents: i64,
    pub platform_fee_cents: i64,
    pub game_type: Option<String>,
    pub best_of: i32,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = match_participants)]
pub struct MatchParticipant {
    pub id: String,
    pub match_id: String,
    pub user_id: String,
    pub team_number: i32,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = match_participants)]
pub struct NewMatchParticipant {
    pub id: String,
    pub match_id: String,
    pub user_id: String,
    pub team_number: i32,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = match_results)]
pub struct MatchResult {
    pub id: String,
    pub match_id: String,
    pub game_number: i32,
    pub winner_id: String,
    pub reported_by: String,
    pub reported_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = match_results)]
pub struct NewMatchResult {
    pub id: String,
    pub match_id: String,
    pub game_number: i32,
    pub winner_id: String,
    pub reported_by: String,
    pub reported_at: NaiveDateTime,
}

impl Match {
    pub fn create(conn: &mut SqliteConnection, new_match: NewMatch) -> Result<Match> {
        diesel::insert_into(matches::table)
            .values(&new_match)
            .execute(conn)
            .context("Failed to insert match")?;

        matches::table
            .filter(matches::id.eq(new_match.id))
            .first(conn)
            .context("Failed to retrieve created match")
    }

    pub fn find_by_id(conn: &mut SqliteConnection, match_id: &str) -> Result<Option<Match>> {
        matches::table
            .filter(matches::id.eq(match_id))
            .first(conn)
            .optional()
            .context("Failed to query match")
    }

    pub fn list_by_status(
        conn: &mut SqliteConnection,
        status: MatchStatus,
        limit: i64,
    ) -> Result<Vec<Match>> {
        matches::table
            .filter(matches::status.eq(status.as_str()))
            .order(matches::created_at.desc())
            .limit(limit)
            .load(conn)
            .context("Failed to list matches by status")
    }

    /// Status-guarded transition; false when the row was not in `from`
    pub fn transition(
        conn: &mut SqliteConnection,
        match_id: &str,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> Result<bool> {
        let from_strs: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let affected = diesel::update(
            matches::table
                .filter(matches::id.eq(match_id))
                .filter(matches::status.eq_any(from_strs)),
        )
        .set((
            matches::status.eq(to.as_str()),
            matches::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)
        .context("Failed to transition match status")?;
        Ok(affected == 1)
    }

    pub fn set_accepted(conn: &mut SqliteConnection, match_id: &str, accepted_by: &str) -> Result<()> {
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::status.eq(MatchStatus::Accepted.as_str()),
                matches::accepted_by.eq(accepted_by),
                matches::updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .execute(conn)
            .context("Failed to mark match accepted")?;
        Ok(())
    }

    pub fn set_started(conn: &mut SqliteConnection, match_id: &str) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::status.eq(MatchStatus::InProgress.as_str()),
                matches::started_at.eq(now),
                matches::updated_at.eq(now),
            ))
            .execute(conn)
            .context("Failed to mark match started")?;
        Ok(())
    }

    pub fn set_completed(conn: &mut SqliteConnection, match_id: &str, winner_id: &str) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::status.eq(MatchStatus::Completed.as_str()),
                matches::winner_id.eq(winner_id),
                matches::completed_at.eq(now),
                matches::updated_at.eq(now),
            ))
            .execute(conn)
            .context("Failed to mark match completed")?;
        Ok(())
    }

    pub fn set_cancelled(
        conn: &mut SqliteConnection,
        match_id: &str,
        cancelled_by: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::status.eq(MatchStatus::Cancelled.as_str()),
                matches::cancelled_at.eq(now),
                matches::cancelled_by.eq(cancelled_by),
                matches::cancellation_reason.eq(reason),
                matches::updated_at.eq(now),
            ))
            .execute(conn)
            .context("Failed to mark match cancelled")?;
        Ok(())
    }

    pub fn status_is(&self, status: MatchStatus) -> bool {
        self.status == status.as_str()
    }

    pub fn can_be_accepted(&self) -> bool {
        self.status_is(MatchStatus::Created)
    }

    pub fn can_be_started(&self) -> bool {
        self.status_is(MatchStatus::Accepted)
    }

    pub fn can_be_completed(&self) -> bool {
        self.status_is(MatchStatus::InProgress)
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status_is(MatchStatus::Created) || self.status_is(MatchStatus::Accepted)
    }

    pub fn can_be_disputed(&self) -> bool {
        self.status_is(MatchStatus::InProgress) || self.status_is(MatchStatus::Completed)
    }
}

impl MatchParticipant {
    /// Idempotent insert; UNIQUE(match_id, user_id) swallows the replay
    pub fn add(
        conn: &mut SqliteConnection,
        match_id: &str,
        user_id: &str,
        team_number: i32,
    ) -> Result<()> {
        let new_participant = NewMatchParticipant {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            user_id: user_id.to_string(),
            team_number,
            joined_at: chrono::Utc::now().naive_utc(),
        };
        diesel::insert_into(match_participants::table)
            .values(&new_participant)
            .on_conflict_do_nothing()
            .execute(conn)
            .context("Failed to insert match participant")?;
        Ok(())
    }

    pub fn for_match(conn: &mut SqliteConnection, match_id: &str) -> Result<Vec<MatchParticipant>> {
        match_participants::table
            .filter(match_participants::match_id.eq(match_id))
            .order(match_participants::team_number.asc())
            .load(conn)
            .context("Failed to load match participants")
    }
}

impl MatchResult {
    /// Idempotent insert keyed on (match_id, game_number)
    pub fn record(
        conn: &mut SqliteConnection,
        match_id: &str,
        game_number: i32,
        winner_id: &str,
        reported_by: &str,
    ) -> Result<()> {
        let new_result = NewMatchResult {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            game_number,
            winner_id: winner_id.to_string(),
            reported_by: reported_by.to_string(),
            reported_at: chrono::Utc::now().naive_utc(),
        };
        diesel::insert_into(match_results::table)
            .values(&new_result)
            .on_conflict_do_nothing()
            .execute(conn)
            .context("Failed to insert match result")?;
        Ok(())
    }

    pub fn for_match(conn: &mut SqliteConnection, match_id: &str) -> Result<Vec<MatchResult>> {
        match_results::table
            .filter(match_results::match_id.eq(match_id))
            .order(match_results::game_number.asc())
            .load(conn)
            .context("Failed to load match results")
    }
}
