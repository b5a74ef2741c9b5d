//! Ranking model: per-user rating and match statistics

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::rankings;

/// Every player starts here
pub const STARTING_RATING: i32 = 1500;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = rankings)]
pub struct Ranking {
    pub id: String,
    pub user_id: String,
    pub rating: i32,
    pub peak_rating: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub win_streak: i32,
    pub best_win_streak: i32,
    pub total_matches: i32,
    pub total_earnings_cents: i64,
    pub last_match_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rankings)]
pub struct NewRanking {
    pub id: String,
    pub user_id: String,
    pub rating: i32,
    pub peak_rating: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Ranking {
    pub fn get_or_create(conn: &mut SqliteConnection, user_id: &str) -> Result<Ranking> {
        if let Some(ranking) = Self::find_by_user(conn, user_id)? {
            return Ok(ranking);
        }

        let now = chrono::Utc::now().naive_utc();
        let new_ranking = NewRanking {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            rating: STARTING_RATING,
            peak_rating: STARTING_RATING,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(rankings::table)
            .values(&new_ranking)
            .execute(conn)
            .context("Failed to insert ranking")?;

        rankings::table
            .filter(rankings::id.eq(new_ranking.id))
            .first(conn)
            .context("Failed to retrieve created ranking")
    }

    pub fn find_by_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<Ranking>> {
        rankings::table
            .filter(rankings::user_id.eq(user_id))
            .first(conn)
            .optional()
            .context("Failed to query ranking")
    }

    /// Apply one completed match to this player's row
    pub fn apply_outcome(
        &self,
        conn: &mut SqliteConnection,
        won: bool,
        new_rating: i32,
        earnings_delta_cents: i64,
    ) -> Result<Ranking> {
        let now = chrono::Utc::now().naive_utc();
        let (wins, losses) = if won {
            (self.wins + 1, self.losses)
        } else {
            (self.wins, self.losses + 1)
        };
        let win_streak = if won { self.win_streak + 1 } else { 0 };
        let best_win_streak = self.best_win_streak.max(win_streak);
        let peak_rating = self.peak_rating.max(new_rating);

        diesel::update(rankings::table.filter(rankings::id.eq(&self.id)))
            .set((
                rankings::rating.eq(new_rating),
                rankings::peak_rating.eq(peak_rating),
                rankings::wins.eq(wins),
                rankings::losses.eq(losses),
                rankings::win_streak.eq(win_streak),
                rankings::best_win_streak.eq(best_win_streak),
                rankings::total_matches.eq(self.total_matches + 1),
                rankings::total_earnings_cents.eq(self.total_earnings_cents + earnings_delta_cents),
                rankings::last_match_at.eq(now),
                rankings::updated_at.eq(now),
            ))
            .execute(conn)
            .context("Failed to update ranking")?;

        rankings::table
            .filter(rankings::id.eq(&self.id))
            .first(conn)
            .context("Failed to retrieve updated ranking")
    }

    pub fn leaderboard(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Ranking>> {
        rankings::table
            .order(rankings::rating.desc())
            .limit(limit)
            .load(conn)
            .context("Failed to load leaderboard")
    }

    pub fn win_rate(&self) -> f64 {
        let total = self.wins + self.losses + self.draws;
        if total == 0 {
            return 0.0;
        }
        self.wins as f64 / total as f64 * 100.0
    }
}
