//! ELO rating calculation and ranking updates

use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::db::{with_conn, DbPool};
use crate::error::CoreResult;
use crate::models::ranking::Ranking;

/// Standard ELO update for a decided 1v1 game.
///
/// Expected score `E1 = 1 / (1 + 10^((R2-R1)/400))`, actual score 1/0,
/// `R' = R + k * (actual - expected)`, rounded to the nearest integer.
pub fn elo_update(rating1: i32, rating2: i32, player1_won: bool, k: i32) -> (i32, i32) {
    let expected1 = 1.0 / (1.0 + 10f64.powf((rating2 - rating1) as f64 / 400.0));
    let expected2 = 1.0 - expected1;

    let actual1 = if player1_won { 1.0 } else { 0.0 };
    let actual2 = 1.0 - actual1;

    let new_rating1 = rating1 as f64 + k as f64 * (actual1 - expected1);
    let new_rating2 = rating2 as f64 + k as f64 * (actual2 - expected2);

    (
        new_rating1.round() as i32,
        new_rating2.round() as i32,
    )
}

/// Apply one completed match to both players' rows on the given connection.
/// The winner's cumulative earnings grow by the released pot.
pub(crate) fn apply_match_on(
    conn: &mut SqliteConnection,
    player1_id: &str,
    player2_id: &str,
    winner_id: &str,
    k_factor: i32,
    winner_payout_cents: i64,
) -> CoreResult<(Ranking, Ranking)> {
    let ranking1 = Ranking::get_or_create(conn, player1_id)?;
    let ranking2 = Ranking::get_or_create(conn, player2_id)?;

    let player1_won = winner_id == player1_id;
    let (new_rating1, new_rating2) =
        elo_update(ranking1.rating, ranking2.rating, player1_won, k_factor);

    let updated1 = ranking1.apply_outcome(
        conn,
        player1_won,
        new_rating1,
        if player1_won { winner_payout_cents } else { 0 },
    )?;
    let updated2 = ranking2.apply_outcome(
        conn,
        !player1_won,
        new_rating2,
        if player1_won { 0 } else { winner_payout_cents },
    )?;

    info!(
        player1_id = %player1_id,
        player2_id = %player2_id,
        rating1 = new_rating1,
        rating2 = new_rating2,
        "Rankings updated after match"
    );
    Ok((updated1, updated2))
}

/// Read surface over the rankings table
#[derive(Clone)]
pub struct RankingService {
    pool: DbPool,
    config: CoreConfig,
}

impl RankingService {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self { pool, config }
    }

    pub fn k_factor(&self) -> i32 {
        self.config.elo_k_factor
    }

    pub async fn ranking_for(&self, user_id: Uuid) -> CoreResult<Ranking> {
        let user = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(Ranking::get_or_create(conn, &user)?)
        })
        .await
    }

    pub async fn leaderboard(&self, limit: i64) -> CoreResult<Vec<Ranking>> {
        let limit = limit.clamp(1, 100);
        with_conn(&self.pool, move |conn| Ok(Ranking::leaderboard(conn, limit)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_shift_sixteen_points() {
        let (r1, r2) = elo_update(1500, 1500, true, 32);
        assert_eq!(r1, 1516);
        assert_eq!(r2, 1484);
    }

    #[test]
    fn upset_moves_more_points_than_expected_win() {
        // Underdog beats a much higher-rated player
        let (underdog, favorite) = elo_update(1400, 1600, true, 32);
        assert!(underdog - 1400 > 16);
        assert!(1600 - favorite > 16);

        // Favorite winning barely moves either rating
        let (favorite2, underdog2) = elo_update(1600, 1400, true, 32);
        assert!(favorite2 - 1600 < 16);
        assert!(1400 - underdog2 < 16);
    }

    #[test]
    fn update_is_symmetric() {
        let (a, b) = elo_update(1450, 1550, false, 32);
        let (b2, a2) = elo_update(1550, 1450, true, 32);
        assert_eq!(a, a2);
        assert_eq!(b, b2);
    }

    #[test]
    fn rating_changes_sum_to_zero_for_equal_k() {
        for (r1, r2) in [(1500, 1500), (1432, 1587), (1200, 1900)] {
            let (n1, n2) = elo_update(r1, r2, true, 32);
            // Rounding may leave at most one point of drift
            assert!(((n1 - r1) + (n2 - r2)).abs() <= 1);
        }
    }
}
