use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{get_team_by_id, insert_elo_history, insert_team};
use crate::models::{Match, Team};

/// Rating bonus applied to the home side before computing expected scores.
const HOME_ADVANTAGE: f64 = 100.0;

/// Base share of football matches that end level.
const BASE_DRAW_RATE: f64 = 0.25;

pub struct EloModel {
    k_factor: f64,
}

impl Default for EloModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EloModel {
    pub fn new() -> Self {
        Self { k_factor: 32.0 }
    }

    /// Expected score of side A against side B under the logistic ELO curve.
    pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
    }

    /// New ratings for both sides after a finished match. Larger wins move
    /// ratings further via a goal-difference multiplier.
    pub fn update_ratings(
        &self,
        home_rating: f64,
        away_rating: f64,
        home_score: i32,
        away_score: i32,
    ) -> (f64, f64) {
        let expected_home = Self::expected_score(home_rating + HOME_ADVANTAGE, away_rating);
        let expected_away = 1.0 - expected_home;

        let actual_home = match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Less => 0.0,
        };
        let actual_away = 1.0 - actual_home;

        let goal_diff = (home_score - away_score).abs() as f64;
        let goal_multiplier = if goal_diff <= 1.0 {
            1.0
        } else if goal_diff == 2.0 {
            1.5
        } else {
            (11.0 + goal_diff) / 8.0
        };

        let new_home = home_rating + self.k_factor * goal_multiplier * (actual_home - expected_home);
        let new_away = away_rating + self.k_factor * goal_multiplier * (actual_away - expected_away);

        (new_home, new_away)
    }

    /// 1X2 probabilities (home, draw, away) from the two ratings. The draw
    /// share is carved out of both win probabilities at the base rate, then
    /// nudged up for evenly-matched sides.
    pub fn win_probabilities(&self, home_rating: f64, away_rating: f64) -> (f64, f64, f64) {
        let expected_home = Self::expected_score(home_rating + HOME_ADVANTAGE, away_rating);

        // Closer matchups draw more often; cap the bump at +0.05.
        let closeness = 1.0 - (expected_home - 0.5).abs() * 2.0;
        let draw = BASE_DRAW_RATE + 0.05 * closeness;

        let home = expected_home * (1.0 - draw);
        let away = (1.0 - expected_home) * (1.0 - draw);
        (home, draw, away)
    }

    /// Rating adjustment from a recent-form string such as "WLWDW"
    /// (most recent first), with diminishing weight for older results.
    pub fn form_adjustment(&self, form: &str) -> f64 {
        let mut adjustment: f64 = 0.0;
        let mut weight = 1.0;

        for result in form.chars() {
            match result {
                'W' => adjustment += 20.0 * weight,
                'D' => adjustment += 10.0 * weight,
                'L' => adjustment -= 20.0 * weight,
                _ => {}
            }
            weight *= 0.8;
        }

        adjustment.clamp(-100.0, 100.0)
    }

    /// Apply a finished match to both teams' stored ratings and append the
    /// new ratings to the history table.
    pub async fn apply_result(&self, pool: &SqlitePool, match_data: &Match) -> Result<()> {
        let (Some(home_score), Some(away_score)) = (match_data.home_score, match_data.away_score)
        else {
            return Ok(());
        };
        if match_data.status != "finished" {
            return Ok(());
        }

        let home_team = get_team_by_id(pool, &match_data.home_team_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("home team {} not found", match_data.home_team_id))?;
        let away_team = get_team_by_id(pool, &match_data.away_team_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("away team {} not found", match_data.away_team_id))?;

        let (new_home, new_away) = self.update_ratings(
            home_team.elo_rating,
            away_team.elo_rating,
            home_score,
            away_score,
        );

        tracing::debug!(
            "ELO: {} {:.1} -> {:.1}, {} {:.1} -> {:.1}",
            home_team.name,
            home_team.elo_rating,
            new_home,
            away_team.name,
            away_team.elo_rating,
            new_away
        );

        insert_team(
            pool,
            &Team {
                elo_rating: new_home,
                updated_at: Utc::now(),
                ..home_team
            },
        )
        .await?;
        insert_team(
            pool,
            &Team {
                elo_rating: new_away,
                updated_at: Utc::now(),
                ..away_team
            },
        )
        .await?;

        insert_elo_history(
            pool,
            &match_data.home_team_id,
            match_data.match_date,
            new_home,
            &match_data.id,
        )
        .await?;
        insert_elo_history(
            pool,
            &match_data.away_team_id,
            match_data.match_date,
            new_away,
            &match_data.id,
        )
        .await?;

        Ok(())
    }

    /// Starting rating for a newly ingested team.
    pub fn initial_rating(league: &str) -> f64 {
        match league {
            "CL" => 1400.0, // Champions League sides start stronger
            "PL" | "PD" | "BL1" | "SA" | "FL1" => 1300.0,
            _ => 1200.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_expected_score_symmetry() {
        assert_relative_eq!(EloModel::expected_score(1300.0, 1300.0), 0.5, epsilon = 1e-9);
        let a = EloModel::expected_score(1400.0, 1200.0);
        let b = EloModel::expected_score(1200.0, 1400.0);
        assert_relative_eq!(a + b, 1.0, epsilon = 1e-9);
        assert!(a > 0.5);
    }

    #[test]
    fn test_update_ratings_zero_sum() {
        let elo = EloModel::new();
        let (h, a) = elo.update_ratings(1300.0, 1300.0, 2, 0);
        // Winner gains, loser drops by the same amount
        assert!(h > 1300.0);
        assert!(a < 1300.0);
        assert_relative_eq!((h - 1300.0) + (a - 1300.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_update_ratings_blowout_moves_more() {
        let elo = EloModel::new();
        let (narrow, _) = elo.update_ratings(1300.0, 1300.0, 1, 0);
        let (blowout, _) = elo.update_ratings(1300.0, 1300.0, 4, 0);
        assert!(blowout > narrow);
    }

    #[test]
    fn test_draw_against_stronger_side_gains_rating() {
        let elo = EloModel::new();
        // Weak away side draws at a strong home side: away should gain
        let (_, away) = elo.update_ratings(1500.0, 1200.0, 1, 1);
        assert!(away > 1200.0);
    }

    #[test]
    fn test_win_probabilities_sum_to_one() {
        let elo = EloModel::new();
        for (h, a) in [(1300.0, 1300.0), (1500.0, 1200.0), (1100.0, 1450.0)] {
            let (home, draw, away) = elo.win_probabilities(h, a);
            assert_relative_eq!(home + draw + away, 1.0, epsilon = 1e-9);
            assert!(home > 0.0 && draw > 0.0 && away > 0.0);
        }
    }

    #[test]
    fn test_home_advantage_shows_in_probabilities() {
        let elo = EloModel::new();
        let (home, _, away) = elo.win_probabilities(1300.0, 1300.0);
        assert!(home > away);
    }

    #[test]
    fn test_form_adjustment() {
        let elo = EloModel::new();
        assert!(elo.form_adjustment("WWWWW") > 0.0);
        assert!(elo.form_adjustment("LLLLL") < 0.0);
        assert_relative_eq!(elo.form_adjustment(""), 0.0, epsilon = 1e-9);
        // Recent results weigh more: a recent win beats an old one
        assert!(elo.form_adjustment("WLLLL") > elo.form_adjustment("LLLLW"));
    }
}
