use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{
    get_finished_matches_ordered, get_head_to_head_matches, get_market_odds,
    get_prediction_for_match, get_team_by_id, get_team_current_stats, get_team_recent_matches,
    get_upcoming_matches, insert_prediction, reset_elo_ratings, upsert_team_stats,
};
use crate::models::{Match, MatchValueReport, Prediction, Team, TeamStats};
use crate::services::goals::{self, DEFAULT_TOTAL_LINE};
use crate::services::value_bet;
use crate::services::EloModel;
use crate::utils::{normalize_probabilities, results_to_form, season_label};

const MODEL_VERSION: &str = "ensemble_v2.0";

/// League-average 1X2 split (home, draw, away), used when a model has no data.
const LEAGUE_AVERAGE: (f64, f64, f64) = (0.46, 0.27, 0.27);

pub struct PredictionEngine {
    elo: EloModel,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self { elo: EloModel::new() }
    }

    /// Generate and store predictions for every scheduled match in the list.
    pub async fn generate_predictions(&self, pool: &SqlitePool, matches: &[Match]) -> Result<()> {
        for match_data in matches {
            if match_data.status != "scheduled" {
                continue;
            }

            let prediction = self.predict_match(pool, match_data).await?;
            insert_prediction(pool, &prediction).await?;

            tracing::info!(
                "Prediction {} vs {}: H {:.1}% / D {:.1}% / A {:.1}%, O{} {:.1}%",
                match_data.home_team_name,
                match_data.away_team_name,
                prediction.home_win_probability * 100.0,
                prediction.draw_probability * 100.0,
                prediction.away_win_probability * 100.0,
                prediction.total_line,
                prediction.over_probability * 100.0,
            );
        }

        Ok(())
    }

    /// Predict one fixture with an ensemble of ELO, head-to-head and
    /// recent-form models, plus the Poisson goals model for totals and
    /// both-teams-to-score.
    pub async fn predict_match(&self, pool: &SqlitePool, match_data: &Match) -> Result<Prediction> {
        let home_team = get_team_by_id(pool, &match_data.home_team_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("home team {} not found", match_data.home_team_id))?;
        let away_team = get_team_by_id(pool, &match_data.away_team_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("away team {} not found", match_data.away_team_id))?;

        let home_stats = get_team_current_stats(pool, &home_team.id).await?;
        let away_stats = get_team_current_stats(pool, &away_team.id).await?;

        let elo_probs = self
            .elo
            .win_probabilities(home_team.elo_rating, away_team.elo_rating);
        let h2h_probs = self.head_to_head_probs(pool, &home_team, &away_team).await?;
        let form_probs = self.form_probs(&home_team, &away_team, home_stats.as_ref(), away_stats.as_ref());

        // Ensemble: weighted average of models
        let elo_weight = 0.5;
        let h2h_weight = 0.3;
        let form_weight = 0.2;

        let blended = [
            elo_probs.0 * elo_weight + h2h_probs.0 * h2h_weight + form_probs.0 * form_weight,
            elo_probs.1 * elo_weight + h2h_probs.1 * h2h_weight + form_probs.1 * form_weight,
            elo_probs.2 * elo_weight + h2h_probs.2 * h2h_weight + form_probs.2 * form_weight,
        ];
        let [home_prob, draw_prob, away_prob] = normalize_probabilities(blended);

        let confidence = Self::agreement_confidence(&[elo_probs.0, h2h_probs.0, form_probs.0]);

        // Goals model: price the bookmaker's line when one is stored,
        // otherwise the 2.5 reference line.
        let (lambda_home, lambda_away) =
            goals::expected_goals(home_stats.as_ref(), away_stats.as_ref());
        let total_line = get_market_odds(pool, &match_data.id)
            .await?
            .and_then(|o| o.total_line)
            .unwrap_or(DEFAULT_TOTAL_LINE);
        let over_probability = goals::over_probability(lambda_home, lambda_away, total_line);
        let btts_probability = goals::btts_probability(lambda_home, lambda_away);

        Ok(Prediction {
            id: Uuid::new_v4().to_string(),
            match_id: match_data.id.clone(),
            home_win_probability: home_prob,
            draw_probability: draw_prob,
            away_win_probability: away_prob,
            total_line,
            over_probability,
            under_probability: 1.0 - over_probability,
            btts_probability,
            expected_home_goals: lambda_home,
            expected_away_goals: lambda_away,
            model_version: MODEL_VERSION.to_string(),
            confidence_score: confidence,
            created_at: Utc::now(),
        })
    }

    /// Head-to-head record between the two sides, regressed toward the league
    /// average to avoid overconfidence on small samples.
    async fn head_to_head_probs(
        &self,
        pool: &SqlitePool,
        home_team: &Team,
        away_team: &Team,
    ) -> Result<(f64, f64, f64)> {
        let h2h = get_head_to_head_matches(pool, &home_team.id, &away_team.id).await?;

        let mut home_wins = 0;
        let mut away_wins = 0;
        let mut draws = 0;
        let mut total = 0;

        for m in &h2h {
            let (Some(home_score), Some(away_score)) = (m.home_score, m.away_score) else {
                continue;
            };
            total += 1;
            match home_score.cmp(&away_score) {
                std::cmp::Ordering::Greater => {
                    if m.home_team_id == home_team.id {
                        home_wins += 1;
                    } else {
                        away_wins += 1;
                    }
                }
                std::cmp::Ordering::Less => {
                    if m.away_team_id == away_team.id {
                        away_wins += 1;
                    } else {
                        home_wins += 1;
                    }
                }
                std::cmp::Ordering::Equal => draws += 1,
            }
        }

        if total == 0 {
            return Ok(LEAGUE_AVERAGE);
        }

        let total_f = total as f64;
        let raw = (
            home_wins as f64 / total_f,
            draws as f64 / total_f,
            away_wins as f64 / total_f,
        );

        let regression = 0.3;
        Ok((
            raw.0 * (1.0 - regression) + LEAGUE_AVERAGE.0 * regression,
            raw.1 * (1.0 - regression) + LEAGUE_AVERAGE.1 * regression,
            raw.2 * (1.0 - regression) + LEAGUE_AVERAGE.2 * regression,
        ))
    }

    /// Recent-form model: each side's rating adjusted by its form string,
    /// run through the ELO curve.
    fn form_probs(
        &self,
        home_team: &Team,
        away_team: &Team,
        home_stats: Option<&TeamStats>,
        away_stats: Option<&TeamStats>,
    ) -> (f64, f64, f64) {
        let adjusted = |team: &Team, stats: Option<&TeamStats>| -> f64 {
            team.elo_rating
                + stats
                    .map(|s| self.elo.form_adjustment(&s.form))
                    .unwrap_or(0.0)
        };

        self.elo.win_probabilities(
            adjusted(home_team, home_stats),
            adjusted(away_team, away_stats),
        )
    }

    /// Confidence from model agreement: low spread across the models' home-win
    /// probabilities means high confidence. Maps std dev 0.0..0.2 to 1.0..0.5.
    fn agreement_confidence(home_probs: &[f64]) -> f64 {
        let mean = home_probs.iter().sum::<f64>() / home_probs.len() as f64;
        let variance = home_probs.iter().map(|&p| (p - mean).powi(2)).sum::<f64>()
            / home_probs.len() as f64;
        let std_dev = variance.sqrt();

        (1.0 - (std_dev / 0.2).min(0.5)).max(0.5)
    }

    /// Evaluate every upcoming match that has both a stored prediction and
    /// real stored market odds; matches without odds are skipped, never
    /// priced against simulated markets. Sorted best edge first.
    pub async fn value_reports(&self, pool: &SqlitePool) -> Result<Vec<MatchValueReport>> {
        let upcoming = get_upcoming_matches(pool, None, 50).await?;
        let mut reports = Vec::new();

        for match_data in upcoming {
            let Some(prediction) = get_prediction_for_match(pool, &match_data.id).await? else {
                continue;
            };
            let Some(odds) = get_market_odds(pool, &match_data.id).await? else {
                tracing::debug!(
                    "No market odds for {} vs {} — skipping",
                    match_data.home_team_name,
                    match_data.away_team_name
                );
                continue;
            };

            reports.push(value_bet::analyze_match(match_data, prediction, odds));
        }

        reports.sort_by(|a, b| {
            let best = |r: &MatchValueReport| {
                r.value_bets
                    .iter()
                    .map(|v| v.assessment.edge)
                    .fold(f64::NEG_INFINITY, f64::max)
            };
            best(b).partial_cmp(&best(a)).unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(reports)
    }

    /// Recompute season aggregates and form strings for every team from the
    /// finished matches on record.
    pub async fn recompute_team_stats(&self, pool: &SqlitePool) -> Result<usize> {
        let finished = get_finished_matches_ordered(pool).await?;
        let mut team_ids: Vec<String> = Vec::new();
        for m in &finished {
            for id in [&m.home_team_id, &m.away_team_id] {
                if !team_ids.contains(id) {
                    team_ids.push(id.clone());
                }
            }
        }

        let mut updated = 0usize;
        for team_id in team_ids {
            let recent = get_team_recent_matches(pool, &team_id, 1000).await?;
            if recent.is_empty() {
                continue;
            }

            // Current season only; recent[0] is the latest finished match.
            let season = season_label(recent[0].match_date);
            let mut stats = TeamStats {
                id: Uuid::new_v4().to_string(),
                team_id: team_id.clone(),
                season: season.clone(),
                matches_played: 0,
                wins: 0,
                draws: 0,
                losses: 0,
                goals_for: 0,
                goals_against: 0,
                form: String::new(),
                updated_at: Utc::now(),
            };
            let mut results = Vec::new();

            for m in recent.iter().filter(|m| season_label(m.match_date) == season) {
                let (Some(home_score), Some(away_score)) = (m.home_score, m.away_score) else {
                    continue;
                };
                let is_home = m.home_team_id == team_id;
                let (scored, conceded) = if is_home {
                    (home_score, away_score)
                } else {
                    (away_score, home_score)
                };

                stats.matches_played += 1;
                stats.goals_for += scored;
                stats.goals_against += conceded;

                let result = match scored.cmp(&conceded) {
                    std::cmp::Ordering::Greater => {
                        stats.wins += 1;
                        'W'
                    }
                    std::cmp::Ordering::Equal => {
                        stats.draws += 1;
                        'D'
                    }
                    std::cmp::Ordering::Less => {
                        stats.losses += 1;
                        'L'
                    }
                };
                results.push((result, m.match_date));
            }

            stats.form = results_to_form(&results);
            upsert_team_stats(pool, &stats).await?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Reset ratings to league baselines and replay every finished match in
    /// chronological order, then recompute season stats.
    pub async fn rebuild(&self, pool: &SqlitePool) -> Result<usize> {
        reset_elo_ratings(pool).await?;

        let finished = get_finished_matches_ordered(pool).await?;
        for match_data in &finished {
            self.elo.apply_result(pool, match_data).await?;
        }

        let teams = self.recompute_team_stats(pool).await?;
        tracing::info!(
            "Replayed {} finished matches, refreshed stats for {} teams",
            finished.len(),
            teams
        );
        Ok(finished.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_agreement_confidence_bounds() {
        // Perfect agreement
        assert_relative_eq!(
            PredictionEngine::agreement_confidence(&[0.5, 0.5, 0.5]),
            1.0,
            epsilon = 1e-9
        );
        // Wild disagreement caps out at 0.5
        let low = PredictionEngine::agreement_confidence(&[0.1, 0.5, 0.9]);
        assert_relative_eq!(low, 0.5, epsilon = 1e-9);
        // In between
        let mid = PredictionEngine::agreement_confidence(&[0.45, 0.50, 0.55]);
        assert!(mid > 0.5 && mid < 1.0);
    }
}
