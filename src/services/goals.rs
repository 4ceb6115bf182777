//! Goal-totals model: expected goals per side from team scoring rates, then a
//! Poisson split of the over/under probabilities for a bookmaker line.

use statrs::distribution::{DiscreteCDF, Poisson};

use crate::models::TeamStats;

/// League-wide scoring baselines, used when a team has no stored stats yet.
const LEAGUE_AVG_HOME_GOALS: f64 = 1.5;
const LEAGUE_AVG_AWAY_GOALS: f64 = 1.2;

/// Home sides score a little above their blended rate, away sides below it.
const HOME_BOOST: f64 = 1.10;
const AWAY_DAMP: f64 = 0.90;

/// The reference line priced when the book has not quoted one.
pub const DEFAULT_TOTAL_LINE: f64 = 2.5;

/// Expected goals (home, away) for a fixture. Each side's rate blends its own
/// attack with the opponent's defence, both per match played.
pub fn expected_goals(home: Option<&TeamStats>, away: Option<&TeamStats>) -> (f64, f64) {
    let rates = |s: &TeamStats| -> Option<(f64, f64)> {
        if s.matches_played > 0 {
            let played = s.matches_played as f64;
            Some((s.goals_for as f64 / played, s.goals_against as f64 / played))
        } else {
            None
        }
    };

    let home_rates = home.and_then(rates);
    let away_rates = away.and_then(rates);

    match (home_rates, away_rates) {
        (Some((h_attack, h_defence)), Some((a_attack, a_defence))) => {
            let lambda_home = (h_attack + a_defence) / 2.0 * HOME_BOOST;
            let lambda_away = (a_attack + h_defence) / 2.0 * AWAY_DAMP;
            (clamp_lambda(lambda_home), clamp_lambda(lambda_away))
        }
        _ => (LEAGUE_AVG_HOME_GOALS, LEAGUE_AVG_AWAY_GOALS),
    }
}

fn clamp_lambda(lambda: f64) -> f64 {
    lambda.clamp(0.1, 5.0)
}

/// P(total goals > line) when home and away goals are independent Poissons,
/// so the total is Poisson(lambda_home + lambda_away).
///
/// For half lines (2.5, 3.5, ...) over and under partition the outcome space.
/// For whole-goal lines the push lands on the under side, which is the
/// conservative reading for an over bet.
pub fn over_probability(lambda_home: f64, lambda_away: f64, line: f64) -> f64 {
    let total = clamp_lambda(lambda_home) + clamp_lambda(lambda_away);
    // lambda is clamped positive, so the constructor cannot fail
    let dist = match Poisson::new(total) {
        Ok(d) => d,
        Err(_) => return 0.5,
    };
    1.0 - dist.cdf(line.floor().max(0.0) as u64)
}

/// P(both teams score) under independent Poisson goals: the product of each
/// side scoring at least once.
pub fn btts_probability(lambda_home: f64, lambda_away: f64) -> f64 {
    let p_home_scores = 1.0 - (-clamp_lambda(lambda_home)).exp();
    let p_away_scores = 1.0 - (-clamp_lambda(lambda_away)).exp();
    p_home_scores * p_away_scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_over_probability_reference_value() {
        // lambda_total = 2.7: P(N <= 2) = e^-2.7 * (1 + 2.7 + 2.7^2/2) ≈ 0.4936
        let over = over_probability(1.5, 1.2, 2.5);
        assert_relative_eq!(over, 0.5064, epsilon = 1e-3);
    }

    #[test]
    fn test_over_probability_monotonic_in_lambda() {
        let low = over_probability(1.0, 0.8, 2.5);
        let high = over_probability(2.0, 1.6, 2.5);
        assert!(high > low);
    }

    #[test]
    fn test_over_probability_decreasing_in_line() {
        let at_15 = over_probability(1.5, 1.2, 1.5);
        let at_25 = over_probability(1.5, 1.2, 2.5);
        let at_35 = over_probability(1.5, 1.2, 3.5);
        assert!(at_15 > at_25 && at_25 > at_35);
    }

    #[test]
    fn test_over_probability_in_unit_interval() {
        for line in [0.5, 1.5, 2.5, 3.5, 4.5] {
            let p = over_probability(1.5, 1.2, line);
            assert!(p > 0.0 && p < 1.0, "line {}: {}", line, p);
        }
    }

    #[test]
    fn test_btts_probability_reference_value() {
        // (1 - e^-1.5)(1 - e^-1.2) ≈ 0.5429
        assert_relative_eq!(btts_probability(1.5, 1.2), 0.5429, epsilon = 1e-3);
    }

    #[test]
    fn test_btts_probability_monotonic_and_bounded() {
        assert!(btts_probability(2.0, 1.6) > btts_probability(1.0, 0.8));
        for (lh, la) in [(0.1, 0.1), (1.5, 1.2), (5.0, 5.0)] {
            let p = btts_probability(lh, la);
            assert!(p > 0.0 && p < 1.0, "btts({}, {}) = {}", lh, la, p);
        }
    }

    fn stats(matches: i32, goals_for: i32, goals_against: i32) -> TeamStats {
        TeamStats {
            id: "s".to_string(),
            team_id: "t".to_string(),
            season: "2025-26".to_string(),
            matches_played: matches,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for,
            goals_against,
            form: String::new(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_expected_goals_blends_attack_and_defence() {
        let home = stats(10, 20, 10); // scores 2.0, concedes 1.0
        let away = stats(10, 10, 20); // scores 1.0, concedes 2.0
        let (lh, la) = expected_goals(Some(&home), Some(&away));
        // home: (2.0 + 2.0)/2 * 1.1 = 2.2; away: (1.0 + 1.0)/2 * 0.9 = 0.9
        assert_relative_eq!(lh, 2.2, epsilon = 1e-9);
        assert_relative_eq!(la, 0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_expected_goals_falls_back_to_league_average() {
        let (lh, la) = expected_goals(None, None);
        assert_relative_eq!(lh, LEAGUE_AVG_HOME_GOALS, epsilon = 1e-9);
        assert_relative_eq!(la, LEAGUE_AVG_AWAY_GOALS, epsilon = 1e-9);

        // Zero matches played counts as no data
        let empty = stats(0, 0, 0);
        let (lh, _) = expected_goals(Some(&empty), Some(&empty));
        assert_relative_eq!(lh, LEAGUE_AVG_HOME_GOALS, epsilon = 1e-9);
    }
}
