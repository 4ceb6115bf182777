use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub league: String, // football-data.org competition code: "PL", "PD", ...
    pub crest_url: Option<String>,
    pub elo_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub league: String,
    pub match_date: DateTime<Utc>,
    pub status: String, // "scheduled", "live", "finished"
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamStats {
    pub id: String,
    pub team_id: String,
    pub season: String,
    pub matches_played: i32,
    pub wins: i32,
    pub draws: i32,
    pub losses: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub form: String, // Last 5 games, most recent first: "WLWDW"
    pub updated_at: DateTime<Utc>,
}

/// Model output for one fixture: 1X2 probabilities plus the goals model's
/// over/under split for the reference total line. The three 1X2 probabilities
/// are renormalised to sum to 1 before storage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub id: String,
    pub match_id: String,
    pub home_win_probability: f64,
    pub draw_probability: f64,
    pub away_win_probability: f64,
    pub total_line: f64,
    pub over_probability: f64,
    pub under_probability: f64,
    pub btts_probability: f64,
    pub expected_home_goals: f64,
    pub expected_away_goals: f64,
    pub model_version: String,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Best available bookmaker prices for one fixture: the 1X2 market and, when
/// the book offers them, a goal-totals line and a both-teams-to-score pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketOdds {
    pub match_id: String,
    pub bookmaker: String,
    pub home_odds: f64,
    pub draw_odds: f64,
    pub away_odds: f64,
    pub total_line: Option<f64>,
    pub over_odds: Option<f64>,
    pub under_odds: Option<f64>,
    pub btts_yes_odds: Option<f64>,
    pub btts_no_odds: Option<f64>,
    pub fetched_at: String,
}

#[derive(Debug, Error)]
pub enum OddsError {
    #[error("decimal odds must be greater than 1.0, got {0}")]
    PriceOutOfRange(f64),
}

/// Reject prices that cannot represent a real decimal quote. Applied at the
/// ingestion boundary so the evaluator itself can stay total.
pub fn validate_price(odds: f64) -> Result<f64, OddsError> {
    if odds.is_finite() && odds > 1.0 {
        Ok(odds)
    } else {
        Err(OddsError::PriceOutOfRange(odds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EloHistoryPoint {
    pub team_id: String,
    pub date: DateTime<Utc>,
    pub elo_rating: f64,
    pub match_id: Option<String>,
}

// ── Value-bet analysis types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// One outcome run through the edge calculator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueAssessment {
    pub model_probability: f64,
    pub implied_probability: f64,
    pub edge: f64,
    pub expected_value: f64,
    pub is_value_bet: bool,
    pub confidence_level: ConfidenceLevel,
    pub kelly_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueBet {
    pub market: String,  // "1X2", "OVER/UNDER" or "BTTS"
    pub outcome: String, // "HOME_WIN", "DRAW", "AWAY_WIN", "OVER 2.5", "BTTS_YES", ...
    pub odds: f64,
    pub assessment: ValueAssessment,
}

/// Per-match betting advice: the single best value bet, if any qualifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    /// A HIGH-confidence value bet exists; this is the highest-edge one.
    Bet { bet: ValueBet },
    /// Only MEDIUM-confidence value bets; proceed with caution.
    Consider { bet: ValueBet },
    Pass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchValueReport {
    pub match_info: Match,
    pub prediction: Prediction,
    pub odds: MarketOdds,
    pub value_bets: Vec<ValueBet>,
    pub recommendation: Recommendation,
}

// ── API view types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingMatchWithPrediction {
    pub match_info: Match,
    pub prediction: Option<Prediction>,
    pub odds: Option<MarketOdds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamProfile {
    pub team: Team,
    pub current_stats: Option<TeamStats>,
    pub recent_matches: Vec<Match>,
    pub elo_history: Vec<EloHistoryPoint>,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_price() {
        assert!(validate_price(1.89).is_ok());
        assert!(validate_price(1.0).is_err());
        assert!(validate_price(0.0).is_err());
        assert!(validate_price(-2.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_confidence_level_ordering() {
        assert!(ConfidenceLevel::High > ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium > ConfidenceLevel::Low);
    }
}
