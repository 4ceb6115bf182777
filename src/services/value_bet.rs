//! Value-bet / edge arithmetic shared by every market we price.
//!
//! All functions here are pure: they take a model probability and a decimal
//! bookmaker price and return an assessment. Input validation happens at the
//! ingestion boundary (`models::validate_price`); the evaluator itself is
//! total and never panics, so a malformed price flows through the arithmetic
//! rather than aborting a whole match scan.

use crate::models::{
    ConfidenceLevel, MarketOdds, Match, MatchValueReport, Prediction, Recommendation,
    ValueAssessment, ValueBet,
};

/// Minimum edge for an outcome to count as a value bet.
pub const VALUE_EDGE_THRESHOLD: f64 = 0.05;

/// Edge above which a value bet is rated HIGH confidence.
pub const HIGH_EDGE_THRESHOLD: f64 = 0.10;

/// The market's break-even probability for a decimal price, ignoring vig.
/// Non-positive odds yield 0.0 rather than an error.
pub fn implied_probability(odds: f64) -> f64 {
    if odds > 0.0 {
        1.0 / odds
    } else {
        0.0
    }
}

/// Evaluate one outcome: our probability against the bookmaker's price.
///
/// The Kelly fraction is the simplified `edge / (odds - 1)`, not the textbook
/// `(b*p - q) / b` with `b = odds - 1`. The two differ by a factor of `odds`
/// (the simplified stake is the canonical one divided by the price), so this
/// always stakes less than full Kelly. Deliberate: it matches the historical
/// behaviour this tool replicates and errs conservative.
pub fn evaluate(model_prob: f64, odds: f64) -> ValueAssessment {
    let implied = implied_probability(odds);
    let edge = model_prob - implied;
    let expected_value = model_prob * odds - 1.0;

    let kelly_fraction = if odds > 1.0 {
        (edge / (odds - 1.0)).max(0.0)
    } else {
        0.0
    };

    let confidence_level = if edge > HIGH_EDGE_THRESHOLD {
        ConfidenceLevel::High
    } else if edge > VALUE_EDGE_THRESHOLD {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    ValueAssessment {
        model_probability: model_prob,
        implied_probability: implied,
        edge,
        expected_value,
        is_value_bet: edge > VALUE_EDGE_THRESHOLD,
        confidence_level,
        kelly_fraction,
    }
}

/// Evaluate every priced outcome of a match and collect the value bets.
pub fn find_value_bets(prediction: &Prediction, odds: &MarketOdds) -> Vec<ValueBet> {
    let mut bets = Vec::new();

    let one_x_two = [
        ("HOME_WIN", prediction.home_win_probability, odds.home_odds),
        ("DRAW", prediction.draw_probability, odds.draw_odds),
        ("AWAY_WIN", prediction.away_win_probability, odds.away_odds),
    ];
    for (outcome, prob, price) in one_x_two {
        let assessment = evaluate(prob, price);
        if assessment.is_value_bet {
            bets.push(ValueBet {
                market: "1X2".to_string(),
                outcome: outcome.to_string(),
                odds: price,
                assessment,
            });
        }
    }

    // Totals market only when the book quotes a line and it matches the line
    // the goals model priced.
    if let (Some(line), Some(over), Some(under)) =
        (odds.total_line, odds.over_odds, odds.under_odds)
    {
        if (line - prediction.total_line).abs() < 0.01 {
            let totals = [
                (format!("OVER {}", line), prediction.over_probability, over),
                (format!("UNDER {}", line), prediction.under_probability, under),
            ];
            for (outcome, prob, price) in totals {
                let assessment = evaluate(prob, price);
                if assessment.is_value_bet {
                    bets.push(ValueBet {
                        market: "OVER/UNDER".to_string(),
                        outcome,
                        odds: price,
                        assessment,
                    });
                }
            }
        }
    }

    if let (Some(yes), Some(no)) = (odds.btts_yes_odds, odds.btts_no_odds) {
        let btts = [
            ("BTTS_YES", prediction.btts_probability, yes),
            ("BTTS_NO", 1.0 - prediction.btts_probability, no),
        ];
        for (outcome, prob, price) in btts {
            let assessment = evaluate(prob, price);
            if assessment.is_value_bet {
                bets.push(ValueBet {
                    market: "BTTS".to_string(),
                    outcome: outcome.to_string(),
                    odds: price,
                    assessment,
                });
            }
        }
    }

    bets
}

/// Reduce a match's value bets to a single piece of advice: the highest-edge
/// HIGH-confidence bet wins; failing that the highest-edge MEDIUM one is
/// flagged for consideration; otherwise pass.
pub fn recommend(value_bets: &[ValueBet]) -> Recommendation {
    let best_at = |level: ConfidenceLevel| -> Option<&ValueBet> {
        value_bets
            .iter()
            .filter(|b| b.assessment.confidence_level == level)
            .max_by(|a, b| {
                a.assessment
                    .edge
                    .partial_cmp(&b.assessment.edge)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    };

    if let Some(bet) = best_at(ConfidenceLevel::High) {
        Recommendation::Bet { bet: bet.clone() }
    } else if let Some(bet) = best_at(ConfidenceLevel::Medium) {
        Recommendation::Consider { bet: bet.clone() }
    } else {
        Recommendation::Pass
    }
}

/// Full analysis for one fixture.
pub fn analyze_match(
    match_info: Match,
    prediction: Prediction,
    odds: MarketOdds,
) -> MatchValueReport {
    let value_bets = find_value_bets(&prediction, &odds);
    let recommendation = recommend(&value_bets);
    MatchValueReport {
        match_info,
        prediction,
        odds,
        value_bets,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_implied_probability() {
        assert_relative_eq!(implied_probability(2.0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(implied_probability(4.0), 0.25, epsilon = 1e-9);
        assert_relative_eq!(implied_probability(0.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(implied_probability(-1.5), 0.0, epsilon = 1e-9);
        // Within (0, 1) for any realistic price
        for odds in [1.01, 1.5, 2.13, 10.0, 100.0] {
            let p = implied_probability(odds);
            assert!(p > 0.0 && p < 1.0, "implied({}) = {}", odds, p);
        }
    }

    #[test]
    fn test_evaluate_medium_confidence_value_bet() {
        // model_prob=0.60, odds=1.89
        let a = evaluate(0.60, 1.89);
        assert_relative_eq!(a.implied_probability, 0.529, epsilon = 1e-3);
        assert_relative_eq!(a.edge, 0.071, epsilon = 1e-3);
        assert_relative_eq!(a.expected_value, 0.134, epsilon = 1e-3);
        assert!(a.is_value_bet);
        assert_eq!(a.confidence_level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_evaluate_negative_edge() {
        // model_prob=0.45, odds=2.13
        let a = evaluate(0.45, 2.13);
        assert_relative_eq!(a.implied_probability, 0.469, epsilon = 1e-3);
        assert_relative_eq!(a.edge, -0.019, epsilon = 1e-3);
        assert!(!a.is_value_bet);
        assert_eq!(a.confidence_level, ConfidenceLevel::Low);
        assert_relative_eq!(a.kelly_fraction, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_evaluate_high_confidence_value_bet() {
        // model_prob=0.70, odds=2.00
        let a = evaluate(0.70, 2.00);
        assert_relative_eq!(a.edge, 0.20, epsilon = 1e-9);
        assert_eq!(a.confidence_level, ConfidenceLevel::High);
        assert_relative_eq!(a.kelly_fraction, 0.20, epsilon = 1e-9);
    }

    #[test]
    fn test_evaluate_no_value() {
        // model_prob=0.30, odds=2.00
        let a = evaluate(0.30, 2.00);
        assert_relative_eq!(a.edge, -0.20, epsilon = 1e-9);
        assert!(!a.is_value_bet);
        assert_relative_eq!(a.kelly_fraction, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expected_value_sign_matches_edge_sign() {
        // EV > 0 iff model_prob > implied_probability, for odds > 1
        for (p, odds) in [(0.6, 1.89), (0.45, 2.13), (0.5, 2.0), (0.1, 5.0)] {
            let a = evaluate(p, odds);
            assert_eq!(a.expected_value > 0.0, a.edge > 0.0, "p={} odds={}", p, odds);
        }
    }

    #[test]
    fn test_kelly_fraction_never_negative() {
        for (p, odds) in [(0.0, 2.0), (0.3, 2.0), (0.9, 1.01), (0.5, 1.0), (0.5, 0.0)] {
            assert!(evaluate(p, odds).kelly_fraction >= 0.0);
        }
    }

    #[test]
    fn test_kelly_fraction_zero_at_or_below_one() {
        assert_relative_eq!(evaluate(0.9, 1.0).kelly_fraction, 0.0, epsilon = 1e-9);
        assert_relative_eq!(evaluate(0.9, 0.5).kelly_fraction, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_value_threshold_is_strict() {
        // edge at or just under the threshold is not a value bet; 0.30 at 4.0
        // lands a hair below 0.05 in floats, unlike 0.55 - 0.5 which rounds up
        let a = evaluate(0.30, 4.0);
        assert!(a.edge <= VALUE_EDGE_THRESHOLD);
        assert!(!a.is_value_bet);
        assert_eq!(a.confidence_level, ConfidenceLevel::Low);
        // the flag is exactly the strict comparison, at every input
        for (p, odds) in [(0.55, 2.0), (0.30, 4.0), (0.60, 1.89), (0.45, 2.13)] {
            let a = evaluate(p, odds);
            assert_eq!(a.is_value_bet, a.edge > VALUE_EDGE_THRESHOLD, "p={} odds={}", p, odds);
        }
    }

    fn prediction(home: f64, draw: f64, away: f64, over: f64, btts: f64) -> Prediction {
        Prediction {
            id: "p1".to_string(),
            match_id: "m1".to_string(),
            home_win_probability: home,
            draw_probability: draw,
            away_win_probability: away,
            total_line: 2.5,
            over_probability: over,
            under_probability: 1.0 - over,
            btts_probability: btts,
            expected_home_goals: 1.5,
            expected_away_goals: 1.2,
            model_version: "ensemble_test".to_string(),
            confidence_score: 0.8,
            created_at: chrono::Utc::now(),
        }
    }

    fn market_odds(home: f64, draw: f64, away: f64) -> MarketOdds {
        MarketOdds {
            match_id: "m1".to_string(),
            bookmaker: "Pinnacle".to_string(),
            home_odds: home,
            draw_odds: draw,
            away_odds: away,
            total_line: Some(2.5),
            over_odds: Some(2.0),
            under_odds: Some(1.8),
            btts_yes_odds: Some(1.9),
            btts_no_odds: Some(1.9),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_find_value_bets_scans_all_priced_markets() {
        // home 0.60 @ 2.0 (edge 0.10), over 0.60 @ 2.0 (edge 0.10),
        // BTTS yes 0.65 @ 1.9 (edge ~0.124); draw/away/under/no have none
        let p = prediction(0.60, 0.25, 0.15, 0.60, 0.65);
        let o = market_odds(2.0, 3.5, 8.0);

        let bets = find_value_bets(&p, &o);
        let outcomes: Vec<&str> = bets.iter().map(|b| b.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["HOME_WIN", "OVER 2.5", "BTTS_YES"]);

        let btts = bets.iter().find(|b| b.market == "BTTS").unwrap();
        assert_eq!(btts.assessment.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn test_find_value_bets_skips_btts_without_quotes() {
        let p = prediction(0.60, 0.25, 0.15, 0.60, 0.65);
        let mut o = market_odds(2.0, 3.5, 8.0);
        o.btts_yes_odds = None;
        o.btts_no_odds = None;

        let bets = find_value_bets(&p, &o);
        assert!(bets.iter().all(|b| b.market != "BTTS"));
    }

    fn bet(market: &str, outcome: &str, prob: f64, odds: f64) -> ValueBet {
        ValueBet {
            market: market.to_string(),
            outcome: outcome.to_string(),
            odds,
            assessment: evaluate(prob, odds),
        }
    }

    #[test]
    fn test_recommend_picks_highest_edge_high() {
        let bets = vec![
            bet("1X2", "HOME_WIN", 0.70, 2.00),    // edge 0.20, HIGH
            bet("OVER/UNDER", "OVER 2.5", 0.65, 2.00), // edge 0.15, HIGH
            bet("1X2", "DRAW", 0.40, 3.00),        // edge ~0.067, MEDIUM
        ];
        match recommend(&bets) {
            Recommendation::Bet { bet } => assert_eq!(bet.outcome, "HOME_WIN"),
            other => panic!("expected BET, got {:?}", other),
        }
    }

    #[test]
    fn test_recommend_falls_back_to_medium() {
        let bets = vec![
            bet("1X2", "AWAY_WIN", 0.40, 3.00),     // edge ~0.067, MEDIUM
            bet("OVER/UNDER", "UNDER 2.5", 0.60, 1.89), // edge ~0.071, MEDIUM
        ];
        match recommend(&bets) {
            Recommendation::Consider { bet } => assert_eq!(bet.outcome, "UNDER 2.5"),
            other => panic!("expected CONSIDER, got {:?}", other),
        }
    }

    #[test]
    fn test_recommend_passes_on_empty() {
        assert!(matches!(recommend(&[]), Recommendation::Pass));
    }
}
