use chrono::{DateTime, Datelike, Utc};

/// Convert a probability to a fair decimal price (no margin).
pub fn probability_to_odds(probability: f64) -> f64 {
    if probability <= 0.0 || probability >= 1.0 {
        return 1000.0; // Very high odds for impossible/certain events
    }
    1.0 / probability
}

/// Normalize a 1X2 probability triple to sum to 1.0
pub fn normalize_probabilities(probs: [f64; 3]) -> [f64; 3] {
    let sum: f64 = probs.iter().sum();
    if sum == 0.0 {
        return probs;
    }
    [probs[0] / sum, probs[1] / sum, probs[2] / sum]
}

/// Convert a win/loss/draw record to a form string (e.g., "WLWDW"),
/// most recent result first, capped at five games.
pub fn results_to_form(results: &[(char, DateTime<Utc>)]) -> String {
    let mut sorted_results = results.to_vec();
    sorted_results.sort_by(|a, b| b.1.cmp(&a.1));

    sorted_results.iter().take(5).map(|(r, _)| r).collect()
}

/// Season label for a match date, European style. Seasons roll over in July,
/// so early-July fixtures already count toward the new season.
/// 2025-08-16 -> "2025-26", 2026-02-01 -> "2025-26", 2026-07-10 -> "2026-27".
pub fn season_label(date: DateTime<Utc>) -> String {
    let start_year = if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{:02}", start_year, (start_year + 1) % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_probability_to_odds() {
        assert_eq!(probability_to_odds(0.5), 2.0);
        assert_eq!(probability_to_odds(0.25), 4.0);
        assert!(probability_to_odds(0.0) > 100.0);
        assert!(probability_to_odds(1.0) > 100.0);
    }

    #[test]
    fn test_normalize_probabilities() {
        let normalized = normalize_probabilities([0.4, 0.3, 0.2]);
        let sum: f64 = normalized.iter().sum();
        assert!((sum - 1.0).abs() < 0.001);
        // Relative ordering preserved
        assert!(normalized[0] > normalized[1] && normalized[1] > normalized[2]);
    }

    #[test]
    fn test_results_to_form_orders_most_recent_first() {
        let d = |day| Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap();
        let results = vec![('L', d(1)), ('W', d(20)), ('D', d(10))];
        assert_eq!(results_to_form(&results), "WDL");
    }

    #[test]
    fn test_results_to_form_caps_at_five() {
        let d = |day| Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap();
        let results: Vec<_> = (1..=8).map(|i| ('W', d(i))).collect();
        assert_eq!(results_to_form(&results), "WWWWW");
    }

    #[test]
    fn test_season_label() {
        let autumn = Utc.with_ymd_and_hms(2025, 8, 16, 15, 0, 0).unwrap();
        let spring = Utc.with_ymd_and_hms(2026, 2, 1, 15, 0, 0).unwrap();
        assert_eq!(season_label(autumn), "2025-26");
        assert_eq!(season_label(spring), "2025-26");
        // July belongs to the season about to start, June to the one ending
        let july = Utc.with_ymd_and_hms(2026, 7, 10, 15, 0, 0).unwrap();
        let june = Utc.with_ymd_and_hms(2026, 6, 30, 15, 0, 0).unwrap();
        assert_eq!(season_label(july), "2026-27");
        assert_eq!(season_label(june), "2025-26");
    }
}
