//! Fetches live odds from The Odds API and stores them in the `market_odds`
//! table: the 1X2 (h2h) market plus goal-totals and both-teams-to-score
//! quotes when the book carries them.
//!
//! ## Credit budget (500 free req / month)
//! Each `refresh_odds_if_stale` call consumes at most 1 API request per
//! configured competition. A competition is skipped when:
//!   1. its last successful fetch was < 12 hours ago, OR
//!   2. it has no upcoming matches in the next 3 days.

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AppConfig;
use crate::db::upsert_market_odds;
use crate::models::{validate_price, MarketOdds};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Odds API: invalid API key (401)")]
    InvalidKey,
    #[error("Odds API: sport {0} not in subscription (422)")]
    SportNotAvailable(String),
    #[error("Odds API HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

// ── Odds API response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OddsEvent {
    #[allow(dead_code)]
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    key: String,
    title: String,
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
    // totals outcomes carry the line here
    point: Option<f64>,
}

struct BestOdds {
    home_odds: f64,
    draw_odds: f64,
    away_odds: f64,
    total_line: Option<f64>,
    over_odds: Option<f64>,
    under_odds: Option<f64>,
    btts_yes_odds: Option<f64>,
    btts_no_odds: Option<f64>,
    bookmaker: String,
}

/// The Odds API sport key for a football-data.org competition code.
fn sport_key(competition: &str) -> Option<&'static str> {
    match competition {
        "PL" => Some("soccer_epl"),
        "PD" => Some("soccer_spain_la_liga"),
        "SA" => Some("soccer_italy_serie_a"),
        "BL1" => Some("soccer_germany_bundesliga"),
        "FL1" => Some("soccer_france_ligue_one"),
        "CL" => Some("soccer_uefa_champs_league"),
        _ => None,
    }
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Refresh odds for every configured competition if stale.
/// Returns number of match odds upserted. Per-competition failures are logged
/// and skipped; they never abort the whole refresh or get papered over with
/// fabricated prices.
pub async fn refresh_odds_if_stale(pool: &SqlitePool, config: &AppConfig) -> u32 {
    let Some(api_key) = config.odds_api_key.as_deref() else {
        tracing::warn!("ODDS_API_KEY not set — odds refresh skipped");
        return 0;
    };

    let mut total = 0u32;

    for competition in &config.competitions {
        let Some(key) = sport_key(competition) else {
            tracing::debug!("Odds: no sport key mapping for {}", competition);
            continue;
        };

        if !is_stale(pool, key).await {
            tracing::debug!("Odds: {} fetch skipped (fetched recently)", competition);
            continue;
        }
        if !has_upcoming(pool, competition, 3).await {
            tracing::debug!("Odds: {} fetch skipped (no upcoming matches)", competition);
            continue;
        }

        match fetch_sport(pool, api_key, key).await {
            Ok(n) => {
                total += n;
                tracing::info!("Odds: {} events stored for {}", n, competition);
                mark_fetched(pool, key).await;
            }
            Err(e) => tracing::error!("Odds fetch failed ({}): {}", competition, e),
        }
    }

    total
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Returns true if we haven't fetched this sport_key in the last 12 hours.
async fn is_stale(pool: &SqlitePool, sport_key: &str) -> bool {
    let last: Option<String> =
        sqlx::query_scalar("SELECT last_fetched FROM odds_fetch_log WHERE sport_key = ?")
            .bind(sport_key)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    match last {
        None => true,
        Some(ts) => {
            let fetched = DateTime::parse_from_rfc3339(&ts)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now() - Duration::hours(25));
            Utc::now().signed_duration_since(fetched) > Duration::hours(12)
        }
    }
}

async fn mark_fetched(pool: &SqlitePool, sport_key: &str) {
    let now = Utc::now().to_rfc3339();
    let _ = sqlx::query(
        "INSERT OR REPLACE INTO odds_fetch_log (sport_key, last_fetched) VALUES (?, ?)",
    )
    .bind(sport_key)
    .bind(&now)
    .execute(pool)
    .await;
}

/// Returns true if the league has scheduled matches starting within `days` days.
async fn has_upcoming(pool: &SqlitePool, league: &str, days: i64) -> bool {
    let now = Utc::now();
    let horizon = now + Duration::days(days);
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM matches \
         WHERE league = ? AND status = 'scheduled' \
           AND match_date > ? AND match_date < ?",
    )
    .bind(league)
    .bind(now.to_rfc3339())
    .bind(horizon.to_rfc3339())
    .fetch_one(pool)
    .await
    .unwrap_or(0);
    count > 0
}

/// Calls The Odds API for one sport and stores best odds for each matched event.
async fn fetch_sport(pool: &SqlitePool, api_key: &str, sport_key: &str) -> Result<u32, FetchError> {
    let url = format!(
        "https://api.the-odds-api.com/v4/sports/{}/odds/\
         ?apiKey={}&regions=eu&markets=h2h,totals,btts&oddsFormat=decimal&dateFormat=iso",
        sport_key, api_key
    );

    let client = reqwest::Client::new();
    let resp = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(20))
        .send()
        .await?;

    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::InvalidKey);
    }
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return Err(FetchError::SportNotAvailable(sport_key.to_string()));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Http { status, body });
    }

    let events: Vec<OddsEvent> = resp.json().await?;
    let mut upserted = 0u32;

    for event in &events {
        let Some(odds) = best_odds(event) else { continue };

        // Match to our DB by kick-off time window (±4 h) + fuzzy team names
        let Some(match_id) =
            find_match_id(pool, &event.home_team, &event.away_team, event.commence_time).await
        else {
            tracing::debug!(
                "Odds: no DB match for {} vs {} at {}",
                event.home_team,
                event.away_team,
                event.commence_time
            );
            continue;
        };

        let record = MarketOdds {
            match_id,
            bookmaker: odds.bookmaker,
            home_odds: odds.home_odds,
            draw_odds: odds.draw_odds,
            away_odds: odds.away_odds,
            total_line: odds.total_line,
            over_odds: odds.over_odds,
            under_odds: odds.under_odds,
            btts_yes_odds: odds.btts_yes_odds,
            btts_no_odds: odds.btts_no_odds,
            fetched_at: Utc::now().to_rfc3339(),
        };

        if let Err(e) = upsert_market_odds(pool, &record).await {
            tracing::error!("Odds upsert failed for match {}: {}", record.match_id, e);
        } else {
            upserted += 1;
        }
    }

    Ok(upserted)
}

/// Select the sharpest odds from a bookmaker priority list, fallback to lowest
/// overround. Prices failing validation disqualify the bookmaker.
fn best_odds(event: &OddsEvent) -> Option<BestOdds> {
    let priority = ["pinnacle", "betfair_ex_eu", "betfair_ex_uk", "williamhill", "bet365"];

    let extract = |bk: &Bookmaker| -> Option<BestOdds> {
        let h2h = bk.markets.iter().find(|m| m.key == "h2h")?;
        let price_for = |name_match: &dyn Fn(&str) -> bool| -> Option<f64> {
            h2h.outcomes
                .iter()
                .find(|o| name_match(&o.name))
                .and_then(|o| validate_price(o.price).ok())
        };

        let home_odds = price_for(&|n| names_match(n, &event.home_team))?;
        let away_odds = price_for(&|n| names_match(n, &event.away_team))?;
        let draw_odds = price_for(&|n| n.eq_ignore_ascii_case("draw"))?;

        // Totals are optional; take the quoted line only when both sides
        // carry valid prices on the same point.
        let totals = bk.markets.iter().find(|m| m.key == "totals");
        let (total_line, over_odds, under_odds) = match totals {
            Some(market) => {
                let over = market
                    .outcomes
                    .iter()
                    .find(|o| o.name.eq_ignore_ascii_case("over") && o.point.is_some());
                let under = over.and_then(|ov| {
                    market.outcomes.iter().find(|o| {
                        o.name.eq_ignore_ascii_case("under") && o.point == ov.point
                    })
                });
                match (over, under) {
                    (Some(ov), Some(un)) => {
                        match (validate_price(ov.price), validate_price(un.price)) {
                            (Ok(o), Ok(u)) => (ov.point, Some(o), Some(u)),
                            _ => (None, None, None),
                        }
                    }
                    _ => (None, None, None),
                }
            }
            None => (None, None, None),
        };

        // BTTS is a plain yes/no pair; both prices must validate or neither
        // is kept.
        let btts = bk.markets.iter().find(|m| m.key == "btts");
        let (btts_yes_odds, btts_no_odds) = match btts {
            Some(market) => {
                let yes = market.outcomes.iter().find(|o| o.name.eq_ignore_ascii_case("yes"));
                let no = market.outcomes.iter().find(|o| o.name.eq_ignore_ascii_case("no"));
                match (yes, no) {
                    (Some(y), Some(n)) => {
                        match (validate_price(y.price), validate_price(n.price)) {
                            (Ok(y), Ok(n)) => (Some(y), Some(n)),
                            _ => (None, None),
                        }
                    }
                    _ => (None, None),
                }
            }
            None => (None, None),
        };

        Some(BestOdds {
            home_odds,
            draw_odds,
            away_odds,
            total_line,
            over_odds,
            under_odds,
            btts_yes_odds,
            btts_no_odds,
            bookmaker: bk.title.clone(),
        })
    };

    // 1. Try priority (sharpest) books first
    for pref in &priority {
        if let Some(bk) = event.bookmakers.iter().find(|b| b.key == *pref) {
            if let Some(odds) = extract(bk) {
                return Some(odds);
            }
        }
    }

    // 2. Fallback: lowest 1X2 overround across all bookmakers
    event
        .bookmakers
        .iter()
        .filter_map(|bk| {
            let odds = extract(bk)?;
            let overround =
                1.0 / odds.home_odds + 1.0 / odds.draw_odds + 1.0 / odds.away_odds;
            Some((odds, overround))
        })
        .min_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(odds, _)| odds)
}

/// Find our internal match_id by matching team names and kick-off time.
async fn find_match_id(
    pool: &SqlitePool,
    home_team: &str,
    away_team: &str,
    commence_time: DateTime<Utc>,
) -> Option<String> {
    // Look for scheduled matches within ±4 hours of the commence_time
    let window_start = (commence_time - Duration::hours(4)).to_rfc3339();
    let window_end = (commence_time + Duration::hours(4)).to_rfc3339();

    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT id, home_team_name, away_team_name FROM matches \
         WHERE status = 'scheduled' AND match_date BETWEEN ? AND ?",
    )
    .bind(&window_start)
    .bind(&window_end)
    .fetch_all(pool)
    .await
    .ok()?;

    rows.into_iter()
        .find(|(_, db_home, db_away)| {
            names_match(db_home, home_team) && names_match(db_away, away_team)
        })
        .map(|(id, _, _)| id)
}

/// Fuzzy team-name match: strips common suffixes, then accepts an exact hit,
/// a contains-both-ways hit, or a high Jaro-Winkler similarity.
fn names_match(a: &str, b: &str) -> bool {
    let norm = |s: &str| -> String {
        s.to_lowercase()
            .replace(" fc", "")
            .replace("fc ", "")
            .replace("afc ", "")
            .replace(" afc", "")
            .replace(" sc", "")
            .replace('.', "")
            .replace('-', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    };
    let a = norm(a);
    let b = norm(b);
    a == b || a.contains(&b) || b.contains(&a) || strsim::jaro_winkler(&a, &b) > 0.90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_suffixes() {
        assert!(names_match("Arsenal FC", "Arsenal"));
        assert!(names_match("AFC Bournemouth", "Bournemouth"));
        assert!(names_match("Wolverhampton Wanderers", "Wolverhampton Wanderers FC"));
    }

    #[test]
    fn test_names_match_fuzzy() {
        // "&" vs "and" defeats exact/contains, Jaro-Winkler catches it
        assert!(names_match("Brighton & Hove Albion", "Brighton and Hove Albion FC"));
        assert!(!names_match("Arsenal", "Aston Villa"));
        assert!(!names_match("Manchester United", "Newcastle United"));
    }

    #[test]
    fn test_best_odds_extracts_btts_pair() {
        let outcome = |name: &str, price: f64| Outcome {
            name: name.to_string(),
            price,
            point: None,
        };
        let event = OddsEvent {
            id: "e1".to_string(),
            commence_time: Utc::now(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            bookmakers: vec![Bookmaker {
                key: "pinnacle".to_string(),
                title: "Pinnacle".to_string(),
                markets: vec![
                    Market {
                        key: "h2h".to_string(),
                        outcomes: vec![
                            outcome("Arsenal", 2.1),
                            outcome("Chelsea", 3.4),
                            outcome("Draw", 3.3),
                        ],
                    },
                    Market {
                        key: "btts".to_string(),
                        outcomes: vec![outcome("Yes", 1.85), outcome("No", 1.95)],
                    },
                ],
            }],
        };

        let odds = best_odds(&event).unwrap();
        assert_eq!(odds.btts_yes_odds, Some(1.85));
        assert_eq!(odds.btts_no_odds, Some(1.95));
        // No totals market quoted
        assert!(odds.total_line.is_none());
    }

    #[test]
    fn test_sport_key_mapping() {
        assert_eq!(sport_key("PL"), Some("soccer_epl"));
        assert_eq!(sport_key("PD"), Some("soccer_spain_la_liga"));
        assert_eq!(sport_key("XYZ"), None);
    }
}
