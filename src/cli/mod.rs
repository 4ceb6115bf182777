use anyhow::Result;

use crate::config::AppConfig;
use crate::db::{
    create_pool, find_teams_by_name, get_market_odds, get_prediction_for_match,
    get_team_current_stats, get_team_recent_matches, get_upcoming_matches, init_database,
};
use crate::models::Recommendation;
use crate::services::{odds_fetcher, DataFetcher, PredictionEngine};
use crate::utils::probability_to_odds;

pub async fn fetch_data(config: &AppConfig) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("📥 Fetching fixtures for: {}", config.competitions.join(", "));

    let fetcher = DataFetcher::new(config);
    fetcher.fetch_all(&pool).await?;

    println!("✅ Fixture data fetched successfully!");
    Ok(())
}

pub async fn refresh_odds(config: &AppConfig) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("💰 Refreshing market odds...");
    let stored = odds_fetcher::refresh_odds_if_stale(&pool, config).await;
    println!("✅ Stored odds for {} matches", stored);
    Ok(())
}

pub async fn rebuild(config: &AppConfig) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("♻️  Replaying finished matches through the rating model...");
    let engine = PredictionEngine::new();
    let replayed = engine.rebuild(&pool).await?;
    println!("✅ Replayed {} matches and refreshed team stats", replayed);
    Ok(())
}

pub async fn generate_predictions(config: &AppConfig) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("🔮 Generating predictions for upcoming matches...");

    let matches = get_upcoming_matches(&pool, None, 50).await?;
    if matches.is_empty() {
        println!("📭 No upcoming matches found. Try fetching data first: edgefinder fetch");
        return Ok(());
    }

    let engine = PredictionEngine::new();
    engine.generate_predictions(&pool, &matches).await?;

    println!("✅ Generated predictions for {} matches!\n", matches.len());

    println!("🎯 Sample predictions:");
    for (i, match_data) in matches.iter().take(5).enumerate() {
        if let Some(prediction) = get_prediction_for_match(&pool, &match_data.id).await? {
            println!(
                "{}. {} vs {} ({}):",
                i + 1,
                match_data.home_team_name,
                match_data.away_team_name,
                match_data.match_date.format("%Y-%m-%d %H:%M")
            );
            println!(
                "   Home {:.1}% | Draw {:.1}% | Away {:.1}%",
                prediction.home_win_probability * 100.0,
                prediction.draw_probability * 100.0,
                prediction.away_win_probability * 100.0
            );
            println!(
                "   Over {} {:.1}% | BTTS {:.1}% (xG {:.2} - {:.2}) | Confidence {:.1}%\n",
                prediction.total_line,
                prediction.over_probability * 100.0,
                prediction.btts_probability * 100.0,
                prediction.expected_home_goals,
                prediction.expected_away_goals,
                prediction.confidence_score * 100.0
            );
        }
    }

    Ok(())
}

pub async fn show_value_bets(config: &AppConfig) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("🎯 Scanning for value bets...\n");

    odds_fetcher::refresh_odds_if_stale(&pool, config).await;

    let engine = PredictionEngine::new();
    let reports = engine.value_reports(&pool).await?;

    if reports.is_empty() {
        println!("📭 No matches with both predictions and market odds.");
        println!("💡 Run: edgefinder fetch, then edgefinder odds, then edgefinder predict");
        return Ok(());
    }

    for (i, report) in reports.iter().take(10).enumerate() {
        println!(
            "{}. {} vs {} ({})",
            i + 1,
            report.match_info.home_team_name,
            report.match_info.away_team_name,
            report.match_info.match_date.format("%Y-%m-%d %H:%M")
        );
        println!(
            "   Our model: H {:.1}% / D {:.1}% / A {:.1}% (fair home price {:.2})",
            report.prediction.home_win_probability * 100.0,
            report.prediction.draw_probability * 100.0,
            report.prediction.away_win_probability * 100.0,
            probability_to_odds(report.prediction.home_win_probability)
        );
        println!(
            "   {} odds: {:.2} / {:.2} / {:.2}",
            report.odds.bookmaker,
            report.odds.home_odds,
            report.odds.draw_odds,
            report.odds.away_odds
        );

        for bet in &report.value_bets {
            println!(
                "   💡 {} {} @ {:.2}: edge {:+.1}%, EV {:+.3}, {:?}, Kelly {:.3}",
                bet.market,
                bet.outcome,
                bet.odds,
                bet.assessment.edge * 100.0,
                bet.assessment.expected_value,
                bet.assessment.confidence_level,
                bet.assessment.kelly_fraction
            );
        }

        match &report.recommendation {
            Recommendation::Bet { bet } => {
                println!("   ✅ BET: {} @ {:.2}", bet.outcome, bet.odds)
            }
            Recommendation::Consider { bet } => {
                println!("   ⚠️  CONSIDER: {} @ {:.2} (medium confidence)", bet.outcome, bet.odds)
            }
            Recommendation::Pass => println!("   ❌ PASS"),
        }
        println!();
    }

    Ok(())
}

pub async fn query_team(config: &AppConfig, team_name: &str) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database(&pool).await?;

    println!("🔍 Searching for team: {}", team_name);

    let teams = find_teams_by_name(&pool, team_name).await?;

    if teams.is_empty() {
        println!("❌ No teams found matching '{}'", team_name);
        return Ok(());
    }

    if teams.len() > 1 {
        println!("📋 Found {} teams matching '{}':\n", teams.len(), team_name);
        for (i, team) in teams.iter().enumerate() {
            println!("{}. {} ({})", i + 1, team.name, team.league);
        }
        println!("\n🔍 Showing details for first match:");
    }

    let team = &teams[0];

    println!("📊 Team Details:");
    println!("   Name: {}", team.name);
    println!("   League: {}", team.league);
    println!("   ELO Rating: {:.1}", team.elo_rating);

    if let Some(stats) = get_team_current_stats(&pool, &team.id).await? {
        println!(
            "   Season {}: {}W-{}D-{}L, {} scored / {} conceded, form {}",
            stats.season,
            stats.wins,
            stats.draws,
            stats.losses,
            stats.goals_for,
            stats.goals_against,
            if stats.form.is_empty() { "-" } else { &stats.form }
        );
    }

    println!("\n📅 Recent Matches:");
    let recent = get_team_recent_matches(&pool, &team.id, 5).await?;
    if recent.is_empty() {
        println!("   No recent matches found");
    }
    for m in recent {
        let is_home = m.home_team_id == team.id;
        let opponent = if is_home { &m.away_team_name } else { &m.home_team_name };
        let venue = if is_home { "vs" } else { "at" };
        let result = match (m.home_score, m.away_score) {
            (Some(h), Some(a)) => {
                let (scored, conceded) = if is_home { (h, a) } else { (a, h) };
                match scored.cmp(&conceded) {
                    std::cmp::Ordering::Greater => "W",
                    std::cmp::Ordering::Equal => "D",
                    std::cmp::Ordering::Less => "L",
                }
            }
            _ => "?",
        };
        let score = match (m.home_score, m.away_score) {
            (Some(h), Some(a)) => format!("({}-{})", h, a),
            _ => "(TBD)".to_string(),
        };
        println!(
            "   {} {} {} {} {}",
            m.match_date.format("%m/%d"),
            venue,
            opponent,
            score,
            result
        );
    }

    println!("\n📅 Upcoming Matches:");
    let upcoming = get_upcoming_matches(&pool, None, 50).await?;
    let mut shown = 0;
    for m in upcoming
        .iter()
        .filter(|m| m.home_team_id == team.id || m.away_team_id == team.id)
        .take(5)
    {
        shown += 1;
        let is_home = m.home_team_id == team.id;
        let opponent = if is_home { &m.away_team_name } else { &m.home_team_name };
        let venue = if is_home { "vs" } else { "at" };

        if let Some(prediction) = get_prediction_for_match(&pool, &m.id).await? {
            let win_prob = if is_home {
                prediction.home_win_probability
            } else {
                prediction.away_win_probability
            };
            let odds_note = match get_market_odds(&pool, &m.id).await? {
                Some(odds) => {
                    let price = if is_home { odds.home_odds } else { odds.away_odds };
                    format!(" | market {:.2}", price)
                }
                None => String::new(),
            };
            println!(
                "   {} {} {} - win probability {:.1}%{}",
                m.match_date.format("%m/%d %H:%M"),
                venue,
                opponent,
                win_prob * 100.0,
                odds_note
            );
        } else {
            println!("   {} {} {}", m.match_date.format("%m/%d %H:%M"), venue, opponent);
        }
    }
    if shown == 0 {
        println!("   No upcoming matches found");
    }

    Ok(())
}
