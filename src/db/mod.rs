use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::str::FromStr;

use crate::config::AppConfig;
use crate::models::*;

pub async fn create_pool(config: &AppConfig) -> Result<SqlitePool> {
    let database_url = &config.database_url;

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

pub async fn init_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            league TEXT NOT NULL,
            crest_url TEXT,
            elo_rating REAL NOT NULL DEFAULT 1200.0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            home_team_name TEXT NOT NULL,
            away_team_name TEXT NOT NULL,
            league TEXT NOT NULL,
            match_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            home_score INTEGER,
            away_score INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (home_team_id) REFERENCES teams (id),
            FOREIGN KEY (away_team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL UNIQUE,
            home_win_probability REAL NOT NULL,
            draw_probability REAL NOT NULL,
            away_win_probability REAL NOT NULL,
            total_line REAL NOT NULL,
            over_probability REAL NOT NULL,
            under_probability REAL NOT NULL,
            btts_probability REAL NOT NULL,
            expected_home_goals REAL NOT NULL,
            expected_away_goals REAL NOT NULL,
            model_version TEXT NOT NULL,
            confidence_score REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (match_id) REFERENCES matches (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_stats (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            season TEXT NOT NULL,
            matches_played INTEGER NOT NULL DEFAULT 0,
            wins INTEGER NOT NULL DEFAULT 0,
            draws INTEGER NOT NULL DEFAULT 0,
            losses INTEGER NOT NULL DEFAULT 0,
            goals_for INTEGER NOT NULL DEFAULT 0,
            goals_against INTEGER NOT NULL DEFAULT 0,
            form TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL,
            UNIQUE (team_id, season),
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // market_odds: one row per match, best available book prices
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_odds (
            match_id    TEXT PRIMARY KEY,
            bookmaker   TEXT NOT NULL,
            home_odds   REAL NOT NULL,
            draw_odds   REAL NOT NULL,
            away_odds   REAL NOT NULL,
            total_line  REAL,
            over_odds   REAL,
            under_odds  REAL,
            btts_yes_odds REAL,
            btts_no_odds  REAL,
            fetched_at  TEXT NOT NULL,
            FOREIGN KEY (match_id) REFERENCES matches (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS elo_history (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            date TEXT NOT NULL,
            elo_rating REAL NOT NULL,
            match_id TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (id),
            FOREIGN KEY (match_id) REFERENCES matches (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // odds_fetch_log: tracks last successful API call per sport_key to avoid burning quota
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS odds_fetch_log (
            sport_key    TEXT PRIMARY KEY,
            last_fetched TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_teams_league ON teams(league)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// ── Team operations ──────────────────────────────────────────────────────────

pub async fn insert_team(pool: &SqlitePool, team: &Team) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO teams
        (id, name, league, crest_url, elo_rating, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&team.id)
    .bind(&team.name)
    .bind(&team.league)
    .bind(&team.crest_url)
    .bind(team.elo_rating)
    .bind(team.created_at.to_rfc3339())
    .bind(team.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_team_by_id(pool: &SqlitePool, team_id: &str) -> Result<Option<Team>> {
    let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;
    Ok(team)
}

pub async fn get_teams_by_league(pool: &SqlitePool, league: &str) -> Result<Vec<Team>> {
    let teams =
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE league = ? ORDER BY name")
            .bind(league)
            .fetch_all(pool)
            .await?;
    Ok(teams)
}

pub async fn find_teams_by_name(pool: &SqlitePool, name: &str) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>(
        "SELECT * FROM teams WHERE LOWER(name) LIKE LOWER(?) ORDER BY name",
    )
    .bind(format!("%{}%", name))
    .fetch_all(pool)
    .await?;
    Ok(teams)
}

/// Reset every team to its league's initial rating and wipe rating history.
/// Used before a chronological replay of finished matches.
pub async fn reset_elo_ratings(pool: &SqlitePool) -> Result<()> {
    let teams = sqlx::query_as::<_, Team>("SELECT * FROM teams")
        .fetch_all(pool)
        .await?;
    for team in teams {
        let initial = crate::services::EloModel::initial_rating(&team.league);
        sqlx::query("UPDATE teams SET elo_rating = ?, updated_at = ? WHERE id = ?")
            .bind(initial)
            .bind(Utc::now().to_rfc3339())
            .bind(&team.id)
            .execute(pool)
            .await?;
    }
    sqlx::query("DELETE FROM elo_history").execute(pool).await?;
    Ok(())
}

// ── Match operations ─────────────────────────────────────────────────────────

pub async fn insert_match(pool: &SqlitePool, match_data: &Match) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO matches
        (id, home_team_id, away_team_id, home_team_name, away_team_name, league,
         match_date, status, home_score, away_score, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&match_data.id)
    .bind(&match_data.home_team_id)
    .bind(&match_data.away_team_id)
    .bind(&match_data.home_team_name)
    .bind(&match_data.away_team_name)
    .bind(&match_data.league)
    .bind(match_data.match_date.to_rfc3339())
    .bind(&match_data.status)
    .bind(match_data.home_score)
    .bind(match_data.away_score)
    .bind(match_data.created_at.to_rfc3339())
    .bind(match_data.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_upcoming_matches(
    pool: &SqlitePool,
    league: Option<&str>,
    limit: i64,
) -> Result<Vec<Match>> {
    let now = Utc::now().to_rfc3339();
    let matches = if let Some(league) = league {
        sqlx::query_as::<_, Match>(
            "SELECT * FROM matches WHERE match_date > ? AND status = 'scheduled' AND league = ? \
             ORDER BY match_date LIMIT ?",
        )
        .bind(&now)
        .bind(league)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Match>(
            "SELECT * FROM matches WHERE match_date > ? AND status = 'scheduled' \
             ORDER BY match_date LIMIT ?",
        )
        .bind(&now)
        .bind(limit)
        .fetch_all(pool)
        .await?
    };
    Ok(matches)
}

pub async fn get_finished_matches_ordered(pool: &SqlitePool) -> Result<Vec<Match>> {
    let matches = sqlx::query_as::<_, Match>(
        "SELECT * FROM matches WHERE status = 'finished' AND home_score IS NOT NULL \
         ORDER BY match_date ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(matches)
}

pub async fn get_team_recent_matches(
    pool: &SqlitePool,
    team_id: &str,
    limit: i64,
) -> Result<Vec<Match>> {
    let matches = sqlx::query_as::<_, Match>(
        r#"SELECT * FROM matches
           WHERE (home_team_id = ? OR away_team_id = ?) AND status = 'finished'
           ORDER BY match_date DESC LIMIT ?"#,
    )
    .bind(team_id)
    .bind(team_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(matches)
}

pub async fn get_head_to_head_matches(
    pool: &SqlitePool,
    team1_id: &str,
    team2_id: &str,
) -> Result<Vec<Match>> {
    let matches = sqlx::query_as::<_, Match>(
        r#"
        SELECT * FROM matches
        WHERE ((home_team_id = ? AND away_team_id = ?)
            OR (home_team_id = ? AND away_team_id = ?))
            AND status = 'finished'
        ORDER BY match_date DESC
        LIMIT 10
        "#,
    )
    .bind(team1_id)
    .bind(team2_id)
    .bind(team2_id)
    .bind(team1_id)
    .fetch_all(pool)
    .await?;
    Ok(matches)
}

// ── Prediction operations ────────────────────────────────────────────────────

pub async fn insert_prediction(pool: &SqlitePool, prediction: &Prediction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO predictions
        (id, match_id, home_win_probability, draw_probability, away_win_probability,
         total_line, over_probability, under_probability, btts_probability,
         expected_home_goals, expected_away_goals,
         model_version, confidence_score, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(match_id) DO UPDATE SET
            home_win_probability = excluded.home_win_probability,
            draw_probability     = excluded.draw_probability,
            away_win_probability = excluded.away_win_probability,
            total_line           = excluded.total_line,
            over_probability     = excluded.over_probability,
            under_probability    = excluded.under_probability,
            btts_probability     = excluded.btts_probability,
            expected_home_goals  = excluded.expected_home_goals,
            expected_away_goals  = excluded.expected_away_goals,
            model_version        = excluded.model_version,
            confidence_score     = excluded.confidence_score,
            created_at           = excluded.created_at
        "#,
    )
    .bind(&prediction.id)
    .bind(&prediction.match_id)
    .bind(prediction.home_win_probability)
    .bind(prediction.draw_probability)
    .bind(prediction.away_win_probability)
    .bind(prediction.total_line)
    .bind(prediction.over_probability)
    .bind(prediction.under_probability)
    .bind(prediction.btts_probability)
    .bind(prediction.expected_home_goals)
    .bind(prediction.expected_away_goals)
    .bind(&prediction.model_version)
    .bind(prediction.confidence_score)
    .bind(prediction.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_prediction_for_match(
    pool: &SqlitePool,
    match_id: &str,
) -> Result<Option<Prediction>> {
    let prediction =
        sqlx::query_as::<_, Prediction>("SELECT * FROM predictions WHERE match_id = ?")
            .bind(match_id)
            .fetch_optional(pool)
            .await?;
    Ok(prediction)
}

// ── Team stats operations ────────────────────────────────────────────────────

pub async fn upsert_team_stats(pool: &SqlitePool, stats: &TeamStats) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO team_stats
        (id, team_id, season, matches_played, wins, draws, losses,
         goals_for, goals_against, form, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(team_id, season) DO UPDATE SET
            matches_played = excluded.matches_played,
            wins           = excluded.wins,
            draws          = excluded.draws,
            losses         = excluded.losses,
            goals_for      = excluded.goals_for,
            goals_against  = excluded.goals_against,
            form           = excluded.form,
            updated_at     = excluded.updated_at
        "#,
    )
    .bind(&stats.id)
    .bind(&stats.team_id)
    .bind(&stats.season)
    .bind(stats.matches_played)
    .bind(stats.wins)
    .bind(stats.draws)
    .bind(stats.losses)
    .bind(stats.goals_for)
    .bind(stats.goals_against)
    .bind(&stats.form)
    .bind(stats.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_team_current_stats(pool: &SqlitePool, team_id: &str) -> Result<Option<TeamStats>> {
    let stats = sqlx::query_as::<_, TeamStats>(
        "SELECT * FROM team_stats WHERE team_id = ? ORDER BY season DESC LIMIT 1",
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;
    Ok(stats)
}

// ── Market odds operations ───────────────────────────────────────────────────

pub async fn upsert_market_odds(pool: &SqlitePool, odds: &MarketOdds) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO market_odds
           (match_id, bookmaker, home_odds, draw_odds, away_odds,
            total_line, over_odds, under_odds, btts_yes_odds, btts_no_odds, fetched_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(match_id) DO UPDATE SET
               bookmaker     = excluded.bookmaker,
               home_odds     = excluded.home_odds,
               draw_odds     = excluded.draw_odds,
               away_odds     = excluded.away_odds,
               total_line    = excluded.total_line,
               over_odds     = excluded.over_odds,
               under_odds    = excluded.under_odds,
               btts_yes_odds = excluded.btts_yes_odds,
               btts_no_odds  = excluded.btts_no_odds,
               fetched_at    = excluded.fetched_at"#,
    )
    .bind(&odds.match_id)
    .bind(&odds.bookmaker)
    .bind(odds.home_odds)
    .bind(odds.draw_odds)
    .bind(odds.away_odds)
    .bind(odds.total_line)
    .bind(odds.over_odds)
    .bind(odds.under_odds)
    .bind(odds.btts_yes_odds)
    .bind(odds.btts_no_odds)
    .bind(&odds.fetched_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_market_odds(pool: &SqlitePool, match_id: &str) -> Result<Option<MarketOdds>> {
    let odds = sqlx::query_as::<_, MarketOdds>("SELECT * FROM market_odds WHERE match_id = ?")
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    Ok(odds)
}

// ── ELO history operations ───────────────────────────────────────────────────

pub async fn insert_elo_history(
    pool: &SqlitePool,
    team_id: &str,
    date: chrono::DateTime<Utc>,
    elo_rating: f64,
    match_id: &str,
) -> Result<()> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT OR IGNORE INTO elo_history (id, team_id, date, elo_rating, match_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(team_id)
    .bind(date.to_rfc3339())
    .bind(elo_rating)
    .bind(match_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_elo_history(pool: &SqlitePool, team_id: &str) -> Result<Vec<EloHistoryPoint>> {
    let history = sqlx::query_as::<_, EloHistoryPoint>(
        "SELECT team_id, date, elo_rating, match_id FROM elo_history \
         WHERE team_id = ? ORDER BY date ASC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn team(id: &str) -> Team {
        Team {
            id: id.to_string(),
            name: id.to_string(),
            league: "PL".to_string(),
            crest_url: None,
            elo_rating: 1200.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scheduled_match(i: i64) -> Match {
        Match {
            id: format!("m{}", i),
            home_team_id: format!("h{}", i),
            away_team_id: format!("a{}", i),
            home_team_name: format!("Home {}", i),
            away_team_name: format!("Away {}", i),
            league: "PL".to_string(),
            match_date: Utc::now() + Duration::days(1) + Duration::minutes(i),
            status: "scheduled".to_string(),
            home_score: None,
            away_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_upcoming_matches_honours_requested_limit() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_database(&pool).await.unwrap();

        for i in 0..60 {
            insert_team(&pool, &team(&format!("h{}", i))).await.unwrap();
            insert_team(&pool, &team(&format!("a{}", i))).await.unwrap();
            insert_match(&pool, &scheduled_match(i)).await.unwrap();
        }

        assert_eq!(get_upcoming_matches(&pool, None, 100).await.unwrap().len(), 60);
        assert_eq!(get_upcoming_matches(&pool, None, 10).await.unwrap().len(), 10);
        assert_eq!(get_upcoming_matches(&pool, Some("PL"), 100).await.unwrap().len(), 60);
        assert_eq!(get_upcoming_matches(&pool, Some("SA"), 100).await.unwrap().len(), 0);
    }
}
