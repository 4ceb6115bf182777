use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::db::{insert_match, insert_team};
use crate::models::{Match, Team};
use crate::services::EloModel;

// ── football-data.org structures ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompetitionTeams {
    teams: Vec<CompetitionTeam>,
}

#[derive(Debug, Deserialize)]
struct CompetitionTeam {
    id: u32,
    name: String,
    crest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompetitionMatches {
    matches: Vec<CompetitionMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompetitionMatch {
    id: u32,
    utc_date: String,
    status: String,
    home_team: MatchTeam,
    away_team: MatchTeam,
    score: MatchScore,
}

#[derive(Debug, Deserialize)]
struct MatchTeam {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchScore {
    full_time: Option<Score>,
}

#[derive(Debug, Clone, Deserialize)]
struct Score {
    home: Option<u32>,
    away: Option<u32>,
}

// ── DataFetcher ──────────────────────────────────────────────────────────────

pub struct DataFetcher {
    client: Client,
    api_key: Option<String>,
    competitions: Vec<String>,
}

impl DataFetcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.football_data_api_key.clone(),
            competitions: config.competitions.clone(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY not set"))
    }

    /// Fetch teams for one competition and store them with an initial rating.
    /// Re-fetching an existing team keeps its current rating.
    pub async fn fetch_teams(&self, pool: &SqlitePool, competition: &str) -> Result<usize> {
        let api_key = self.api_key()?;

        tracing::info!("Fetching {} teams from football-data.org…", competition);

        let url = format!(
            "https://api.football-data.org/v4/competitions/{}/teams",
            competition
        );
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} teams API error {}: {}", competition, status, body));
        }

        let data: CompetitionTeams = response.json().await?;
        let mut stored = 0usize;
        for t in data.teams {
            let id = format!("fd_{}", t.id);
            let existing_rating = crate::db::get_team_by_id(pool, &id)
                .await?
                .map(|team| team.elo_rating);

            insert_team(
                pool,
                &Team {
                    id,
                    name: t.name,
                    league: competition.to_string(),
                    crest_url: t.crest,
                    elo_rating: existing_rating
                        .unwrap_or_else(|| EloModel::initial_rating(competition)),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            )
            .await?;
            stored += 1;
        }

        tracing::info!("{} teams stored for {}", stored, competition);
        Ok(stored)
    }

    /// Fetch all matches for a competition's current season (finished + scheduled).
    pub async fn fetch_matches(&self, pool: &SqlitePool, competition: &str) -> Result<usize> {
        let api_key = self.api_key()?;

        tracing::info!("Fetching {} matches from football-data.org…", competition);

        let url = format!(
            "https://api.football-data.org/v4/competitions/{}/matches",
            competition
        );
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "{} matches API error {}: {}",
                competition,
                status,
                body
            ));
        }

        let data: CompetitionMatches = response.json().await?;
        let mut stored = 0usize;

        for m in data.matches {
            let match_date = match DateTime::parse_from_rfc3339(&m.utc_date) {
                Ok(d) => d.with_timezone(&Utc),
                Err(e) => {
                    tracing::warn!("Bad date '{}': {}", m.utc_date, e);
                    continue;
                }
            };

            let status = match m.status.as_str() {
                "FINISHED" => "finished",
                "IN_PLAY" | "PAUSED" => "live",
                _ => "scheduled", // SCHEDULED, TIMED, POSTPONED …
            };

            let match_obj = Match {
                id: format!("fd_{}", m.id),
                home_team_id: format!("fd_{}", m.home_team.id),
                away_team_id: format!("fd_{}", m.away_team.id),
                home_team_name: m.home_team.name,
                away_team_name: m.away_team.name,
                league: competition.to_string(),
                match_date,
                status: status.to_string(),
                home_score: m
                    .score
                    .full_time
                    .as_ref()
                    .and_then(|s| s.home.map(|v| v as i32)),
                away_score: m
                    .score
                    .full_time
                    .as_ref()
                    .and_then(|s| s.away.map(|v| v as i32)),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };

            insert_match(pool, &match_obj).await?;
            stored += 1;
        }

        tracing::info!("Stored {} {} matches", stored, competition);
        Ok(stored)
    }

    /// Fetch teams and matches for every configured competition.
    /// football-data.org free tier allows 10 req/min, so pace between calls.
    /// A failing competition is logged and skipped; the rest still run.
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<()> {
        if self.api_key.is_none() {
            tracing::warn!("FOOTBALL_DATA_API_KEY not set — nothing fetched");
            return Ok(());
        }

        for (i, competition) in self.competitions.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_secs(6)).await;
            }
            if let Err(e) = self.fetch_teams(pool, competition).await {
                tracing::error!("Fixture fetch failed ({} teams): {}", competition, e);
                continue;
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(6)).await;
            if let Err(e) = self.fetch_matches(pool, competition).await {
                tracing::error!("Fixture fetch failed ({} matches): {}", competition, e);
            }
        }

        Ok(())
    }
}
