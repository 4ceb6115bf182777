use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::db::{
    create_pool, get_elo_history, get_market_odds, get_prediction_for_match, get_team_by_id,
    get_team_current_stats, get_team_recent_matches, get_teams_by_league, get_upcoming_matches,
    init_database,
};
use crate::models::{
    ApiResponse, MatchValueReport, Team, TeamProfile, UpcomingMatchWithPrediction,
};
use crate::services::{odds_fetcher, DataFetcher, PredictionEngine};

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
}

pub async fn serve(port: u16, config: AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config).await?;
    init_database(&pool).await?;

    let state = AppState {
        pool,
        config: Arc::new(config),
    };
    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("edgefinder API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/matches/upcoming", get(get_upcoming_matches_handler))
        .route("/teams/{id}", get(get_team_profile_handler))
        .route("/teams/league/{league}", get(get_teams_by_league_handler))
        .route("/value-bets", get(get_value_bets_handler))
        .route("/data/fetch", post(fetch_data_handler))
        .route("/predictions/generate", post(generate_predictions_handler))
        .route("/reports/export", post(export_report_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("edgefinder API is running"))
}

// GET /matches/upcoming - Upcoming matches with predictions and stored odds
#[derive(Deserialize)]
struct UpcomingMatchesQuery {
    league: Option<String>,
    limit: Option<usize>,
}

async fn get_upcoming_matches_handler(
    State(state): State<AppState>,
    Query(params): Query<UpcomingMatchesQuery>,
) -> Result<Json<ApiResponse<Vec<UpcomingMatchWithPrediction>>>, StatusCode> {
    let limit = params.limit.unwrap_or(50).min(100) as i64; // Cap at 100
    match get_upcoming_matches(&state.pool, params.league.as_deref(), limit).await {
        Ok(matches) => {
            let mut out = Vec::new();

            for match_data in matches {
                let prediction = get_prediction_for_match(&state.pool, &match_data.id)
                    .await
                    .ok()
                    .flatten();
                let odds = get_market_odds(&state.pool, &match_data.id).await.ok().flatten();

                out.push(UpcomingMatchWithPrediction {
                    match_info: match_data,
                    prediction,
                    odds,
                });
            }

            Ok(Json(ApiResponse::success(out)))
        }
        Err(e) => {
            tracing::error!("Failed to fetch upcoming matches: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /teams/{id} - Team profile with stats, recent matches and rating history
async fn get_team_profile_handler(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<Json<ApiResponse<TeamProfile>>, StatusCode> {
    match get_team_by_id(&state.pool, &team_id).await {
        Ok(Some(team)) => {
            let current_stats = get_team_current_stats(&state.pool, &team_id)
                .await
                .ok()
                .flatten();
            let recent_matches = get_team_recent_matches(&state.pool, &team_id, 5)
                .await
                .unwrap_or_default();
            let elo_history = get_elo_history(&state.pool, &team_id).await.unwrap_or_default();

            Ok(Json(ApiResponse::success(TeamProfile {
                team,
                current_stats,
                recent_matches,
                elo_history,
            })))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to fetch team profile: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /teams/league/{league} - Teams in one competition
async fn get_teams_by_league_handler(
    State(state): State<AppState>,
    Path(league): Path<String>,
) -> Result<Json<ApiResponse<Vec<Team>>>, StatusCode> {
    match get_teams_by_league(&state.pool, &league).await {
        Ok(teams) => Ok(Json(ApiResponse::success(teams))),
        Err(e) => {
            tracing::error!("Failed to fetch teams by league: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /value-bets - Value-bet reports for upcoming matches with stored odds
async fn get_value_bets_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MatchValueReport>>>, StatusCode> {
    odds_fetcher::refresh_odds_if_stale(&state.pool, &state.config).await;

    let engine = PredictionEngine::new();
    match engine.value_reports(&state.pool).await {
        Ok(reports) => Ok(Json(ApiResponse::success(reports))),
        Err(e) => {
            tracing::error!("Failed to build value-bet reports: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// POST /data/fetch - Fetch teams and matches for the configured competitions
async fn fetch_data_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    let fetcher = DataFetcher::new(&state.config);

    match fetcher.fetch_all(&state.pool).await {
        Ok(()) => Ok(Json(ApiResponse::success(
            "Fixture data fetched successfully".to_string(),
        ))),
        Err(e) => {
            tracing::error!("Failed to fetch data: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// POST /predictions/generate - Generate predictions for upcoming matches
async fn generate_predictions_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    let engine = PredictionEngine::new();

    match get_upcoming_matches(&state.pool, None, 50).await {
        Ok(matches) => match engine.generate_predictions(&state.pool, &matches).await {
            Ok(()) => Ok(Json(ApiResponse::success(format!(
                "Generated predictions for {} matches",
                matches.len()
            )))),
            Err(e) => {
                tracing::error!("Failed to generate predictions: {}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        Err(e) => {
            tracing::error!("Failed to fetch matches for prediction: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// POST /reports/export - Write the current value-bet report to CSV or JSON
#[derive(Deserialize)]
struct ExportRequest {
    format: String, // "csv" or "json"
}

#[derive(Serialize)]
struct ExportResponse {
    path: String,
    format: String,
    rows: usize,
    generated_at: chrono::DateTime<chrono::Utc>,
}

async fn export_report_handler(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ApiResponse<ExportResponse>>, StatusCode> {
    match export_value_bet_report(&state, &request.format).await {
        Ok(response) => Ok(Json(ApiResponse::success(response))),
        Err(e) => {
            tracing::error!("Failed to export report: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Flat row for the exported report: one line per evaluated value bet.
#[derive(Serialize)]
struct ReportRow {
    match_id: String,
    home_team: String,
    away_team: String,
    match_date: String,
    bookmaker: String,
    market: String,
    outcome: String,
    odds: f64,
    model_probability: f64,
    implied_probability: f64,
    edge: f64,
    expected_value: f64,
    confidence_level: crate::models::ConfidenceLevel,
    kelly_fraction: f64,
}

async fn export_value_bet_report(state: &AppState, format: &str) -> anyhow::Result<ExportResponse> {
    let engine = PredictionEngine::new();
    let reports = engine.value_reports(&state.pool).await?;

    let rows: Vec<ReportRow> = reports
        .iter()
        .flat_map(|report| {
            report.value_bets.iter().map(|bet| ReportRow {
                match_id: report.match_info.id.clone(),
                home_team: report.match_info.home_team_name.clone(),
                away_team: report.match_info.away_team_name.clone(),
                match_date: report.match_info.match_date.to_rfc3339(),
                bookmaker: report.odds.bookmaker.clone(),
                market: bet.market.clone(),
                outcome: bet.outcome.clone(),
                odds: bet.odds,
                model_probability: bet.assessment.model_probability,
                implied_probability: bet.assessment.implied_probability,
                edge: bet.assessment.edge,
                expected_value: bet.assessment.expected_value,
                confidence_level: bet.assessment.confidence_level,
                kelly_fraction: bet.assessment.kelly_fraction,
            })
        })
        .collect();

    tokio::fs::create_dir_all(&state.config.export_dir).await?;
    let filename = format!("value_bets_{}.{}", chrono::Utc::now().timestamp(), format);
    let path = state.config.export_dir.join(&filename);

    match format {
        "csv" => {
            let mut writer = csv::Writer::from_path(&path)?;
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        "json" => {
            let json_str = serde_json::to_string_pretty(&rows)?;
            tokio::fs::write(&path, json_str).await?;
        }
        _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
    }

    Ok(ExportResponse {
        path: path.display().to_string(),
        format: format.to_string(),
        rows: rows.len(),
        generated_at: chrono::Utc::now(),
    })
}
