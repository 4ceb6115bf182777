use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded once at startup and passed down explicitly.
/// API credentials and paths come from the environment (or a `.env` file),
/// never from source literals.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// football-data.org API token (X-Auth-Token header).
    pub football_data_api_key: Option<String>,
    /// The Odds API key.
    pub odds_api_key: Option<String>,
    /// football-data.org competition codes to track, e.g. "PL", "PD", "SA".
    pub competitions: Vec<String>,
    /// Directory for CSV/JSON report exports.
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/edgefinder.db".to_string()),
            football_data_api_key: env::var("FOOTBALL_DATA_API_KEY").ok(),
            odds_api_key: env::var("ODDS_API_KEY").ok(),
            competitions: parse_competitions(
                &env::var("COMPETITIONS").unwrap_or_else(|_| "PL".to_string()),
            ),
            export_dir: env::var("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/exports")),
        }
    }

}

fn parse_competitions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competition_list_parsing() {
        assert_eq!(parse_competitions("PL"), vec!["PL"]);
        assert_eq!(parse_competitions("PL, PD ,SA"), vec!["PL", "PD", "SA"]);
        assert_eq!(parse_competitions("PL,,"), vec!["PL"]);
    }
}
