pub mod data_fetcher;
pub mod elo;
pub mod goals;
pub mod odds_fetcher;
pub mod predictor;
pub mod value_bet;

pub use data_fetcher::DataFetcher;
pub use elo::EloModel;
pub use predictor::PredictionEngine;
