//! # Sky Flights Library
//!
//! Flight search over the Sky-Scrapper API. A search resolves the origin and
//! destination names to Sky identifier pairs, queries the flight endpoint and
//! classifies the payload into a [`SearchOutcome`] that a front end renders.

pub mod client;
pub mod config;
pub mod display;
pub mod search;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export main types for convenience
pub use client::{search_params, SkyClient};
pub use crate::config::{ApiConfig, RedactedApiKey};
pub use display::FlightCard;
pub use search::{classify_payload, EmptyReason, SearchOrchestrator, SearchOutcome};

/// Error types for the flights library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No airport found for \"{0}\"")]
    AirportNotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Place query must not be empty")]
    EmptyQuery,

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("No API key configured (set SKY_FLIGHTS_API_KEY)")]
    MissingApiKey,

    #[error("A search is already in progress")]
    SearchInProgress,
}

/// An airport or city in the remote system's vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub sky_id: String,     // Short code, e.g. "DXB"
    pub entity_id: String,  // Numeric entity id, kept as text
}

impl ResolvedPlace {
    pub fn new(sky_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            sky_id: sky_id.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Raw search input as typed by the user
#[derive(Debug, Clone, Default)]
pub struct SearchSubmission {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,         // YYYY-MM-DD
    pub return_date: Option<String>,    // YYYY-MM-DD, blank means one way
}

impl SearchSubmission {
    pub fn new(origin: &str, destination: &str, departure_date: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: departure_date.to_string(),
            return_date: None,
        }
    }

    pub fn with_return_date(mut self, return_date: &str) -> Self {
        self.return_date = Some(return_date.to_string());
        self
    }

    /// Parse the dates of this submission.
    ///
    /// A missing or blank return date yields `None`.
    pub fn parse_dates(&self) -> Result<(NaiveDate, Option<NaiveDate>), FlightError> {
        let departure = parse_date(&self.departure_date)?;
        let return_date = self
            .return_date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_date)
            .transpose()?;

        Ok((departure, return_date))
    }
}

/// Fully resolved search parameters for a single submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub origin: ResolvedPlace,
    pub destination: ResolvedPlace,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

/// Parse an ISO calendar date (YYYY-MM-DD)
pub fn parse_date(date: &str) -> Result<NaiveDate, FlightError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| FlightError::InvalidDate(format!("{} ({})", date, e)))
}

/// Run a single search using configuration from the environment.
///
/// # Example
/// ```no_run
/// use sky_flights::{search_flights, SearchSubmission};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = search_flights(SearchSubmission::new("Dubai", "London", "2025-06-01")).await?;
/// println!("{}", outcome.message());
/// # Ok(())
/// # }
/// ```
pub async fn search_flights(submission: SearchSubmission) -> Result<SearchOutcome, FlightError> {
    let config = ApiConfig::load()?;
    let orchestrator = SearchOrchestrator::new(SkyClient::new(config)?);
    orchestrator.run_search(submission).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2025-06-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());

        assert!(parse_date("01/06/2025").is_err());
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_submission_dates_one_way() {
        let submission = SearchSubmission::new("Dubai", "London", "2025-06-01");
        let (departure, return_date) = submission.parse_dates().unwrap();
        assert_eq!(departure.to_string(), "2025-06-01");
        assert!(return_date.is_none());
    }

    #[test]
    fn test_submission_blank_return_date_is_one_way() {
        let submission = SearchSubmission::new("Dubai", "London", "2025-06-01").with_return_date("  ");
        let (_, return_date) = submission.parse_dates().unwrap();
        assert!(return_date.is_none());
    }

    #[test]
    fn test_submission_round_trip() {
        let submission = SearchSubmission::new("Dubai", "London", "2025-06-01").with_return_date("2025-06-10");
        let (_, return_date) = submission.parse_dates().unwrap();
        assert_eq!(return_date, NaiveDate::from_ymd_opt(2025, 6, 10));
    }

    #[test]
    fn test_submission_invalid_return_date() {
        let submission = SearchSubmission::new("Dubai", "London", "2025-06-01").with_return_date("next week");
        assert!(matches!(submission.parse_dates(), Err(FlightError::InvalidDate(_))));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FlightError::AirportNotFound("Atlantis".to_string()).to_string(),
            "No airport found for \"Atlantis\""
        );
        assert_eq!(FlightError::SearchInProgress.to_string(), "A search is already in progress");
    }
}
