//! Search orchestration: resolve both places, query flights, classify the payload.
//!
//! Every outcome transition is published on a watch channel so a front end can
//! render the latest state without the orchestrator touching shared globals.

use crate::{FlightError, SearchCriteria, SearchSubmission, SkyClient};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub const NO_FLIGHTS_MESSAGE: &str = "No flights found for the specified criteria.";
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while fetching flight data.";
pub const IDLE_MESSAGE: &str = "No flights found. Please try a different search.";

/// Why a finished search has no flights to show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmptyReason {
    /// Well-formed response with an empty or missing flight list
    NoFlights,
    /// The API reported `context.status == "failure"`
    ExplicitFailure { total_results: Option<Value> },
    /// Resolution, transport or input failure
    Error { message: String },
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoFlights => write!(f, "{}", NO_FLIGHTS_MESSAGE),
            EmptyReason::ExplicitFailure { total_results } => {
                let total = match total_results {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "unknown".to_string(),
                };
                write!(f, "No flights found. Total Results: {}", total)
            }
            EmptyReason::Error { message } if message.trim().is_empty() => write!(f, "{}", GENERIC_ERROR_MESSAGE),
            EmptyReason::Error { message } => write!(f, "{}", message),
        }
    }
}

/// State of the current (or last) search submission
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchOutcome {
    /// Nothing submitted yet
    #[default]
    Idle,
    Loading,
    /// Flights exactly as returned by the API, in original order
    Flights(Vec<Value>),
    Empty(EmptyReason),
}

impl SearchOutcome {
    pub fn is_loading(&self) -> bool {
        matches!(self, SearchOutcome::Loading)
    }

    pub fn flights(&self) -> &[Value] {
        match self {
            SearchOutcome::Flights(flights) => flights,
            _ => &[],
        }
    }

    /// The single message line shown instead of flight cards, if any
    pub fn message(&self) -> String {
        match self {
            SearchOutcome::Idle => IDLE_MESSAGE.to_string(),
            SearchOutcome::Loading => "Searching…".to_string(),
            SearchOutcome::Flights(flights) => format!("Found {} flights", flights.len()),
            SearchOutcome::Empty(reason) => reason.to_string(),
        }
    }

    fn from_error(err: &FlightError) -> Self {
        SearchOutcome::Empty(EmptyReason::Error { message: err.to_string() })
    }
}

/// Classify a flight search payload.
///
/// An explicit failure marker takes precedence over any flight list.
pub fn classify_payload(payload: &Value) -> SearchOutcome {
    let status = payload.pointer("/data/context/status").and_then(Value::as_str);
    if status == Some("failure") {
        let total_results = payload.pointer("/data/context/totalResults").cloned();
        debug!(total_results = ?total_results, "API reported failure status");
        return SearchOutcome::Empty(EmptyReason::ExplicitFailure { total_results });
    }

    let flights = payload
        .pointer("/data/flights")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    debug!(flights_found = flights.len(), "Classified flight payload");
    if flights.is_empty() {
        SearchOutcome::Empty(EmptyReason::NoFlights)
    } else {
        SearchOutcome::Flights(flights)
    }
}

/// Sequences place resolution and the flight query for one submission at a time.
///
/// A submission made while another is in flight is rejected with
/// [`FlightError::SearchInProgress`].
pub struct SearchOrchestrator {
    client: Arc<SkyClient>,
    in_flight: AtomicBool,
    outcome_tx: watch::Sender<SearchOutcome>,
}

/// Clears the in-flight flag when the search finishes or its future is dropped.
struct InFlightGuard<'a> {
    orchestrator: &'a SearchOrchestrator,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Dropped mid-search: nothing final was published
        self.orchestrator.outcome_tx.send_if_modified(|outcome| {
            if outcome.is_loading() {
                *outcome = SearchOutcome::Idle;
                true
            } else {
                false
            }
        });
        self.orchestrator.in_flight.store(false, Ordering::Release);
    }
}

impl SearchOrchestrator {
    pub fn new(client: SkyClient) -> Self {
        Self::with_shared_client(Arc::new(client))
    }

    /// Build an orchestrator over a client shared with other orchestrators.
    ///
    /// Each orchestrator guards only its own submissions.
    pub fn with_shared_client(client: Arc<SkyClient>) -> Self {
        let (outcome_tx, _) = watch::channel(SearchOutcome::Idle);
        Self {
            client,
            in_flight: AtomicBool::new(false),
            outcome_tx,
        }
    }

    pub fn client(&self) -> &SkyClient {
        &self.client
    }

    /// Receive every published outcome, starting from the current one
    pub fn subscribe(&self) -> watch::Receiver<SearchOutcome> {
        self.outcome_tx.subscribe()
    }

    pub fn current_outcome(&self) -> SearchOutcome {
        self.outcome_tx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one search submission to completion.
    ///
    /// Failures while resolving or querying become an empty outcome carrying the
    /// error message; only a rejected re-submission returns `Err`.
    #[instrument(level = "info", skip(self, submission), fields(
        origin = %submission.origin,
        destination = %submission.destination,
    ))]
    pub async fn run_search(&self, submission: SearchSubmission) -> Result<SearchOutcome, FlightError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Search submitted while another is in flight, ignoring");
            return Err(FlightError::SearchInProgress);
        }
        let _guard = InFlightGuard { orchestrator: self };

        self.outcome_tx.send_replace(SearchOutcome::Loading);

        let outcome = match self.execute(&submission).await {
            Ok(payload) => classify_payload(&payload),
            Err(e) => {
                warn!(error = %e, "Flight search failed");
                SearchOutcome::from_error(&e)
            }
        };

        info!(
            flights_found = outcome.flights().len(),
            message = %outcome.message(),
            "Search finished"
        );
        self.outcome_tx.send_replace(outcome.clone());
        Ok(outcome)
    }

    async fn execute(&self, submission: &SearchSubmission) -> Result<Value, FlightError> {
        let (departure_date, return_date) = submission.parse_dates()?;

        let origin = self.client.resolve_place(&submission.origin).await?;
        let destination = self.client.resolve_place(&submission.destination).await?;

        let criteria = SearchCriteria {
            origin,
            destination,
            departure_date,
            return_date,
        };

        self.client.search_flights(&criteria).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiConfig;
    use serde_json::json;

    #[test]
    fn test_explicit_failure_reports_total() {
        let payload = json!({ "data": { "context": { "status": "failure", "totalResults": 0 } } });
        let outcome = classify_payload(&payload);

        assert_eq!(
            outcome,
            SearchOutcome::Empty(EmptyReason::ExplicitFailure { total_results: Some(json!(0)) })
        );
        assert!(outcome.message().contains('0'));
        assert_eq!(outcome.message(), "No flights found. Total Results: 0");
    }

    #[test]
    fn test_explicit_failure_wins_over_flights() {
        let payload = json!({
            "data": {
                "context": { "status": "failure", "totalResults": 2 },
                "flights": [{ "airline": "Emirates" }]
            }
        });
        assert!(matches!(
            classify_payload(&payload),
            SearchOutcome::Empty(EmptyReason::ExplicitFailure { .. })
        ));
    }

    #[test]
    fn test_explicit_failure_without_total() {
        let payload = json!({ "data": { "context": { "status": "failure" } } });
        assert_eq!(classify_payload(&payload).message(), "No flights found. Total Results: unknown");
    }

    #[test]
    fn test_flights_passed_through_in_order() {
        let flights = vec![
            json!({ "airline": "Emirates", "flightNumber": "EK1", "price": 650, "extra": { "stops": 0 } }),
            json!({ "airline": "British Airways", "flightNumber": "BA106", "price": "$712" }),
            json!({ "airline": "Virgin", "flightNumber": "VS401" }),
        ];
        let payload = json!({ "data": { "context": { "status": "complete" }, "flights": flights.clone() } });

        assert_eq!(classify_payload(&payload), SearchOutcome::Flights(flights));
    }

    #[test]
    fn test_missing_flights_is_empty() {
        for payload in [json!({}), json!({ "data": {} }), json!({ "data": { "flights": null } }), json!(null)] {
            let outcome = classify_payload(&payload);
            assert_eq!(outcome, SearchOutcome::Empty(EmptyReason::NoFlights));
            assert_eq!(outcome.message(), NO_FLIGHTS_MESSAGE);
        }
    }

    #[test]
    fn test_empty_flight_list() {
        let payload = json!({ "data": { "flights": [] } });
        assert_eq!(classify_payload(&payload), SearchOutcome::Empty(EmptyReason::NoFlights));
    }

    #[test]
    fn test_error_message_fallback() {
        let reason = EmptyReason::Error { message: String::new() };
        assert_eq!(reason.to_string(), GENERIC_ERROR_MESSAGE);

        let outcome = SearchOutcome::from_error(&FlightError::AirportNotFound("Atlantis".into()));
        assert_eq!(outcome.message(), "No airport found for \"Atlantis\"");
    }

    #[tokio::test]
    async fn test_invalid_date_fails_without_loading() {
        // Never reaches the network: the date is rejected first
        let config = ApiConfig::new("key", "sky-scrapper.p.rapidapi.com")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let orchestrator = SearchOrchestrator::new(SkyClient::new(config).unwrap());

        let outcome = orchestrator
            .run_search(SearchSubmission::new("Dubai", "London", "June 1st"))
            .await
            .unwrap();

        assert!(matches!(outcome, SearchOutcome::Empty(EmptyReason::Error { .. })));
        assert!(outcome.message().starts_with("Invalid date format"));
        assert!(!orchestrator.is_loading());
        assert_eq!(orchestrator.current_outcome(), outcome);
    }

    #[tokio::test]
    async fn test_dropped_search_clears_loading() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
            .mount(&server)
            .await;

        let config = ApiConfig::new("key", "sky-scrapper.p.rapidapi.com")
            .unwrap()
            .with_base_url(server.uri());
        let orchestrator = SearchOrchestrator::new(SkyClient::new(config).unwrap());

        {
            let search = orchestrator.run_search(SearchSubmission::new("Dubai", "London", "2025-06-01"));
            tokio::pin!(search);
            let timed_out = tokio::time::timeout(std::time::Duration::from_millis(100), &mut search).await;
            assert!(timed_out.is_err());
            assert!(orchestrator.is_loading());
            assert!(orchestrator.current_outcome().is_loading());
        }

        assert!(!orchestrator.is_loading());
        assert_eq!(orchestrator.current_outcome(), SearchOutcome::Idle);
    }
}
