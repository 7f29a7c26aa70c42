//! HTTP client for the Sky-Scrapper airport and flight endpoints

use crate::{ApiConfig, FlightError, ResolvedPlace, SearchCriteria};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

const AIRPORT_SEARCH_PATH: &str = "/api/v1/flights/searchAirport";
const FLIGHT_SEARCH_PATH: &str = "/api/v1/flights/searchFlights";

const RAPIDAPI_KEY_HEADER: &str = "X-RapidAPI-Key";
const RAPIDAPI_HOST_HEADER: &str = "X-RapidAPI-Host";

// Fixed search defaults, not exposed to callers
pub const DEFAULT_ADULTS: u32 = 1;
pub const DEFAULT_CABIN_CLASS: &str = "economy";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_MARKET: &str = "en-US";
pub const DEFAULT_COUNTRY_CODE: &str = "US";

/// Client for the airport lookup and flight search endpoints
pub struct SkyClient {
    http_client: Client,
    config: ApiConfig,
}

impl SkyClient {
    /// Create a new client from the given configuration
    pub fn new(config: ApiConfig) -> Result<Self, FlightError> {
        debug!(base_url = %config.base_url, "Creating new Sky-Scrapper client");
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http_client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        self.http_client
            .get(url)
            .header(RAPIDAPI_KEY_HEADER, self.config.api_key.expose())
            .header(RAPIDAPI_HOST_HEADER, &self.config.api_host)
    }

    async fn fetch_json(&self, request: RequestBuilder, endpoint: &'static str) -> Result<Value, FlightError> {
        let start_time = std::time::Instant::now();
        let response = request.send().await?;
        let status = response.status();

        info!(
            endpoint,
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "HTTP request completed"
        );

        let response = response.error_for_status().map_err(|e| {
            error!(endpoint, status = %status, "HTTP request failed");
            e
        })?;

        let payload: Value = response.json().await?;
        Ok(payload)
    }

    /// Raw airport lookup for a free-text query
    #[instrument(level = "info", skip(self))]
    pub async fn search_airport(&self, query: &str) -> Result<Value, FlightError> {
        let request = self.get(AIRPORT_SEARCH_PATH).query(&[("query", query)]);
        self.fetch_json(request, "searchAirport").await
    }

    /// Resolve a place name to the identifier pair of its first match.
    ///
    /// Later candidates are ignored; there is no disambiguation.
    pub async fn resolve_place(&self, query: &str) -> Result<ResolvedPlace, FlightError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(FlightError::EmptyQuery);
        }

        let payload = self.search_airport(trimmed).await?;
        let place = first_candidate(&payload, query)?;

        info!(query, sky_id = %place.sky_id, entity_id = %place.entity_id, "Resolved place");
        Ok(place)
    }

    /// Query flights for resolved criteria and return the payload unmodified
    #[instrument(level = "info", skip(self, criteria), fields(
        origin = %criteria.origin.sky_id,
        destination = %criteria.destination.sky_id,
        date = %criteria.departure_date,
    ))]
    pub async fn search_flights(&self, criteria: &SearchCriteria) -> Result<Value, FlightError> {
        let params = search_params(criteria);
        debug!(param_count = params.len(), "Built flight search parameters");

        let request = self.get(FLIGHT_SEARCH_PATH).query(&params);
        self.fetch_json(request, "searchFlights").await
    }
}

/// Extract the first candidate's identifier pair from an airport lookup payload.
///
/// `query` is the original user text, carried in the not-found error.
pub fn first_candidate(payload: &Value, query: &str) -> Result<ResolvedPlace, FlightError> {
    let candidates = payload.get("data").and_then(Value::as_array);

    let first = match candidates.and_then(|c| c.first()) {
        Some(first) => first,
        None => {
            warn!(query, "Airport lookup returned no candidates");
            return Err(FlightError::AirportNotFound(query.to_string()));
        }
    };

    let sky_id = first.get("skyId").and_then(id_text).ok_or_else(|| {
        FlightError::InvalidResponse(format!("first airport match for \"{}\" has no skyId", query))
    })?;
    let entity_id = first.get("entityId").and_then(id_text).ok_or_else(|| {
        FlightError::InvalidResponse(format!("first airport match for \"{}\" has no entityId", query))
    })?;

    Ok(ResolvedPlace { sky_id, entity_id })
}

// Identifiers arrive as strings, occasionally as bare numbers
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Query parameters for the flight search endpoint.
///
/// `returnDate` is present only for round trips; the remaining defaults are fixed.
pub fn search_params(criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("originSkyId", criteria.origin.sky_id.clone()),
        ("originEntityId", criteria.origin.entity_id.clone()),
        ("destinationSkyId", criteria.destination.sky_id.clone()),
        ("destinationEntityId", criteria.destination.entity_id.clone()),
        ("date", criteria.departure_date.format("%Y-%m-%d").to_string()),
    ];

    if let Some(return_date) = criteria.return_date {
        params.push(("returnDate", return_date.format("%Y-%m-%d").to_string()));
    }

    params.extend([
        ("adults", DEFAULT_ADULTS.to_string()),
        ("cabinClass", DEFAULT_CABIN_CLASS.to_string()),
        ("currency", DEFAULT_CURRENCY.to_string()),
        ("market", DEFAULT_MARKET.to_string()),
        ("countryCode", DEFAULT_COUNTRY_CODE.to_string()),
    ]);

    params
}
