// src/mcp_server.rs

use rmcp::{
    ServerHandler, ServiceExt,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
};
use sky_flights::{
    ApiConfig, FlightCard, SearchOrchestrator, SearchOutcome, SearchSubmission, SkyClient,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, error, debug};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_MAX_FLIGHTS: usize = 30;

/// Flight search MCP server
///
/// Tool calls are independent requests, so each search gets its own
/// orchestrator over the shared HTTP client.
#[derive(Clone)]
pub struct FlightServer {
    client: Arc<SkyClient>,
}

impl FlightServer {
    pub fn new(client: SkyClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "sky-flights-mcp.log");

        // stdout carries the protocol, so everything goes to the file
        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"))
                    .add_directive("sky_flights=debug".parse()?)
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
            )
            .init();

        info!("Logging initialized - logs will be written to logs/sky-flights-mcp.log.*");
        Ok(())
    }
}

/// Flight search parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FlightSearchParams {
    #[schemars(description = "Origin city or airport name (e.g., Dubai)")]
    pub origin: String,
    #[schemars(description = "Destination city or airport name (e.g., London)")]
    pub destination: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub departure_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format for round trips")]
    pub return_date: Option<String>,
    #[schemars(description = "Maximum number of flights to return (default: 30)")]
    pub max_flights: Option<usize>,
}

/// Airport lookup parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct AirportLookupParams {
    #[schemars(description = "City or airport name to resolve (e.g., New York)")]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct FlightSearchResult {
    pub total_flights: usize,
    pub cards: Vec<FlightCard>,
    pub flights: Vec<Value>,
}

#[tool(tool_box)]
impl FlightServer {
    /// Search flights between two places
    #[tool(description = "Search for flights between two cities or airports. Place names are resolved to Sky identifiers automatically; the first match is used.")]
    async fn search_flights(
        &self,
        #[tool(aggr)] params: FlightSearchParams,
    ) -> String {
        let max_flights = params.max_flights.unwrap_or(DEFAULT_MAX_FLIGHTS);

        info!(
            origin = params.origin,
            destination = params.destination,
            departure_date = params.departure_date,
            return_date = params.return_date.as_deref(),
            max_flights,
            "Flight search request received"
        );

        let submission = SearchSubmission {
            origin: params.origin,
            destination: params.destination,
            departure_date: params.departure_date,
            return_date: params.return_date,
        };

        let orchestrator = SearchOrchestrator::with_shared_client(Arc::clone(&self.client));
        match orchestrator.run_search(submission).await {
            Ok(outcome) => format_outcome_json(outcome, max_flights),
            Err(e) => {
                error!("Flight search failed: {}", e);
                serde_json::json!({ "error": format!("Flight search failed: {}", e) }).to_string()
            }
        }
    }

    /// Resolve a place name to its identifier pair
    #[tool(description = "Resolve a city or airport name to its Sky identifiers (sky_id and entity_id). Returns the first match.")]
    async fn resolve_airport(
        &self,
        #[tool(aggr)] params: AirportLookupParams,
    ) -> String {
        info!(query = params.query, "Airport lookup request received");

        match self.client.resolve_place(&params.query).await {
            Ok(place) => {
                debug!(sky_id = %place.sky_id, entity_id = %place.entity_id, "Airport resolved");
                serde_json::to_string_pretty(&place).unwrap_or_else(|e| {
                    serde_json::json!({ "error": format!("Failed to serialize place: {}", e) }).to_string()
                })
            }
            Err(e) => {
                warn!(error = %e, "Airport lookup failed");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

fn format_outcome_json(outcome: SearchOutcome, max_flights: usize) -> String {
    let flights: Vec<Value> = match outcome {
        SearchOutcome::Flights(flights) => flights.into_iter().take(max_flights).collect(),
        other => {
            return serde_json::json!({
                "total_flights": 0,
                "cards": [],
                "flights": [],
                "message": other.message()
            }).to_string();
        }
    };

    let search_result = FlightSearchResult {
        total_flights: flights.len(),
        cards: flights.iter().map(FlightCard::from_value).collect(),
        flights,
    };

    serde_json::to_string_pretty(&search_result).unwrap_or_else(|e| {
        serde_json::json!({ "error": format!("Failed to serialize results: {}", e) }).to_string()
    })
}

#[tool(tool_box)]
impl ServerHandler for FlightServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A flight search server over the Sky-Scrapper API. search_flights resolves origin and destination names and returns matching flights; resolve_airport returns the Sky identifiers for a single place.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = FlightServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without logging rather than failing
    }

    info!("Starting MCP Flight Server");

    let config = ApiConfig::load()?;
    let server = FlightServer::new(SkyClient::new(config)?);
    let transport = stdio();

    // SDK handles initialization, tool discovery, and message routing
    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sky_flights::EmptyReason;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_airport(server: &MockServer, query: &str, sky_id: &str, entity_id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v1/flights/searchAirport"))
            .and(query_param("query", query))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [{ "skyId": sky_id, "entityId": entity_id }] })),
            )
            .mount(server)
            .await;
    }

    fn params(origin: &str, destination: &str) -> FlightSearchParams {
        FlightSearchParams {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: "2025-06-01".to_string(),
            return_date: None,
            max_flights: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_searches_both_succeed() {
        let server = MockServer::start().await;
        mount_airport(&server, "Dubai", "DXB", "123").await;
        mount_airport(&server, "Paris", "CDG", "789").await;
        mount_airport(&server, "London", "LHR", "456").await;
        Mock::given(method("GET"))
            .and(path("/api/v1/flights/searchFlights"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "flights": [{ "airline": "Emirates", "flightNumber": "EK1" }] } }))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let config = ApiConfig::new("test-key", "sky-scrapper.p.rapidapi.com")
            .unwrap()
            .with_base_url(server.uri());
        let flight_server = FlightServer::new(SkyClient::new(config).unwrap());

        let (first, second) = tokio::join!(
            flight_server.search_flights(params("Dubai", "London")),
            flight_server.search_flights(params("Paris", "London")),
        );

        for reply in [first, second] {
            let reply: Value = serde_json::from_str(&reply).unwrap();
            assert!(reply.get("error").is_none(), "unexpected error reply: {}", reply);
            assert_eq!(reply["total_flights"], 1);
        }
    }

    #[test]
    fn test_format_outcome_limits_flights() {
        let flights = (0..5).map(|i| json!({ "airline": "Emirates", "flightNumber": format!("EK{}", i) })).collect();
        let formatted: Value = serde_json::from_str(&format_outcome_json(SearchOutcome::Flights(flights), 2)).unwrap();

        assert_eq!(formatted["total_flights"], 2);
        assert_eq!(formatted["flights"][1]["flightNumber"], "EK1");
        assert_eq!(formatted["cards"][0]["flight_number"], "EK0");
    }

    #[test]
    fn test_format_outcome_empty_message() {
        let outcome = SearchOutcome::Empty(EmptyReason::ExplicitFailure { total_results: Some(json!(0)) });
        let formatted: Value = serde_json::from_str(&format_outcome_json(outcome, 30)).unwrap();

        assert_eq!(formatted["total_flights"], 0);
        assert_eq!(formatted["message"], "No flights found. Total Results: 0");
    }
}
