//! CLI interface for sky-flights

use clap::{Parser, Subcommand};
use sky_flights::{ApiConfig, FlightCard, SearchOrchestrator, SearchOutcome, SearchSubmission, SkyClient};
use serde_json::Value;
use std::fs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sky-flights")]
#[command(about = "Search flights between two places via the Sky-Scrapper API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Origin city or airport (e.g. Dubai)
        #[arg(short, long)]
        origin: String,
        /// Destination city or airport (e.g. London)
        #[arg(short = 't', long)]
        destination: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        departure: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Print the raw flight list as JSON instead of cards
        #[arg(long)]
        json: bool,
        /// Output file for JSON results
        #[arg(long)]
        output: Option<String>,
    },
    /// Resolve a city or airport name to its Sky identifiers
    Airport {
        /// City or airport name
        query: String,
    },
}

fn init_logging() {
    // stdout is reserved for results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Text written to stdout for a populated result: raw JSON or one card per flight
fn render_flights(flights: &[Value], json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(flights);
    }

    let cards: Vec<String> = flights
        .iter()
        .map(|flight| FlightCard::from_value(flight).to_string())
        .collect();
    Ok(cards.join("\n\n"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();
    let client = SkyClient::new(ApiConfig::load()?)?;

    match cli.command {
        Commands::Search {
            origin,
            destination,
            departure,
            return_date,
            json,
            output,
        } => {
            let submission = SearchSubmission {
                origin,
                destination,
                departure_date: departure,
                return_date,
            };

            let orchestrator = SearchOrchestrator::new(client);
            // Progress and summary go to stderr so stdout stays pipeable
            eprintln!("{}", SearchOutcome::Loading.message());

            let outcome = orchestrator.run_search(submission).await?;
            let flights = outcome.flights();
            if flights.is_empty() {
                eprintln!("{}", outcome.message());
                std::process::exit(1);
            }

            if let Some(output_file) = output {
                fs::write(&output_file, serde_json::to_string_pretty(flights)?)?;
                eprintln!("Results saved to {}", output_file);
            }

            println!("{}", render_flights(flights, json)?);
            eprintln!("{}", outcome.message());
        }
        Commands::Airport { query } => match client.resolve_place(&query).await {
            Ok(place) => println!("{} (entity {})", place.sky_id, place.entity_id),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
