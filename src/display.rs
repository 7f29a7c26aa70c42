//! Flight card rendering for terminal and tool output

use serde::Serialize;
use serde_json::Value;
use std::fmt;

const MISSING: &str = "N/A";

/// Display projection of one flight from the search payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightCard {
    pub airline: String,
    pub flight_number: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub price: String,
}

impl FlightCard {
    pub fn from_value(flight: &Value) -> Self {
        Self {
            airline: field_text(flight, "airline"),
            flight_number: field_text(flight, "flightNumber"),
            departure_time: field_text(flight, "departureTime"),
            arrival_time: field_text(flight, "arrivalTime"),
            price: price_text(flight.get("price")),
        }
    }
}

impl fmt::Display for FlightCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.airline, self.flight_number)?;
        writeln!(f, "Departure: {} | Arrival: {}", self.departure_time, self.arrival_time)?;
        write!(f, "Price: {}", self.price)
    }
}

fn field_text(flight: &Value, key: &str) -> String {
    match flight.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => MISSING.to_string(),
        Some(other) => other.to_string(),
    }
}

// Prices are sometimes objects like {"raw": 650.5, "formatted": "$651"}
fn price_text(price: Option<&Value>) -> String {
    match price {
        Some(Value::Object(obj)) => obj
            .get("formatted")
            .or_else(|| obj.get("raw"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| MISSING.to_string()),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => MISSING.to_string(),
        Some(other) => other.to_string(),
    }
}
