// Feed models and data fetching for the Amana transportation dashboard
//
// API Endpoint (default, overridable with --feed-url / ATD_FEED_URL):
// - Bus lines snapshot: https://www.amanabootcamp.org/api/fs-classwork-data/amana-transportation
//
// The feed is a single JSON document shaped as `{ "bus_lines": [...] }`. Every
// record is normalized here, once, so the rest of the application never has to
// deal with missing or mistyped fields.

use crate::atd_config::DashboardConfig;
use log::{debug, info, warn};
use reqwest::blocking;
use reqwest::header::CACHE_CONTROL;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// Data Structures
// ============================================================================

pub type RouteId = i64;

/// Placeholder used for any missing text field.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder used for a missing stop name.
pub const NO_STOP: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` for coordinates outside the WGS84 range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(GeoPoint { latitude, longitude })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub point: GeoPoint,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Passengers {
    pub current: u32,
    pub capacity: u32,
    /// Supplied by the feed, never recomputed.
    pub utilization_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusStop {
    pub id: i64,
    pub name: String,
    pub coordinates: Option<GeoPoint>,
    pub estimated_arrival: String,
    pub is_next_stop: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: i64,
    pub kind: String,
    pub description: String,
    pub reported_by: String,
    pub reported_time: String,
    pub status: String,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleInfo {
    pub model: String,
    pub license_plate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub id: RouteId,
    pub name: String,
    pub route_number: String,
    /// Raw status string as sent by the feed, casing preserved.
    pub status: String,
    pub current_location: Option<Location>,
    pub passengers: Passengers,
    pub bus_stops: Vec<BusStop>,
    pub incidents: Vec<Incident>,
    pub driver: Option<Driver>,
    pub vehicle_info: Option<VehicleInfo>,
}

impl RouteRecord {
    pub fn has_incidents(&self) -> bool {
        !self.incidents.is_empty()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.current_location.as_ref().map(|l| l.point)
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, Error)]
pub enum ATDError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API returned error: {0}")]
    Http(reqwest::StatusCode),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ATDError>;

// ============================================================================
// Main Implementation
// ============================================================================

pub struct ATDModels;

impl ATDModels {
    pub const DEFAULT_FEED_URL: &'static str =
        "https://www.amanabootcamp.org/api/fs-classwork-data/amana-transportation";

    /// Fetches the feed once. Any failure degrades to an empty route list.
    pub fn fetch_routes(config: &DashboardConfig) -> Vec<RouteRecord> {
        let routes = Self::routes_or_empty(Self::try_fetch_routes(config));
        info!("Loaded {} bus lines from {}", routes.len(), config.feed_url);
        routes
    }

    fn routes_or_empty(result: Result<Vec<RouteRecord>>) -> Vec<RouteRecord> {
        result.unwrap_or_else(|e| {
            warn!("Feed unavailable, continuing with no routes: {}", e);
            Vec::new()
        })
    }

    pub fn try_fetch_routes(config: &DashboardConfig) -> Result<Vec<RouteRecord>> {
        let mut builder = blocking::Client::builder()
            .user_agent(concat!("ATD/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ATDError::Network(format!("Failed to create HTTP client: {}", e)))?;

        debug!("GET {}", config.feed_url);
        let response = client
            .get(config.feed_url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|e| ATDError::Network(format!("Failed to fetch bus lines: {}. Check your internet connection.", e)))?;

        if !response.status().is_success() {
            return Err(ATDError::Http(response.status()));
        }

        let body = response
            .text()
            .map_err(|e| ATDError::Network(format!("Failed to read response: {}", e)))?;

        Self::parse_feed(&body)
    }

    pub fn parse_feed(body: &str) -> Result<Vec<RouteRecord>> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| ATDError::Parse(format!("Invalid JSON response: {}", e)))?;
        Self::routes_from_json(&json)
    }

    pub fn routes_from_json(json: &Value) -> Result<Vec<RouteRecord>> {
        let lines = json["bus_lines"]
            .as_array()
            .ok_or_else(|| ATDError::Parse("Missing or invalid bus_lines data in API response".to_string()))?;

        let mut seen: HashSet<RouteId> = HashSet::new();
        let mut routes = Vec::with_capacity(lines.len());

        for (index, raw) in lines.iter().enumerate() {
            let Some(route) = Self::parse_route(raw) else {
                warn!("Skipping bus_lines[{}]: not an object with an integer id", index);
                continue;
            };
            if !seen.insert(route.id) {
                warn!("Skipping bus_lines[{}]: duplicate route id {}", index, route.id);
                continue;
            }
            routes.push(route);
        }

        Ok(routes)
    }

    fn parse_route(raw: &Value) -> Option<RouteRecord> {
        let id = Self::route_id(raw.get("id")?)?;

        let current_location = {
            let loc = &raw["current_location"];
            match (loc["latitude"].as_f64(), loc["longitude"].as_f64()) {
                (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).map(|point| Location {
                    point,
                    address: Self::text_or(&loc["address"], NOT_AVAILABLE),
                }),
                _ => None,
            }
        };
        if current_location.is_none() {
            debug!("Route {} has no usable current_location", id);
        }

        let passengers = {
            let p = &raw["passengers"];
            Passengers {
                current: Self::count_or_zero(&p["current"]),
                capacity: Self::count_or_zero(&p["capacity"]),
                utilization_percentage: p["utilization_percentage"]
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0),
            }
        };

        let bus_stops = raw["bus_stops"]
            .as_array()
            .map(|arr| arr.iter().filter(|s| s.is_object()).map(Self::parse_stop).collect())
            .unwrap_or_default();

        let incidents = raw["incidents"]
            .as_array()
            .map(|arr| arr.iter().filter(|i| i.is_object()).map(Self::parse_incident).collect())
            .unwrap_or_default();

        let driver = raw
            .get("driver")
            .filter(|d| d.is_object())
            .map(|d| Driver { name: Self::text_or(&d["name"], NOT_AVAILABLE) });

        let vehicle_info = raw
            .get("vehicle_info")
            .filter(|v| v.is_object())
            .map(|v| VehicleInfo {
                model: Self::text_or(&v["model"], NOT_AVAILABLE),
                license_plate: Self::text_or(&v["license_plate"], NOT_AVAILABLE),
            });

        Some(RouteRecord {
            id,
            name: Self::text_or(&raw["name"], NOT_AVAILABLE),
            route_number: Self::text_or(&raw["route_number"], NOT_AVAILABLE),
            status: Self::text_or(&raw["status"], "unknown"),
            current_location,
            passengers,
            bus_stops,
            incidents,
            driver,
            vehicle_info,
        })
    }

    fn parse_stop(raw: &Value) -> BusStop {
        let coordinates = match (raw["latitude"].as_f64(), raw["longitude"].as_f64()) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
            _ => None,
        };
        BusStop {
            id: raw["id"].as_i64().unwrap_or(0),
            name: Self::text_or(&raw["name"], NO_STOP),
            coordinates,
            estimated_arrival: Self::text_or(&raw["estimated_arrival"], NOT_AVAILABLE),
            is_next_stop: raw["is_next_stop"].as_bool().unwrap_or(false),
        }
    }

    fn parse_incident(raw: &Value) -> Incident {
        Incident {
            id: raw["id"].as_i64().unwrap_or(0),
            kind: Self::text_or(&raw["type"], NOT_AVAILABLE),
            description: Self::text_or(&raw["description"], NOT_AVAILABLE),
            reported_by: Self::text_or(&raw["reported_by"], NOT_AVAILABLE),
            reported_time: Self::text_or(&raw["reported_time"], NOT_AVAILABLE),
            status: Self::text_or(&raw["status"], NOT_AVAILABLE),
            priority: Self::text_or(&raw["priority"], NOT_AVAILABLE),
        }
    }

    /// Strings and numbers are accepted; empty strings count as missing.
    fn text_or(value: &Value, default: &str) -> String {
        match value {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => default.to_string(),
        }
    }

    /// Integer ids, or floats with no fractional part (`2.0`).
    fn route_id(value: &Value) -> Option<RouteId> {
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
                .map(|v| v as RouteId)
        })
    }

    fn count_or_zero(value: &Value) -> u32 {
        if let Some(n) = value.as_u64() {
            return u32::try_from(n).unwrap_or(u32::MAX);
        }
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round().min(u32::MAX as f64) as u32)
            .unwrap_or(0)
    }
}
