//! Road-network distances from an OSRM-compatible routing service.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::model::GeoPoint;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing service answered with status {0}")]
    Status(StatusCode),

    #[error("no route between the points (service code: {0})")]
    NoRoute(String),

    #[error("routing service returned an invalid distance: {0}")]
    InvalidDistance(f64),
}

/// Source of network-path distances in meters.
pub trait RouteProvider {
    fn route_distance(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, OracleError>;
}

fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("load-planner/{version} ({os}; {arch})")
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    distance: f64,
}

impl RouteResponse {
    fn shortest_distance(self) -> Result<f64, OracleError> {
        if self.code != "Ok" {
            return Err(OracleError::NoRoute(self.code));
        }
        let distance = self
            .routes
            .first()
            .map(|r| r.distance)
            .ok_or_else(|| OracleError::NoRoute(self.code.clone()))?;
        if !distance.is_finite() || distance < 0.0 {
            return Err(OracleError::InvalidDistance(distance));
        }
        Ok(distance)
    }
}

/// Blocking client for the OSRM `route` service.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// OSRM expects `lon,lat` pairs.
    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url, from.lon, from.lat, to.lon, to.lat
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route_distance(&self, from: GeoPoint, to: GeoPoint) -> Result<f64, OracleError> {
        let response = self.client.get(self.route_url(from, to)).send()?;
        let status = response.status();
        // OSRM reports unroutable pairs as 400 with a JSON body.
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            return Err(OracleError::Status(status));
        }
        response.json::<RouteResponse>()?.shortest_distance()
    }
}
