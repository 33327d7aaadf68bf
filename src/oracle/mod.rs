//! Distance oracle.
//!
//! Travel cost between two coordinates in meters. Lookups go to a routing
//! service when one is configured and fall back to the great-circle distance
//! on any failure. Routed distances are kept in a persistent cache; fallback
//! values are only memoized for the current process.

pub mod cache;
pub mod route;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::model::GeoPoint;

pub use self::cache::{CacheError, DistanceCache, cache_key};
pub use self::route::{OracleError, OsrmClient, RouteProvider};

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Cost of moving goods between two coordinates.
pub trait TravelCost {
    fn distance(&self, from: GeoPoint, to: GeoPoint) -> f64;
}

/// Great-circle distance in meters.
pub fn haversine_m(from: GeoPoint, to: GeoPoint) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.lon - from.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Straight-line cost without any lookups.
#[derive(Clone, Copy, Debug, Default)]
pub struct Haversine;

impl TravelCost for Haversine {
    fn distance(&self, from: GeoPoint, to: GeoPoint) -> f64 {
        haversine_m(from, to)
    }
}

/// Cached, routing-backed travel cost.
pub struct DistanceOracle<P = OsrmClient> {
    provider: Option<P>,
    cache: Mutex<DistanceCache>,
    memo: Mutex<HashMap<String, f64>>,
    symmetric: bool,
}

impl DistanceOracle<OsrmClient> {
    /// Builds the oracle described by the configuration.
    ///
    /// An unreadable cache file or an unusable routing URL degrade the oracle
    /// (in-memory cache, geodesic distances) instead of failing.
    pub fn from_config(config: &OracleConfig) -> Self {
        let cache = match DistanceCache::open(&config.cache_path) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(
                    path = %config.cache_path.display(),
                    error = %err,
                    "distance cache unusable, continuing without persistence"
                );
                DistanceCache::in_memory()
            }
        };

        let provider = config.routing_url.as_deref().and_then(|url| {
            match OsrmClient::new(url, config.routing_timeout) {
                Ok(client) => Some(client),
                Err(err) => {
                    warn!(url, error = %err, "routing client unavailable, using geodesic distances");
                    None
                }
            }
        });

        Self::new(provider, cache, config.symmetric)
    }
}

impl<P: RouteProvider> DistanceOracle<P> {
    pub fn new(provider: Option<P>, cache: DistanceCache, symmetric: bool) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
            memo: Mutex::new(HashMap::new()),
            symmetric,
        }
    }

    fn lookup(&self, key: &str) -> Option<f64> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Some(hit);
        }
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn remember(&self, key: String, distance: f64) {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, distance);
    }
}

impl<P: RouteProvider> TravelCost for DistanceOracle<P> {
    fn distance(&self, from: GeoPoint, to: GeoPoint) -> f64 {
        let key = cache_key(from, to, self.symmetric);
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        let Some(provider) = self.provider.as_ref() else {
            let distance = haversine_m(from, to);
            self.remember(key, distance);
            return distance;
        };

        match provider.route_distance(from, to) {
            Ok(distance) => {
                debug!(%key, distance, "routed distance");
                let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(err) = cache.insert(key, distance) {
                    warn!(error = %err, "could not persist distance cache");
                }
                distance
            }
            Err(err) => {
                let distance = haversine_m(from, to);
                warn!(%key, error = %err, distance, "routing failed, falling back to geodesic distance");
                self.remember(key, distance);
                distance
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    struct FixedRoute {
        distance: Option<f64>,
        calls: Cell<u32>,
    }

    impl FixedRoute {
        fn new(distance: Option<f64>) -> Self {
            Self {
                distance,
                calls: Cell::new(0),
            }
        }
    }

    impl RouteProvider for FixedRoute {
        fn route_distance(&self, _: GeoPoint, _: GeoPoint) -> Result<f64, OracleError> {
            self.calls.set(self.calls.get() + 1);
            self.distance
                .ok_or_else(|| OracleError::NoRoute("NoRoute".to_string()))
        }
    }

    #[test]
    fn test_haversine_matches_known_distance() {
        // Paris to London, roughly 343.5 km.
        let d = haversine_m(point(48.8566, 2.3522), point(51.5074, -0.1278));
        assert!((d - 343_500.0).abs() < 1_000.0, "got {d}");
        assert_eq!(haversine_m(point(10.0, 10.0), point(10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_routed_distances_are_cached_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (a, b) = (point(28.45, 77.02), point(28.70, 77.10));

        let oracle = DistanceOracle::new(
            Some(FixedRoute::new(Some(31_000.0))),
            DistanceCache::open(&path).unwrap(),
            true,
        );
        assert_eq!(oracle.distance(a, b), 31_000.0);
        assert_eq!(oracle.distance(b, a), 31_000.0);
        assert_eq!(oracle.provider.as_ref().unwrap().calls.get(), 1);

        let restarted = DistanceOracle::new(
            Some(FixedRoute::new(Some(99.0))),
            DistanceCache::open(&path).unwrap(),
            true,
        );
        assert_eq!(restarted.distance(a, b), 31_000.0);
        assert_eq!(restarted.provider.as_ref().unwrap().calls.get(), 0);
    }

    #[test]
    fn test_failed_lookup_falls_back_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (a, b) = (point(28.45, 77.02), point(28.70, 77.10));

        let oracle = DistanceOracle::new(
            Some(FixedRoute::new(None)),
            DistanceCache::open(&path).unwrap(),
            true,
        );
        let d = oracle.distance(a, b);
        assert!((d - haversine_m(a, b)).abs() < 1e-9);
        oracle.distance(a, b);
        assert_eq!(oracle.provider.as_ref().unwrap().calls.get(), 1);
        assert!(DistanceCache::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_asymmetric_oracle_keeps_directions_apart() {
        let (a, b) = (point(1.0, 1.0), point(2.0, 2.0));
        let oracle = DistanceOracle::new(
            Some(FixedRoute::new(Some(5.0))),
            DistanceCache::in_memory(),
            false,
        );
        oracle.distance(a, b);
        oracle.distance(b, a);
        assert_eq!(oracle.provider.as_ref().unwrap().calls.get(), 2);
    }

    #[test]
    fn test_without_provider_uses_geodesic() {
        let oracle: DistanceOracle = DistanceOracle::new(None, DistanceCache::in_memory(), true);
        let (a, b) = (point(0.0, 0.0), point(0.0, 1.0));
        assert!((oracle.distance(a, b) - Haversine.distance(a, b)).abs() < 1e-9);
    }
}
