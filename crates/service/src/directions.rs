//! Directions provider: the external routing service and its client.

use std::time::Duration;

use async_trait::async_trait;
use common::types::GeoPoint;
use configs::RoutingConfig;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::RouteData;
use crate::errors::ServiceError;
use crate::metrics;

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Route between two points. Network and upstream failures surface as
    /// `TransientDependency`.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteData, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
    geometry: String,
}

fn route_from_response(resp: OsrmResponse) -> Result<RouteData, ServiceError> {
    if resp.code != "Ok" {
        return Err(ServiceError::TransientDependency(format!(
            "directions provider answered {}: {}",
            resp.code,
            resp.message.unwrap_or_default()
        )));
    }
    let route = resp
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::TransientDependency("directions provider returned no route".into()))?;
    Ok(RouteData {
        distance_km: route.distance / 1000.0,
        duration_min: route.duration / 60.0,
        polyline: route.geometry,
    })
}

/// ~1 m of precision; requests closer than that share a cache entry.
type CacheKey = (i64, i64, i64, i64);

fn cache_key(from: GeoPoint, to: GeoPoint) -> CacheKey {
    let q = |v: f64| (v * 1e5).round() as i64;
    (q(from.lon), q(from.lat), q(to.lon), q(to.lat))
}

/// Client for an OSRM-compatible `route/v1` endpoint.
#[derive(Clone)]
pub struct OsrmDirections {
    http: Client,
    base_url: String,
    profile: String,
    cache: Cache<CacheKey, RouteData>,
}

impl OsrmDirections {
    pub fn new(cfg: &RoutingConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::TransientDependency(e.to_string()))?;
        let cache = Cache::builder()
            .max_capacity(cfg.cache_capacity)
            .time_to_live(Duration::from_secs(cfg.cache_ttl_secs))
            .build();
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            profile: cfg.profile.clone(),
            cache,
        })
    }

    fn url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=polyline",
            self.base_url, self.profile, from.lon, from.lat, to.lon, to.lat
        )
    }
}

#[async_trait]
impl DirectionsProvider for OsrmDirections {
    #[instrument(skip(self))]
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteData, ServiceError> {
        let key = cache_key(from, to);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("directions cache hit");
            return Ok(hit);
        }
        metrics::DIRECTIONS_REQUESTS_TOTAL.inc();
        let resp = self
            .http
            .get(self.url(from, to))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                metrics::DIRECTIONS_ERRORS_TOTAL.inc();
                ServiceError::TransientDependency(e.to_string())
            })?;
        let body: OsrmResponse = resp.json().await.map_err(|e| {
            metrics::DIRECTIONS_ERRORS_TOTAL.inc();
            ServiceError::TransientDependency(e.to_string())
        })?;
        let route = route_from_response(body)?;
        self.cache.insert(key, route.clone()).await;
        Ok(route)
    }
}

/// Scripted provider for tests and benches.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct StaticDirections {
        route: Option<RouteData>,
        calls: AtomicUsize,
    }

    impl StaticDirections {
        pub fn returning(route: RouteData) -> Self { Self { route: Some(route), calls: AtomicUsize::new(0) } }

        /// A provider that is always unreachable.
        pub fn failing() -> Self { Self { route: None, calls: AtomicUsize::new(0) } }

        pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl DirectionsProvider for StaticDirections {
        async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteData, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.route
                .clone()
                .ok_or_else(|| ServiceError::TransientDependency("directions provider unreachable".into()))
        }
    }
}
