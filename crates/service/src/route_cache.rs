//! Route reuse between rides with matching endpoints.

use std::sync::Arc;

use common::types::GeoPoint;
use common::utils::geo::haversine_km;
use tracing::{debug, instrument, warn};

use crate::directions::DirectionsProvider;
use crate::domain::RouteData;
use crate::errors::ServiceError;
use crate::metrics;
use crate::store::RideStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    /// Copied from a stored ride with nearby endpoints.
    Reused,
    Provider,
    /// Great-circle distance; the provider was unavailable.
    Estimate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// Route to persist on the ride; `None` for estimates.
    pub route: Option<RouteData>,
    pub distance_km: f64,
    pub source: RouteSource,
}

pub struct RouteLookup<S: RideStore> {
    store: Arc<S>,
    provider: Arc<dyn DirectionsProvider>,
    tolerance_m: f64,
}

impl<S: RideStore> RouteLookup<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn DirectionsProvider>, tolerance_m: f64) -> Self {
        Self { store, provider, tolerance_m }
    }

    /// Most recent stored route whose endpoints both lie within the
    /// tolerance. `None` when nothing matches.
    pub async fn lookup(&self, departure: GeoPoint, arrival: GeoPoint) -> Result<Option<RouteData>, ServiceError> {
        self.store.latest_route_near(departure, arrival, self.tolerance_m).await
    }

    /// Reused route, else a fresh provider route, else a great-circle
    /// estimate when the provider fails transiently.
    #[instrument(skip(self))]
    pub async fn resolve(&self, departure: GeoPoint, arrival: GeoPoint) -> Result<ResolvedRoute, ServiceError> {
        if let Some(route) = self.lookup(departure, arrival).await? {
            metrics::ROUTE_CACHE_HITS_TOTAL.inc();
            debug!(distance_km = route.distance_km, "route reused");
            return Ok(ResolvedRoute { distance_km: route.distance_km, route: Some(route), source: RouteSource::Reused });
        }
        match self.provider.route(departure, arrival).await {
            Ok(route) => Ok(ResolvedRoute { distance_km: route.distance_km, route: Some(route), source: RouteSource::Provider }),
            Err(ServiceError::TransientDependency(reason)) => {
                metrics::ROUTE_ESTIMATES_TOTAL.inc();
                warn!(%reason, "directions unavailable, using great-circle estimate");
                Ok(ResolvedRoute { route: None, distance_km: haversine_km(departure, arrival), source: RouteSource::Estimate })
            }
            Err(e) => Err(e),
        }
    }
}
