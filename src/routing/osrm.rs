use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::trip::Route;
use crate::routing::RouteOracle;

pub struct OsrmRouteOracle {
    client: Client,
    base_url: String,
}

impl OsrmRouteOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, origin: &GeoPoint, destination: &GeoPoint) -> String {
        // OSRM takes lng,lat pairs.
        format!(
            "{}/{},{};{},{}?overview=full&geometries=polyline6",
            self.base_url, origin.lng, origin.lat, destination.lng, destination.lat
        )
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: Option<String>,
}

#[async_trait]
impl RouteOracle for OsrmRouteOracle {
    async fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, AppError> {
        let response = self
            .client
            .get(self.url(&origin, &destination))
            .send()
            .await
            .map_err(|err| AppError::RoutingUnavailable(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::RoutingUnavailable(format!(
                "routing backend returned {}",
                response.status()
            )));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| AppError::RoutingUnavailable(format!("invalid response: {err}")))?;

        if body.code != "Ok" {
            return Err(AppError::RoutingUnavailable(format!(
                "routing backend answered {}",
                body.code
            )));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::RoutingUnavailable("no route found".to_string()))?;

        Ok(Route {
            distance_meters: route.distance,
            duration_seconds: route.duration,
            geometry: route.geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::OsrmRouteOracle;
    use crate::geo::GeoPoint;

    #[test]
    fn url_uses_lng_lat_order_and_polyline6() {
        let oracle = OsrmRouteOracle::new("http://osrm.local/route/v1/driving/", Duration::from_secs(1))
            .unwrap();
        let url = oracle.url(
            &GeoPoint::new(37.7749, -122.4194),
            &GeoPoint::new(37.784, -122.409),
        );

        assert_eq!(
            url,
            "http://osrm.local/route/v1/driving/-122.4194,37.7749;-122.409,37.784?overview=full&geometries=polyline6"
        );
    }
}
