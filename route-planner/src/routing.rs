//! Pedestrian routing through a Valhalla server. Only the shape of the first leg is used.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use route_planner_model::polyline::{self, ROUTING_PRECISION};
use route_planner_model::GeoCoordinate;

use crate::{PlannerError, Result};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RouteRequest {
    pub locations: Vec<Location>,
    pub costing: String,
    pub directions_type: String,
    pub radius: u32,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct RouteReply {
    pub trip: Option<Trip>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Trip {
    #[serde(default)]
    pub legs: Vec<Leg>,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Leg {
    pub shape: String,
}

impl RouteRequest {
    pub fn pedestrian(from: GeoCoordinate, to: GeoCoordinate, radius: u32) -> RouteRequest {
        RouteRequest {
            locations: vec![
                Location {
                    lat: from.lat,
                    lon: from.lon,
                },
                Location {
                    lat: to.lat,
                    lon: to.lon,
                },
            ],
            costing: "pedestrian".to_string(),
            directions_type: "none".to_string(),
            radius,
        }
    }
}

impl RouteReply {
    /// Decodes the first leg into WGS84 points.
    pub fn shape(&self) -> Result<Vec<GeoCoordinate>> {
        let leg = self
            .trip
            .as_ref()
            .and_then(|trip| trip.legs.first())
            .ok_or_else(|| PlannerError::Routing("reply has no legs".to_string()))?;
        let pts = polyline::decode(&leg.shape, ROUTING_PRECISION)
            .map_err(|err| PlannerError::Routing(err.to_string()))?;
        Ok(pts
            .into_iter()
            .map(|[lat, lon]| GeoCoordinate::new(lat, lon))
            .collect())
    }
}

#[async_trait(?Send)]
pub trait RoutingService {
    async fn route(&self, request: RouteRequest) -> Result<RouteReply>;
}

pub struct ValhallaClient {
    client: reqwest::Client,
    base_url: String,
}

impl ValhallaClient {
    pub fn new(base_url: &str) -> ValhallaClient {
        ValhallaClient {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// The whole request travels URL-encoded in the `json` query parameter.
    pub fn request_url(&self, request: &RouteRequest) -> Result<Url> {
        let base = format!("{}/route", self.base_url.trim_end_matches('/'));
        let json = serde_json::to_string(request)?;
        Url::parse_with_params(&base, &[("json", json)])
            .map_err(|err| PlannerError::Routing(format!("bad routing URL {base}: {err}")))
    }
}

#[async_trait(?Send)]
impl RoutingService for ValhallaClient {
    async fn route(&self, request: RouteRequest) -> Result<RouteReply> {
        let url = self.request_url(&request)?;
        debug!("Routing {:?}", request.locations);
        let reply = self
            .client
            .post(url)
            .send()
            .await?
            .json::<RouteReply>()
            .await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_url_encoded_json() {
        let client = ValhallaClient::new("http://localhost:8002/");
        let request = RouteRequest::pedestrian(
            GeoCoordinate::new(46.95, 7.44),
            GeoCoordinate::new(46.96, 7.45),
            25,
        );
        let url = client.request_url(&request).unwrap();
        assert_eq!(url.path(), "/route");

        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "json");
        let decoded: RouteRequest = serde_json::from_str(&value).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.costing, "pedestrian");
    }

    #[test]
    fn shape_of_first_leg() {
        let encoded = polyline::encode(&[[46.95, 7.44], [46.955, 7.445]], ROUTING_PRECISION);
        let reply: RouteReply = serde_json::from_value(serde_json::json!({
            "trip": {"legs": [{"shape": encoded}, {"shape": ""}]}
        }))
        .unwrap();
        let shape = reply.shape().unwrap();
        assert_eq!(shape.len(), 2);
        assert!((shape[1].lat - 46.955).abs() < 1e-6);
        assert!((shape[1].lon - 7.445).abs() < 1e-6);
    }

    #[test]
    fn missing_trip_is_a_routing_error() {
        let reply: RouteReply =
            serde_json::from_str(r#"{"error_code": 171, "error": "No suitable edges"}"#).unwrap();
        assert!(matches!(reply.shape(), Err(PlannerError::Routing(_))));
    }
}
