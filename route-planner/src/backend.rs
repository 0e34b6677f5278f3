//! The walk time table backend: request and reply records for each endpoint, plus the HTTP
//! client that speaks them.

use async_trait::async_trait;
use log::debug;
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use route_planner_model::polyline::{self, PolylineError, GRID_PRECISION};
use route_planner_model::Waypoint;

use crate::settings::ExportSettings;
use crate::Result;

const ENCODING: &str = "polyline";

/// Every endpoint answers either with its payload or with `{status: "error", message}`.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Reply<T> {
    Failure(Failure),
    Success(T),
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Failure {
    pub status: FailureStatus,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FailureStatus {
    Error,
}

/// What was uploaded, in the form `parse_route` expects
#[derive(Clone, Debug, PartialEq)]
pub struct ParseRouteRequest {
    pub file_type: String,
    pub file_content: String,
}

#[derive(Serialize)]
struct ParseRouteOptions<'a> {
    encoding: &'static str,
    file_type: &'a str,
}

/// Fields are optional so a reply missing one becomes a parse error, not a decoding failure.
#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ParsedRoute {
    pub route: Option<String>,
    pub elevation_data: Option<String>,
    pub route_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WalkTableRequest {
    pub encoding: String,
    pub route: String,
    pub elevation_data: String,
    pub auto_waypoints: bool,
    pub pois_distance: String,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct WalkTable {
    pub pois: Option<String>,
    pub pois_elevation: Option<String>,
    pub pois_names: Option<Vec<String>>,
    pub selected_way_points: Option<String>,
    pub selected_way_points_elevation: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportRequest {
    pub settings: ExportSettings,
    pub flags: Vec<String>,
    pub encoding: String,
    pub route: String,
    pub route_elevation: String,
    pub way_points: String,
    pub way_points_elevation: String,
    pub pois_distance: String,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct ExportStatus {
    pub status: String,
    pub uuid: Option<String>,
}

impl WalkTableRequest {
    pub fn new(path: &[Waypoint], pois: &[Waypoint], auto_waypoints: bool) -> WalkTableRequest {
        WalkTableRequest {
            encoding: ENCODING.to_string(),
            route: encode_route(path),
            elevation_data: encode_elevation(path),
            auto_waypoints,
            pois_distance: pois_distance(pois),
        }
    }
}

impl ExportRequest {
    pub fn new(
        settings: ExportSettings,
        path: &[Waypoint],
        way_points: &[Waypoint],
        pois: &[Waypoint],
    ) -> ExportRequest {
        ExportRequest {
            settings,
            flags: Vec::new(),
            encoding: ENCODING.to_string(),
            route: encode_route(path),
            route_elevation: encode_elevation(path),
            way_points: encode_route(way_points),
            way_points_elevation: encode_elevation(way_points),
            pois_distance: pois_distance(pois),
        }
    }
}

pub fn encode_route(path: &[Waypoint]) -> String {
    let pts: Vec<[f64; 2]> = path.iter().map(|p| [p.x, p.y]).collect();
    polyline::encode(&pts, GRID_PRECISION)
}

/// `[distance in meters, elevation]` per point
pub fn encode_elevation(path: &[Waypoint]) -> String {
    let pts: Vec<[f64; 2]> = path
        .iter()
        .map(|p| [p.accumulated_distance * 1_000.0, p.h])
        .collect();
    polyline::encode(&pts, GRID_PRECISION)
}

/// POI distances in meters, sorted along the path, comma separated
pub fn pois_distance(pois: &[Waypoint]) -> String {
    let mut distances: Vec<f64> = pois
        .iter()
        .map(|p| p.accumulated_distance * 1_000.0)
        .collect();
    distances.sort_by(|a, b| a.total_cmp(b));
    distances
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Zips a decoded route with its `[distance, elevation]` pairs. Names are optional; when present
/// they line up with the points.
pub fn decode_waypoints(
    route: &str,
    elevation: &str,
    names: Option<&[String]>,
) -> Result<Vec<Waypoint>, WaypointDecodeError> {
    let route = polyline::decode(route, GRID_PRECISION)?;
    let elevation = polyline::decode(elevation, GRID_PRECISION)?;
    if route.len() != elevation.len() {
        return Err(WaypointDecodeError::LengthMismatch {
            route: route.len(),
            elevation: elevation.len(),
        });
    }

    Ok(route
        .into_iter()
        .zip(elevation)
        .enumerate()
        .map(|(idx, ([x, y], [distance, h]))| Waypoint {
            x,
            y,
            h,
            accumulated_distance: distance / 1_000.0,
            name: names.and_then(|names| names.get(idx).cloned()),
        })
        .collect())
}

#[derive(Debug, Error, PartialEq)]
pub enum WaypointDecodeError {
    #[error(transparent)]
    Polyline(#[from] PolylineError),
    #[error("{route} points but {elevation} elevation values")]
    LengthMismatch { route: usize, elevation: usize },
}

#[async_trait(?Send)]
pub trait Backend {
    async fn parse_route(&self, request: ParseRouteRequest) -> Result<Reply<ParsedRoute>>;

    async fn create_walk_time_table(&self, request: WalkTableRequest) -> Result<Reply<WalkTable>>;

    async fn create_map(&self, request: ExportRequest) -> Result<Reply<ExportStatus>>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> HttpBackend {
        HttpBackend {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    async fn post_form<T: DeserializeOwned>(&self, name: &str, form: Form) -> Result<Reply<T>> {
        let url = self.endpoint(name);
        debug!("POST {url}");
        let reply = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?
            .json::<Reply<T>>()
            .await?;
        Ok(reply)
    }
}

fn options_form(options: &impl Serialize) -> Result<Form> {
    Ok(Form::new().text("options", serde_json::to_string(options)?))
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn parse_route(&self, request: ParseRouteRequest) -> Result<Reply<ParsedRoute>> {
        let form = options_form(&ParseRouteOptions {
            encoding: ENCODING,
            file_type: &request.file_type,
        })?
        .text("file_content", request.file_content);
        self.post_form("parse_route", form).await
    }

    async fn create_walk_time_table(&self, request: WalkTableRequest) -> Result<Reply<WalkTable>> {
        let form = options_form(&request)?;
        self.post_form("create-walk-time-table", form).await
    }

    async fn create_map(&self, request: ExportRequest) -> Result<Reply<ExportStatus>> {
        let form = options_form(&request)?;
        self.post_form("create_map", form).await
    }
}

#[cfg(test)]
mod tests {
    use route_planner_model::Coordinate;

    use super::*;

    fn waypt(x: f64, y: f64, h: f64, km: f64) -> Waypoint {
        Waypoint::new(Coordinate::new(x, y), h, km)
    }

    #[test]
    fn error_replies_are_recognized() {
        let reply: Reply<ParsedRoute> =
            serde_json::from_str(r#"{"status": "error", "message": "Unknown file type"}"#).unwrap();
        assert_eq!(
            reply,
            Reply::Failure(Failure {
                status: FailureStatus::Error,
                message: "Unknown file type".to_string()
            })
        );

        // Any other status is a normal payload
        let reply: Reply<ExportStatus> =
            serde_json::from_str(r#"{"status": "running", "uuid": "abc"}"#).unwrap();
        assert_eq!(
            reply,
            Reply::Success(ExportStatus {
                status: "running".to_string(),
                uuid: Some("abc".to_string())
            })
        );
    }

    #[test]
    fn missing_fields_still_decode() {
        let reply: Reply<ParsedRoute> = serde_json::from_str(r#"{"route_name": "x"}"#).unwrap();
        assert_eq!(
            reply,
            Reply::Success(ParsedRoute {
                route_name: Some("x".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn pois_are_sorted_by_distance_on_the_wire() {
        let pois = vec![
            waypt(0.0, 0.0, 0.0, 2.5),
            waypt(0.0, 0.0, 0.0, 0.125),
            waypt(0.0, 0.0, 0.0, 1.0),
        ];
        assert_eq!(pois_distance(&pois), "125,1000,2500");
        assert_eq!(pois_distance(&[]), "");
    }

    #[test]
    fn waypoints_survive_the_wire() {
        let path = vec![
            waypt(2_600_000.0, 1_200_000.0, 540.0, 0.0),
            waypt(2_600_300.0, 1_200_400.0, 552.0, 0.5),
            waypt(2_600_300.0, 1_200_900.0, 601.0, 1.0),
        ];
        let decoded = decode_waypoints(&encode_route(&path), &encode_elevation(&path), None).unwrap();
        assert_eq!(decoded, path);

        let names = vec!["Start".to_string(), "Bridge".to_string(), "Top".to_string()];
        let decoded =
            decode_waypoints(&encode_route(&path), &encode_elevation(&path), Some(&names)).unwrap();
        assert_eq!(decoded[1].name.as_deref(), Some("Bridge"));
    }

    #[test]
    fn length_mismatch_is_detected() {
        let path: Vec<Waypoint> = (0..5).map(|i| waypt(i as f64, 0.0, 0.0, 0.0)).collect();
        let longer: Vec<Waypoint> = (0..7).map(|i| waypt(i as f64, 0.0, 0.0, 0.0)).collect();
        assert_eq!(
            decode_waypoints(&encode_route(&path), &encode_elevation(&longer), None),
            Err(WaypointDecodeError::LengthMismatch {
                route: 5,
                elevation: 7
            })
        );
    }

    #[test]
    fn walk_table_request_shape() {
        let path = vec![waypt(10.0, 20.0, 500.0, 0.0), waypt(13.0, 24.0, 501.0, 0.005)];
        let request = WalkTableRequest::new(&path, &[path[1].clone()], true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["encoding"], "polyline");
        assert_eq!(json["auto_waypoints"], true);
        assert_eq!(json["pois_distance"], "5");
        assert_eq!(json["route"], encode_route(&path));
    }
}
