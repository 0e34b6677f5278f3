//! Owns the route being planned. Every piece of state lives in a `Channel`; renderers subscribe,
//! and all changes go through the operations here so dependent values stay consistent.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use route_planner_model::{
    center_of, coordinates, recompute_accumulated_distances, Coordinate, Waypoint,
};

use crate::backend::{
    decode_waypoints, Backend, ExportRequest, HttpBackend, ParseRouteRequest, Reply,
    WalkTableRequest, WaypointDecodeError,
};
use crate::channel::Channel;
use crate::config::PlannerConfig;
use crate::path_index::IndexedPath;
use crate::projection::{Reprojection, SwisstopoApproximation};
use crate::routing::{RouteRequest, RoutingService, ValhallaClient};
use crate::settings::ExportSettings;
use crate::{PlannerError, Result};

/// What to hand to the backend for parsing
#[derive(Clone, Debug, PartialEq)]
pub enum RouteSource {
    /// Uploaded file contents, with the type taken from the file extension (`gpx`, `kml`, ...)
    File { file_type: String, content: String },
    /// Bare grid points, for routes drawn by hand
    Points(Vec<Coordinate>),
}

impl RouteSource {
    pub fn from_file(file_name: &str, content: String) -> RouteSource {
        let file_type = file_name.rsplit('.').next().unwrap_or_default().to_string();
        RouteSource::File { file_type, content }
    }

    fn into_request(self) -> Result<ParseRouteRequest> {
        Ok(match self {
            RouteSource::File { file_type, content } => ParseRouteRequest {
                file_type,
                file_content: minify_xml(&content)?,
            },
            RouteSource::Points(pts) => ParseRouteRequest {
                file_type: "array".to_string(),
                file_content: pts
                    .iter()
                    .map(|pt| format!("{},{}", pt.x, pt.y))
                    .collect::<Vec<_>>()
                    .join(";"),
            },
        })
    }
}

/// Strips whitespace around tags.
pub fn minify_xml(xml: &str) -> Result<String> {
    let after_tag = Regex::new(r">\s+").map_err(|err| PlannerError::Parse(err.to_string()))?;
    let before_tag = Regex::new(r"\s+<").map_err(|err| PlannerError::Parse(err.to_string()))?;
    let xml = after_tag.replace_all(xml, ">");
    Ok(before_tag.replace_all(&xml, "<").into_owned())
}

/// Everything the store holds at one moment
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct RouteSnapshot {
    pub path: Vec<Waypoint>,
    pub selected_waypoints: Vec<Waypoint>,
    pub pois: Vec<Waypoint>,
    pub pointer: Option<Waypoint>,
    pub map_center: Coordinate,
}

pub struct RouteStore {
    backend: Rc<dyn Backend>,
    routing: Rc<dyn RoutingService>,
    reprojection: Box<dyn Reprojection>,
    config: PlannerConfig,

    path: Channel<Vec<Waypoint>>,
    selected_waypoints: Channel<Vec<Waypoint>>,
    pois: Channel<Vec<Waypoint>>,
    pointer: Channel<Option<Waypoint>>,
    map_center: Channel<Coordinate>,
    indexed_path: Rc<RefCell<Rc<IndexedPath>>>,

    automatic_waypoints: Cell<bool>,
}

impl RouteStore {
    pub fn new(
        config: PlannerConfig,
        backend: Rc<dyn Backend>,
        routing: Rc<dyn RoutingService>,
    ) -> RouteStore {
        let path = Channel::new(Vec::new());
        let indexed_path = Rc::new(RefCell::new(Rc::new(IndexedPath::new(Vec::new()))));
        let sink = indexed_path.clone();
        path.subscribe(move |path: &Vec<Waypoint>| {
            *sink.borrow_mut() = Rc::new(IndexedPath::new(path.clone()));
        });

        RouteStore {
            backend,
            routing,
            reprojection: Box::new(SwisstopoApproximation),
            path,
            indexed_path,
            selected_waypoints: Channel::new(Vec::new()),
            pois: Channel::new(Vec::new()),
            pointer: Channel::new(None),
            map_center: Channel::new(config.default_map_center),
            automatic_waypoints: Cell::new(true),
            config,
        }
    }

    /// Talks to the backend and routing service named in the config over HTTP.
    pub fn connect(config: PlannerConfig) -> RouteStore {
        let backend = Rc::new(HttpBackend::new(&config.api_url));
        let routing = Rc::new(ValhallaClient::new(&config.routing_url));
        RouteStore::new(config, backend, routing)
    }

    pub fn with_reprojection(mut self, reprojection: Box<dyn Reprojection>) -> RouteStore {
        self.reprojection = reprojection;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn path(&self) -> &Channel<Vec<Waypoint>> {
        &self.path
    }

    pub fn selected_waypoints(&self) -> &Channel<Vec<Waypoint>> {
        &self.selected_waypoints
    }

    pub fn pois(&self) -> &Channel<Vec<Waypoint>> {
        &self.pois
    }

    pub fn pointer(&self) -> &Channel<Option<Waypoint>> {
        &self.pointer
    }

    pub fn map_center(&self) -> &Channel<Coordinate> {
        &self.map_center
    }

    /// The current path and its spatial index. Rebuilt whenever the path is published.
    pub fn indexed_path(&self) -> Rc<IndexedPath> {
        self.indexed_path.borrow().clone()
    }

    pub fn automatic_waypoint_selection(&self) -> bool {
        self.automatic_waypoints.get()
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            path: self.path.current_value(),
            selected_waypoints: self.selected_waypoints.current_value(),
            pois: self.pois.current_value(),
            pointer: self.pointer.current_value(),
            map_center: self.map_center.current_value(),
        }
    }

    /// Parses a new route and replaces everything derived from the old one. Returns the route's
    /// name. On failure, nothing changes.
    pub async fn replace_route(&self, source: RouteSource) -> Result<String> {
        let request = source.into_request()?;
        info!("Parsing a {} route", request.file_type);
        let parsed = match self.backend.parse_route(request).await? {
            Reply::Failure(failure) => return Err(PlannerError::Parse(failure.message)),
            Reply::Success(parsed) => parsed,
        };
        let route = parsed
            .route
            .ok_or_else(|| PlannerError::Parse("no route in reply".to_string()))?;
        let elevation = parsed
            .elevation_data
            .ok_or_else(|| PlannerError::Parse("no elevation data in reply".to_string()))?;
        let route_name = parsed.route_name.unwrap_or_default();

        let path = match decode_waypoints(&route, &elevation, None) {
            Ok(path) => path,
            // An empty route means there's nothing to show, whatever came along with it
            Err(WaypointDecodeError::LengthMismatch { route: 0, .. }) => Vec::new(),
            Err(WaypointDecodeError::LengthMismatch { route, elevation }) => {
                return Err(PlannerError::LengthMismatch { route, elevation });
            }
            Err(WaypointDecodeError::Polyline(err)) => {
                return Err(PlannerError::Parse(err.to_string()))
            }
        };
        if path.is_empty() {
            info!("Parsed route is empty");
            self.clear();
            return Ok(route_name);
        }

        let (pois, selected) = self.compute_walk_table(&path, &[]).await?;
        info!(
            "Replaced route with {} points, {} waypoints selected",
            path.len(),
            selected.len()
        );
        if let Some(center) = center_of(&coordinates(&path)) {
            self.map_center.publish(center);
        }
        self.path.publish(path);
        self.pois.publish(pois);
        self.selected_waypoints.publish(selected);
        Ok(route_name)
    }

    pub async fn add_point_of_interest(&self, poi: Waypoint) -> Result<()> {
        self.pois.update(|pois| pois.push(poi));
        self.recompute().await
    }

    /// Removes every POI at exactly the same position as `poi`.
    pub async fn delete_poi(&self, poi: &Waypoint) -> Result<()> {
        let pt = poi.coordinate();
        self.pois.update(|pois| pois.retain(|p| !p.same_position(pt)));
        self.recompute().await
    }

    /// Extends a hand-drawn path to `pt`, following ways from the current end of the path.
    /// The marker for `pt` and the extended path are only published once routing succeeded.
    pub async fn add_waypoint_by_drawing(&self, pt: Coordinate) -> Result<()> {
        let tail = self.path.current_value().last().map(Waypoint::coordinate);
        let shape = match tail {
            Some(tail) => Some(self.route_between(tail, pt).await?),
            None => None,
        };

        // Read again, the path may have moved on while routing
        let mut path = self.path.current_value();
        match shape {
            Some(shape) => {
                debug!("Drawing appends {} routed points", shape.len());
                path.extend(shape.into_iter().map(|pt| Waypoint::new(pt, 0.0, 0.0)));
                // The routed shape starts where the path currently ends
                path.dedup_by(|b, a| a.same_position(b.coordinate()));
                recompute_accumulated_distances(&mut path);
            }
            None => path = vec![Waypoint::new(pt, 0.0, 0.0)],
        }
        self.pois.update(|pois| pois.push(Waypoint::new(pt, 0.0, 0.0)));
        self.path.publish(path);
        Ok(())
    }

    /// Hands the drawn path to the backend, which attaches elevation and distances. On success
    /// the drawing markers are replaced by the backend's POIs; on failure they stay.
    pub async fn finish_drawing(&self) -> Result<String> {
        let pts = coordinates(&self.path.current_value());
        self.replace_route(RouteSource::Points(pts)).await
    }

    pub async fn set_automatic_waypoint_selection(&self, automatic: bool) -> Result<()> {
        self.automatic_waypoints.set(automatic);
        self.recompute().await
    }

    /// Recomputes POIs and selected waypoints for whatever path and POIs are current right now.
    /// If several recomputes overlap, the last reply to arrive wins.
    pub async fn recompute(&self) -> Result<()> {
        let path = self.path.current_value();
        if path.is_empty() {
            debug!("No path, skipping walk time table");
            return Ok(());
        }
        let pois = self.pois.current_value();
        let (pois, selected) = self.compute_walk_table(&path, &pois).await?;
        self.pois.publish(pois);
        self.selected_waypoints.publish(selected);
        Ok(())
    }

    /// Takes over an edited path. Distances are recalculated along the new geometry.
    pub async fn adopt_path(&self, mut path: Vec<Waypoint>) -> Result<()> {
        recompute_accumulated_distances(&mut path);
        self.path.publish(path);
        self.recompute().await
    }

    pub fn clear(&self) {
        self.path.publish(Vec::new());
        self.selected_waypoints.publish(Vec::new());
        self.pois.publish(Vec::new());
        self.map_center.publish(self.config.default_map_center);
    }

    pub fn move_pointer(&self, pointer: Option<Waypoint>) {
        self.pointer.publish(pointer);
    }

    /// Points at the closest path point, if the pointer is near enough to the path.
    pub fn hover(&self, pt: Coordinate) {
        self.move_pointer(self.nearest_path_point(pt));
    }

    pub fn set_map_center(&self, center: Coordinate) {
        self.map_center.publish(center);
    }

    /// The path point closest to `pt`, if it's within the snap distance
    pub fn nearest_path_point(&self, pt: Coordinate) -> Option<Waypoint> {
        self.indexed_path()
            .nearest_within(pt, self.config.snap_distance)
            .cloned()
    }

    /// Starts rendering the map PDFs. Returns the job id to poll for.
    pub async fn export_map(&self, settings: ExportSettings) -> Result<String> {
        let request = ExportRequest::new(
            settings,
            &self.path.current_value(),
            &self.selected_waypoints.current_value(),
            &self.pois.current_value(),
        );
        match self.backend.create_map(request).await? {
            Reply::Failure(failure) => Err(PlannerError::Export(failure.message)),
            Reply::Success(status) => match (status.status.as_str(), status.uuid) {
                ("running", Some(uuid)) => {
                    info!("Map export {uuid} started");
                    Ok(uuid)
                }
                (other, _) => Err(PlannerError::Export(format!("job status is {other}"))),
            },
        }
    }

    /// A walkable line from `from` to `to`, in grid coordinates
    pub async fn route_between(&self, from: Coordinate, to: Coordinate) -> Result<Vec<Coordinate>> {
        let request = RouteRequest::pedestrian(
            self.reprojection.grid_to_geographic(from),
            self.reprojection.grid_to_geographic(to),
            self.config.routing_radius,
        );
        let reply = self.routing.route(request).await?;
        Ok(reply
            .shape()?
            .into_iter()
            .map(|pt| self.reprojection.geographic_to_grid(pt))
            .collect())
    }

    async fn compute_walk_table(
        &self,
        path: &[Waypoint],
        pois: &[Waypoint],
    ) -> Result<(Vec<Waypoint>, Vec<Waypoint>)> {
        let request = WalkTableRequest::new(path, pois, self.automatic_waypoints.get());
        let table = match self.backend.create_walk_time_table(request).await? {
            Reply::Failure(failure) => return Err(PlannerError::Compute(failure.message)),
            Reply::Success(table) => table,
        };

        let missing = |field: &str| PlannerError::Compute(format!("reply has no {field}"));
        let pois = decode_waypoints(
            table.pois.as_deref().ok_or_else(|| missing("pois"))?,
            table
                .pois_elevation
                .as_deref()
                .ok_or_else(|| missing("pois_elevation"))?,
            table.pois_names.as_deref(),
        )
        .map_err(|err| PlannerError::Compute(format!("bad pois: {err}")))?;
        let selected = decode_waypoints(
            table
                .selected_way_points
                .as_deref()
                .ok_or_else(|| missing("selected_way_points"))?,
            table
                .selected_way_points_elevation
                .as_deref()
                .ok_or_else(|| missing("selected_way_points_elevation"))?,
            None,
        )
        .map_err(|err| PlannerError::Compute(format!("bad selected waypoints: {err}")))?;

        if selected.is_empty() {
            warn!("Walk time table selected no waypoints");
        }
        Ok((pois, selected))
    }
}
