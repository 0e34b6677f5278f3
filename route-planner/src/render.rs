//! The overlay handed to the map renderer, as GeoJSON in grid coordinates (EPSG:2056). Every
//! feature has a `type` property for styling: `route`, `preview`, `waypoint`, `poi` or `pointer`.

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::Map;

use route_planner_model::{Coordinate, Waypoint};

use crate::store::RouteSnapshot;
use crate::Result;

pub fn render_geojson(snapshot: &RouteSnapshot, preview: Option<[Coordinate; 3]>) -> Result<String> {
    let mut features = Vec::new();

    if snapshot.path.len() >= 2 {
        let line = snapshot.path.iter().map(position).collect();
        features.push(feature(Value::LineString(line), "route"));
    }
    if let Some(triangle) = preview {
        let line = triangle.iter().map(|pt| vec![pt.x, pt.y]).collect();
        features.push(feature(Value::LineString(line), "preview"));
    }

    // Later features are drawn on top, so the pointer goes last
    for waypt in &snapshot.selected_waypoints {
        features.push(point_feature(waypt, "waypoint"));
    }
    for poi in &snapshot.pois {
        let mut f = point_feature(poi, "poi");
        if let Some(ref name) = poi.name {
            f.set_property("name", name.clone());
        }
        features.push(f);
    }
    if let Some(ref pointer) = snapshot.pointer {
        features.push(point_feature(pointer, "pointer"));
    }

    let fc = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    Ok(serde_json::to_string_pretty(&fc)?)
}

fn position(waypt: &Waypoint) -> Vec<f64> {
    vec![waypt.x, waypt.y]
}

fn point_feature(waypt: &Waypoint, kind: &str) -> Feature {
    let mut f = feature(Value::Point(position(waypt)), kind);
    f.set_property("h", waypt.h);
    f.set_property("accumulated_distance", waypt.accumulated_distance);
    f
}

fn feature(value: Value, kind: &str) -> Feature {
    let mut props = Map::new();
    props.insert("type".to_string(), kind.into());
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}
