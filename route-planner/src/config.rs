use serde::{Deserialize, Serialize};

use route_planner_model::Coordinate;

use crate::tiles::TileSource;

/// Where the map starts out before any route is loaded, near Bern
pub const DEFAULT_MAP_CENTER: Coordinate = Coordinate {
    x: 2_719_675.0,
    y: 1_216_320.0,
};

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct PlannerConfig {
    /// Base URL of the walk time table backend
    pub api_url: String,
    /// Base URL of the pedestrian routing service, ending in `/`
    pub routing_url: String,
    /// How close (in meters) the pointer has to be to a path point to start a drag
    pub snap_distance: f64,
    /// Routed points closer than this to the existing path are considered already covered
    pub reroute_tolerance: f64,
    /// Search radius the routing service uses to snap locations onto ways
    pub routing_radius: u32,
    pub default_map_center: Coordinate,
    pub tile_source: TileSource,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            routing_url: "https://valhalla1.openstreetmap.de/".to_string(),
            snap_distance: 50.0,
            reroute_tolerance: 20.0,
            routing_radius: 25,
            default_map_center: DEFAULT_MAP_CENTER,
            tile_source: TileSource::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"api_url": "https://api.example.ch", "snap_distance": 30}"#)
                .unwrap();
        assert_eq!(config.api_url, "https://api.example.ch");
        assert_eq!(config.snap_distance, 30.0);
        assert_eq!(config.reroute_tolerance, 20.0);
        assert_eq!(config.default_map_center, DEFAULT_MAP_CENTER);
        assert_eq!(config.tile_source, TileSource::default());
    }
}
