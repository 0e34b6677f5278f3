//! Plans walking routes on the Swiss LV95 grid. Map tiles are addressed and placed on a canvas,
//! the route lives in observable channels kept in sync with the walk time table backend, and a
//! drag gesture re-routes part of the path through a pedestrian routing service.

pub mod backend;
pub mod channel;
pub mod config;
pub mod editor;
mod error;
pub mod grid;
#[cfg(target_arch = "wasm32")]
mod js;
pub mod path_index;
pub mod projection;
pub mod render;
pub mod routing;
pub mod settings;
pub mod store;
pub mod tile_loader;
pub mod tiles;


pub use error::{PlannerError, Result};
pub use route_planner_model::{Coordinate, GeoCoordinate, Waypoint};
