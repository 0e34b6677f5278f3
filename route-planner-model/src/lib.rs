use geo::{BoundingRect, Distance, Euclidean, LineString, Point};
use serde::{Deserialize, Serialize};

pub mod polyline;

/// A point on the LV95 grid (EPSG:2056), in meters. `x` grows east, `y` grows north.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// WGS84 degrees. Deliberately not convertible to or from `Coordinate` without a projection.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lon: f64,
}

/// A vertex of a path. `accumulated_distance` is in kilometers from the start of the path.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub h: f64,
    pub accumulated_distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Coordinate {
        Coordinate { x, y }
    }

    pub fn dist_to(self, other: Coordinate) -> f64 {
        Euclidean.distance(Point::from(self), Point::from(other))
    }
}

impl From<Coordinate> for geo::Coord {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.x, y: c.y }
    }
}

impl From<Coordinate> for Point {
    fn from(c: Coordinate) -> Self {
        Point::new(c.x, c.y)
    }
}

impl From<geo::Coord> for Coordinate {
    fn from(c: geo::Coord) -> Self {
        Coordinate { x: c.x, y: c.y }
    }
}

impl GeoCoordinate {
    pub fn new(lat: f64, lon: f64) -> GeoCoordinate {
        GeoCoordinate { lat, lon }
    }
}

impl Waypoint {
    pub fn new(pt: Coordinate, h: f64, accumulated_distance: f64) -> Waypoint {
        Waypoint {
            x: pt.x,
            y: pt.y,
            h,
            accumulated_distance,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Waypoint {
        self.name = Some(name.into());
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }

    pub fn dist_to(&self, pt: Coordinate) -> f64 {
        self.coordinate().dist_to(pt)
    }

    /// True if both waypoints sit on exactly the same grid position.
    pub fn same_position(&self, pt: Coordinate) -> bool {
        self.x == pt.x && self.y == pt.y
    }
}

/// Recalculates `accumulated_distance` along the path with straight segments, so the first
/// point is 0 and the sequence never decreases.
pub fn recompute_accumulated_distances(path: &mut [Waypoint]) {
    let mut total = 0.0;
    let mut prev: Option<Coordinate> = None;
    for waypt in path.iter_mut() {
        if let Some(prev) = prev {
            total += prev.dist_to(waypt.coordinate()) / 1_000.0;
        }
        waypt.accumulated_distance = total;
        prev = Some(waypt.coordinate());
    }
}

pub fn is_monotonic(path: &[Waypoint]) -> bool {
    path.windows(2)
        .all(|pair| pair[0].accumulated_distance <= pair[1].accumulated_distance)
}

/// The `[min, max]` corners of everything in `pts`.
pub fn bounding_box(pts: &[Coordinate]) -> Option<[Coordinate; 2]> {
    let line: LineString = pts.iter().map(|pt| geo::Coord::from(*pt)).collect();
    let rect = line.bounding_rect()?;
    Some([rect.min().into(), rect.max().into()])
}

/// Midpoint of the bounding box
pub fn center_of(pts: &[Coordinate]) -> Option<Coordinate> {
    let [min, max] = bounding_box(pts)?;
    Some(Coordinate::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0))
}

pub fn coordinates(path: &[Waypoint]) -> Vec<Coordinate> {
    path.iter().map(Waypoint::coordinate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypt(x: f64, y: f64) -> Waypoint {
        Waypoint::new(Coordinate::new(x, y), 500.0, 0.0)
    }

    #[test]
    fn distances_start_at_zero_and_never_decrease() {
        let mut path = vec![
            waypt(2_600_000.0, 1_200_000.0),
            waypt(2_600_300.0, 1_200_400.0),
            waypt(2_600_300.0, 1_200_400.0),
            waypt(2_599_000.0, 1_200_400.0),
        ];
        recompute_accumulated_distances(&mut path);

        assert_eq!(path[0].accumulated_distance, 0.0);
        assert!((path[1].accumulated_distance - 0.5).abs() < 1e-9);
        assert_eq!(path[1].accumulated_distance, path[2].accumulated_distance);
        assert!((path[3].accumulated_distance - 1.8).abs() < 1e-9);
        assert!(is_monotonic(&path));
    }

    #[test]
    fn center_is_midpoint_of_bbox() {
        let pts = vec![
            Coordinate::new(2_600_000.0, 1_200_000.0),
            Coordinate::new(2_610_000.0, 1_190_000.0),
            Coordinate::new(2_605_000.0, 1_204_000.0),
        ];
        assert_eq!(
            bounding_box(&pts),
            Some([
                Coordinate::new(2_600_000.0, 1_190_000.0),
                Coordinate::new(2_610_000.0, 1_204_000.0)
            ])
        );
        assert_eq!(
            center_of(&pts),
            Some(Coordinate::new(2_605_000.0, 1_197_000.0))
        );
        assert_eq!(center_of(&[]), None);
    }

    #[test]
    fn same_position_ignores_elevation_and_name() {
        let a = waypt(10.0, 20.0).with_name("Gurten");
        assert!(a.same_position(Coordinate::new(10.0, 20.0)));
        assert!(!a.same_position(Coordinate::new(10.0, 20.5)));
    }
}
