//! WGS84 to Swiss grid conversion, using swisstopo's approximate formulas. They're accurate to
//! about 1-2 meters, which is plenty for snapping a route drawn on a map.

use route_planner_model::{Coordinate, GeoCoordinate};

/// LV03 values in the surveyor's convention: `x` is the northing, `y` the easting.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Lv03 {
    pub x: f64,
    pub y: f64,
}

/// Converts decimal degrees to sexagesimal seconds
pub fn dec_to_sex(angle: f64) -> f64 {
    let deg = angle.trunc();
    let min = (angle - deg) * 60.0;
    let sec = ((angle - deg) * 60.0 - min) * 60.0;
    sec + min * 60.0 + deg * 3600.0
}

pub fn geographic_to_lv03(pt: GeoCoordinate) -> Lv03 {
    // Auxiliary values relative to the old observatory in Bern
    let lat_aux = (dec_to_sex(pt.lat) - 169_028.66) / 10_000.0;
    let lon_aux = (dec_to_sex(pt.lon) - 26_782.5) / 10_000.0;

    let x = 200_147.07 + 308_807.95 * lat_aux + 3_745.25 * lon_aux.powi(2)
        + 76.63 * lat_aux.powi(2)
        - 194.56 * lon_aux.powi(2) * lat_aux
        + 119.79 * lat_aux.powi(3);
    let y = 600_072.37 + 211_455.93 * lon_aux
        - 10_938.51 * lon_aux * lat_aux
        - 0.36 * lon_aux * lat_aux.powi(2)
        - 44.54 * lon_aux.powi(3);

    Lv03 { x, y }
}

/// Projects onto the LV95 grid that the rest of the planner works in.
pub fn geographic_to_grid(pt: GeoCoordinate) -> Coordinate {
    let lv03 = geographic_to_lv03(pt);
    Coordinate::new(2_000_000.0 + lv03.y, 1_000_000.0 + lv03.x)
}

/// The way back from the grid isn't part of the polynomial above. Anything talking to a service
/// in WGS84 goes through this, so a full reprojection library can be swapped in.
pub trait Reprojection {
    fn grid_to_geographic(&self, pt: Coordinate) -> GeoCoordinate;

    fn geographic_to_grid(&self, pt: GeoCoordinate) -> Coordinate {
        geographic_to_grid(pt)
    }
}

/// swisstopo's published approximate inverse, same accuracy class as the forward formula.
#[derive(Clone, Copy, Default, Debug)]
pub struct SwisstopoApproximation;

impl Reprojection for SwisstopoApproximation {
    fn grid_to_geographic(&self, pt: Coordinate) -> GeoCoordinate {
        let y_aux = (pt.x - 2_600_000.0) / 1_000_000.0;
        let x_aux = (pt.y - 1_200_000.0) / 1_000_000.0;

        let lat = 16.902_389_2 + 3.238_272 * x_aux
            - 0.270_978 * y_aux.powi(2)
            - 0.002_528 * x_aux.powi(2)
            - 0.044_7 * y_aux.powi(2) * x_aux
            - 0.014_0 * x_aux.powi(3);
        let lon = 2.677_909_4 + 4.728_982 * y_aux + 0.791_484 * y_aux * x_aux
            + 0.130_6 * y_aux * x_aux.powi(2)
            - 0.043_6 * y_aux.powi(3);

        // Units of 10000", back to degrees
        GeoCoordinate::new(lat * 100.0 / 36.0, lon * 100.0 / 36.0)
    }
}
