use route_planner_model::Coordinate;

use crate::tiles::{
    check_zoom, tile_size, CanvasPoint, Tile, TileIndex, MAX_ZOOM, MIN_ZOOM, TILE_RENDER_SIZE,
    TILE_SIZES,
};
use crate::Result;

/// Top-left corner of the WMTS tile matrix. Tile rows grow southward, grid y grows northward.
pub const GRID_ORIGIN: Coordinate = Coordinate {
    x: 2_420_000.0,
    y: 1_350_000.0,
};

/// `choose_zoom` never picks the most detailed supported level
pub const FINEST_AUTO_ZOOM: usize = MAX_ZOOM - 1;

/// Keep the hover pointer at least this fraction of the visible extent away from the edges
const POINTER_BORDER: f64 = 0.05;

/// Index of the tile containing `center`
pub fn base_tile(center: Coordinate, zoom_level: usize) -> Result<TileIndex> {
    let size = tile_size(zoom_level)?;
    Ok(TileIndex {
        x: ((center.x - GRID_ORIGIN.x) / size).floor() as i64,
        y: ((GRID_ORIGIN.y - center.y) / size).floor() as i64,
    })
}

/// How far `center` sits into its tile, in meters from the tile's top-left corner. Both
/// components point the way tile indices grow (east, south).
pub fn grid_offset(center: Coordinate, zoom_level: usize) -> Result<Coordinate> {
    let size = tile_size(zoom_level)?;
    Ok(Coordinate::new(
        (center.x - GRID_ORIGIN.x).rem_euclid(size),
        (GRID_ORIGIN.y - center.y).rem_euclid(size),
    ))
}

/// Where the top-left corner of the base tile lands, when `center` is drawn in the middle of
/// the canvas.
pub fn canvas_offset_of_center(
    center: Coordinate,
    zoom_level: usize,
    canvas_size: CanvasPoint,
) -> Result<CanvasPoint> {
    let size = tile_size(zoom_level)?;
    let offset = grid_offset(center, zoom_level)?;
    Ok(CanvasPoint {
        x: (canvas_size.x / 2.0).ceil() - TILE_RENDER_SIZE * offset.x / size,
        y: (canvas_size.y / 2.0).ceil() - TILE_RENDER_SIZE * offset.y / size,
    })
}

/// Picks the most detailed zoom level (starting from `FINEST_AUTO_ZOOM`) at which the bounding
/// box fits on the canvas. Falls back to the coarsest supported level when nothing fits.
pub fn choose_zoom(canvas_size: CanvasPoint, [min, max]: [Coordinate; 2]) -> usize {
    let dx = max.x - min.x;
    let dy = max.y - min.y;
    let tiles_x = (canvas_size.x / TILE_RENDER_SIZE).floor();
    let tiles_y = (canvas_size.y / TILE_RENDER_SIZE).floor();

    let mut zoom_level = FINEST_AUTO_ZOOM;
    while zoom_level > MIN_ZOOM {
        if dx <= tiles_x * TILE_SIZES[zoom_level] && dy <= tiles_y * TILE_SIZES[zoom_level] {
            break;
        }
        zoom_level -= 1;
    }
    zoom_level
}

/// Addresses the tiles under a canvas centered on some grid coordinate, and maps grid
/// coordinates to pixels on that canvas.
#[derive(Clone, Debug)]
pub struct TileGrid {
    zoom_level: usize,
    canvas_size: CanvasPoint,
    center: Coordinate,
    // Grid coordinate of the top-left corner of all covering tiles
    origin: Coordinate,
    base_tile: Tile,
    delta_x: i64,
    delta_y: i64,
}

impl TileGrid {
    pub fn new(
        center: Coordinate,
        zoom_level: usize,
        canvas_size: CanvasPoint,
        layer: &str,
    ) -> Result<TileGrid> {
        check_zoom(zoom_level)?;
        let size = TILE_SIZES[zoom_level];

        let base_tile = Tile::new(
            base_tile(center, zoom_level)?,
            canvas_offset_of_center(center, zoom_level, canvas_size)?,
            layer,
            zoom_level,
        )?;

        let delta_x = (canvas_size.x / TILE_RENDER_SIZE / 2.0).ceil() as i64;
        let delta_y = (canvas_size.y / TILE_RENDER_SIZE / 2.0).ceil() as i64;

        let offset = grid_offset(center, zoom_level)?;
        let origin = Coordinate::new(
            center.x - offset.x - delta_x as f64 * size,
            center.y + offset.y + delta_y as f64 * size,
        );

        Ok(TileGrid {
            zoom_level,
            canvas_size,
            center,
            origin,
            base_tile,
            delta_x,
            delta_y,
        })
    }

    pub fn zoom_level(&self) -> usize {
        self.zoom_level
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    pub fn base_tile(&self) -> &Tile {
        &self.base_tile
    }

    /// Every tile needed so that no pixel of the canvas is left uncovered. Rows are walked
    /// outward from the base tile; nothing is deduplicated, since drawing a tile twice is
    /// harmless.
    pub fn covering_tiles(&self) -> Vec<Tile> {
        let mut tiles = vec![self.base_tile.clone()];

        let mut west = self.base_tile.clone();
        let mut east = self.base_tile.clone();
        for _ in 0..self.delta_x {
            west = west.west();
            east = east.east();
            tiles.push(west.clone());
            tiles.push(east.clone());
        }

        let mut north = self.base_tile.clone();
        let mut south = self.base_tile.clone();
        for _ in 0..self.delta_y {
            north = north.north();
            south = south.south();
            tiles.push(north.clone());
            tiles.push(south.clone());

            let (mut north_west, mut north_east) = (north.clone(), north.clone());
            let (mut south_west, mut south_east) = (south.clone(), south.clone());
            for _ in 0..self.delta_x {
                north_west = north_west.west();
                north_east = north_east.east();
                tiles.push(north_west.clone());
                tiles.push(north_east.clone());

                south_west = south_west.west();
                south_east = south_east.east();
                tiles.push(south_west.clone());
                tiles.push(south_east.clone());
            }
        }

        tiles
    }

    pub fn to_canvas_coordinates(&self, pt: Coordinate) -> CanvasPoint {
        let size = TILE_SIZES[self.zoom_level];
        let left = self.base_tile.canvas_position.x - self.delta_x as f64 * TILE_RENDER_SIZE;
        let top = self.base_tile.canvas_position.y - self.delta_y as f64 * TILE_RENDER_SIZE;
        CanvasPoint {
            x: left + TILE_RENDER_SIZE * (pt.x - self.origin.x) / size,
            y: top + TILE_RENDER_SIZE * (self.origin.y - pt.y) / size,
        }
    }

    /// The `[min, max]` grid corners shown on the canvas
    pub fn visible_extent(&self) -> [Coordinate; 2] {
        let meters_per_pixel = TILE_SIZES[self.zoom_level] / TILE_RENDER_SIZE;
        let half_w = self.canvas_size.x / 2.0 * meters_per_pixel;
        let half_h = self.canvas_size.y / 2.0 * meters_per_pixel;
        [
            Coordinate::new(self.center.x - half_w, self.center.y - half_h),
            Coordinate::new(self.center.x + half_w, self.center.y + half_h),
        ]
    }

    /// If the pointer has wandered into the border of the visible extent, returns a new map
    /// center that pulls it back inside, moving no further than needed.
    pub fn recenter_for_pointer(&self, pointer: Coordinate) -> Option<Coordinate> {
        let [min, max] = self.visible_extent();
        let border = (max.x - min.x).min(max.y - min.y) * POINTER_BORDER;
        let max_offset_x = (max.x - min.x) / 2.0 - border;
        let max_offset_y = (max.y - min.y) / 2.0 - border;

        let offset_x = pointer.x - self.center.x;
        let offset_y = pointer.y - self.center.y;

        let mut new_center = self.center;
        if offset_x > max_offset_x {
            new_center.x += offset_x - max_offset_x;
        } else if offset_x < -max_offset_x {
            new_center.x += offset_x + max_offset_x;
        }
        if offset_y > max_offset_y {
            new_center.y += offset_y - max_offset_y;
        } else if offset_y < -max_offset_y {
            new_center.y += offset_y + max_offset_y;
        }

        if new_center == self.center {
            None
        } else {
            Some(new_center)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::PlannerError;

    const DEFAULT_CENTER: Coordinate = Coordinate {
        x: 2_719_675.0,
        y: 1_216_320.0,
    };
    const CANVAS: CanvasPoint = CanvasPoint { x: 512.0, y: 512.0 };
    const LAYER: &str = "ch.swisstopo.pixelkarte-farbe";

    #[test]
    fn base_tile_is_reproducible() {
        // 299675 / 640 and 133680 / 640, rounded down
        assert_eq!(
            base_tile(DEFAULT_CENTER, 6).unwrap(),
            TileIndex { x: 468, y: 208 }
        );
        assert_eq!(
            grid_offset(DEFAULT_CENTER, 6).unwrap(),
            Coordinate::new(155.0, 560.0)
        );
        // 155m and 560m into a 640m tile are 62px and 224px
        assert_eq!(
            canvas_offset_of_center(DEFAULT_CENTER, 6, CANVAS).unwrap(),
            CanvasPoint { x: 194.0, y: 32.0 }
        );
    }

    #[test]
    fn invalid_zoom_is_an_error() {
        for zoom in [0, 11, 12] {
            assert!(matches!(
                TileGrid::new(DEFAULT_CENTER, zoom, CANVAS, LAYER),
                Err(PlannerError::InvalidZoomLevel(_))
            ));
            assert!(base_tile(DEFAULT_CENTER, zoom).is_err());
        }
    }

    #[test]
    fn center_maps_to_canvas_center_at_every_zoom() {
        let centers = [
            DEFAULT_CENTER,
            Coordinate::new(2_600_000.0, 1_200_000.0),
            Coordinate::new(2_683_112.7, 1_247_981.3),
        ];
        for canvas in [CANVAS, CanvasPoint { x: 1280.0, y: 768.0 }, CanvasPoint { x: 300.0, y: 201.0 }] {
            for center in centers {
                for zoom in MIN_ZOOM..=MAX_ZOOM {
                    let grid = TileGrid::new(center, zoom, canvas, LAYER).unwrap();
                    let px = grid.to_canvas_coordinates(center);
                    assert!((px.x - (canvas.x / 2.0).ceil()).abs() < TILE_RENDER_SIZE / 2.0);
                    assert!((px.y - (canvas.y / 2.0).ceil()).abs() < TILE_RENDER_SIZE / 2.0);
                }
            }
        }
    }

    #[test]
    fn north_is_up_on_the_canvas() {
        let grid = TileGrid::new(DEFAULT_CENTER, 6, CANVAS, LAYER).unwrap();
        let center = grid.to_canvas_coordinates(DEFAULT_CENTER);
        let north_east =
            grid.to_canvas_coordinates(Coordinate::new(DEFAULT_CENTER.x + 640.0, DEFAULT_CENTER.y + 640.0));
        assert!((north_east.x - center.x - 256.0).abs() < 1e-9);
        assert!((north_east.y - center.y + 256.0).abs() < 1e-9);
    }

    #[test]
    fn covering_tiles_cover_the_canvas() {
        let grid = TileGrid::new(DEFAULT_CENTER, 6, CANVAS, LAYER).unwrap();
        let tiles = grid.covering_tiles();
        // 2 * delta + 1 in each direction
        assert_eq!(tiles.len(), 9);

        let distinct: HashSet<TileIndex> = tiles.iter().map(|t| t.tile_coordinates).collect();
        assert!(distinct.len() >= 4);

        // Every canvas pixel is under some tile
        for px in [0.0, 100.0, 255.0, 256.0, 400.0, 511.0] {
            for py in [0.0, 31.0, 32.0, 300.0, 511.0] {
                assert!(
                    tiles.iter().any(|t| {
                        let p = t.canvas_position;
                        p.x <= px && px < p.x + TILE_RENDER_SIZE && p.y <= py && py < p.y + TILE_RENDER_SIZE
                    }),
                    "({px}, {py}) isn't covered"
                );
            }
        }

        // Tiles and their pixel positions agree with each other
        let base = grid.base_tile();
        for t in &tiles {
            let dx = (t.tile_coordinates.x - base.tile_coordinates.x) as f64;
            let dy = (t.tile_coordinates.y - base.tile_coordinates.y) as f64;
            assert_eq!(t.canvas_position.x, base.canvas_position.x + dx * TILE_RENDER_SIZE);
            assert_eq!(t.canvas_position.y, base.canvas_position.y + dy * TILE_RENDER_SIZE);
        }
    }

    #[test]
    fn choose_zoom_fits_the_bbox() {
        let bbox = [
            Coordinate::new(2_600_000.0, 1_190_000.0),
            Coordinate::new(2_606_000.0, 1_193_000.0),
        ];
        // 2 tiles across: 6000m needs 3200m+ tiles, so 5120m
        let zoom = choose_zoom(CANVAS, bbox);
        assert_eq!(zoom, 3);
        assert!(6_000.0 <= 2.0 * TILE_SIZES[zoom]);
        assert!(6_000.0 > 2.0 * TILE_SIZES[zoom + 1]);
    }

    #[test]
    fn choose_zoom_with_tiny_bbox_returns_finest() {
        let bbox = [
            Coordinate::new(2_600_000.0, 1_200_000.0),
            Coordinate::new(2_600_001.0, 1_200_001.0),
        ];
        assert_eq!(choose_zoom(CANVAS, bbox), FINEST_AUTO_ZOOM);
    }

    #[test]
    fn choose_zoom_with_huge_bbox_returns_coarsest() {
        let bbox = [
            Coordinate::new(2_000_000.0, 1_000_000.0),
            Coordinate::new(3_000_000.0, 1_500_000.0),
        ];
        assert_eq!(choose_zoom(CANVAS, bbox), MIN_ZOOM);
    }

    #[test]
    fn pointer_near_the_edge_moves_the_center() {
        let grid = TileGrid::new(DEFAULT_CENTER, 6, CANVAS, LAYER).unwrap();
        // 512px at 2.5m per pixel is 1280m across, with a 64m border
        let [min, max] = grid.visible_extent();
        assert_eq!(max.x - min.x, 1_280.0);

        assert_eq!(grid.recenter_for_pointer(DEFAULT_CENTER), None);
        assert_eq!(
            grid.recenter_for_pointer(Coordinate::new(DEFAULT_CENTER.x + 500.0, DEFAULT_CENTER.y)),
            None
        );

        let moved = grid
            .recenter_for_pointer(Coordinate::new(DEFAULT_CENTER.x + 600.0, DEFAULT_CENTER.y - 620.0))
            .unwrap();
        assert_eq!(moved, Coordinate::new(DEFAULT_CENTER.x + 24.0, DEFAULT_CENTER.y - 44.0));
    }
}
