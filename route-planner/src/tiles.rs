use serde::{Deserialize, Serialize};

use crate::{PlannerError, Result};

/// Pixels per tile on the canvas
pub const TILE_RENDER_SIZE: f64 = 256.0;
/// Meters per tile, indexed by internal zoom level. Coarsest first.
pub const TILE_SIZES: [f64; 12] = [
    64_000.0, 25_600.0, 12_800.0, 5_120.0, 2_560.0, 1_280.0, 640.0, 512.0, 384.0, 256.0, 128.0,
    64.0,
];
/// The WMTS TileMatrix id for each internal zoom level
pub const EXTERNAL_ZOOM_IDS: [u32; 12] = [16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27];

// The first and last entries of the tables aren't addressable
pub const MIN_ZOOM: usize = 1;
pub const MAX_ZOOM: usize = TILE_SIZES.len() - 2;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TileIndex {
    pub x: i64,
    pub y: i64,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

/// Where tile images come from. The defaults point at swisstopo's public WMTS.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct TileSource {
    pub base_url: String,
    pub timestamp: String,
    pub projection: String,
    pub format: String,
}

impl Default for TileSource {
    fn default() -> Self {
        TileSource {
            base_url: "https://wmts100.geo.admin.ch/1.0.0".to_string(),
            timestamp: "current".to_string(),
            projection: "2056".to_string(),
            format: "jpeg".to_string(),
        }
    }
}

/// One map tile, placed on the canvas. Never changed after creation; neighbors are new values.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct Tile {
    pub tile_coordinates: TileIndex,
    pub zoom_level: usize,
    pub canvas_position: CanvasPoint,
    pub layer: String,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

pub fn check_zoom(zoom_level: usize) -> Result<()> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom_level) {
        return Err(PlannerError::InvalidZoomLevel(zoom_level));
    }
    Ok(())
}

pub fn tile_size(zoom_level: usize) -> Result<f64> {
    check_zoom(zoom_level)?;
    Ok(TILE_SIZES[zoom_level])
}

impl Tile {
    pub fn new(
        tile_coordinates: TileIndex,
        canvas_position: CanvasPoint,
        layer: &str,
        zoom_level: usize,
    ) -> Result<Tile> {
        check_zoom(zoom_level)?;
        Ok(Tile {
            tile_coordinates,
            zoom_level,
            canvas_position,
            layer: layer.to_string(),
            image: None,
        })
    }

    pub fn north(&self) -> Tile {
        self.shifted(0, -1)
    }

    pub fn south(&self) -> Tile {
        self.shifted(0, 1)
    }

    pub fn east(&self) -> Tile {
        self.shifted(1, 0)
    }

    pub fn west(&self) -> Tile {
        self.shifted(-1, 0)
    }

    // Tile rows count southward, just like canvas pixels
    fn shifted(&self, dx: i64, dy: i64) -> Tile {
        Tile {
            tile_coordinates: TileIndex {
                x: self.tile_coordinates.x + dx,
                y: self.tile_coordinates.y + dy,
            },
            zoom_level: self.zoom_level,
            canvas_position: CanvasPoint {
                x: self.canvas_position.x + dx as f64 * TILE_RENDER_SIZE,
                y: self.canvas_position.y + dy as f64 * TILE_RENDER_SIZE,
            },
            layer: self.layer.clone(),
            image: None,
        }
    }

    pub fn external_zoom_id(&self) -> u32 {
        EXTERNAL_ZOOM_IDS[self.zoom_level]
    }

    pub fn url(&self, source: &TileSource) -> String {
        format!(
            "{}/{}/default/{}/{}/{}/{}/{}.{}",
            source.base_url.trim_end_matches('/'),
            self.layer,
            source.timestamp,
            source.projection,
            self.external_zoom_id(),
            self.tile_coordinates.x,
            self.tile_coordinates.y,
            source.format
        )
    }

    pub fn with_image(self, image: Vec<u8>) -> Tile {
        Tile {
            image: Some(image),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> Tile {
        Tile::new(
            TileIndex { x: 468, y: 208 },
            CanvasPoint { x: 194.0, y: 32.0 },
            "ch.swisstopo.pixelkarte-farbe",
            6,
        )
        .unwrap()
    }

    #[test]
    fn rejects_reserved_zoom_levels() {
        for zoom in [0, MAX_ZOOM + 1, 40] {
            let err = Tile::new(TileIndex { x: 0, y: 0 }, CanvasPoint::default(), "x", zoom);
            assert!(matches!(err, Err(PlannerError::InvalidZoomLevel(z)) if z == zoom));
        }
        assert!(Tile::new(TileIndex { x: 0, y: 0 }, CanvasPoint::default(), "x", MIN_ZOOM).is_ok());
        assert!(Tile::new(TileIndex { x: 0, y: 0 }, CanvasPoint::default(), "x", MAX_ZOOM).is_ok());
    }

    #[test]
    fn neighbors_are_new_values() {
        let base = tile();
        let north = base.north();
        assert_eq!(north.tile_coordinates, TileIndex { x: 468, y: 207 });
        assert_eq!(north.canvas_position, CanvasPoint { x: 194.0, y: -224.0 });

        let east = base.east();
        assert_eq!(east.tile_coordinates, TileIndex { x: 469, y: 208 });
        assert_eq!(east.canvas_position, CanvasPoint { x: 450.0, y: 32.0 });

        assert_eq!(base.south().west().north().east(), base);
        // Neighbours are new values
        assert_eq!(base, tile());
    }

    #[test]
    fn url_template() {
        assert_eq!(
            tile().url(&TileSource::default()),
            "https://wmts100.geo.admin.ch/1.0.0/ch.swisstopo.pixelkarte-farbe/default/current/2056/22/468/208.jpeg"
        );
    }
}
