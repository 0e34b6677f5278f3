use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use js_sys::{Function, Promise};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use route_planner_model::{Coordinate, GeoCoordinate};

use crate::config::PlannerConfig;
use crate::editor::RouteEditor;
use crate::grid::{choose_zoom, TileGrid};
use crate::projection::geographic_to_grid;
use crate::render::render_geojson;
use crate::settings::{persist_settings, restore_settings, ExportSettings};
use crate::store::{RouteSource, RouteStore};
use crate::tiles::{CanvasPoint, Tile, TileSource};

static START: Once = Once::new();

fn setup() {
    START.call_once(|| {
        // Only fails if some other logger is already installed
        let _ = console_log::init_with_level(log::Level::Info);
        console_error_panic_hook::set_once();
    });
}

fn err_to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct JsRoutePlanner {
    store: Rc<RouteStore>,
    editor: Rc<RefCell<RouteEditor>>,
}

#[wasm_bindgen]
impl JsRoutePlanner {
    /// `config` is a partial `PlannerConfig`; anything left out takes its default.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsRoutePlanner, JsValue> {
        setup();
        let config: PlannerConfig = if config.is_undefined() || config.is_null() {
            PlannerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let store = Rc::new(RouteStore::connect(config));
        let editor = Rc::new(RefCell::new(RouteEditor::new(store.clone())));
        Ok(Self { store, editor })
    }

    /// Calls `callback` with no arguments whenever anything drawn on the map changes.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Function) {
        let notify = move || {
            let _ = callback.call0(&JsValue::NULL);
        };
        let f = notify.clone();
        self.store.path().subscribe(move |_| f());
        let f = notify.clone();
        self.store.selected_waypoints().subscribe(move |_| f());
        let f = notify.clone();
        self.store.pois().subscribe(move |_| f());
        let f = notify.clone();
        self.store.pointer().subscribe(move |_| f());
        self.store.map_center().subscribe(move |_| notify());
    }

    /// Resolves to the route's name.
    #[wasm_bindgen(js_name = replaceRoute)]
    pub fn replace_route(&self, file_name: String, content: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let name = store
                .replace_route(RouteSource::from_file(&file_name, content))
                .await
                .map_err(err_to_js)?;
            Ok(JsValue::from_str(&name))
        })
    }

    /// Marks the path point nearest to `(x, y)`, if it's close enough to the path.
    #[wasm_bindgen(js_name = addPointOfInterest)]
    pub fn add_point_of_interest(&self, x: f64, y: f64) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let Some(poi) = store.nearest_path_point(Coordinate::new(x, y)) else {
                return Ok(JsValue::FALSE);
            };
            store.add_point_of_interest(poi).await.map_err(err_to_js)?;
            Ok(JsValue::TRUE)
        })
    }

    #[wasm_bindgen(js_name = deletePoi)]
    pub fn delete_poi(&self, x: f64, y: f64) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let poi = route_planner_model::Waypoint::new(Coordinate::new(x, y), 0.0, 0.0);
            store.delete_poi(&poi).await.map_err(err_to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = addWaypointByDrawing)]
    pub fn add_waypoint_by_drawing(&self, x: f64, y: f64) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store
                .add_waypoint_by_drawing(Coordinate::new(x, y))
                .await
                .map_err(err_to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = finishDrawing)]
    pub fn finish_drawing(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let name = store.finish_drawing().await.map_err(err_to_js)?;
            Ok(JsValue::from_str(&name))
        })
    }

    #[wasm_bindgen(js_name = setAutomaticWaypointSelection)]
    pub fn set_automatic_waypoint_selection(&self, automatic: bool) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store
                .set_automatic_waypoint_selection(automatic)
                .await
                .map_err(err_to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves to the export job's id.
    #[wasm_bindgen(js_name = exportMap)]
    pub fn export_map(&self, settings: JsValue) -> Result<Promise, JsValue> {
        let settings: ExportSettings = serde_wasm_bindgen::from_value(settings)?;
        let store = self.store.clone();
        Ok(future_to_promise(async move {
            let uuid = store.export_map(settings).await.map_err(err_to_js)?;
            Ok(JsValue::from_str(&uuid))
        }))
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    #[wasm_bindgen(js_name = setMapCenter)]
    pub fn set_map_center(&self, x: f64, y: f64) {
        self.store.set_map_center(Coordinate::new(x, y));
    }

    #[wasm_bindgen(js_name = onPointerMove)]
    pub fn on_pointer_move(&self, x: f64, y: f64) {
        self.store.hover(Coordinate::new(x, y));
    }

    /// True if the map shouldn't pan for this event.
    #[wasm_bindgen(js_name = onPointerDrag)]
    pub fn on_pointer_drag(&self, x: f64, y: f64, buttons: u16) -> bool {
        self.editor
            .borrow_mut()
            .on_pointer_drag(Coordinate::new(x, y), buttons)
    }

    /// Resolves to true if the path was re-routed.
    #[wasm_bindgen(js_name = onPointerUp)]
    pub fn on_pointer_up(&self) -> Promise {
        let detour = self.editor.borrow_mut().release();
        let store = self.store.clone();
        future_to_promise(async move {
            let changed = match detour {
                Some(detour) => detour.apply(&store).await,
                None => false,
            };
            Ok(JsValue::from_bool(changed))
        })
    }

    #[wasm_bindgen(js_name = renderGeojson)]
    pub fn render_geojson(&self) -> Result<String, JsValue> {
        let preview = self.editor.borrow().preview();
        render_geojson(&self.store.snapshot(), preview).map_err(err_to_js)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.store.snapshot())?)
    }
}

/// Restores remembered export settings, migrating old formats. Never fails.
#[wasm_bindgen(js_name = restoreSettings)]
pub fn restore_settings_js(stored: Option<String>) -> Result<JsValue, JsValue> {
    setup();
    Ok(serde_wasm_bindgen::to_value(&restore_settings(stored.as_deref()))?)
}

#[wasm_bindgen(js_name = persistSettings)]
pub fn persist_settings_js(settings: JsValue) -> Result<String, JsValue> {
    let settings: ExportSettings = serde_wasm_bindgen::from_value(settings)?;
    persist_settings(&settings).map_err(err_to_js)
}

#[wasm_bindgen(js_name = geographicToGrid)]
pub fn geographic_to_grid_js(lat: f64, lon: f64) -> Result<JsValue, JsValue> {
    Ok(serde_wasm_bindgen::to_value(&geographic_to_grid(
        GeoCoordinate::new(lat, lon),
    ))?)
}

#[wasm_bindgen(js_name = chooseZoom)]
pub fn choose_zoom_js(
    width: f64,
    height: f64,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
) -> usize {
    choose_zoom(
        CanvasPoint {
            x: width,
            y: height,
        },
        [Coordinate::new(min_x, min_y), Coordinate::new(max_x, max_y)],
    )
}

#[derive(Serialize)]
struct TileView<'a> {
    #[serde(flatten)]
    tile: &'a Tile,
    url: String,
}

#[wasm_bindgen]
pub struct JsTileGrid {
    grid: TileGrid,
    source: TileSource,
}

#[wasm_bindgen]
impl JsTileGrid {
    #[wasm_bindgen(constructor)]
    pub fn new(
        x: f64,
        y: f64,
        zoom_level: usize,
        width: f64,
        height: f64,
        layer: String,
    ) -> Result<JsTileGrid, JsValue> {
        setup();
        let grid = TileGrid::new(
            Coordinate::new(x, y),
            zoom_level,
            CanvasPoint {
                x: width,
                y: height,
            },
            &layer,
        )
        .map_err(err_to_js)?;
        Ok(Self {
            grid,
            source: TileSource::default(),
        })
    }

    #[wasm_bindgen(js_name = setTileSource)]
    pub fn set_tile_source(&mut self, source: JsValue) -> Result<(), JsValue> {
        self.source = serde_wasm_bindgen::from_value(source)?;
        Ok(())
    }

    /// Each tile with its image URL
    #[wasm_bindgen(js_name = coveringTiles)]
    pub fn covering_tiles(&self) -> Result<JsValue, JsValue> {
        let tiles = self.grid.covering_tiles();
        let views: Vec<TileView> = tiles
            .iter()
            .map(|tile| TileView {
                tile,
                url: tile.url(&self.source),
            })
            .collect();
        Ok(serde_wasm_bindgen::to_value(&views)?)
    }

    #[wasm_bindgen(js_name = toCanvasCoordinates)]
    pub fn to_canvas_coordinates(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(
            &self.grid.to_canvas_coordinates(Coordinate::new(x, y)),
        )?)
    }

    /// The new map center, or null if the pointer is comfortably inside the map
    #[wasm_bindgen(js_name = recenterForPointer)]
    pub fn recenter_for_pointer(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(
            &self.grid.recenter_for_pointer(Coordinate::new(x, y)),
        )?)
    }
}
