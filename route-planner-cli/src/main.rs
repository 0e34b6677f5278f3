use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use route_planner::config::PlannerConfig;
use route_planner::grid::TileGrid;
use route_planner::projection::geographic_to_grid;
use route_planner::render::render_geojson;
use route_planner::settings::{persist_settings, restore_settings};
use route_planner::store::{RouteSource, RouteStore};
use route_planner::tile_loader::load_tiles;
use route_planner::tiles::CanvasPoint;
use route_planner_model::{Coordinate, GeoCoordinate};

#[derive(Parser)]
#[command(about = "Plan walking routes on the Swiss LV95 grid")]
struct Args {
    /// JSON file with a (partial) planner config
    #[arg(long)]
    config: Option<String>,

    /// Log every request
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Project a WGS84 coordinate onto the LV95 grid
    Project { lat: f64, lon: f64 },

    /// List the WMTS tiles covering a canvas centered on a grid coordinate
    Tiles {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long, default_value_t = 6)]
        zoom: usize,
        #[arg(long, default_value_t = 800.0)]
        width: f64,
        #[arg(long, default_value_t = 600.0)]
        height: f64,
        #[arg(long, default_value = "ch.swisstopo.pixelkarte-farbe")]
        layer: String,
        /// Also download the tile images into this directory
        #[arg(long)]
        download: Option<String>,
    },

    /// Upload a GPX or KML file, compute its walk time table, and write the map overlay
    Plan {
        input: String,
        #[arg(long, default_value = "overlay.geojson")]
        output: String,
        /// Send every path point as a waypoint, instead of letting the backend pick
        #[arg(long)]
        manual_waypoints: bool,
    },

    /// Plan a route, then start rendering its map PDFs
    Export {
        input: String,
        /// Remembered export settings; updated afterwards
        #[arg(long, default_value = "export-settings.json")]
        settings: String,
        #[arg(long)]
        creator: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    simple_logger::init_with_level(level)?;

    let config = match args.config {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => PlannerConfig::default(),
    };

    match args.command {
        Command::Project { lat, lon } => {
            let pt = geographic_to_grid(GeoCoordinate::new(lat, lon));
            println!("{:.2} {:.2}", pt.x, pt.y);
        }
        Command::Tiles {
            x,
            y,
            zoom,
            width,
            height,
            layer,
            download,
        } => {
            let grid = TileGrid::new(
                Coordinate::new(x, y),
                zoom,
                CanvasPoint {
                    x: width,
                    y: height,
                },
                &layer,
            )?;
            let tiles = grid.covering_tiles();
            for tile in &tiles {
                println!(
                    "{} at ({}, {})",
                    tile.url(&config.tile_source),
                    tile.canvas_position.x,
                    tile.canvas_position.y
                );
            }

            if let Some(dir) = download {
                std::fs::create_dir_all(&dir)?;
                let client = reqwest::Client::new();
                for tile in load_tiles(&client, &config.tile_source, tiles).await? {
                    let path = Path::new(&dir).join(format!(
                        "{}_{}_{}.{}",
                        tile.external_zoom_id(),
                        tile.tile_coordinates.x,
                        tile.tile_coordinates.y,
                        config.tile_source.format
                    ));
                    if let Some(ref image) = tile.image {
                        std::fs::write(&path, image)
                            .with_context(|| format!("writing {}", path.display()))?;
                    }
                }
                info!("Tiles written to {dir}");
            }
        }
        Command::Plan {
            input,
            output,
            manual_waypoints,
        } => {
            let store = RouteStore::connect(config);
            let name = upload(&store, &input).await?;
            if manual_waypoints {
                store.set_automatic_waypoint_selection(false).await?;
            }

            let snapshot = store.snapshot();
            info!(
                "{name}: {} points, {:.2} km, {} waypoints, {} POIs",
                snapshot.path.len(),
                snapshot
                    .path
                    .last()
                    .map_or(0.0, |waypt| waypt.accumulated_distance),
                snapshot.selected_waypoints.len(),
                snapshot.pois.len()
            );
            std::fs::write(&output, render_geojson(&snapshot, None)?)
                .with_context(|| format!("writing {output}"))?;
        }
        Command::Export {
            input,
            settings: settings_path,
            creator,
        } => {
            let stored = std::fs::read_to_string(&settings_path).ok();
            let mut settings = restore_settings(stored.as_deref());
            if let Some(creator) = creator {
                settings.creator_name = creator;
            }

            let store = RouteStore::connect(config);
            let name = upload(&store, &input).await?;
            if settings.route_name.is_empty() {
                settings.route_name = name;
            }
            if !settings.automatic_waypoint_selection {
                store.set_automatic_waypoint_selection(false).await?;
            }

            let uuid = store.export_map(settings.clone()).await?;
            std::fs::write(&settings_path, persist_settings(&settings)?)
                .with_context(|| format!("writing {settings_path}"))?;
            println!("{uuid}");
        }
    }

    Ok(())
}

async fn upload(store: &RouteStore, input: &str) -> Result<String> {
    let content = std::fs::read_to_string(input).with_context(|| format!("reading {input}"))?;
    let name = store
        .replace_route(RouteSource::from_file(input, content))
        .await
        .with_context(|| format!("planning {input}"))?;
    Ok(name)
}
