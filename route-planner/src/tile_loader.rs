use futures::future::try_join_all;
use log::{debug, info};

use crate::tiles::{Tile, TileSource};
use crate::Result;

/// Fetches every tile's image concurrently. Nothing is returned until all of them have arrived;
/// one failure fails the whole batch.
pub async fn load_tiles(
    client: &reqwest::Client,
    source: &TileSource,
    tiles: Vec<Tile>,
) -> Result<Vec<Tile>> {
    info!("Loading {} tiles", tiles.len());
    let loaded = try_join_all(tiles.into_iter().map(|tile| load_tile(client, source, tile))).await?;
    Ok(loaded)
}

async fn load_tile(client: &reqwest::Client, source: &TileSource, tile: Tile) -> Result<Tile> {
    let url = tile.url(source);
    debug!("GET {url}");
    let bytes = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(tile.with_image(bytes.to_vec()))
}
