//! XYZ basemap tiles: addressing, HTTP fetching and an in-run cache.
//!
//! Fetching is kept apart from drawing. The renderer only ever sees a
//! [`Basemap`] that has already been filled, so map drawing can be tested
//! without a network.

use std::{
    collections::HashMap,
    future::Future,
    num::NonZeroUsize,
    sync::Mutex,
    time::Duration,
};

use image::RgbaImage;
use lru::LruCache;

use crate::error::TileError;

pub const TILE_SIZE: u32 = 256;

/// Half the side of the square Web Mercator world, in metres.
pub const WORLD_HALF_M: f64 = 20_037_508.342_789_244;

pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CACHE_TILES: usize = 512;

/// Metres per pixel at `zoom` for tiles rendered at their native size.
pub fn resolution(zoom: u8) -> f64 {
    2.0 * WORLD_HALF_M / (f64::from(TILE_SIZE) * 2f64.powi(i32::from(zoom)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Tile at column `x` and row `y`, wrapping columns around the antimeridian
    /// and clamping rows to the world.
    pub fn wrapped(zoom: u8, x: i64, y: i64) -> Self {
        let count = 1i64 << zoom;
        Self {
            zoom,
            x: x.rem_euclid(count) as u32,
            y: y.clamp(0, count - 1) as u32,
        }
    }
}

pub trait TileSource {
    fn fetch(&self, tile: TileId) -> impl Future<Output = Result<RgbaImage, TileError>> + Send;
}

/// Tiles fetched for one map, keyed by address.
#[derive(Debug, Default)]
pub struct Basemap {
    tiles: HashMap<TileId, RgbaImage>,
}

impl Basemap {
    pub fn get(&self, tile: &TileId) -> Option<&RgbaImage> {
        self.tiles.get(tile)
    }

    pub fn insert(&mut self, tile: TileId, image: RgbaImage) {
        self.tiles.insert(tile, image);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Fetches each distinct tile in turn. The first failure aborts the basemap.
pub async fn fetch_basemap<S: TileSource>(
    source: &S,
    tiles: impl IntoIterator<Item = TileId>,
) -> Result<Basemap, TileError> {
    let mut basemap = Basemap::default();
    for tile in tiles {
        if basemap.get(&tile).is_some() {
            continue;
        }
        let image = source.fetch(tile).await?;
        basemap.insert(tile, image);
    }
    Ok(basemap)
}

pub struct HttpTileSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpTileSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, TileError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(TileError::Client)?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn tile_url(&self, tile: TileId) -> String {
        self.url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

impl TileSource for HttpTileSource {
    async fn fetch(&self, tile: TileId) -> Result<RgbaImage, TileError> {
        let url = self.tile_url(tile);
        tracing::debug!("fetching tile {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TileError::Request {
                source,
                url: url.clone(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TileError::Status { status, url });
        }

        let bytes = response.bytes().await.map_err(|source| TileError::Request {
            source,
            url: url.clone(),
        })?;

        image::load_from_memory(&bytes)
            .map(|decoded| decoded.to_rgba8())
            .map_err(|source| TileError::Decode { source, url })
    }
}

/// Keeps recently used tiles so neighbouring tracks share downloads.
pub struct CachedTileSource<S> {
    inner: S,
    cache: Mutex<LruCache<TileId, RgbaImage>>,
}

impl<S> CachedTileSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_TILES)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, tile: &TileId) -> Option<RgbaImage> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(tile).cloned()
    }

    fn remember(&self, tile: TileId, image: RgbaImage) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.put(tile, image);
    }
}

impl<S: TileSource + Sync> TileSource for CachedTileSource<S> {
    async fn fetch(&self, tile: TileId) -> Result<RgbaImage, TileError> {
        if let Some(image) = self.cached(&tile) {
            tracing::debug!("tile cache hit {tile:?}");
            return Ok(image);
        }
        let image = self.inner.fetch(tile).await?;
        self.remember(tile, image.clone());
        Ok(image)
    }
}
