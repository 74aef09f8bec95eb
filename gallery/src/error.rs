use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to open track file {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse GPX in {path:?}: {source}")]
    Parse {
        source: gpx::errors::GpxError,
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to set up EPSG:4326 -> EPSG:3857 projection: {0}")]
    Setup(#[from] proj::ProjCreateError),
    #[error("coordinate out of range for Web Mercator: lon={lon}, lat={lat}")]
    OutOfRange { lon: f64, lat: f64 },
    #[error("projection failed: {0}")]
    Transform(#[from] proj::ProjError),
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error("tile request to {url} failed: {source}")]
    Request {
        source: reqwest::Error,
        url: String,
    },
    #[error("tile server answered {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("tile from {url} is not a readable image: {source}")]
    Decode {
        source: image::ImageError,
        url: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to draw: track and waypoints are both empty")]
    NoGeometry,
    #[error("basemap unavailable: {0}")]
    Tile(#[from] TileError),
    #[error("overlay font is unusable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    #[error("failed to write image {path:?}: {source}")]
    Write {
        source: image::ImageError,
        path: PathBuf,
    },
}

/// Anything that can stop a single track from being rendered.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("image {image:?} is already rendered from {earlier:?}")]
    ImageClash { image: PathBuf, earlier: PathBuf },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to list track directory {path:?}: {source}")]
    ReadDir {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to write index document {path:?}: {source}")]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("aborted at {file:?}: {source}")]
    Aborted {
        #[source]
        source: FileError,
        file: PathBuf,
    },
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
