pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod projection;
pub mod render;
pub mod stats;
pub mod tiles;
pub mod track;

pub use config::{FailurePolicy, GalleryConfig};
pub use index::{build_gallery, FileOutcome, GalleryReport, IndexDocument};
pub use render::MapStyle;
pub use tiles::{CachedTileSource, HttpTileSource, TileSource};
