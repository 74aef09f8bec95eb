use std::{path::PathBuf, time::Duration};

use clap::Parser;
use gallery::{
    build_gallery,
    config::{
        DEFAULT_BASE_URL, DEFAULT_EXTENSION, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DOCUMENT,
        DEFAULT_TITLE,
    },
    tiles::OSM_TILE_URL,
    CachedTileSource, FailurePolicy, GalleryConfig, HttpTileSource, MapStyle,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Render a folder of GPX tracks to map images and a markdown index"
)]
struct Args {
    /// Directory holding the GPX files; images are written next to them
    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Path of the markdown index document
    #[arg(long, default_value = DEFAULT_OUTPUT_DOCUMENT)]
    output: PathBuf,

    /// URL prefix for image and download links
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    /// Track file extension, matched case-insensitively
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    extension: String,

    /// XYZ tile URL template with {z}, {x} and {y} placeholders
    #[arg(long, default_value = OSM_TILE_URL)]
    tile_url: String,

    #[arg(long, default_value_t = 30)]
    tile_timeout_secs: u64,

    #[arg(long, default_value_t = 17)]
    max_zoom: u8,

    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Skip tracks that fail to render instead of aborting the run
    #[arg(long)]
    keep_going: bool,
}

impl Args {
    fn config(&self) -> GalleryConfig {
        GalleryConfig {
            input_dir: self.input_dir.clone(),
            output_document: self.output.clone(),
            base_url: self.base_url.clone(),
            title: self.title.clone(),
            extension: self.extension.clone(),
            failure_policy: if self.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            style: MapStyle {
                width: self.width,
                height: self.height,
                max_zoom: self.max_zoom,
                ..MapStyle::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.config();
    let tiles = CachedTileSource::new(HttpTileSource::new(
        args.tile_url.as_str(),
        Duration::from_secs(args.tile_timeout_secs),
    )?);

    let report = build_gallery(&config, &tiles).await?;

    let failed = report.failures().count();
    if failed > 0 {
        tracing::warn!("{failed} track(s) skipped");
        for (file, error) in report.failures() {
            tracing::warn!("  {:?}: {}", file, error);
        }
    }
    tracing::info!(
        "{} track(s) listed in {:?}",
        report.entries().count(),
        report.document
    );

    Ok(())
}
