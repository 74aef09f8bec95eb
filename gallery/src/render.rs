use std::path::Path;

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;

use crate::error::{FileError, RenderError};
use crate::models::{ProjectedPoint, TrackFile, Trackpoint, TripSummary, Waypoint};
use crate::projection::Reprojector;
use crate::tiles::{
    fetch_basemap, resolution, Basemap, TileId, TileSource, TILE_SIZE, WORLD_HALF_M,
};
use crate::track::load_track;

const OVERLAY_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Smallest extent a map shows, so a single point still gets a street-level view.
const MIN_SPAN_M: f64 = 250.0;

const BACKGROUND: Rgba<u8> = Rgba([224, 224, 224, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const OVERLAY_ALPHA: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    pub max_zoom: u8,
    /// Margin around the data, as a fraction of its extent on each side.
    pub padding: f64,
    pub track_color: Rgba<u8>,
    pub track_width: f32,
    pub waypoint_color: Rgba<u8>,
    pub waypoint_radius: f32,
    pub font_size: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            max_zoom: 17,
            padding: 0.05,
            track_color: Rgba([0, 0, 255, 255]),
            track_width: 3.0,
            waypoint_color: Rgba([255, 0, 0, 255]),
            waypoint_radius: 10.0,
            font_size: 17.0,
        }
    }
}

/// A tile together with where its top-left corner lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlacement {
    pub tile: TileId,
    pub left: i64,
    pub top: i64,
}

/// The window of the Web Mercator world shown on the canvas.
///
/// `origin_x`/`origin_y` are whole global pixel coordinates at `zoom`, so
/// tiles land on exact pixel boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: u8,
    width: u32,
    height: u32,
    origin_x: f64,
    origin_y: f64,
}

impl Viewport {
    /// Frames every point at the deepest zoom that still fits them on the canvas.
    pub fn fit(points: &[ProjectedPoint], style: &MapStyle) -> Result<Self, RenderError> {
        let first = points.first().ok_or(RenderError::NoGeometry)?;
        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        );

        let grow = 1.0 + 2.0 * style.padding.max(0.0);
        let span_x = (max_x - min_x).max(MIN_SPAN_M) * grow;
        let span_y = (max_y - min_y).max(MIN_SPAN_M) * grow;
        let width = style.width.max(1);
        let height = style.height.max(1);
        let needed = (span_x / f64::from(width)).max(span_y / f64::from(height));
        let zoom = zoom_for(needed, style.max_zoom);

        let res = resolution(zoom);
        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;

        Ok(Self {
            zoom,
            width,
            height,
            origin_x: ((center_x + WORLD_HALF_M) / res - f64::from(width) / 2.0).round(),
            origin_y: ((WORLD_HALF_M - center_y) / res - f64::from(height) / 2.0).round(),
        })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn to_pixel(&self, point: &ProjectedPoint) -> (f32, f32) {
        let res = resolution(self.zoom);
        let x = (point.x + WORLD_HALF_M) / res - self.origin_x;
        let y = (WORLD_HALF_M - point.y) / res - self.origin_y;
        (x as f32, y as f32)
    }

    /// Tiles covering the canvas. Rows beyond the poles are left out.
    pub fn tiles(&self) -> Vec<TilePlacement> {
        let size = f64::from(TILE_SIZE);
        let rows = 1i64 << self.zoom;
        let first_col = (self.origin_x / size).floor() as i64;
        let last_col = ((self.origin_x + f64::from(self.width) - 1.0) / size).floor() as i64;
        let first_row = ((self.origin_y / size).floor() as i64).max(0);
        let last_row =
            (((self.origin_y + f64::from(self.height) - 1.0) / size).floor() as i64).min(rows - 1);

        let mut placements = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                placements.push(TilePlacement {
                    tile: TileId::wrapped(self.zoom, col, row),
                    left: col * i64::from(TILE_SIZE) - self.origin_x as i64,
                    top: row * i64::from(TILE_SIZE) - self.origin_y as i64,
                });
            }
        }
        placements
    }
}

fn zoom_for(metres_per_px: f64, max_zoom: u8) -> u8 {
    let world_px = 2.0 * WORLD_HALF_M / f64::from(TILE_SIZE);
    let zoom = (world_px / metres_per_px).log2().floor();
    if zoom.is_nan() {
        return 0;
    }
    zoom.clamp(0.0, f64::from(max_zoom)) as u8
}

/// Text box burned into the top-left corner of each map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    lines: Vec<String>,
}

impl Overlay {
    pub fn new(file_name: &str, summary: &TripSummary) -> Self {
        Self {
            lines: vec![
                file_name.to_string(),
                format!("Distance: {:.1} km", summary.distance_km()),
                format!("Ascent: {} m", summary.ascent_m.round_ties_even() as i64),
            ],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

pub fn overlay_font() -> Result<FontRef<'static>, InvalidFont> {
    FontRef::try_from_slice(OVERLAY_FONT)
}

/// Draws a complete map. Pure: everything it needs has already been fetched.
pub fn draw_map(
    viewport: &Viewport,
    basemap: &Basemap,
    track: &[ProjectedPoint],
    waypoints: &[ProjectedPoint],
    overlay: &Overlay,
    style: &MapStyle,
) -> Result<RgbaImage, RenderError> {
    let font = overlay_font()?;
    let (width, height) = viewport.size();
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

    for placement in viewport.tiles() {
        match basemap.get(&placement.tile) {
            Some(tile) => imageops::overlay(&mut canvas, tile, placement.left, placement.top),
            None => tracing::warn!("tile {:?} missing from basemap", placement.tile),
        }
    }

    let line: Vec<(f32, f32)> = track.iter().map(|p| viewport.to_pixel(p)).collect();
    draw_thick_polyline(&mut canvas, &line, style.track_width, style.track_color);

    for waypoint in waypoints {
        let (x, y) = viewport.to_pixel(waypoint);
        draw_star(&mut canvas, x, y, style.waypoint_radius, style.waypoint_color);
    }

    draw_overlay(&mut canvas, overlay, &font, style.font_size);
    Ok(canvas)
}

fn draw_thick_polyline(canvas: &mut RgbaImage, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
    let radius = (width / 2.0).round().max(1.0) as i32;
    let stamp = |canvas: &mut RgbaImage, x: f32, y: f32| {
        draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
    };

    if let [(x, y)] = points {
        stamp(canvas, *x, *y);
        return;
    }

    for pair in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let steps = ((x1 - x0).hypot(y1 - y0).ceil() as usize).max(1);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            stamp(canvas, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
        }
    }
}

fn draw_star(canvas: &mut RgbaImage, x: f32, y: f32, outer: f32, color: Rgba<u8>) {
    if outer < 3.0 {
        draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), 1, color);
        return;
    }
    let inner = outer * 0.45;
    let vertices: Vec<Point<i32>> = (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { inner };
            let angle = -std::f32::consts::FRAC_PI_2 + i as f32 * std::f32::consts::PI / 5.0;
            Point::new(
                (x + radius * angle.cos()).round() as i32,
                (y + radius * angle.sin()).round() as i32,
            )
        })
        .collect();
    draw_polygon_mut(canvas, &vertices, color);
}

fn draw_overlay(canvas: &mut RgbaImage, overlay: &Overlay, font: &FontRef<'_>, font_size: f32) {
    let scale = PxScale::from(font_size);
    let line_height = (font_size * 1.3).ceil() as u32;
    let pad = (font_size / 2.0).ceil() as u32;

    let text_width = overlay
        .lines()
        .iter()
        .map(|line| text_size(scale, font, line).0)
        .max()
        .unwrap_or(0);
    let box_width = text_width + 2 * pad;
    let box_height = line_height * overlay.lines().len() as u32 + 2 * pad;

    let left = canvas.width() / 100;
    let top = canvas.height() / 100;
    let right = (left + box_width).min(canvas.width());
    let bottom = (top + box_height).min(canvas.height());

    for y in top..bottom {
        for x in left..right {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut().take(3) {
                let blended = f32::from(*channel) * (1.0 - OVERLAY_ALPHA) + 255.0 * OVERLAY_ALPHA;
                *channel = blended.round() as u8;
            }
        }
    }

    for (i, line) in overlay.lines().iter().enumerate() {
        let y = top + pad + i as u32 * line_height;
        draw_text_mut(canvas, TEXT_COLOR, (left + pad) as i32, y as i32, scale, font, line);
    }
}

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), RenderError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| RenderError::Write {
            source,
            path: path.into(),
        })
}

/// Loads one GPX file, renders its map to `image_path` and returns its statistics.
pub async fn render_track<S: TileSource>(
    track_path: &Path,
    image_path: &Path,
    reprojector: &Reprojector,
    tiles: &S,
    style: &MapStyle,
) -> Result<TripSummary, FileError> {
    let TrackFile { track, waypoints } = load_track(track_path)?;
    let summary = track.summary();

    let track_coords: Vec<_> = track.points().map(Trackpoint::coord).collect();
    let waypoint_coords: Vec<_> = waypoints.iter().map(Waypoint::coord).collect();
    let track_xy = reprojector.project(&track_coords)?;
    let waypoint_xy = reprojector.project(&waypoint_coords)?;

    let extent: Vec<ProjectedPoint> = track_xy.iter().chain(&waypoint_xy).copied().collect();
    let viewport = Viewport::fit(&extent, style)?;
    let basemap = fetch_basemap(tiles, viewport.tiles().into_iter().map(|p| p.tile))
        .await
        .map_err(RenderError::from)?;
    tracing::debug!(
        "basemap for {:?}: zoom {}, {} tiles",
        track_path,
        viewport.zoom(),
        basemap.len()
    );

    let file_name = track_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let overlay = Overlay::new(&file_name, &summary);
    let image = draw_map(&viewport, &basemap, &track_xy, &waypoint_xy, &overlay, style)?;
    write_png(&image, image_path)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgba<u8> = Rgba([200, 200, 200, 255]);

    fn pt(x: f64, y: f64) -> ProjectedPoint {
        ProjectedPoint { x, y }
    }

    fn grey_basemap(viewport: &Viewport) -> Basemap {
        let mut basemap = Basemap::default();
        for placement in viewport.tiles() {
            basemap.insert(placement.tile, RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, GREY));
        }
        basemap
    }

    fn is_red(pixel: &Rgba<u8>) -> bool {
        pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60
    }

    fn overlay() -> Overlay {
        Overlay::new(
            "ride.gpx",
            &TripSummary {
                distance_m: 12_345.0,
                ascent_m: 456.6,
            },
        )
    }

    #[test]
    fn overlay_formats_distance_and_ascent() {
        assert_eq!(
            overlay().lines(),
            ["ride.gpx", "Distance: 12.3 km", "Ascent: 457 m"]
        );
    }

    #[test]
    fn ascent_halves_round_to_even() {
        let ascent = |ascent_m| {
            let summary = TripSummary {
                distance_m: 0.0,
                ascent_m,
            };
            Overlay::new("x.gpx", &summary).lines()[2].clone()
        };
        assert_eq!(ascent(456.5), "Ascent: 456 m");
        assert_eq!(ascent(457.5), "Ascent: 458 m");
        assert_eq!(ascent(456.51), "Ascent: 457 m");
    }

    #[test]
    fn fit_requires_geometry() {
        let err = Viewport::fit(&[], &MapStyle::default()).unwrap_err();
        assert!(matches!(err, RenderError::NoGeometry));
    }

    #[test]
    fn fit_keeps_every_point_on_canvas() {
        let style = MapStyle::default();
        let points = [
            pt(600_000.0, 5_650_000.0),
            pt(640_000.0, 5_700_000.0),
            pt(610_000.0, 5_690_000.0),
        ];
        let viewport = Viewport::fit(&points, &style).unwrap();

        for p in &points {
            let (x, y) = viewport.to_pixel(p);
            assert!(x >= 0.0 && x < style.width as f32, "x={x}");
            assert!(y >= 0.0 && y < style.height as f32, "y={y}");
        }
        // One zoom level deeper would no longer fit.
        let deeper = resolution(viewport.zoom() + 1);
        assert!(50_000.0 / deeper > f64::from(style.height));
    }

    #[test]
    fn fit_clamps_to_max_zoom() {
        let style = MapStyle {
            max_zoom: 12,
            ..MapStyle::default()
        };
        let viewport = Viewport::fit(&[pt(1.0, 1.0)], &style).unwrap();
        assert_eq!(viewport.zoom(), 12);
    }

    #[test]
    fn tiles_cover_the_canvas() {
        let viewport =
            Viewport::fit(&[pt(0.0, 0.0), pt(30_000.0, 20_000.0)], &MapStyle::default()).unwrap();
        let placements = viewport.tiles();
        let size = TILE_SIZE as i64;

        let covers = |x: i64, y: i64| {
            placements
                .iter()
                .any(|p| x >= p.left && x < p.left + size && y >= p.top && y < p.top + size)
        };
        assert!(covers(0, 0));
        assert!(covers(999, 0));
        assert!(covers(0, 799));
        assert!(covers(999, 799));
    }

    #[test]
    fn draws_track_over_basemap() {
        let style = MapStyle::default();
        let track = [pt(0.0, 0.0), pt(10_000.0, 10_000.0)];
        let viewport = Viewport::fit(&track, &style).unwrap();
        let basemap = grey_basemap(&viewport);
        let image = draw_map(&viewport, &basemap, &track, &[], &overlay(), &style).unwrap();

        assert_eq!(image.dimensions(), (style.width, style.height));
        let (x, y) = viewport.to_pixel(&pt(5_000.0, 5_000.0));
        assert_eq!(*image.get_pixel(x.round() as u32, y.round() as u32), style.track_color);
        assert_eq!(*image.get_pixel(style.width - 1, style.height - 1), GREY);
    }

    #[test]
    fn waypoints_drawn_only_when_present() {
        let style = MapStyle::default();
        let track = [pt(0.0, 0.0), pt(10_000.0, 0.0)];
        let waypoint = [pt(5_000.0, 3_000.0)];
        let viewport = Viewport::fit(&[track[0], track[1], waypoint[0]], &style).unwrap();
        let basemap = grey_basemap(&viewport);

        let bare = draw_map(&viewport, &basemap, &track, &[], &overlay(), &style).unwrap();
        assert!(!bare.pixels().any(is_red));

        let marked = draw_map(&viewport, &basemap, &track, &waypoint, &overlay(), &style).unwrap();
        let (x, y) = viewport.to_pixel(&waypoint[0]);
        assert!(is_red(marked.get_pixel(x.round() as u32, y.round() as u32)));
    }

    #[test]
    fn overlay_box_lightens_top_left() {
        let style = MapStyle::default();
        let track = [pt(0.0, 0.0), pt(10_000.0, 10_000.0)];
        let viewport = Viewport::fit(&track, &style).unwrap();
        let basemap = grey_basemap(&viewport);
        let image = draw_map(&viewport, &basemap, &track, &[], &overlay(), &style).unwrap();

        // Inside the box padding, before any text.
        let inside = image.get_pixel(style.width / 100 + 2, style.height / 100 + 2);
        assert!((237..=240).contains(&inside[0]), "{inside:?}");
        assert_eq!(inside[0], inside[2]);
        assert_eq!(inside[3], 255);
    }

    #[test]
    fn write_png_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        std::fs::write(&path, b"stale").unwrap();

        write_png(&RgbaImage::from_pixel(4, 3, GREY), &path).unwrap();
        let reread = image::open(&path).unwrap();
        assert_eq!((reread.width(), reread.height()), (4, 3));
    }
}
