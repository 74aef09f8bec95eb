use geo_types::Coord;

use crate::stats::summarize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trackpoint {
    pub lat: f64,
    pub lon: f64,
    /// Metres above sea level, when the recorder provided one.
    pub elevation: Option<f64>,
}

impl Trackpoint {
    pub fn new(lat: f64, lon: f64, elevation: Option<f64>) -> Self {
        Self {
            lat,
            lon,
            elevation,
        }
    }

    /// Geographic position with `x = lon`, `y = lat`.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Recorded track, split into the segments of the source file.
///
/// Statistics never bridge two segments, but the plotted line does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub segments: Vec<Vec<Trackpoint>>,
}

impl Track {
    /// All points in recording order.
    pub fn points(&self) -> impl Iterator<Item = &Trackpoint> + '_ {
        self.segments.iter().flatten()
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    pub fn summary(&self) -> TripSummary {
        self.segments
            .iter()
            .map(|segment| summarize(segment))
            .fold(TripSummary::default(), |acc, s| TripSummary {
                distance_m: acc.distance_m + s.distance_m,
                ascent_m: acc.ascent_m + s.ascent_m,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Everything the loader pulls out of one GPX file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFile {
    pub track: Track,
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TripSummary {
    pub distance_m: f64,
    pub ascent_m: f64,
}

impl TripSummary {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }
}

/// Web Mercator (EPSG:3857) coordinates in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

/// One rendered track as listed in the index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    /// Image file name, relative to the input directory.
    pub image_path: String,
    /// Track file name as found on disk, extension case included, rather than `<name>.gpx`.
    pub source_path: String,
}
