use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use gpx::Gpx;

use crate::error::TrackError;
use crate::models::{Track, TrackFile, Trackpoint, Waypoint};

pub fn load_track(path: impl AsRef<Path>) -> Result<TrackFile, TrackError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TrackError::Io {
        source,
        path: path.into(),
    })?;
    read_track(BufReader::new(file)).map_err(|source| TrackError::Parse {
        source,
        path: path.into(),
    })
}

pub fn read_track<R: Read>(reader: R) -> Result<TrackFile, gpx::errors::GpxError> {
    let gpx = gpx::read(reader)?;
    Ok(from_gpx(&gpx))
}

fn from_gpx(gpx: &Gpx) -> TrackFile {
    let segments: Vec<Vec<Trackpoint>> = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .map(|segment| segment.points.iter().map(to_trackpoint).collect())
        .collect();

    let waypoints: Vec<Waypoint> = gpx.waypoints.iter().map(to_waypoint).collect();

    TrackFile {
        track: Track { segments },
        waypoints,
    }
}

fn to_trackpoint(point: &gpx::Waypoint) -> Trackpoint {
    let position = point.point();
    Trackpoint::new(position.y(), position.x(), point.elevation)
}

fn to_waypoint(point: &gpx::Waypoint) -> Waypoint {
    let position = point.point();
    Waypoint {
        lat: position.y(),
        lon: position.x(),
    }
}
