use geo_types::Coord;
use proj::Proj;

use crate::error::ProjectionError;
use crate::models::ProjectedPoint;

/// Latitude where Web Mercator squares off the world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Reprojects geographic coordinates onto the Web Mercator plane used by
/// XYZ basemap tiles.
pub struct Reprojector {
    proj: Proj,
}

impl Reprojector {
    pub fn web_mercator() -> Result<Self, ProjectionError> {
        let proj = Proj::new_known_crs("EPSG:4326", "EPSG:3857", None)?;
        Ok(Self { proj })
    }

    /// Projects `(x = lon, y = lat)` coordinates in degrees.
    ///
    /// Output has the input's length and order.
    pub fn project(&self, coords: &[Coord<f64>]) -> Result<Vec<ProjectedPoint>, ProjectionError> {
        coords.iter().map(|&coord| self.project_one(coord)).collect()
    }

    fn project_one(&self, coord: Coord<f64>) -> Result<ProjectedPoint, ProjectionError> {
        check_range(coord)?;
        // proj expects (lon, lat) order for geographic coordinates
        let (x, y) = self.proj.convert((coord.x, coord.y))?;
        Ok(ProjectedPoint { x, y })
    }
}

fn check_range(coord: Coord<f64>) -> Result<(), ProjectionError> {
    let valid = coord.x.is_finite()
        && coord.y.is_finite()
        && coord.x.abs() <= 180.0
        && coord.y.abs() <= MAX_MERCATOR_LAT;
    if valid {
        Ok(())
    } else {
        Err(ProjectionError::OutOfRange {
            lon: coord.x,
            lat: coord.y,
        })
    }
}
