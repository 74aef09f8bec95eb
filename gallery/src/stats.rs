use crate::models::{Trackpoint, TripSummary};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance and ascent along one uninterrupted run of points.
///
/// A pair where either point lacks an elevation counts its horizontal
/// distance only and adds nothing to the ascent.
pub fn summarize(points: &[Trackpoint]) -> TripSummary {
    let mut summary = TripSummary::default();

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        summary.distance_m += distance_3d_m(prev, curr);

        if let (Some(from), Some(to)) = (prev.elevation, curr.elevation) {
            let diff = to - from;
            if diff > 0.0 {
                summary.ascent_m += diff;
            }
        }
    }

    summary
}

pub fn distance_3d_m(a: &Trackpoint, b: &Trackpoint) -> f64 {
    let horizontal = haversine_m(a, b);
    match (a.elevation, b.elevation) {
        (Some(from), Some(to)) => horizontal.hypot(to - from),
        _ => horizontal,
    }
}

pub fn haversine_m(a: &Trackpoint, b: &Trackpoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
