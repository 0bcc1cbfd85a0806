use crate::core::geo::{geo_to_world, GeoPoint, START_POINT};
use helpers::general::{clamp_unit, lerp};
use serde::{Deserialize, Serialize};

/// RacerPosition is the world pose of a racer derived from its progress along a route.
///
/// * `rotation` - (deg) Heading of the active route segment, atan2(dlat, dlon)
/// * `world` - World coordinates [x, y, z] as produced by `geo_to_world`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RacerPosition {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub rotation: f64,
    pub world: [f64; 3],
}

impl RacerPosition {
    /// at_point returns a pose located at the given point with the given heading.
    pub fn at_point(point: &GeoPoint, rotation: f64) -> RacerPosition {
        RacerPosition {
            longitude: point.longitude,
            latitude: point.latitude,
            altitude: point.altitude,
            rotation,
            world: geo_to_world(point),
        }
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude, self.altitude)
    }

    /// with_offset returns a copy moved by the given longitude and latitude offsets, keeping the
    /// heading.
    pub fn with_offset(&self, d_longitude: f64, d_latitude: f64) -> RacerPosition {
        let point = GeoPoint::new(
            self.longitude + d_longitude,
            self.latitude + d_latitude,
            self.altitude,
        );
        RacerPosition::at_point(&point, self.rotation)
    }
}

impl Default for RacerPosition {
    fn default() -> Self {
        RacerPosition::at_point(&START_POINT, 0.0)
    }
}

/// heading_deg returns the heading from a to b in degrees. A zero-length segment yields 0.0.
pub fn heading_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    (b.latitude - a.latitude)
        .atan2(b.longitude - a.longitude)
        .to_degrees()
}

/// interpolate maps progress in [0, 1] onto the route polyline. Progress outside the range is
/// clamped. Routes with less than two points keep the racer on their first point (or on the
/// fixed start point if the route is empty).
pub fn interpolate(progress: f64, route: &[GeoPoint]) -> RacerPosition {
    if route.len() < 2 {
        return RacerPosition::at_point(route.first().unwrap_or(&START_POINT), 0.0);
    }

    let progress = clamp_unit(progress);
    let tot_segments = route.len() - 1;
    let seg_float = progress * tot_segments as f64;
    let seg_idx = seg_float.floor() as usize;

    if seg_idx >= tot_segments {
        let end = &route[tot_segments];
        return RacerPosition::at_point(end, heading_deg(&route[tot_segments - 1], end));
    }

    let frac = seg_float - seg_idx as f64;
    let start = &route[seg_idx];
    let end = &route[seg_idx + 1];

    let point = GeoPoint::new(
        lerp(start.longitude, end.longitude, frac),
        lerp(start.latitude, end.latitude, frac),
        lerp(start.altitude, end.altitude, frac),
    );

    RacerPosition::at_point(&point, heading_deg(start, end))
}

/// interpolate_chord moves linearly from one pose to another. Used for reroute detours which
/// leave the polyline for a short while.
pub fn interpolate_chord(from: &RacerPosition, to: &RacerPosition, frac: f64) -> RacerPosition {
    let frac = clamp_unit(frac);
    let point = GeoPoint::new(
        lerp(from.longitude, to.longitude, frac),
        lerp(from.latitude, to.latitude, frac),
        lerp(from.altitude, to.altitude, frac),
    );
    RacerPosition::at_point(&point, heading_deg(&from.geo(), &to.geo()))
}
