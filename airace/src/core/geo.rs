use serde::{Deserialize, Serialize};

/// Scale used when projecting geographic coordinates into the renderer's world space.
pub const WORLD_SCALE: f64 = 10000.0;

/// Number of segments of the straight-line fallback route.
const FALLBACK_STEPS: usize = 15;

/// * `longitude` - (deg) Longitude
/// * `latitude` - (deg) Latitude
/// * `altitude` - (m) Altitude above ground (used by the flying racer only)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64, altitude: f64) -> GeoPoint {
        GeoPoint {
            longitude,
            latitude,
            altitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite() && self.altitude.is_finite()
    }
}

/// Race start: Golden Gate Park edge near the Panhandle, San Francisco.
pub const START_POINT: GeoPoint = GeoPoint::new(-122.4724, 37.7704, 0.0);

/// Race finish: One Market Street (NASDAQ MarketSite), San Francisco.
pub const FINISH_POINT: GeoPoint = GeoPoint::new(-122.3944, 37.7937, 0.0);

/// geo_to_world projects a geographic point into world coordinates centered on the start point.
/// The y axis carries the altitude, the z axis the latitude.
pub fn geo_to_world(point: &GeoPoint) -> [f64; 3] {
    [
        (point.longitude - START_POINT.longitude) * WORLD_SCALE,
        point.altitude,
        (point.latitude - START_POINT.latitude) * WORLD_SCALE,
    ]
}

/// * `efficiency` - How direct the route is (0-100)
/// * `complexity` - How many decision points the route has (0-100)
/// * `risk` - How likely the route is to cause trouble (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteCharacteristics {
    pub efficiency: f64,
    pub complexity: f64,
    pub risk: f64,
}

impl Default for RouteCharacteristics {
    fn default() -> Self {
        RouteCharacteristics {
            efficiency: 50.0,
            complexity: 50.0,
            risk: 50.0,
        }
    }
}

/// RouteVariation is one of several named alternative polylines between start and finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteVariation {
    pub name: String,
    pub description: String,
    pub points: Vec<GeoPoint>,
    pub characteristics: RouteCharacteristics,
}

/// Route is the polyline a racer follows during the race. It always holds at least two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRoute")]
pub struct Route {
    points: Vec<GeoPoint>,
}

#[derive(Deserialize)]
struct RawRoute {
    #[serde(default)]
    points: Vec<GeoPoint>,
}

impl From<RawRoute> for Route {
    fn from(raw: RawRoute) -> Self {
        Route::from_points(raw.points)
    }
}

impl Route {
    /// from_points creates a route from the given polyline. Polylines with less than two points
    /// or non-finite coordinates are replaced by the straight-line fallback route.
    pub fn from_points(points: Vec<GeoPoint>) -> Route {
        if points.len() < 2 || points.iter().any(|p| !p.is_finite()) {
            tracing::warn!(
                "Route with {} points is unusable, falling back to a straight line",
                points.len()
            );
            return Route::straight_line(false);
        }
        Route { points }
    }

    /// straight_line returns the fallback route between the fixed start and finish points. The
    /// flying variant arcs up to 50m altitude halfway.
    pub fn straight_line(flying: bool) -> Route {
        Route {
            points: straight_line_points(&START_POINT, &FINISH_POINT, flying),
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn start(&self) -> &GeoPoint {
        &self.points[0]
    }

    pub fn finish(&self) -> &GeoPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// straight_line_points samples a straight path from start to finish with FALLBACK_STEPS
/// segments.
pub fn straight_line_points(start: &GeoPoint, finish: &GeoPoint, flying: bool) -> Vec<GeoPoint> {
    (0..=FALLBACK_STEPS)
        .map(|i| {
            let frac = i as f64 / FALLBACK_STEPS as f64;
            let altitude = if flying {
                (frac * std::f64::consts::PI).sin() * 50.0
            } else {
                0.0
            };
            GeoPoint::new(
                helpers::general::lerp(start.longitude, finish.longitude, frac),
                helpers::general::lerp(start.latitude, finish.latitude, frac),
                altitude,
            )
        })
        .collect()
}
