use crate::core::geo::{
    straight_line_points, GeoPoint, Route, RouteCharacteristics, RouteVariation, FINISH_POINT,
    START_POINT,
};
use crate::core::performance::{ModelId, PerformanceProfile};
use crate::core::text_gen::{fill_placeholders, parse_route_response, Prompt, TextGenerator};
use helpers::general::{argmax, lerp};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    #[error("route source unavailable: {0}")]
    Unavailable(String),
    #[error("route source returned no usable variations for {0}")]
    Empty(ModelId),
}

/// RouteSource supplies the named route variations between start and finish for a model.
pub trait RouteSource {
    fn route_variations(
        &mut self,
        model: ModelId,
        start: &GeoPoint,
        finish: &GeoPoint,
    ) -> Result<Vec<RouteVariation>, RouteError>;
}

// -------------------------------------------------------------------------------------------------
// LOCAL WAYPOINT SOURCE ---------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

struct VariationTemplate {
    ground_name: &'static str,
    flight_name: &'static str,
    description: &'static str,
    waypoints: &'static [(f64, f64)],
    efficiency: f64,
    complexity: f64,
    risk: f64,
    altitude_range: (f64, f64),
}

const VARIATION_TEMPLATES: [VariationTemplate; 5] = [
    VariationTemplate {
        ground_name: "Direct Route",
        flight_name: "Direct Flight Path",
        description: "The most direct path to the NASDAQ building. Efficient but potentially challenging.",
        waypoints: &[],
        efficiency: 90.0,
        complexity: 30.0,
        risk: 40.0,
        altitude_range: (0.0, 40.0),
    },
    VariationTemplate {
        ground_name: "Chinatown Route",
        flight_name: "Chinatown Flight Path",
        description: "A challenging path through Chinatown with many turns and cultural landmarks.",
        waypoints: &[(-122.4074, 37.7947), (-122.4055, 37.7957)],
        efficiency: 60.0,
        complexity: 85.0,
        risk: 70.0,
        altitude_range: (20.0, 80.0),
    },
    VariationTemplate {
        ground_name: "Market Street Route",
        flight_name: "Market Street Corridor",
        description: "Following the main artery of the city with predictable traffic patterns.",
        waypoints: &[(-122.4294, 37.7726), (-122.4124, 37.7835), (-122.3991, 37.7902)],
        efficiency: 75.0,
        complexity: 50.0,
        risk: 40.0,
        altitude_range: (30.0, 60.0),
    },
    VariationTemplate {
        ground_name: "Hayes Valley Route",
        flight_name: "Hayes Valley Traverse",
        description: "A balanced route through diverse neighborhoods with moderate challenges.",
        waypoints: &[(-122.4264, 37.7759), (-122.4169, 37.7811), (-122.4037, 37.7873)],
        efficiency: 70.0,
        complexity: 65.0,
        risk: 55.0,
        altitude_range: (15.0, 50.0),
    },
    VariationTemplate {
        ground_name: "Park & Haight Route",
        flight_name: "Park & Haight Flight",
        description: "A scenic route through Golden Gate Park and Haight Street.",
        waypoints: &[(-122.4699, 37.7686), (-122.4559, 37.7726), (-122.4169, 37.7811)],
        efficiency: 50.0,
        complexity: 75.0,
        risk: 60.0,
        altitude_range: (10.0, 70.0),
    },
];

/// WaypointRouteSource generates the route variations locally from fixed San Francisco
/// waypoints. The legs between waypoints are straight and sampled with `steps_per_leg`
/// segments. Flying variations get a bell-shaped altitude profile.
#[derive(Debug, Clone)]
pub struct WaypointRouteSource {
    pub steps_per_leg: usize,
}

impl Default for WaypointRouteSource {
    fn default() -> Self {
        WaypointRouteSource { steps_per_leg: 8 }
    }
}

impl RouteSource for WaypointRouteSource {
    fn route_variations(
        &mut self,
        model: ModelId,
        start: &GeoPoint,
        finish: &GeoPoint,
    ) -> Result<Vec<RouteVariation>, RouteError> {
        let flying = model.is_flying();
        let steps = self.steps_per_leg.max(1);

        let variations = VARIATION_TEMPLATES
            .iter()
            .map(|template| {
                let mut corners = Vec::with_capacity(template.waypoints.len() + 2);
                corners.push(GeoPoint::new(start.longitude, start.latitude, 0.0));
                corners.extend(
                    template
                        .waypoints
                        .iter()
                        .map(|&(lon, lat)| GeoPoint::new(lon, lat, 0.0)),
                );
                corners.push(GeoPoint::new(finish.longitude, finish.latitude, 0.0));

                let mut points = densify(&corners, steps);
                if flying {
                    apply_bell_altitude(&mut points, template.altitude_range);
                }

                RouteVariation {
                    name: if flying {
                        template.flight_name
                    } else {
                        template.ground_name
                    }
                    .to_owned(),
                    description: template.description.to_owned(),
                    points,
                    characteristics: RouteCharacteristics {
                        efficiency: template.efficiency,
                        complexity: template.complexity,
                        risk: template.risk,
                    },
                }
            })
            .collect();

        Ok(variations)
    }
}

/// densify samples every leg of the polyline with the given number of straight segments.
fn densify(corners: &[GeoPoint], steps: usize) -> Vec<GeoPoint> {
    let mut points = Vec::with_capacity((corners.len().saturating_sub(1)) * steps + 1);
    for leg in corners.windows(2) {
        for i in 0..steps {
            let frac = i as f64 / steps as f64;
            points.push(GeoPoint::new(
                lerp(leg[0].longitude, leg[1].longitude, frac),
                lerp(leg[0].latitude, leg[1].latitude, frac),
                lerp(leg[0].altitude, leg[1].altitude, frac),
            ));
        }
    }
    if let Some(last) = corners.last() {
        points.push(*last);
    }
    points
}

/// apply_bell_altitude lifts the interior points onto a bell curve within the altitude range.
/// Take-off and landing points stay on the ground.
fn apply_bell_altitude(points: &mut [GeoPoint], (min_alt, max_alt): (f64, f64)) {
    let n = points.len();
    if n < 3 {
        return;
    }
    for (i, point) in points.iter_mut().enumerate() {
        if i == 0 || i == n - 1 {
            point.altitude = 0.0;
            continue;
        }
        let dist_from_middle = 2.0 * i as f64 / (n - 1) as f64 - 1.0;
        let altitude = max_alt * (1.0 - dist_from_middle * dist_from_middle);
        point.altitude = altitude.clamp(min_alt, max_alt);
    }
}

/// fallback_variation is the single straight-line variation used when the route source fails.
pub fn fallback_variation(model: ModelId) -> RouteVariation {
    let flying = model.is_flying();
    RouteVariation {
        name: if flying {
            "Fallback Flight Path"
        } else {
            "Fallback Route"
        }
        .to_owned(),
        description: "A simple path generated when no route variations are available.".to_owned(),
        points: straight_line_points(&START_POINT, &FINISH_POINT, flying),
        characteristics: RouteCharacteristics::default(),
    }
}

// -------------------------------------------------------------------------------------------------
// CACHE -------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// RouteCache keeps the route variations per model once they were loaded successfully.
#[derive(Debug, Clone, Default)]
pub struct RouteCache {
    routes: HashMap<ModelId, Vec<RouteVariation>>,
}

impl RouteCache {
    pub fn new() -> RouteCache {
        RouteCache::default()
    }

    pub fn get(&self, model: ModelId) -> Option<&Vec<RouteVariation>> {
        self.routes.get(&model)
    }

    pub fn insert(&mut self, model: ModelId, variations: Vec<RouteVariation>) {
        self.routes.insert(model, variations);
    }

    pub fn invalidate(&mut self, model: ModelId) {
        self.routes.remove(&model);
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn contains(&self, model: ModelId) -> bool {
        self.routes.contains_key(&model)
    }
}

// -------------------------------------------------------------------------------------------------
// PROVIDER ----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// SelectionMethod tells how a route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    TextGen,
    Metrics,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSelection {
    pub route: Route,
    pub name: String,
    pub explanation: String,
    pub method: SelectionMethod,
}

/// RouteProvider picks the route of a racer. It asks the racer's text generator first, falls
/// back to metrics scoring if the answer is unusable and to a straight line if no variations can
/// be loaded at all. Selection never fails.
pub struct RouteProvider {
    source: Box<dyn RouteSource + Send>,
    text_gen: Box<dyn TextGenerator + Send>,
    cache: RouteCache,
}

impl std::fmt::Debug for RouteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteProvider")
            .field("cache", &self.cache)
            .finish()
    }
}

impl RouteProvider {
    pub fn new(
        source: Box<dyn RouteSource + Send>,
        text_gen: Box<dyn TextGenerator + Send>,
    ) -> RouteProvider {
        RouteProvider {
            source,
            text_gen,
            cache: RouteCache::new(),
        }
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RouteCache {
        &mut self.cache
    }

    pub fn text_gen_mut(&mut self) -> &mut (dyn TextGenerator + Send) {
        self.text_gen.as_mut()
    }

    /// route_variations returns the cached variations of the model or loads them from the
    /// source. Failed loads are not cached.
    pub fn route_variations(&mut self, model: ModelId) -> Result<Vec<RouteVariation>, RouteError> {
        if let Some(variations) = self.cache.get(model) {
            return Ok(variations.to_owned());
        }

        let variations: Vec<RouteVariation> = self
            .source
            .route_variations(model, &START_POINT, &FINISH_POINT)?
            .into_iter()
            .filter(|v| v.points.len() >= 2 && v.points.iter().all(|p| p.is_finite()))
            .collect();

        if variations.is_empty() {
            return Err(RouteError::Empty(model));
        }

        self.cache.insert(model, variations.to_owned());
        Ok(variations)
    }

    /// select_route picks the route of the given model for the given profile.
    pub fn select_route(&mut self, model: ModelId, profile: &PerformanceProfile) -> RouteSelection {
        let (variations, from_source) = match self.route_variations(model) {
            Ok(variations) => (variations, true),
            Err(e) => {
                tracing::warn!("Could not load routes for {}: {}, using fallback route", model, e);
                (vec![fallback_variation(model)], false)
            }
        };

        let prompt = Prompt::route_selection(model, profile, &variations);
        let answer = self
            .text_gen
            .generate(&prompt)
            .and_then(|content| parse_route_response(&content));

        let (idx, explanation, method) = match answer {
            Ok((number, explanation)) => {
                let idx = number.saturating_sub(1).min(variations.len() - 1);
                let explanation = explanation
                    .unwrap_or_else(|| "Route selected based on racer characteristics.".to_owned());
                (
                    idx,
                    fill_placeholders(&explanation, profile, None),
                    SelectionMethod::TextGen,
                )
            }
            Err(e) => {
                tracing::warn!("Route selection answer of {} unusable: {}", model, e);
                let (idx, explanation) = select_by_metrics(model, profile, &variations);
                (idx, explanation, SelectionMethod::Metrics)
            }
        };

        let method = if from_source {
            method
        } else {
            SelectionMethod::Fallback
        };
        let variation = &variations[idx];
        tracing::info!("{} selected {} ({:?})", model, variation.name, method);

        RouteSelection {
            route: Route::from_points(variation.points.to_owned()),
            name: variation.name.to_owned(),
            explanation,
            method,
        }
    }
}

/// score_route rates how well a route suits the model's profile. The Rat favours complex routes
/// when accurate, efficient ones when fast and safe ones when not adaptive. The Pigeon favours
/// complex and risky routes when adaptive.
pub fn score_route(
    model: ModelId,
    profile: &PerformanceProfile,
    characteristics: &RouteCharacteristics,
) -> f64 {
    let c = characteristics;
    match model {
        ModelId::Dbrx => {
            profile.accuracy_frac() * c.complexity * 0.4
                + profile.speed_frac() * c.efficiency * 0.4
                + (1.0 - profile.adaptability_frac()) * (100.0 - c.risk) * 0.2
        }
        ModelId::Mistral => {
            profile.adaptability_frac() * c.complexity * 0.4
                + profile.speed_frac() * c.efficiency * 0.3
                + profile.adaptability_frac() * c.risk * 0.3
        }
    }
}

/// select_by_metrics returns the index of the best scoring variation (first one on ties) and an
/// explanation naming the dominant metric.
pub fn select_by_metrics(
    model: ModelId,
    profile: &PerformanceProfile,
    variations: &[RouteVariation],
) -> (usize, String) {
    let scores: Vec<f64> = variations
        .iter()
        .map(|v| score_route(model, profile, &v.characteristics))
        .collect();
    let idx = argmax(&scores).unwrap_or(0);
    let route_name = variations
        .get(idx)
        .map(|v| v.name.to_lowercase())
        .unwrap_or_default();

    let (s, a, d) = (profile.speed, profile.accuracy, profile.adaptability);
    let explanation = match model {
        ModelId::Dbrx => {
            if a > 70 {
                format!(
                    "The Rat's high accuracy ({}%) allows it to navigate the {} with precision, making optimal decisions at each turn.",
                    a, route_name
                )
            } else if s > 70 {
                format!(
                    "With its high speed optimization ({}%), the Rat calculates the most efficient path through the {}.",
                    s, route_name
                )
            } else if d > 70 {
                format!(
                    "The Rat's adaptability ({}%) enables it to process multiple variables along the {}.",
                    d, route_name
                )
            } else {
                format!(
                    "The Rat's balanced performance metrics make the {} an optimal choice for its algorithmic decision-making.",
                    route_name
                )
            }
        }
        ModelId::Mistral => {
            if d > 70 {
                format!(
                    "The Pigeon's high adaptability ({}%) allows it to intuitively navigate the changing conditions of the {}.",
                    d, route_name
                )
            } else if s > 70 {
                format!(
                    "With its speed-focused parameters ({}%), the Pigeon instinctively chooses the {} for rapid progress.",
                    s, route_name
                )
            } else if a > 70 {
                format!(
                    "The Pigeon's accuracy ({}%) guides its intuition through the precise maneuvers required by the {}.",
                    a, route_name
                )
            } else {
                format!(
                    "The Pigeon's balanced capabilities make the {} a natural choice for its adaptive flying style.",
                    route_name
                )
            }
        }
    };

    (idx, explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text_gen::{MockTextGenerator, TextGenError};
    use approx::assert_abs_diff_eq;

    struct FailingSource;

    impl RouteSource for FailingSource {
        fn route_variations(
            &mut self,
            _model: ModelId,
            _start: &GeoPoint,
            _finish: &GeoPoint,
        ) -> Result<Vec<RouteVariation>, RouteError> {
            Err(RouteError::Unavailable("offline".to_owned()))
        }
    }

    struct CountingSource {
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl RouteSource for CountingSource {
        fn route_variations(
            &mut self,
            model: ModelId,
            start: &GeoPoint,
            finish: &GeoPoint,
        ) -> Result<Vec<RouteVariation>, RouteError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            WaypointRouteSource::default().route_variations(model, start, finish)
        }
    }

    struct Gibberish;

    impl TextGenerator for Gibberish {
        fn generate(&mut self, _prompt: &Prompt) -> Result<String, TextGenError> {
            Ok("I would take the scenic one".to_owned())
        }
    }

    struct Fixed(&'static str);

    impl TextGenerator for Fixed {
        fn generate(&mut self, _prompt: &Prompt) -> Result<String, TextGenError> {
            Ok(self.0.to_owned())
        }
    }

    #[test]
    fn waypoint_variations_connect_start_and_finish() {
        for model in [ModelId::Dbrx, ModelId::Mistral] {
            let variations = WaypointRouteSource::default()
                .route_variations(model, &START_POINT, &FINISH_POINT)
                .unwrap();
            assert_eq!(variations.len(), 5);
            for v in variations.iter() {
                let first = v.points.first().unwrap();
                let last = v.points.last().unwrap();
                assert_abs_diff_eq!(first.longitude, START_POINT.longitude);
                assert_abs_diff_eq!(last.latitude, FINISH_POINT.latitude);
                assert_eq!(first.altitude, 0.0);
                assert_eq!(last.altitude, 0.0);
                if model.is_flying() {
                    assert!(v.points.iter().any(|p| p.altitude > 0.0));
                } else {
                    assert!(v.points.iter().all(|p| p.altitude == 0.0));
                }
            }
        }
    }

    #[test]
    fn failing_source_yields_straight_line() {
        let mut provider = RouteProvider::new(
            Box::new(FailingSource),
            Box::new(MockTextGenerator::new(Some(1))),
        );
        let selection = provider.select_route(ModelId::Dbrx, &PerformanceProfile::default());
        assert_eq!(selection.method, SelectionMethod::Fallback);
        assert!(selection.route.len() >= 2);
        assert_eq!(*selection.route.start(), START_POINT);
        assert_abs_diff_eq!(
            selection.route.finish().longitude,
            FINISH_POINT.longitude,
            epsilon = 1e-12
        );
        assert!(!provider.cache().contains(ModelId::Dbrx));
    }

    #[test]
    fn unusable_answer_falls_back_to_metrics() {
        let mut provider =
            RouteProvider::new(Box::new(WaypointRouteSource::default()), Box::new(Gibberish));
        // accurate Rat prefers complex routes: Chinatown
        let profile = PerformanceProfile::new(20, 100, 20);
        let selection = provider.select_route(ModelId::Dbrx, &profile);
        assert_eq!(selection.method, SelectionMethod::Metrics);
        assert_eq!(selection.name, "Chinatown Route");
        assert!(selection.explanation.contains("100%"));
    }

    #[test]
    fn answered_route_number_is_clamped() {
        let mut provider = RouteProvider::new(
            Box::new(WaypointRouteSource::default()),
            Box::new(Fixed("ROUTE_NUMBER: 6\nEXPLANATION: Thermals at {adaptability}%.")),
        );
        let selection =
            provider.select_route(ModelId::Mistral, &PerformanceProfile::new(50, 50, 77));
        assert_eq!(selection.method, SelectionMethod::TextGen);
        assert_eq!(selection.name, "Park & Haight Flight");
        assert_eq!(selection.explanation, "Thermals at 77%.");
    }

    #[test]
    fn variations_are_cached_per_model() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut provider = RouteProvider::new(
            Box::new(CountingSource {
                calls: calls.clone(),
            }),
            Box::new(MockTextGenerator::new(Some(2))),
        );
        let profile = PerformanceProfile::default();
        provider.select_route(ModelId::Dbrx, &profile);
        provider.select_route(ModelId::Dbrx, &profile);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        provider.cache_mut().invalidate(ModelId::Dbrx);
        provider.select_route(ModelId::Dbrx, &profile);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn metrics_pick_first_route_on_ties() {
        let variations = vec![
            fallback_variation(ModelId::Dbrx),
            fallback_variation(ModelId::Dbrx),
        ];
        let (idx, _) =
            select_by_metrics(ModelId::Dbrx, &PerformanceProfile::default(), &variations);
        assert_eq!(idx, 0);
    }
}
