use serde::{Deserialize, Serialize};
use std::fmt;

/// ModelId identifies one of the two competing "AI models". The Rat runs on the street network,
/// the Pigeon flies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    /// The Rat
    Dbrx,
    /// The Pigeon
    Mistral,
}

impl ModelId {
    /// other returns the competing model.
    pub fn other(self) -> ModelId {
        match self {
            ModelId::Dbrx => ModelId::Mistral,
            ModelId::Mistral => ModelId::Dbrx,
        }
    }

    pub fn is_flying(self) -> bool {
        matches!(self, ModelId::Mistral)
    }

    /// racer_name returns the display name of the racer driven by this model.
    pub fn racer_name(self) -> &'static str {
        match self {
            ModelId::Dbrx => "Rat",
            ModelId::Mistral => "Pigeon",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Dbrx => "dbrx",
            ModelId::Mistral => "mistral",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.racer_name(), self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dbrx" | "rat" => Ok(ModelId::Dbrx),
            "mistral" | "pigeon" => Ok(ModelId::Mistral),
            _ => Err(format!("Unknown model id: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawProfile {
    speed: Option<f64>,
    accuracy: Option<f64>,
    adaptability: Option<f64>,
}

/// PerformanceProfile is the {speed, accuracy, adaptability} triple that drives the randomized
/// behaviour of a racer. All values lie in [0, 100]. Missing fields deserialize to 50 and out of
/// range values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProfile")]
pub struct PerformanceProfile {
    pub speed: u8,
    pub accuracy: u8,
    pub adaptability: u8,
}

impl From<RawProfile> for PerformanceProfile {
    fn from(raw: RawProfile) -> Self {
        let fix = |v: Option<f64>| {
            v.filter(|v| v.is_finite())
                .map(|v| v.round().clamp(0.0, 100.0) as u8)
                .unwrap_or(50)
        };
        PerformanceProfile {
            speed: fix(raw.speed),
            accuracy: fix(raw.accuracy),
            adaptability: fix(raw.adaptability),
        }
    }
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        PerformanceProfile {
            speed: 50,
            accuracy: 50,
            adaptability: 50,
        }
    }
}

impl PerformanceProfile {
    pub fn new(speed: u32, accuracy: u32, adaptability: u32) -> PerformanceProfile {
        PerformanceProfile {
            speed: speed.min(100) as u8,
            accuracy: accuracy.min(100) as u8,
            adaptability: adaptability.min(100) as u8,
        }
    }

    pub fn speed_frac(&self) -> f64 {
        self.speed as f64 / 100.0
    }

    pub fn accuracy_frac(&self) -> f64 {
        self.accuracy as f64 / 100.0
    }

    pub fn adaptability_frac(&self) -> f64 {
        self.adaptability as f64 / 100.0
    }

    /// average_frac returns the mean of all three values scaled to [0, 1].
    pub fn average_frac(&self) -> f64 {
        (self.speed as f64 + self.accuracy as f64 + self.adaptability as f64) / 300.0
    }

    /// opponent_profile derives the profile of the competing model from the player's profile.
    /// The shift of 30 points makes the opponent pick a different route.
    pub fn opponent_profile(&self, player: ModelId) -> PerformanceProfile {
        let (s, a, d) = (
            self.speed as i32,
            self.accuracy as i32,
            self.adaptability as i32,
        );
        let (speed, accuracy, adaptability) = match player {
            ModelId::Dbrx => ((s - 30).max(20), (a + 30).min(80), (d - 30).max(20)),
            ModelId::Mistral => ((s + 30).min(80), (a - 30).max(20), (d + 30).min(80)),
        };
        PerformanceProfile::new(speed as u32, accuracy as u32, adaptability as u32)
    }
}

/// Tuning sliders of the Rat (dbrx), each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatTuning {
    pub expert_selection_depth: f64,
    pub token_processing_efficiency: f64,
    pub knowledge_retrieval_scope: f64,
    pub precision_scaling: f64,
}

impl Default for RatTuning {
    fn default() -> Self {
        RatTuning {
            expert_selection_depth: 50.0,
            token_processing_efficiency: 50.0,
            knowledge_retrieval_scope: 50.0,
            precision_scaling: 50.0,
        }
    }
}

/// Tuning sliders of the Pigeon (mistral), each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PigeonTuning {
    pub transformer_block_efficiency: f64,
    pub attention_head_allocation: f64,
    pub weight_quantization: f64,
    pub context_refresh_rate: f64,
}

impl Default for PigeonTuning {
    fn default() -> Self {
        PigeonTuning {
            transformer_block_efficiency: 50.0,
            attention_head_allocation: 50.0,
            weight_quantization: 50.0,
            context_refresh_rate: 50.0,
        }
    }
}

/// TuningPars holds the sliders of one model. The JSON representation is tagged by `model`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum TuningPars {
    Dbrx(RatTuning),
    Mistral(PigeonTuning),
}

impl TuningPars {
    /// default_for returns neutral sliders (all 50) for the given model.
    pub fn default_for(model: ModelId) -> TuningPars {
        match model {
            ModelId::Dbrx => TuningPars::Dbrx(RatTuning::default()),
            ModelId::Mistral => TuningPars::Mistral(PigeonTuning::default()),
        }
    }

    pub fn model(&self) -> ModelId {
        match self {
            TuningPars::Dbrx(_) => ModelId::Dbrx,
            TuningPars::Mistral(_) => ModelId::Mistral,
        }
    }

    /// performance_profile maps the sliders onto the performance profile using the fixed per
    /// model weighting. The weights must not change, existing tuning presets rely on them.
    pub fn performance_profile(&self) -> PerformanceProfile {
        let (speed, accuracy, adaptability) = match self {
            TuningPars::Dbrx(t) => (
                100.0
                    - (t.expert_selection_depth * 0.3
                        + t.precision_scaling * 0.4
                        + t.knowledge_retrieval_scope * 0.3),
                t.expert_selection_depth * 0.4
                    + t.precision_scaling * 0.4
                    + t.knowledge_retrieval_scope * 0.2,
                t.token_processing_efficiency * 0.6 + t.knowledge_retrieval_scope * 0.4,
            ),
            TuningPars::Mistral(t) => (
                100.0
                    - (t.transformer_block_efficiency * 0.4
                        + t.weight_quantization * 0.4
                        + t.context_refresh_rate * 0.2),
                t.transformer_block_efficiency * 0.3
                    + t.attention_head_allocation * 0.4
                    + t.weight_quantization * 0.3,
                t.attention_head_allocation * 0.3 + t.context_refresh_rate * 0.7,
            ),
        };

        PerformanceProfile {
            speed: round_clamp(speed),
            accuracy: round_clamp(accuracy),
            adaptability: round_clamp(adaptability),
        }
    }
}

/// round_clamp rounds half up and clamps into [0, 100].
fn round_clamp(x: f64) -> u8 {
    if x.is_nan() {
        return 0;
    }
    (x + 0.5).floor().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_sliders_give_neutral_profile() {
        for model in [ModelId::Dbrx, ModelId::Mistral] {
            let profile = TuningPars::default_for(model).performance_profile();
            assert_eq!(profile, PerformanceProfile::new(50, 50, 50));
        }
    }

    #[test]
    fn rat_weighting_is_preserved() {
        let tuning = TuningPars::Dbrx(RatTuning {
            expert_selection_depth: 80.0,
            token_processing_efficiency: 20.0,
            knowledge_retrieval_scope: 40.0,
            precision_scaling: 70.0,
        });
        // speed = 100 - (24 + 28 + 12) = 36
        // accuracy = 32 + 28 + 8 = 68
        // adaptability = 12 + 16 = 28
        assert_eq!(
            tuning.performance_profile(),
            PerformanceProfile::new(36, 68, 28)
        );
    }

    #[test]
    fn pigeon_weighting_is_preserved() {
        let tuning = TuningPars::Mistral(PigeonTuning {
            transformer_block_efficiency: 10.0,
            attention_head_allocation: 90.0,
            weight_quantization: 30.0,
            context_refresh_rate: 100.0,
        });
        // speed = 100 - (4 + 12 + 20) = 64
        // accuracy = 3 + 36 + 9 = 48
        // adaptability = 27 + 70 = 97
        assert_eq!(
            tuning.performance_profile(),
            PerformanceProfile::new(64, 48, 97)
        );
    }

    #[test]
    fn out_of_range_sliders_are_clamped() {
        let tuning = TuningPars::Mistral(PigeonTuning {
            transformer_block_efficiency: 500.0,
            attention_head_allocation: 500.0,
            weight_quantization: 500.0,
            context_refresh_rate: 500.0,
        });
        let profile = tuning.performance_profile();
        assert_eq!(profile.speed, 0);
        assert_eq!(profile.accuracy, 100);
        assert_eq!(profile.adaptability, 100);
    }

    #[test]
    fn malformed_profile_json_falls_back_to_defaults() {
        let profile: PerformanceProfile = serde_json::from_str(r#"{"speed": 250}"#).unwrap();
        assert_eq!(profile, PerformanceProfile::new(100, 50, 50));

        let profile: PerformanceProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, PerformanceProfile::default());
    }

    #[test]
    fn fractional_profile_values_are_rounded() {
        let profile: PerformanceProfile =
            serde_json::from_str(r#"{"speed": 62.5, "accuracy": 10.2, "adaptability": -3.7}"#)
                .unwrap();
        assert_eq!(profile, PerformanceProfile::new(63, 10, 0));
    }

    #[test]
    fn opponent_profile_is_shifted_and_bounded() {
        let player = PerformanceProfile::new(40, 70, 90);
        assert_eq!(
            player.opponent_profile(ModelId::Dbrx),
            PerformanceProfile::new(20, 80, 60)
        );
        assert_eq!(
            player.opponent_profile(ModelId::Mistral),
            PerformanceProfile::new(70, 40, 80)
        );
    }

    #[test]
    fn tuning_json_is_tagged_by_model() {
        let tuning: TuningPars =
            serde_json::from_str(r#"{"model": "mistral", "contextRefreshRate": 80}"#).unwrap();
        assert_eq!(tuning.model(), ModelId::Mistral);
        match tuning {
            TuningPars::Mistral(t) => {
                assert_eq!(t.context_refresh_rate, 80.0);
                assert_eq!(t.weight_quantization, 50.0);
            }
            TuningPars::Dbrx(_) => panic!("wrong model"),
        }
    }
}
