use crate::core::performance::{ModelId, PerformanceProfile};
use crate::core::text_gen::{Prompt, TextGenerator};

/// Progress difference below which both racers count as level.
pub const NECK_AND_NECK_MARGIN: f64 = 0.02;

/// Progress values at which the commentator speaks up.
const COMMENTARY_POINTS: [f64; 4] = [0.2, 0.5, 0.8, 0.95];

/// race_status describes the position of a racer relative to the other one, phrased to be
/// followed by the other racer's name.
pub fn race_status(own_progress: f64, other_progress: f64) -> &'static str {
    let diff = own_progress - other_progress;
    if diff.abs() < NECK_AND_NECK_MARGIN {
        "neck and neck with"
    } else if diff > 0.0 {
        "ahead of"
    } else {
        "behind"
    }
}

/// generate_commentary asks the racer's text generator for a line of commentary. Generation
/// errors are replaced by a generic line.
pub fn generate_commentary(
    text_gen: &mut dyn TextGenerator,
    model: ModelId,
    profile: &PerformanceProfile,
    own_progress: f64,
    other_progress: f64,
) -> String {
    let prompt = Prompt::commentary(model, profile, race_status(own_progress, other_progress));
    match text_gen.generate(&prompt) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("Commentary for {} failed: {}", model, e);
            fallback_line(model).to_owned()
        }
    }
}

fn fallback_line(model: ModelId) -> &'static str {
    match model {
        ModelId::Dbrx => "The algorithmic speedster is calculating its next move...",
        ModelId::Mistral => "The instinctive flyer is adapting to the current conditions...",
    }
}

/// performance_insight returns a remark on notable combinations in the profile, if any.
pub fn performance_insight(model: ModelId, profile: &PerformanceProfile) -> Option<&'static str> {
    let (s, a, d) = (profile.speed, profile.accuracy, profile.adaptability);
    match model {
        ModelId::Dbrx => {
            if s > 70 && a < 40 {
                Some("High speed but low accuracy is causing path deviations.")
            } else if a > 70 && s < 40 {
                Some("High accuracy but low speed is limiting race progress.")
            } else if d < 30 {
                Some("Low adaptability is causing difficulty with unexpected obstacles.")
            } else if s > 70 && a > 70 {
                Some("Optimal balance of speed and accuracy is producing excellent results!")
            } else {
                None
            }
        }
        ModelId::Mistral => {
            if d > 70 && a < 40 {
                Some("High adaptability but low accuracy is causing erratic movements.")
            } else if a > 70 && d < 40 {
                Some("High accuracy but low adaptability is limiting reaction time.")
            } else if s < 30 {
                Some("Low speed is preventing the racer from reaching full potential.")
            } else if d > 70 && s > 70 {
                Some("Excellent combination of adaptability and speed is creating fluid movement!")
            } else {
                None
            }
        }
    }
}

/// Commentator decides when a new line of commentary is due. A line is due whenever the racer
/// passes one of the commentary points and the last line was given well before it.
#[derive(Debug, Clone)]
pub struct Commentator {
    last_progress: f64,
}

impl Default for Commentator {
    fn default() -> Self {
        Commentator {
            last_progress: -0.2,
        }
    }
}

impl Commentator {
    pub fn new() -> Commentator {
        Commentator::default()
    }

    /// update returns a new commentary line if one is due at the given progress.
    pub fn update(
        &mut self,
        text_gen: &mut dyn TextGenerator,
        model: ModelId,
        profile: &PerformanceProfile,
        own_progress: f64,
        other_progress: f64,
    ) -> Option<String> {
        let due = COMMENTARY_POINTS
            .iter()
            .any(|&point| own_progress >= point && self.last_progress < point - 0.05);
        if !due {
            return None;
        }
        self.last_progress = own_progress;
        Some(generate_commentary(
            text_gen,
            model,
            profile,
            own_progress,
            other_progress,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text_gen::{MockTextGenerator, TextGenError};

    struct Broken;

    impl TextGenerator for Broken {
        fn generate(&mut self, prompt: &Prompt) -> Result<String, TextGenError> {
            Err(TextGenError::Unavailable(prompt.model))
        }
    }

    #[test]
    fn race_status_uses_margin() {
        assert_eq!(race_status(0.5, 0.49), "neck and neck with");
        assert_eq!(race_status(0.5, 0.4), "ahead of");
        assert_eq!(race_status(0.4, 0.5), "behind");
    }

    #[test]
    fn failed_generation_gives_fallback_line() {
        let line = generate_commentary(
            &mut Broken,
            ModelId::Mistral,
            &PerformanceProfile::default(),
            0.3,
            0.3,
        );
        assert_eq!(line, fallback_line(ModelId::Mistral));
    }

    #[test]
    fn commentator_speaks_once_per_point() {
        let mut gen = MockTextGenerator::new(Some(8));
        let mut commentator = Commentator::new();
        let profile = PerformanceProfile::default();

        let mut lines = 0;
        for i in 0..=100 {
            let progress = i as f64 / 100.0;
            if commentator
                .update(&mut gen, ModelId::Dbrx, &profile, progress, progress)
                .is_some()
            {
                lines += 1;
            }
        }
        assert_eq!(lines, 4);
    }

    #[test]
    fn insights_follow_profile() {
        assert!(performance_insight(ModelId::Dbrx, &PerformanceProfile::new(90, 20, 50)).is_some());
        let balanced = PerformanceProfile::new(50, 50, 50);
        assert!(performance_insight(ModelId::Mistral, &balanced).is_none());
    }
}
