use crate::core::geo::RouteVariation;
use crate::core::performance::{ModelId, PerformanceProfile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TextGenError {
    #[error("text generation for {0} is unavailable")]
    Unavailable(ModelId),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    RouteSelection,
    Commentary,
}

/// Prompt is a request to the (mocked) language model of a racer.
///
/// * `race_status` - Relative position of the racer, only used for commentary
/// * `text` - Rendered prompt text, informational for mocked generators
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub model: ModelId,
    pub profile: PerformanceProfile,
    pub race_status: Option<String>,
    pub text: String,
}

impl Prompt {
    /// route_selection builds the prompt that asks a model to pick one of the listed routes.
    pub fn route_selection(
        model: ModelId,
        profile: &PerformanceProfile,
        variations: &[RouteVariation],
    ) -> Prompt {
        let mut text = format!(
            "You are an AI route planner for the AI Rat Race competition.\n\
             Current racer: {}\n\
             Speed rating: {}%\nAccuracy rating: {}%\nAdaptability rating: {}%\n\nAvailable routes:\n",
            model, profile.speed, profile.accuracy, profile.adaptability
        );
        for (i, variation) in variations.iter().enumerate() {
            text.push_str(&format!(
                "Route {}: {}\nDescription: {}\n- Efficiency: {}/100\n- Complexity: {}/100\n- Risk: {}/100\n",
                i + 1,
                variation.name,
                variation.description,
                variation.characteristics.efficiency,
                variation.characteristics.complexity,
                variation.characteristics.risk
            ));
        }
        text.push_str(&format!(
            "\nRespond with the route number (1-{}) and a brief explanation in the format\n\
             ROUTE_NUMBER: [number]\nEXPLANATION: [explanation]",
            variations.len()
        ));

        Prompt {
            kind: PromptKind::RouteSelection,
            model,
            profile: profile.to_owned(),
            race_status: None,
            text,
        }
    }

    /// commentary builds the prompt that asks a model to comment on the running race.
    pub fn commentary(model: ModelId, profile: &PerformanceProfile, race_status: &str) -> Prompt {
        let text = format!(
            "You are a race commentator for the AI Rat Race.\n\
             Current racer: {}\n\
             Speed rating: {}%\nAccuracy rating: {}%\nAdaptability rating: {}%\n\
             Race position: {}",
            model, profile.speed, profile.accuracy, profile.adaptability, race_status
        );
        Prompt {
            kind: PromptKind::Commentary,
            model,
            profile: profile.to_owned(),
            race_status: Some(race_status.to_owned()),
            text,
        }
    }
}

/// TextGenerator produces free text answers to prompts. Implementations may be backed by a real
/// model or canned responses.
pub trait TextGenerator {
    fn generate(&mut self, prompt: &Prompt) -> Result<String, TextGenError>;
}

const DBRX_ROUTE_SELECTION: [&str; 4] = [
    "ROUTE_NUMBER: 1\nEXPLANATION: The Direct Route aligns with the Rat's high efficiency preference (speed: {speed}%) while still maintaining sufficient accuracy ({accuracy}%) for optimal path calculation.",
    "ROUTE_NUMBER: 2\nEXPLANATION: The Chinatown Route leverages the Rat's strong analytical capabilities (accuracy: {accuracy}%) to navigate multiple decision points with precision.",
    "ROUTE_NUMBER: 5\nEXPLANATION: The Park & Haight Route provides a compromise between efficiency ({speed}%) and complexity, allowing the Rat to maintain consistent performance.",
    "ROUTE_NUMBER: 4\nEXPLANATION: The Hayes Valley Route capitalizes on the Rat's speed optimization ({speed}%) and adaptability ({adaptability}%) to calculate the most efficient path.",
];

const MISTRAL_ROUTE_SELECTION: [&str; 4] = [
    "ROUTE_NUMBER: 1\nEXPLANATION: The Direct Flight Path suits the Pigeon's intuitive flying style, allowing it to leverage its {speed}% speed rating while adapting quickly to changing conditions.",
    "ROUTE_NUMBER: 6\nEXPLANATION: The last listed path complements the Pigeon's {adaptability}% adaptability, allowing it to ride the thermal updrafts between the skyscrapers.",
    "ROUTE_NUMBER: 3\nEXPLANATION: The Market Street Corridor provides a balanced challenge that plays to the Pigeon's strengths in adaptability ({adaptability}%) while not demanding excessive precision.",
    "ROUTE_NUMBER: 4\nEXPLANATION: The Hayes Valley Traverse leverages the Pigeon's adaptability ({adaptability}%) and speed ({speed}%), allowing for rapid course corrections.",
];

const DBRX_COMMENTARY: [&str; 5] = [
    "The algorithmic speedster is calculating optimal trajectories with {accuracy}% precision, maintaining a steady pace through the course. Meanwhile, the Rat is {race_status} the Pigeon, relying on computation rather than intuition.",
    "DBRX is processing the route with remarkable efficiency, its {speed}% speed rating allowing it to execute turns with mathematical precision. The Rat is now {race_status} the Pigeon, whose flight patterns seem less structured.",
    "The Rat's neural pathways are firing at {adaptability}% adaptability, recalculating optimal paths as it encounters each new segment. It's {race_status} the Pigeon, which is taking a more instinctive approach to navigation.",
    "With {accuracy}% accuracy, the Rat is demonstrating superior analytical capabilities, breaking down complex route segments into computable variables. The Rat is {race_status} the Pigeon!",
    "The algorithmic racer is making final optimizations to maximize performance! It is {race_status} the Pigeon, a true test of calculation versus intuition!",
];

const MISTRAL_COMMENTARY: [&str; 5] = [
    "The instinctive flyer is soaring through the course, its {adaptability}% adaptability allowing it to make split-second adjustments to its flight path. The Pigeon is {race_status} the Rat.",
    "Mistral is demonstrating remarkable intuition, using its {speed}% speed rating to navigate the course with fluid, natural movements. The Pigeon is now {race_status} the Rat, whose algorithmic approach seems more rigid.",
    "The Pigeon's attention mechanisms are working at {accuracy}% accuracy, focusing on the most relevant environmental cues to guide its flight. It's {race_status} the Rat.",
    "With {adaptability}% adaptability, the Pigeon is reading the air currents masterfully, making micro-adjustments that optimize its trajectory. It is {race_status} the Rat!",
    "The instinctive flyer is making its final intuitive decisions! It is {race_status} the Rat, a true test of intuition versus calculation!",
];

/// MockTextGenerator answers prompts with canned responses picked at random. Placeholders like
/// `{speed}` are filled in from the prompt.
#[derive(Debug)]
pub struct MockTextGenerator {
    rng: StdRng,
}

impl MockTextGenerator {
    pub fn new(seed: Option<u64>) -> MockTextGenerator {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        MockTextGenerator { rng }
    }
}

impl TextGenerator for MockTextGenerator {
    fn generate(&mut self, prompt: &Prompt) -> Result<String, TextGenError> {
        let templates: &[&str] = match (prompt.model, prompt.kind) {
            (ModelId::Dbrx, PromptKind::RouteSelection) => &DBRX_ROUTE_SELECTION,
            (ModelId::Mistral, PromptKind::RouteSelection) => &MISTRAL_ROUTE_SELECTION,
            (ModelId::Dbrx, PromptKind::Commentary) => &DBRX_COMMENTARY,
            (ModelId::Mistral, PromptKind::Commentary) => &MISTRAL_COMMENTARY,
        };
        let template = templates[self.rng.gen_range(0..templates.len())];
        Ok(fill_placeholders(
            template,
            &prompt.profile,
            prompt.race_status.as_deref(),
        ))
    }
}

/// fill_placeholders substitutes `{speed}`, `{accuracy}`, `{adaptability}` and, if given,
/// `{race_status}`.
pub fn fill_placeholders(
    template: &str,
    profile: &PerformanceProfile,
    race_status: Option<&str>,
) -> String {
    let mut text = template
        .replace("{speed}", &profile.speed.to_string())
        .replace("{accuracy}", &profile.accuracy.to_string())
        .replace("{adaptability}", &profile.adaptability.to_string());
    if let Some(race_status) = race_status {
        text = text.replace("{race_status}", race_status);
    }
    text
}

/// parse_route_response extracts the route number (1-based as written) and the explanation
/// from a `ROUTE_NUMBER: n` / `EXPLANATION: ...` response. The explanation is optional.
pub fn parse_route_response(content: &str) -> Result<(usize, Option<String>), TextGenError> {
    let number = find_field(content, "ROUTE_NUMBER:")
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<usize>().ok()
        })
        .ok_or_else(|| TextGenError::Malformed(content.to_owned()))?;

    let explanation = find_field(content, "EXPLANATION:")
        .map(|rest| rest.lines().next().unwrap_or("").trim().to_owned())
        .filter(|s| !s.is_empty());

    Ok((number, explanation))
}

/// find_field returns the text following the (case insensitive) key, with leading whitespace
/// removed.
fn find_field<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    let idx = content.to_ascii_uppercase().find(&key.to_ascii_uppercase())?;
    content.get(idx + key.len()..).map(|rest| rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_response_is_parsed() {
        let (number, explanation) =
            parse_route_response("ROUTE_NUMBER: 3\nEXPLANATION: Fast and safe.\nmore").unwrap();
        assert_eq!(number, 3);
        assert_eq!(explanation.as_deref(), Some("Fast and safe."));

        let (number, explanation) = parse_route_response("route_number:12").unwrap();
        assert_eq!(number, 12);
        assert!(explanation.is_none());
    }

    #[test]
    fn unparsable_response_is_an_error() {
        assert!(parse_route_response("I like the second one").is_err());
        assert!(parse_route_response("ROUTE_NUMBER: two").is_err());
    }

    #[test]
    fn placeholders_are_filled() {
        let profile = crate::core::performance::PerformanceProfile::new(10, 20, 30);
        let text = fill_placeholders(
            "{speed}/{accuracy}/{adaptability} {race_status}",
            &profile,
            Some("behind"),
        );
        assert_eq!(text, "10/20/30 behind");
    }

    #[test]
    fn mock_answers_route_prompts_in_expected_format() {
        let mut gen = MockTextGenerator::new(Some(9));
        let profile = PerformanceProfile::default();
        for model in [ModelId::Dbrx, ModelId::Mistral] {
            let prompt = Prompt::route_selection(model, &profile, &[]);
            for _ in 0..10 {
                let content = gen.generate(&prompt).unwrap();
                assert!(parse_route_response(&content).is_ok());
                assert!(!content.contains('{'));
            }
        }
    }

    #[test]
    fn mock_commentary_mentions_race_status() {
        let mut gen = MockTextGenerator::new(Some(4));
        let prompt = Prompt::commentary(ModelId::Dbrx, &PerformanceProfile::default(), "ahead of");
        let content = gen.generate(&prompt).unwrap();
        assert!(content.contains("ahead of"));
    }
}
