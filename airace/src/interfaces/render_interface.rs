use crate::core::interpolation::RacerPosition;
use crate::core::race::{Race, RaceOutcome, RaceStatus};
use crate::core::racer::{Ability, ObstructionKind, RacerId, RacerState};
use crate::core::performance::ModelId;
use crate::post::race_result::RaceResult;
use serde::Serialize;

pub const MAX_RENDER_UPDATE_FREQUENCY: f64 = 20.0;

/// RacerSnapshot is everything a renderer needs to draw one racer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerSnapshot {
    pub id: RacerId,
    pub model: ModelId,
    pub name: &'static str,
    pub progress: f64,
    pub position: RacerPosition,
    pub speed: f64,
    pub obstruction: Option<ObstructionKind>,
    pub rerouting: bool,
    /// (s) Remaining cooldown per ability, ordered like `Ability::ALL`
    pub cooldowns: [f64; 3],
}

impl RacerSnapshot {
    pub fn new(racer: &RacerState, cur_racetime: f64) -> RacerSnapshot {
        RacerSnapshot {
            id: racer.id,
            model: racer.model,
            name: racer.model.racer_name(),
            progress: racer.progress(),
            position: racer.position,
            speed: racer.current_speed,
            obstruction: racer.obstruction().map(|o| o.kind),
            rerouting: racer.is_rerouting(),
            cooldowns: Ability::ALL.map(|a| racer.cooldown_remaining(a, cur_racetime)),
        }
    }
}

/// RaceState is sent to a renderer at most MAX_RENDER_UPDATE_FREQUENCY times per simulated
/// second. The last message of a race carries the final result.
#[derive(Debug, Clone, Serialize)]
pub struct RaceState {
    pub race_time: f64,
    pub status: RaceStatus,
    pub outcome: RaceOutcome,
    pub racers: Vec<RacerSnapshot>,
    pub commentary: Option<String>,
    pub final_result: Option<RaceResult>,
}

impl RaceState {
    pub fn new(race: &Race) -> RaceState {
        RaceState {
            race_time: race.cur_racetime,
            status: race.status(),
            outcome: race.outcome(),
            racers: vec![
                RacerSnapshot::new(race.player(), race.cur_racetime),
                RacerSnapshot::new(race.opponent(), race.cur_racetime),
            ],
            commentary: None,
            final_result: None,
        }
    }
}
