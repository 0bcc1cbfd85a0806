use crate::core::geo::Route;
use crate::core::interpolation::{interpolate, interpolate_chord, RacerPosition};
use crate::core::performance::{ModelId, PerformanceProfile};
use crate::core::speed::INITIAL_SPEED;
use rand::Rng;
use rand_distr::{Distribution, UnitDisc};
use serde::{Deserialize, Serialize};

/// RacerId addresses one of the two racers of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RacerId {
    Player,
    Opponent,
}

impl RacerId {
    pub fn other(self) -> RacerId {
        match self {
            RacerId::Player => RacerId::Opponent,
            RacerId::Opponent => RacerId::Player,
        }
    }
}

/// ObstructionKind describes how a racer is hindered by the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstructionKind {
    Blocked,
    Rerouting,
    Evading,
}

impl ObstructionKind {
    /// duration returns how long (s) an obstruction of this kind lasts.
    pub fn duration(self) -> f64 {
        match self {
            ObstructionKind::Blocked => 3.0,
            ObstructionKind::Rerouting => 4.0,
            ObstructionKind::Evading => 2.0,
        }
    }

    /// complementary returns the kind the other racer suffers from in the same incident.
    pub fn complementary(self) -> ObstructionKind {
        match self {
            ObstructionKind::Blocked => ObstructionKind::Evading,
            ObstructionKind::Rerouting => ObstructionKind::Blocked,
            ObstructionKind::Evading => ObstructionKind::Rerouting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstruction {
    pub kind: ObstructionKind,
    pub t_remaining: f64,
}

/// Ability is one of the actively triggered racer abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    /// Doubles the progress rate for a while
    Speed,
    /// Floods the opponent with data, slowing it down
    Attack,
    /// Skips a bit of the route after a short delay
    Optimize,
}

impl Ability {
    pub const ALL: [Ability; 3] = [Ability::Speed, Ability::Attack, Ability::Optimize];

    fn idx(self) -> usize {
        match self {
            Ability::Speed => 0,
            Ability::Attack => 1,
            Ability::Optimize => 2,
        }
    }
}

/// ObstacleKind is a random obstacle appearing on a racer's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObstacleKind {
    Construction,
    Pigeons,
    DataOverflow,
    Traffic,
    Shortcut,
}

/// EffectSource tells where a timed progress multiplier comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EffectSource {
    SpeedBoost,
    DataFlood,
    Obstacle(ObstacleKind),
}

/// SpeedEffect scales the progress increment of a racer for a limited time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedEffect {
    pub source: EffectSource,
    pub multiplier: f64,
    pub t_remaining: f64,
}

/// Reroute is an active detour: the racer leaves its polyline and moves along the chord to a
/// rejoin point further ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reroute {
    pub from: RacerPosition,
    pub to: RacerPosition,
    pub rejoin_progress: f64,
    pub frac: f64,
}

/// TimerEvents collects what expired during update_timers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerEvents {
    pub obstruction_cleared: bool,
    pub speed_boost_ended: bool,
    pub optimization_done: bool,
}

/// RacerState is the complete mutable state of one racer.
///
/// * `progress` - Fraction of the route covered, in [0, 1], never decreasing during a race
/// * `current_speed` - (arbitrary units) Last drawn speed, within [MIN_SPEED, MAX_SPEED]
/// * `t_ability_ready` - (s) Race time at which each ability is available again
/// * `next_checkpoint` - Index of the next checkpoint not yet announced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerState {
    pub id: RacerId,
    pub model: ModelId,
    pub profile: PerformanceProfile,
    pub route: Route,
    pub route_name: String,
    progress: f64,
    pub position: RacerPosition,
    pub current_speed: f64,
    obstruction: Option<Obstruction>,
    reroute: Option<Reroute>,
    effects: Vec<SpeedEffect>,
    pending_boost: f64,
    t_optimization: Option<f64>,
    t_ability_ready: [f64; 3],
    next_checkpoint: usize,
    t_next_obstacle: f64,
    miscalculating: bool,
}

impl RacerState {
    pub fn new(
        id: RacerId,
        model: ModelId,
        profile: PerformanceProfile,
        route: Route,
        route_name: &str,
    ) -> RacerState {
        let position = interpolate(0.0, route.points());
        RacerState {
            id,
            model,
            profile,
            route,
            route_name: route_name.to_owned(),
            progress: 0.0,
            position,
            current_speed: INITIAL_SPEED,
            obstruction: None,
            reroute: None,
            effects: Vec::new(),
            pending_boost: 0.0,
            t_optimization: None,
            t_ability_ready: [0.0; 3],
            next_checkpoint: 0,
            t_next_obstacle: 0.0,
            miscalculating: false,
        }
    }

    /// reset puts the racer back onto the start of its route. Profile, route and model stay.
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.position = interpolate(0.0, self.route.points());
        self.current_speed = INITIAL_SPEED;
        self.obstruction = None;
        self.reroute = None;
        self.effects.clear();
        self.pending_boost = 0.0;
        self.t_optimization = None;
        self.t_ability_ready = [0.0; 3];
        self.next_checkpoint = 0;
        self.t_next_obstacle = 0.0;
        self.miscalculating = false;
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn obstruction(&self) -> Option<&Obstruction> {
        self.obstruction.as_ref()
    }

    pub fn is_obstructed(&self) -> bool {
        self.obstruction.is_some()
    }

    pub fn is_rerouting(&self) -> bool {
        self.reroute.is_some()
    }

    pub fn reroute(&self) -> Option<&Reroute> {
        self.reroute.as_ref()
    }

    pub fn effects(&self) -> &[SpeedEffect] {
        &self.effects
    }

    /// ability_ready checks if the ability's cooldown has run out at the given race time.
    pub fn ability_ready(&self, ability: Ability, cur_racetime: f64) -> bool {
        cur_racetime >= self.t_ability_ready[ability.idx()]
    }

    /// cooldown_remaining returns the remaining cooldown (s) of the ability.
    pub fn cooldown_remaining(&self, ability: Ability, cur_racetime: f64) -> f64 {
        (self.t_ability_ready[ability.idx()] - cur_racetime).max(0.0)
    }

    pub fn t_next_obstacle(&self) -> f64 {
        self.t_next_obstacle
    }

    /// progress_multiplier returns the product of all active multipliers, including the
    /// obstruction slowdown.
    pub fn progress_multiplier(&self, obstruction_factor: f64) -> f64 {
        let mut multiplier: f64 = self.effects.iter().map(|e| e.multiplier).product();
        if self.obstruction.is_some() {
            multiplier *= obstruction_factor;
        }
        multiplier
    }

    // ---------------------------------------------------------------------------------------------
    // STATE CHANGES -------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// update_timers ages obstruction, effects and the pending path optimisation by dt.
    pub fn update_timers(&mut self, dt: f64, optimization_boost: f64) -> TimerEvents {
        let mut timer_events = TimerEvents::default();

        if let Some(obstruction) = self.obstruction.as_mut() {
            obstruction.t_remaining -= dt;
            if obstruction.t_remaining <= 0.0 {
                self.obstruction = None;
                timer_events.obstruction_cleared = true;
            }
        }

        for effect in self.effects.iter_mut() {
            effect.t_remaining -= dt;
            if effect.t_remaining <= 0.0 && matches!(effect.source, EffectSource::SpeedBoost) {
                timer_events.speed_boost_ended = true;
            }
        }
        self.effects.retain(|e| e.t_remaining > 0.0);

        if let Some(t) = self.t_optimization.as_mut() {
            *t -= dt;
            if *t <= 0.0 {
                self.t_optimization = None;
                self.pending_boost += optimization_boost;
                timer_events.optimization_done = true;
            }
        }

        timer_events
    }

    /// add_effect activates a timed multiplier. An effect from the same source is replaced.
    pub fn add_effect(&mut self, source: EffectSource, multiplier: f64, duration: f64) {
        self.effects.retain(|e| e.source != source);
        self.effects.push(SpeedEffect {
            source,
            multiplier,
            t_remaining: duration,
        });
    }

    /// add_boost adds a one-off progress jump applied with the next progress update.
    pub fn add_boost(&mut self, boost: f64) {
        self.pending_boost += boost.max(0.0);
    }

    pub fn schedule_optimization(&mut self, delay: f64) {
        self.t_optimization = Some(delay);
    }

    pub fn set_cooldown(&mut self, ability: Ability, t_ready: f64) {
        self.t_ability_ready[ability.idx()] = t_ready;
    }

    pub fn set_t_next_obstacle(&mut self, t: f64) {
        self.t_next_obstacle = t;
    }

    pub fn set_miscalculating(&mut self) {
        self.miscalculating = true;
    }

    /// act_obstruction starts an obstruction of the given kind. A rerouting obstruction also
    /// starts a detour towards the route point `rejoin_offset` ahead.
    pub fn act_obstruction(&mut self, kind: ObstructionKind, rejoin_offset: f64) {
        self.obstruction = Some(Obstruction {
            kind,
            t_remaining: kind.duration(),
        });

        if kind == ObstructionKind::Rerouting && self.reroute.is_none() && !self.is_finished() {
            let rejoin_progress = (self.progress + rejoin_offset).min(1.0);
            self.reroute = Some(Reroute {
                from: self.position,
                to: interpolate(rejoin_progress, self.route.points()),
                rejoin_progress,
                frac: 0.0,
            });
        }
    }

    /// update_progress advances the racer by one time step. While on a detour the progress is
    /// frozen and the chord fraction advances instead. Progress never decreases and never
    /// exceeds 1.
    pub fn update_progress(
        &mut self,
        dt: f64,
        damping: f64,
        obstruction_factor: f64,
        reroute_speed: f64,
    ) {
        let mut new_progress = self.progress;

        if let Some(reroute) = self.reroute.as_mut() {
            reroute.frac += dt * reroute_speed;
            if reroute.frac >= 1.0 {
                new_progress = new_progress.max(reroute.rejoin_progress);
                self.reroute = None;
            }
        } else {
            let multiplier = self.progress_multiplier(obstruction_factor);
            let increment = dt * self.current_speed * multiplier / damping;
            if increment.is_finite() && increment > 0.0 {
                new_progress += increment;
            }
        }

        new_progress += self.pending_boost;
        self.pending_boost = 0.0;

        self.progress = new_progress.clamp(self.progress, 1.0);
    }

    /// update_position recomputes the pose from the progress. With `deviation` set a random
    /// lateral offset is added whose magnitude shrinks with accuracy and grows while obstructed.
    pub fn update_position<R: Rng>(
        &mut self,
        rng: &mut R,
        deviation: Option<&DeviationPars>,
    ) {
        let ideal = match self.reroute.as_ref() {
            Some(reroute) => interpolate_chord(&reroute.from, &reroute.to, reroute.frac),
            None => interpolate(self.progress, self.route.points()),
        };

        self.position = match deviation {
            Some(pars) => {
                let max_dev = self.max_deviation(pars);
                let [dx, dy]: [f64; 2] = UnitDisc.sample(rng);
                ideal.with_offset(dx * max_dev, dy * max_dev)
            }
            None => ideal,
        };
        self.miscalculating = false;
    }

    /// max_deviation returns the bound (deg) of the lateral offset for the current tick.
    pub fn max_deviation(&self, pars: &DeviationPars) -> f64 {
        let mut max_dev = pars.base * (1.0 - self.profile.accuracy_frac());
        if self.obstruction.is_some() {
            max_dev += pars.obstructed;
        }
        if self.miscalculating {
            max_dev += pars.miscalculation;
        }
        max_dev
    }

    /// take_passed_checkpoints returns all checkpoints reached since the last call.
    pub fn take_passed_checkpoints(&mut self, checkpoints: &[f64]) -> Vec<f64> {
        let mut passed = Vec::new();
        while let Some(&checkpoint) = checkpoints.get(self.next_checkpoint) {
            if self.progress < checkpoint {
                break;
            }
            passed.push(checkpoint);
            self.next_checkpoint += 1;
        }
        passed
    }
}

/// * `base` - (deg) Deviation bound at zero accuracy
/// * `obstructed` - (deg) Additional bound while obstructed
/// * `miscalculation` - (deg) Additional bound on the tick after a miscalculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationPars {
    pub base: f64,
    pub obstructed: f64,
    pub miscalculation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rat() -> RacerState {
        RacerState::new(
            RacerId::Player,
            ModelId::Dbrx,
            PerformanceProfile::default(),
            Route::straight_line(false),
            "Direct Route",
        )
    }

    #[test]
    fn progress_never_exceeds_one() {
        let mut racer = rat();
        racer.current_speed = 0.4;
        racer.add_boost(0.7);
        for _ in 0..100 {
            racer.update_progress(1.0, 10.0, 0.5, 0.5);
        }
        assert_relative_eq!(racer.progress(), 1.0);
        assert!(racer.is_finished());
    }

    #[test]
    fn effects_multiply_and_expire() {
        let mut racer = rat();
        racer.add_effect(EffectSource::SpeedBoost, 2.0, 5.0);
        racer.add_effect(EffectSource::DataFlood, 0.3, 3.0);
        assert_relative_eq!(racer.progress_multiplier(0.5), 0.6);

        let timer_events = racer.update_timers(3.0, 0.05);
        assert!(!timer_events.speed_boost_ended);
        assert_eq!(racer.effects().len(), 1);

        let timer_events = racer.update_timers(2.0, 0.05);
        assert!(timer_events.speed_boost_ended);
        assert!(racer.effects().is_empty());
    }

    #[test]
    fn same_source_effect_is_replaced() {
        let mut racer = rat();
        racer.add_effect(EffectSource::SpeedBoost, 2.0, 1.0);
        racer.add_effect(EffectSource::SpeedBoost, 2.0, 5.0);
        assert_eq!(racer.effects().len(), 1);
        assert_relative_eq!(racer.effects()[0].t_remaining, 5.0);
    }

    #[test]
    fn obstruction_slows_and_clears() {
        let mut racer = rat();
        racer.act_obstruction(ObstructionKind::Blocked, 0.05);
        assert_relative_eq!(racer.progress_multiplier(0.5), 0.5);

        let timer_events = racer.update_timers(2.9, 0.05);
        assert!(!timer_events.obstruction_cleared);
        let timer_events = racer.update_timers(0.2, 0.05);
        assert!(timer_events.obstruction_cleared);
        assert!(!racer.is_obstructed());
    }

    #[test]
    fn reroute_freezes_progress_then_rejoins_ahead() {
        let mut racer = rat();
        racer.update_progress(10.0, 10.0, 0.5, 0.5);
        let p_before = racer.progress();

        racer.act_obstruction(ObstructionKind::Rerouting, 0.05);
        assert!(racer.is_rerouting());

        racer.update_progress(1.0, 10.0, 0.5, 0.5);
        assert_relative_eq!(racer.progress(), p_before);

        racer.update_progress(1.0, 10.0, 0.5, 0.5);
        assert!(!racer.is_rerouting());
        assert_relative_eq!(racer.progress(), p_before + 0.05, epsilon = 1e-12);
    }

    #[test]
    fn optimization_applies_after_delay() {
        let mut racer = rat();
        racer.schedule_optimization(2.0);
        assert!(!racer.update_timers(1.0, 0.05).optimization_done);
        assert!(racer.update_timers(1.0, 0.05).optimization_done);
        racer.current_speed = 0.0;
        racer.update_progress(0.0, 10.0, 0.5, 0.5);
        assert_relative_eq!(racer.progress(), 0.05);
    }

    #[test]
    fn deviation_respects_bound() {
        let mut racer = rat();
        let pars = DeviationPars {
            base: 0.00002,
            obstructed: 0.00005,
            miscalculation: 0.0001,
        };
        racer.act_obstruction(ObstructionKind::Evading, 0.05);
        let mut rng = StdRng::seed_from_u64(5);
        let ideal = interpolate(0.0, racer.route.points());
        for _ in 0..50 {
            racer.update_position(&mut rng, Some(&pars));
            let d = helpers::general::dist_2d(
                racer.position.longitude,
                racer.position.latitude,
                ideal.longitude,
                ideal.latitude,
            );
            assert!(d <= racer.max_deviation(&pars) + 1e-12);
        }
    }

    #[test]
    fn checkpoints_are_reported_once() {
        let mut racer = rat();
        let checkpoints = [0.2, 0.4, 0.6, 0.8, 1.0];
        racer.add_boost(0.45);
        racer.update_progress(0.0, 10.0, 0.5, 0.5);
        assert_eq!(racer.take_passed_checkpoints(&checkpoints), vec![0.2, 0.4]);
        assert!(racer.take_passed_checkpoints(&checkpoints).is_empty());
    }

    #[test]
    fn reset_restores_initial_state() {
        let fresh = rat();
        let mut racer = rat();
        racer.add_boost(0.3);
        racer.update_progress(1.0, 10.0, 0.5, 0.5);
        racer.act_obstruction(ObstructionKind::Rerouting, 0.05);
        racer.add_effect(EffectSource::DataFlood, 0.3, 3.0);
        racer.set_cooldown(Ability::Speed, 12.0);
        racer.reset();
        assert_eq!(racer, fresh);
    }
}
