use crate::core::events::{EventBus, EventRecord, RaceEvent};
use crate::core::geo::Route;
use crate::core::performance::{ModelId, PerformanceProfile, TuningPars};
use crate::core::racer::{
    Ability, DeviationPars, EffectSource, ObstacleKind, ObstructionKind, RacerId, RacerState,
};
use crate::core::speed::{calc_dynamic_speed, calc_opponent_speed};
use crate::post::race_result::RaceResult;
use flume::Receiver;
use helpers::general::dist_2d;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// * `tuning` - Tuning sliders of the player's model, the model is given by the `model` tag
/// * `opponent_profile` - Explicit opponent profile, derived from the player's profile if absent
/// * `seed` - Seed of the random number generator, drawn from entropy if absent
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RacePars {
    pub tuning: TuningPars,
    #[serde(default)]
    pub opponent_profile: Option<PerformanceProfile>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RacePars {
    pub fn player_model(&self) -> ModelId {
        self.tuning.model()
    }

    pub fn player_profile(&self) -> PerformanceProfile {
        self.tuning.performance_profile()
    }

    /// opponent_profile returns the explicit opponent profile or derives it from the player's.
    pub fn opponent_profile(&self) -> PerformanceProfile {
        self.opponent_profile
            .unwrap_or_else(|| self.player_profile().opponent_profile(self.player_model()))
    }
}

/// SimConstants contains all constants of the simulation loop. Every field has a default so
/// parameter files only need to list what they change.
///
/// * `progress_damping` - Damping constant K in `increment = dt * speed / K`
/// * `speed_refresh_prob` - Probability per tick to draw fresh speeds
/// * `obstruction_threshold` - (deg) Racer distance below which an obstruction may occur
/// * `obstruction_cooldown` - (s) Minimum race time between two obstruction incidents
/// * `obstruction_speed_factor` - Progress multiplier while obstructed
/// * `opponent_obstruction_prob` - Probability that the opponent is hit by the incident too
/// * `max_deviation` - (deg) Deviation bound at zero accuracy
/// * `obstruction_deviation` - (deg) Additional deviation while obstructed
/// * `miscalculation_deviation` - (deg) Additional deviation on a miscalculation tick
/// * `progress_boost` - Progress gained by path optimisation, shortcuts and reroute rejoins
/// * `reroute_speed` - (1/s) Chord fraction covered per second on a detour
/// * `checkpoints` - Ascending progress values announced once per racer
/// * `ability_cooldown` - (s) Cooldown of every ability
/// * `random_obstacles` - Spawn random obstacles on the player's route
/// * `max_race_time` - (s) Guard for the headless driver
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    pub progress_damping: f64,
    pub speed_refresh_prob: f64,
    pub obstruction_threshold: f64,
    pub obstruction_cooldown: f64,
    pub obstruction_speed_factor: f64,
    pub opponent_obstruction_prob: f64,
    pub max_deviation: f64,
    pub obstruction_deviation: f64,
    pub miscalculation_deviation: f64,
    pub progress_boost: f64,
    pub reroute_speed: f64,
    pub checkpoints: Vec<f64>,
    pub ability_cooldown: f64,
    pub random_obstacles: bool,
    pub max_race_time: f64,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            progress_damping: 10.0,
            speed_refresh_prob: 0.05,
            obstruction_threshold: 0.0002,
            obstruction_cooldown: 8.0,
            obstruction_speed_factor: 0.5,
            opponent_obstruction_prob: 0.7,
            max_deviation: 0.00002,
            obstruction_deviation: 0.00005,
            miscalculation_deviation: 0.0001,
            progress_boost: 0.05,
            reroute_speed: 0.5,
            checkpoints: vec![0.2, 0.4, 0.6, 0.8, 1.0],
            ability_cooldown: 10.0,
            random_obstacles: true,
            max_race_time: 3600.0,
        }
    }
}

impl SimConstants {
    fn deviation_pars(&self) -> DeviationPars {
        DeviationPars {
            base: self.max_deviation,
            obstructed: self.obstruction_deviation,
            miscalculation: self.miscalculation_deviation,
        }
    }
}

// obstacle timing of the random obstacle generator
const T_FIRST_OBSTACLE: f64 = 5.0;
const T_OBSTACLE_MIN_INTERVAL: f64 = 8.0;
const T_OBSTACLE_MAX_INTERVAL: f64 = 15.0;

// ability effects
const SPEED_BOOST_MULTIPLIER: f64 = 2.0;
const T_SPEED_BOOST: f64 = 5.0;
const MISCALCULATION_PROB: f64 = 0.2;
const DATA_FLOOD_MULTIPLIER: f64 = 0.3;
const T_DATA_FLOOD: f64 = 3.0;
const T_OPTIMIZATION_DELAY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Idle,
    Racing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Player,
    Opponent,
    Tie,
    None,
}

/// RaceOutcome is set exactly once when the first racer reaches the finish and does not change
/// until the race is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub winner: Winner,
    pub finished: bool,
}

impl Default for RaceOutcome {
    fn default() -> Self {
        RaceOutcome {
            winner: Winner::None,
            finished: false,
        }
    }
}

/// RacerSetup contains everything needed to put a racer onto the grid.
#[derive(Debug, Clone)]
pub struct RacerSetup {
    pub model: ModelId,
    pub profile: PerformanceProfile,
    pub route: Route,
    pub route_name: String,
}

#[derive(Debug)]
pub struct Race {
    pub cur_racetime: f64,
    sim_consts: SimConstants,
    status: RaceStatus,
    outcome: RaceOutcome,
    player: RacerState,
    opponent: RacerState,
    rng: StdRng,
    event_bus: EventBus,
    events: Vec<EventRecord>,
    t_last_obstruction: Option<f64>,
    last_tick: Option<Instant>,
    started_at: Option<Instant>,
}

impl Race {
    pub fn new(
        player: RacerSetup,
        opponent: RacerSetup,
        sim_consts: &SimConstants,
        seed: Option<u64>,
    ) -> Race {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Race {
            cur_racetime: 0.0,
            sim_consts: sim_consts.to_owned(),
            status: RaceStatus::Idle,
            outcome: RaceOutcome::default(),
            player: RacerState::new(
                RacerId::Player,
                player.model,
                player.profile,
                player.route,
                &player.route_name,
            ),
            opponent: RacerState::new(
                RacerId::Opponent,
                opponent.model,
                opponent.profile,
                opponent.route,
                &opponent.route_name,
            ),
            rng,
            event_bus: EventBus::new(),
            events: Vec::new(),
            t_last_obstruction: None,
            last_tick: None,
            started_at: None,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // CONTROL -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start begins (or resumes) the race. A finished race is reset first.
    pub fn start(&mut self) {
        match self.status {
            RaceStatus::Racing => return,
            RaceStatus::Finished => self.reset(),
            RaceStatus::Idle | RaceStatus::Paused => {}
        }

        if self.status == RaceStatus::Idle {
            self.refresh_speeds();
            self.player.set_t_next_obstacle(T_FIRST_OBSTACLE);
        }

        self.status = RaceStatus::Racing;
        let now = Instant::now();
        self.last_tick = Some(now);
        self.started_at = Some(now);
        self.emit(RaceEvent::RaceStart);
    }

    /// pause stops ticking. Progress and timers are kept.
    pub fn pause(&mut self) {
        if self.status != RaceStatus::Racing {
            return;
        }
        self.status = RaceStatus::Paused;
        self.last_tick = None;
        self.emit(RaceEvent::RacePause);
    }

    /// reset returns both racers to the start and clears the outcome. Calling it repeatedly
    /// yields the same idle state.
    pub fn reset(&mut self) {
        self.player.reset();
        self.opponent.reset();
        self.status = RaceStatus::Idle;
        self.outcome = RaceOutcome::default();
        self.cur_racetime = 0.0;
        self.t_last_obstruction = None;
        self.last_tick = None;
        self.started_at = None;
        self.events.clear();
        self.emit(RaceEvent::RaceReset);
    }

    /// tick advances the race by the wall-clock time elapsed since the previous tick.
    pub fn tick(&mut self) {
        if self.status != RaceStatus::Racing {
            return;
        }
        let now = Instant::now();
        let dt = self
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.simulate_timestep(dt);
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// simulate_timestep advances the race by dt seconds. It is a no-op unless the race is
    /// running.
    pub fn simulate_timestep(&mut self, dt: f64) {
        if self.status != RaceStatus::Racing || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        // increment discretization variable
        self.cur_racetime += dt;

        // age obstructions, effects and pending optimisations
        self.update_timers(RacerId::Player, dt);
        self.update_timers(RacerId::Opponent, dt);

        // occasionally draw fresh speeds
        if self.rng.gen_bool(self.sim_consts.speed_refresh_prob.clamp(0.0, 1.0)) {
            self.refresh_speeds();
        }

        // random obstacles and obstructions
        if self.sim_consts.random_obstacles {
            self.handle_random_obstacle();
        }
        self.check_for_obstruction();

        // update race progress, player first
        let damping = self.sim_consts.progress_damping;
        let obstruction_factor = self.sim_consts.obstruction_speed_factor;
        let reroute_speed = self.sim_consts.reroute_speed;
        self.player.update_progress(dt, damping, obstruction_factor, reroute_speed);
        self.opponent.update_progress(dt, damping, obstruction_factor, reroute_speed);

        // outcome detection after both racers advanced
        let finished = self.player.is_finished() || self.opponent.is_finished();

        // update positions, no deviation once the race is decided
        let deviation = self.sim_consts.deviation_pars();
        let deviation = if finished { None } else { Some(&deviation) };
        self.player.update_position(&mut self.rng, deviation);
        self.opponent.update_position(&mut self.rng, deviation);

        self.handle_checkpoints();

        if finished {
            self.handle_finish();
        }
    }

    // ---------------------------------------------------------------------------------------------
    // ABILITIES AND OBSTACLES ---------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// activate_ability triggers an ability of the given racer. Returns false if the race is not
    /// running or the ability is still cooling down.
    pub fn activate_ability(&mut self, racer: RacerId, ability: Ability) -> bool {
        if self.status != RaceStatus::Racing {
            return false;
        }
        if !self.racer(racer).ability_ready(ability, self.cur_racetime) {
            tracing::debug!("{:?} ability {:?} is still cooling down", racer, ability);
            return false;
        }

        let t_ready = self.cur_racetime + self.sim_consts.ability_cooldown;
        self.racer_mut(racer).set_cooldown(ability, t_ready);

        match ability {
            Ability::Speed => self.racer_mut(racer).add_effect(
                EffectSource::SpeedBoost,
                SPEED_BOOST_MULTIPLIER,
                T_SPEED_BOOST,
            ),
            Ability::Attack => self.racer_mut(racer.other()).add_effect(
                EffectSource::DataFlood,
                DATA_FLOOD_MULTIPLIER,
                T_DATA_FLOOD,
            ),
            Ability::Optimize => self
                .racer_mut(racer)
                .schedule_optimization(T_OPTIMIZATION_DELAY),
        }

        self.emit(RaceEvent::AbilityActivated { racer, ability });
        true
    }

    /// apply_obstacle lets an obstacle hit the given racer. The effect depends on the racer's
    /// model and profile. Returns false if the race is not running.
    pub fn apply_obstacle(&mut self, racer: RacerId, obstacle: ObstacleKind) -> bool {
        if self.status != RaceStatus::Racing {
            return false;
        }

        let profile = self.racer(racer).profile;
        let model = self.racer(racer).model;
        let source = EffectSource::Obstacle(obstacle);

        match obstacle {
            ObstacleKind::Construction => {
                if profile.accuracy > 50 {
                    self.trigger_obstruction(racer, ObstructionKind::Rerouting);
                } else {
                    self.racer_mut(racer).add_effect(source, 0.5, 3.0);
                }
            }
            ObstacleKind::Pigeons => {
                let (multiplier, duration) = match model {
                    ModelId::Mistral => (0.6, 3.0),
                    ModelId::Dbrx => (0.9, 1.0),
                };
                self.racer_mut(racer).add_effect(source, multiplier, duration);
            }
            ObstacleKind::DataOverflow => {
                let multiplier = 0.3 + 0.4 * profile.adaptability_frac();
                self.racer_mut(racer).add_effect(source, multiplier, 3.0);
            }
            ObstacleKind::Traffic => {
                let (multiplier, duration) = if profile.speed > 70 {
                    if self.rng.gen_bool(0.3) {
                        (0.2, 4.0)
                    } else {
                        (0.8, 2.0)
                    }
                } else {
                    (0.6, 3.0)
                };
                self.racer_mut(racer).add_effect(source, multiplier, duration);
            }
            ObstacleKind::Shortcut => {
                let boost = self.sim_consts.progress_boost;
                self.racer_mut(racer).add_boost(boost);
            }
        }

        self.emit(RaceEvent::ObstacleAppeared { racer, obstacle });
        true
    }

    /// trigger_obstruction obstructs a racer directly, independent of proximity and cooldown.
    pub fn trigger_obstruction(&mut self, racer: RacerId, kind: ObstructionKind) {
        let offset = self.sim_consts.progress_boost;
        self.racer_mut(racer).act_obstruction(kind, offset);
        self.t_last_obstruction = Some(self.cur_racetime);
        self.emit(RaceEvent::PathObstruction {
            racer,
            obstruction: kind,
        });
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn outcome(&self) -> RaceOutcome {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.finished
    }

    pub fn player(&self) -> &RacerState {
        &self.player
    }

    pub fn opponent(&self) -> &RacerState {
        &self.opponent
    }

    pub fn racer(&self, id: RacerId) -> &RacerState {
        match id {
            RacerId::Player => &self.player,
            RacerId::Opponent => &self.opponent,
        }
    }

    fn racer_mut(&mut self, id: RacerId) -> &mut RacerState {
        match id {
            RacerId::Player => &mut self.player,
            RacerId::Opponent => &mut self.opponent,
        }
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// wallclock_elapsed returns the wall-clock time since the race was last started.
    pub fn wallclock_elapsed(&self) -> Option<std::time::Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// subscribe returns a receiver for all race events published from now on.
    pub fn subscribe(&mut self) -> Receiver<EventRecord> {
        self.event_bus.subscribe()
    }

    /// set_speeds overrides the current speeds of both racers, e.g. for scripted scenarios. The
    /// values are clamped into the speed bounds.
    pub fn set_speeds(&mut self, player_speed: f64, opponent_speed: f64) {
        use crate::core::speed::{MAX_SPEED, MIN_SPEED};
        let fix = |v: f64| if v.is_nan() { MIN_SPEED } else { v.clamp(MIN_SPEED, MAX_SPEED) };
        self.player.current_speed = fix(player_speed);
        self.opponent.current_speed = fix(opponent_speed);
    }

    /// get_race_result returns the summary of the race for post-processing.
    pub fn get_race_result(&self) -> RaceResult {
        RaceResult {
            player_model: self.player.model,
            opponent_model: self.opponent.model,
            player_route: self.player.route_name.to_owned(),
            opponent_route: self.opponent.route_name.to_owned(),
            player_profile: self.player.profile,
            opponent_profile: self.opponent.profile,
            outcome: self.outcome,
            player_progress: self.player.progress(),
            opponent_progress: self.opponent.progress(),
            race_time: self.cur_racetime,
            events: self.events.to_owned(),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn emit(&mut self, event: RaceEvent) {
        tracing::debug!("{:8.3}s {:?}", self.cur_racetime, event);
        let record = EventRecord {
            time_s: self.cur_racetime,
            event,
        };
        self.event_bus.publish(&record);
        self.events.push(record);
    }

    fn refresh_speeds(&mut self) {
        self.player.current_speed = calc_dynamic_speed(&self.player.profile, &mut self.rng);
        self.opponent.current_speed =
            calc_opponent_speed(&self.opponent.profile, &self.player.profile, &mut self.rng);
    }

    fn update_timers(&mut self, racer: RacerId, dt: f64) {
        let boost = self.sim_consts.progress_boost;
        let timer_events = self.racer_mut(racer).update_timers(dt, boost);

        if timer_events.obstruction_cleared {
            self.emit(RaceEvent::ObstructionCleared { racer });
        }
        if timer_events.speed_boost_ended && self.rng.gen_bool(MISCALCULATION_PROB) {
            self.racer_mut(racer).set_miscalculating();
            self.emit(RaceEvent::AbilityMiscalculation { racer });
        }
    }

    /// check_for_obstruction handles incidents between the two racers. An incident requires
    /// proximity, an elapsed cooldown and a successful draw whose probability decreases with the
    /// player's adaptability.
    fn check_for_obstruction(&mut self) {
        if let Some(t_last) = self.t_last_obstruction {
            if self.cur_racetime - t_last < self.sim_consts.obstruction_cooldown {
                return;
            }
        }
        if self.player.is_rerouting() || self.player.is_finished() || self.opponent.is_finished()
        {
            return;
        }

        let p_pos = &self.player.position;
        let o_pos = &self.opponent.position;
        let dist = dist_2d(p_pos.longitude, p_pos.latitude, o_pos.longitude, o_pos.latitude);
        if dist >= self.sim_consts.obstruction_threshold {
            return;
        }

        let prob = (0.8 - 0.6 * self.player.profile.adaptability_frac()).clamp(0.0, 1.0);
        if !self.rng.gen_bool(prob) {
            return;
        }

        let kind = self.determine_obstruction_kind();
        self.trigger_obstruction(RacerId::Player, kind);

        if self
            .rng
            .gen_bool(self.sim_consts.opponent_obstruction_prob.clamp(0.0, 1.0))
        {
            self.trigger_obstruction(RacerId::Opponent, kind.complementary());
        }
    }

    /// determine_obstruction_kind picks the player's obstruction kind from the relative heading
    /// and the progress difference.
    fn determine_obstruction_kind(&mut self) -> ObstructionKind {
        let mut heading_diff =
            (self.player.position.rotation - self.opponent.position.rotation).abs() % 360.0;
        if heading_diff > 180.0 {
            heading_diff = 360.0 - heading_diff;
        }
        if heading_diff > 45.0 && heading_diff < 135.0 {
            return ObstructionKind::Evading;
        }

        let d_progress = self.player.progress() - self.opponent.progress();
        if d_progress.abs() < 0.05 {
            if self.rng.gen_bool(0.5) {
                ObstructionKind::Blocked
            } else {
                ObstructionKind::Rerouting
            }
        } else if d_progress > 0.0 {
            ObstructionKind::Blocked
        } else {
            ObstructionKind::Rerouting
        }
    }

    /// handle_random_obstacle lets a random obstacle appear on the player's route every 8 to 15
    /// seconds. Higher adaptability makes obstacles rarer.
    fn handle_random_obstacle(&mut self) {
        if self.cur_racetime < self.player.t_next_obstacle() {
            return;
        }
        let t_next = self.cur_racetime
            + self
                .rng
                .gen_range(T_OBSTACLE_MIN_INTERVAL..T_OBSTACLE_MAX_INTERVAL);
        self.player.set_t_next_obstacle(t_next);

        let profile = self.player.profile;
        let chance = 0.7 * (1.0 - profile.adaptability as f64 / 150.0);
        if !self.rng.gen_bool(chance.clamp(0.0, 1.0)) {
            return;
        }

        let candidates = obstacle_candidates(self.player.model, &profile);
        let obstacle = candidates[self.rng.gen_range(0..candidates.len())];
        self.apply_obstacle(RacerId::Player, obstacle);
    }

    fn handle_checkpoints(&mut self) {
        let checkpoints = &self.sim_consts.checkpoints;
        let passed_player = self.player.take_passed_checkpoints(checkpoints);
        let passed_opponent = self.opponent.take_passed_checkpoints(checkpoints);

        for checkpoint in passed_player {
            self.emit(RaceEvent::CheckpointPassed {
                racer: RacerId::Player,
                checkpoint,
            });
        }
        for checkpoint in passed_opponent {
            self.emit(RaceEvent::CheckpointPassed {
                racer: RacerId::Opponent,
                checkpoint,
            });
        }
    }

    fn handle_finish(&mut self) {
        let winner = match (self.player.is_finished(), self.opponent.is_finished()) {
            (true, false) => Winner::Player,
            (false, true) => Winner::Opponent,
            (true, true) => Winner::Tie,
            (false, false) => return,
        };

        self.outcome = RaceOutcome {
            winner,
            finished: true,
        };
        self.status = RaceStatus::Finished;
        self.last_tick = None;

        tracing::info!(
            "Race finished after {:.3}s, winner: {:?}",
            self.cur_racetime,
            winner
        );
        self.emit(RaceEvent::RaceComplete {
            winner,
            player_progress: self.player.progress(),
            opponent_progress: self.opponent.progress(),
        });
    }
}

/// obstacle_candidates returns the weighted list of obstacles a racer may encounter. Entries
/// appearing more often are more likely.
pub fn obstacle_candidates(model: ModelId, profile: &PerformanceProfile) -> Vec<ObstacleKind> {
    let mut candidates = vec![
        ObstacleKind::Construction,
        ObstacleKind::Pigeons,
        ObstacleKind::DataOverflow,
        ObstacleKind::Traffic,
    ];
    if profile.adaptability > 70 {
        candidates.push(ObstacleKind::Shortcut);
    }

    match model {
        ModelId::Dbrx => {
            candidates.push(ObstacleKind::DataOverflow);
            candidates.push(ObstacleKind::DataOverflow);
            candidates.retain(|o| *o != ObstacleKind::Pigeons);
        }
        ModelId::Mistral => {
            candidates.push(ObstacleKind::Pigeons);
            candidates.push(ObstacleKind::Pigeons);
        }
    }

    if profile.speed > 70 {
        candidates.push(ObstacleKind::Traffic);
        candidates.push(ObstacleKind::Traffic);
    }
    if profile.accuracy > 70 {
        candidates.push(ObstacleKind::Construction);
        candidates.push(ObstacleKind::Construction);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quiet_consts() -> SimConstants {
        SimConstants {
            speed_refresh_prob: 0.0,
            obstruction_threshold: 0.0,
            random_obstacles: false,
            ..SimConstants::default()
        }
    }

    fn setup(model: ModelId, profile: PerformanceProfile) -> RacerSetup {
        RacerSetup {
            model,
            profile,
            route: Route::straight_line(model.is_flying()),
            route_name: "Direct Route".to_owned(),
        }
    }

    fn race(sim_consts: &SimConstants) -> Race {
        Race::new(
            setup(ModelId::Dbrx, PerformanceProfile::default()),
            setup(ModelId::Mistral, PerformanceProfile::default()),
            sim_consts,
            Some(42),
        )
    }

    #[test]
    fn idle_race_does_not_move() {
        let mut race = race(&quiet_consts());
        race.simulate_timestep(1.0);
        assert_eq!(race.player().progress(), 0.0);
        assert_eq!(race.cur_racetime, 0.0);
    }

    #[test]
    fn progress_increment_follows_speed_and_damping() {
        let mut race = race(&quiet_consts());
        race.start();
        race.set_speeds(0.2, 0.1);
        race.simulate_timestep(1.0);
        assert_relative_eq!(race.player().progress(), 0.02);
        assert_relative_eq!(race.opponent().progress(), 0.01);
    }

    #[test]
    fn pause_keeps_progress() {
        let mut race = race(&quiet_consts());
        race.start();
        race.simulate_timestep(1.0);
        let progress = race.player().progress();
        race.pause();
        assert_eq!(race.status(), RaceStatus::Paused);
        race.simulate_timestep(1.0);
        assert_eq!(race.player().progress(), progress);

        race.start();
        assert_eq!(race.status(), RaceStatus::Racing);
        assert_eq!(race.player().progress(), progress);
    }

    #[test]
    fn abilities_respect_cooldown() {
        let mut race = race(&quiet_consts());
        assert!(!race.activate_ability(RacerId::Player, Ability::Speed));

        race.start();
        assert!(race.activate_ability(RacerId::Player, Ability::Speed));
        assert!(!race.activate_ability(RacerId::Player, Ability::Speed));
        assert!(race.activate_ability(RacerId::Player, Ability::Attack));

        for _ in 0..10 {
            race.simulate_timestep(1.0);
        }
        assert!(race.activate_ability(RacerId::Player, Ability::Speed));
    }

    #[test]
    fn speed_boost_doubles_progress_rate() {
        let mut race = race(&quiet_consts());
        race.start();
        race.set_speeds(0.2, 0.2);
        race.activate_ability(RacerId::Player, Ability::Speed);
        race.simulate_timestep(1.0);
        assert_relative_eq!(race.player().progress(), 0.04);
        assert_relative_eq!(race.opponent().progress(), 0.02);
    }

    #[test]
    fn data_flood_slows_the_other_racer() {
        let mut race = race(&quiet_consts());
        race.start();
        race.set_speeds(0.2, 0.2);
        race.activate_ability(RacerId::Player, Ability::Attack);
        race.simulate_timestep(1.0);
        assert_relative_eq!(race.opponent().progress(), 0.006, epsilon = 1e-12);
    }

    #[test]
    fn shortcut_skips_ahead() {
        let mut race = race(&quiet_consts());
        race.start();
        race.set_speeds(0.2, 0.2);
        assert!(race.apply_obstacle(RacerId::Player, ObstacleKind::Shortcut));
        race.simulate_timestep(1.0);
        assert_relative_eq!(race.player().progress(), 0.07, epsilon = 1e-12);
    }

    #[test]
    fn construction_reroutes_accurate_racers() {
        let mut race = Race::new(
            setup(ModelId::Dbrx, PerformanceProfile::new(50, 80, 50)),
            setup(ModelId::Mistral, PerformanceProfile::default()),
            &quiet_consts(),
            Some(1),
        );
        race.start();
        race.apply_obstacle(RacerId::Player, ObstacleKind::Construction);
        assert!(race.player().is_rerouting());
        assert!(race.events().iter().any(|r| r.event
            == RaceEvent::PathObstruction {
                racer: RacerId::Player,
                obstruction: ObstructionKind::Rerouting
            }));
    }

    #[test]
    fn close_racers_get_obstructed() {
        let sim_consts = SimConstants {
            speed_refresh_prob: 0.0,
            random_obstacles: false,
            obstruction_threshold: 1.0,
            opponent_obstruction_prob: 1.0,
            ..SimConstants::default()
        };
        // zero adaptability gives an obstruction probability of 0.8
        let mut race = Race::new(
            setup(ModelId::Dbrx, PerformanceProfile::new(50, 50, 0)),
            setup(ModelId::Mistral, PerformanceProfile::default()),
            &sim_consts,
            Some(3),
        );
        race.start();
        for _ in 0..20 {
            race.simulate_timestep(0.1);
        }
        let obstructions = race
            .events()
            .iter()
            .filter(|r| matches!(r.event, RaceEvent::PathObstruction { .. }))
            .count();
        // one incident hits both racers, the cooldown prevents a second one within 2s
        assert_eq!(obstructions, 2);
    }

    #[test]
    fn obstacle_candidates_follow_model() {
        let rat = obstacle_candidates(ModelId::Dbrx, &PerformanceProfile::default());
        assert!(!rat.contains(&ObstacleKind::Pigeons));
        assert!(!rat.contains(&ObstacleKind::Shortcut));

        let pigeon = obstacle_candidates(ModelId::Mistral, &PerformanceProfile::new(80, 80, 80));
        assert_eq!(pigeon.iter().filter(|o| **o == ObstacleKind::Pigeons).count(), 3);
        assert!(pigeon.contains(&ObstacleKind::Shortcut));
    }

    #[test]
    fn race_pars_derive_opponent_profile() {
        let race_pars: RacePars =
            serde_json::from_str(r#"{"tuning": {"model": "dbrx"}, "seed": 3}"#).unwrap();
        assert_eq!(race_pars.player_model(), ModelId::Dbrx);
        assert_eq!(
            race_pars.opponent_profile(),
            PerformanceProfile::new(20, 80, 20)
        );
        assert_eq!(race_pars.seed, Some(3));
    }
}
