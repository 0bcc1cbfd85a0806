use crate::core::commentary::{performance_insight, Commentator};
use crate::core::race::RaceStatus;
use crate::core::route_provider::RouteProvider;
use crate::core::session::RaceSession;
use crate::interfaces::render_interface::{RaceState, MAX_RENDER_UPDATE_FREQUENCY};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// handle_race loads the routes, simulates a race on the basis of the inserted parameters, and
/// returns the results for post-processing. If a sender is inserted the race runs in real-time
/// and its state is streamed through the sender.
pub fn handle_race(
    sim_pars: &SimPars,
    provider: RouteProvider,
    timestep_size: f64,
    print_debug: bool,
    tx: Option<&Sender<RaceState>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    if !(timestep_size >= 0.001 && timestep_size <= 1.0) {
        anyhow::bail!(
            "Timestep size must be in the range [0.001, 1.0], got {}!",
            timestep_size
        );
    }
    if !(realtime_factor > 0.0) {
        anyhow::bail!("Real-time factor must be positive, got {}!", realtime_factor);
    }

    let mut session = RaceSession::new(&sim_pars.race_pars, &sim_pars.sim_consts, provider);
    let mut commentator = Commentator::new();

    {
        let race = session.load_routes();
        tracing::info!(
            "{} takes the {}, {} takes the {}",
            race.player().model,
            race.player().route_name,
            race.opponent().model,
            race.opponent().route_name
        );
        race.start();
    }
    if let Some(routes) = session.routes() {
        tracing::debug!("Player route: {}", routes.player.explanation);
        tracing::debug!("Opponent route: {}", routes.opponent.explanation);
    }
    if let Some(insight) = performance_insight(
        sim_pars.race_pars.player_model(),
        &sim_pars.race_pars.player_profile(),
    ) {
        tracing::info!("INSIGHT: {}", insight);
    }

    let max_race_time = sim_pars.sim_consts.max_race_time;
    let mut t_race_update_print = 0.0;
    let mut t_race_update_render = f64::NEG_INFINITY;

    loop {
        let t_start = Instant::now();

        // simulate one step
        let (racetime, player_progress, opponent_progress, status) = {
            let race = session
                .race_mut()
                .context("Race vanished from the session!")?;
            race.simulate_timestep(timestep_size);
            (
                race.cur_racetime,
                race.player().progress(),
                race.opponent().progress(),
                race.status(),
            )
        };

        if (print_debug || tx.is_some()) && racetime > t_race_update_print + 0.9999 {
            tracing::info!(
                "Simulating... Current race time is {:.3}s, progress {:.3} vs. {:.3}",
                racetime,
                player_progress,
                opponent_progress
            );
            t_race_update_print = racetime;
        }

        // commentary of the player's model
        let commentary = if print_debug || tx.is_some() {
            let model = sim_pars.race_pars.player_model();
            let profile = sim_pars.race_pars.player_profile();
            let line = commentator.update(
                session.provider_mut().text_gen_mut(),
                model,
                &profile,
                player_progress,
                opponent_progress,
            );
            if let Some(line) = line.as_ref() {
                tracing::info!("COMMENTARY: {}", line);
            }
            line
        } else {
            None
        };

        let finished = status == RaceStatus::Finished;
        if !finished && racetime >= max_race_time {
            tracing::warn!(
                "Race not finished after {:.0}s, stopping the simulation",
                max_race_time
            );
            if let Some(race) = session.race_mut() {
                race.pause();
            }
            break;
        }

        if let Some(tx) = tx {
            if finished
                || racetime > t_race_update_render + 1.0 / MAX_RENDER_UPDATE_FREQUENCY - 0.001
            {
                let race = session.race().context("Race vanished from the session!")?;
                let mut race_state = RaceState::new(race);
                race_state.commentary = commentary;
                if finished {
                    race_state.final_result = Some(race.get_race_result());
                }

                // send current race state
                tx.send(race_state)
                    .context("Failed to send race state to the renderer!")?;
                t_race_update_render = racetime;
            }

            // sleep until time step is finished in real-time as well (calculation in ms)
            if !finished {
                let t_sleep = (timestep_size * 1000.0 / realtime_factor) as i64
                    - t_start.elapsed().as_millis() as i64;

                if t_sleep > 0 {
                    sleep(Duration::from_millis(t_sleep as u64));
                } else {
                    tracing::warn!("Could not keep up with real-time!");
                }
            }
        }

        if finished {
            break;
        }
    }

    // return race result
    let race = session.race().context("Race vanished from the session!")?;
    if let Some(elapsed) = race.wallclock_elapsed() {
        tracing::debug!(
            "Race time {:.3}s simulated in {}ms",
            race.cur_racetime,
            elapsed.as_millis()
        );
    }
    Ok(race.get_race_result())
}
