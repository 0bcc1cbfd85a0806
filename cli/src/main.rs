use airace::core::handle_race::handle_race;
use airace::core::performance::ModelId;
use airace::core::race::Winner;
use airace::core::route_provider::{RouteProvider, WaypointRouteSource};
use airace::core::text_gen::MockTextGenerator;
use airace::interfaces::render_interface::RaceState;
use airace::post::race_result::RaceResult;
use airace::pre::read_sim_pars::{read_sim_pars, SimPars};
use airace::pre::sim_opts::SimOpts;
use clap::Parser;
use rayon::prelude::*;
use std::thread;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// create_provider sets up the local route source and the mocked text generation of a run.
fn create_provider(seed: Option<u64>) -> RouteProvider {
    RouteProvider::new(
        Box::new(WaypointRouteSource::default()),
        Box::new(MockTextGenerator::new(seed)),
    )
}

/// print_win_tally prints how often each racer won over all runs.
fn print_win_tally(results: &[RaceResult]) {
    let mut tally = [0u32; 4];
    for result in results.iter() {
        let idx = match result.outcome.winner {
            Winner::Player => 0,
            Winner::Opponent => 1,
            Winner::Tie => 2,
            Winner::None => 3,
        };
        tally[idx] += 1;
    }
    let avg_race_time =
        results.iter().map(|r| r.race_time).sum::<f64>() / results.len().max(1) as f64;

    if let Some(first) = results.first() {
        println!("RESULT: Win tally over {} runs", results.len());
        println!("{:<10} {:5}", first.player_model.racer_name(), tally[0]);
        println!("{:<10} {:5}", first.opponent_model.racer_name(), tally[1]);
        println!("{:<10} {:5}", "Tie", tally[2]);
        println!("{:<10} {:5}", "Unfinished", tally[3]);
        println!("Average race time: {:.3}s", avg_race_time);
    }
}

fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        tracing::info!("Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        let model = sim_opts.model.unwrap_or(ModelId::Dbrx);
        tracing::info!("No parameter file provided, racing a neutrally tuned {}", model);
        SimPars::default_for(model)
    };
    if sim_opts.seed.is_some() {
        sim_pars.race_pars.seed = sim_opts.seed;
    }

    // print race details
    let player_model = sim_pars.race_pars.player_model();
    let player_profile = sim_pars.race_pars.player_profile();
    tracing::info!(
        "Simulating {} (profile {}/{}/{}) vs. {} with a time step size of {:.4}s",
        player_model,
        player_profile.speed,
        player_profile.accuracy,
        player_profile.adaptability,
        player_model.other(),
        sim_opts.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let last_result = if !sim_opts.live {
        // HEADLESS CASE
        let t_start = Instant::now();
        let no_sim_runs = sim_opts.no_sim_runs.max(1);

        let results: Vec<RaceResult> = (0..no_sim_runs)
            .into_par_iter()
            .map(|run| {
                let mut run_pars = sim_pars.clone();
                run_pars.race_pars.seed =
                    sim_pars.race_pars.seed.map(|s| s.wrapping_add(run as u64));
                handle_race(
                    &run_pars,
                    create_provider(run_pars.race_pars.seed),
                    sim_opts.timestep_size,
                    sim_opts.debug && no_sim_runs == 1,
                    None,
                    1.0,
                )
            })
            .collect::<anyhow::Result<Vec<RaceResult>>>()?;

        tracing::info!(
            "Execution time: {}ms ({} runs)",
            t_start.elapsed().as_millis(),
            results.len()
        );

        if results.len() > 1 {
            print_win_tally(&results);
        }
        results.last().cloned()
    } else {
        // LIVE CASE
        tracing::info!("Running race in real-time...");
        let (tx, rx) = flume::unbounded::<RaceState>();

        let sim_opts_thread = sim_opts.clone();
        let sim_pars_thread = sim_pars.clone();
        let sim_handle = thread::spawn(move || {
            handle_race(
                &sim_pars_thread,
                create_provider(sim_pars_thread.race_pars.seed),
                sim_opts_thread.timestep_size,
                sim_opts_thread.debug,
                Some(&tx),
                sim_opts_thread.realtime_factor,
            )
        });

        // consume the stream in the main thread until the simulation closes the channel
        let mut final_result = None;
        for race_state in rx.iter() {
            if let Some(line) = race_state.commentary.as_ref() {
                println!("{:8.3}s  {}", race_state.race_time, line);
            }
            if race_state.final_result.is_some() {
                final_result = race_state.final_result;
            } else {
                let p = &race_state.racers[0];
                let o = &race_state.racers[1];
                print!(
                    "\r{:8.3}s  {} {:6.2}%  {} {:6.2}%",
                    race_state.race_time,
                    p.name,
                    p.progress * 100.0,
                    o.name,
                    o.progress * 100.0
                );
            }
        }
        println!();

        let result = sim_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))??;
        final_result.or(Some(result))
    };

    // POST-PROCESSING -----------------------------------------------------------------------------
    if let Some(result) = last_result {
        result.print_summary()?;
        if sim_opts.write_results {
            let path = result.write_to_file(None)?;
            tracing::info!("Result written to {}", path.display());
        }
    }

    Ok(())
}
