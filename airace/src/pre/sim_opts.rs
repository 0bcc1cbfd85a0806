use crate::core::performance::ModelId;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "airace",
    about = "Rat vs. Pigeon: a time-discrete AI race simulation through San Francisco"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (progress of the race every simulated second)
    #[clap(short, long)]
    pub debug: bool,

    /// Run a single race in real-time and stream its state (ignores the number of runs)
    #[clap(short, long)]
    pub live: bool,

    /// Write the result of the last race to output/last_run.txt and output/last_run.json
    #[clap(short, long)]
    pub write_results: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for non-live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set the player's model (dbrx/rat or mistral/pigeon) used with neutral tuning if no
    /// parameter file is given
    #[clap(short, long)]
    pub model: Option<ModelId>,

    /// Set path to the simulation parameter file (OPTIONAL: neutral tuning if not set)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.0167")]
    pub timestep_size: f64,

    /// Set the seed of the first run, overrides the seed of the parameter file. Run i uses
    /// seed + i.
    #[clap(short, long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_model_names() {
        let opts = SimOpts::try_parse_from(["airace"]).unwrap();
        assert_eq!(opts.no_sim_runs, 1);
        assert!(opts.model.is_none());
        assert!(!opts.live);

        let opts = SimOpts::try_parse_from(["airace", "-m", "pigeon", "-s", "7"]).unwrap();
        assert_eq!(opts.model, Some(ModelId::Mistral));
        assert_eq!(opts.seed, Some(7));

        let opts = SimOpts::try_parse_from(["airace", "--model", "DBRX"]).unwrap();
        assert_eq!(opts.model, Some(ModelId::Dbrx));

        assert!(SimOpts::try_parse_from(["airace", "-m", "owl"]).is_err());
    }
}
