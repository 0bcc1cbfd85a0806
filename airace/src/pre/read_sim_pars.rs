use crate::core::performance::{ModelId, TuningPars};
use crate::core::race::{RacePars, SimConstants};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    #[serde(default)]
    pub sim_consts: SimConstants,
}

impl SimPars {
    /// default_for returns neutral tuning of the given model with default simulation constants.
    pub fn default_for(model: ModelId) -> SimPars {
        SimPars {
            race_pars: RacePars {
                tuning: TuningPars::default_for(model),
                opponent_profile: None,
                seed: None,
            },
            sim_consts: SimConstants::default(),
        }
    }
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}
