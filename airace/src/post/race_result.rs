use crate::core::events::{EventRecord, RaceEvent};
use crate::core::performance::{ModelId, PerformanceProfile};
use crate::core::race::{RaceOutcome, Winner};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub player_model: ModelId,
    pub opponent_model: ModelId,
    pub player_route: String,
    pub opponent_route: String,
    pub player_profile: PerformanceProfile,
    pub opponent_profile: PerformanceProfile,
    pub outcome: RaceOutcome,
    pub player_progress: f64,
    pub opponent_progress: f64,
    pub race_time: f64,
    pub events: Vec<EventRecord>,
}

impl RaceResult {
    /// winner_name returns the display name of the winning racer.
    pub fn winner_name(&self) -> &'static str {
        match self.outcome.winner {
            Winner::Player => self.player_model.racer_name(),
            Winner::Opponent => self.opponent_model.racer_name(),
            Winner::Tie => "Tie",
            Winner::None => "-",
        }
    }

    /// format_summary renders the result as human readable text.
    pub fn format_summary(&self) -> anyhow::Result<String> {
        let mut content = String::new();
        writeln!(&mut content, "RESULT: Race summary")?;
        writeln!(
            &mut content,
            "player:   {:<16} route {:<24} profile {:3}/{:3}/{:3}, progress {:6.2}%",
            self.player_model.to_string(),
            self.player_route,
            self.player_profile.speed,
            self.player_profile.accuracy,
            self.player_profile.adaptability,
            self.player_progress * 100.0
        )?;
        writeln!(
            &mut content,
            "opponent: {:<16} route {:<24} profile {:3}/{:3}/{:3}, progress {:6.2}%",
            self.opponent_model.to_string(),
            self.opponent_route,
            self.opponent_profile.speed,
            self.opponent_profile.accuracy,
            self.opponent_profile.adaptability,
            self.opponent_progress * 100.0
        )?;
        writeln!(
            &mut content,
            "winner:   {} after {:.3}s",
            self.winner_name(),
            self.race_time
        )?;

        writeln!(&mut content, "RESULT: Events")?;
        for record in self.events.iter() {
            if matches!(record.event, RaceEvent::RaceReset) {
                continue;
            }
            writeln!(&mut content, "{:8.3}s  {}", record.time_s, describe_event(&record.event))?;
        }

        Ok(content)
    }

    /// print_summary prints the result to the console output.
    pub fn print_summary(&self) -> anyhow::Result<()> {
        print!("{}", self.format_summary()?);
        Ok(())
    }

    /// write_to_file writes the summary to a text file and the complete result as JSON next to
    /// it. Without a path the files are placed in output/. Returns the path of the text file.
    pub fn write_to_file(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
                out_dir.join("last_run.txt")
            }
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)
            .context(format!("Failed to open {}!", out_path.display()))?;
        file.write_all(self.format_summary()?.as_bytes())?;
        file.flush()?;

        let json_path = out_path.with_extension("json");
        let fh = std::fs::File::create(&json_path)
            .context(format!("Failed to open {}!", json_path.display()))?;
        serde_json::to_writer_pretty(fh, self).context("Failed to serialize race result!")?;

        Ok(out_path)
    }
}

/// describe_event renders an event as a short line of text.
pub fn describe_event(event: &RaceEvent) -> String {
    match event {
        RaceEvent::RaceStart => "race started".to_owned(),
        RaceEvent::RacePause => "race paused".to_owned(),
        RaceEvent::CheckpointPassed { racer, checkpoint } => {
            format!("{:?} passed checkpoint {:.0}%", racer, checkpoint * 100.0)
        }
        RaceEvent::PathObstruction { racer, obstruction } => {
            format!("{:?} obstructed ({:?})", racer, obstruction)
        }
        RaceEvent::ObstructionCleared { racer } => format!("{:?} obstruction cleared", racer),
        RaceEvent::AbilityActivated { racer, ability } => {
            format!("{:?} activated ability {:?}", racer, ability)
        }
        RaceEvent::AbilityMiscalculation { racer } => {
            format!("{:?} miscalculated after speed boost", racer)
        }
        RaceEvent::ObstacleAppeared { racer, obstacle } => {
            format!("{:?} hit obstacle {:?}", racer, obstacle)
        }
        RaceEvent::RaceComplete {
            winner,
            player_progress,
            opponent_progress,
        } => format!(
            "race complete, winner {:?} (player {:.3}, opponent {:.3})",
            winner, player_progress, opponent_progress
        ),
        RaceEvent::RaceReset => "race reset".to_owned(),
    }
}
