use crate::core::racer::{Ability, ObstacleKind, ObstructionKind, RacerId};
use crate::core::race::Winner;
use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// RaceEvent is a one-directional notification about something that happened in the race.
/// Listeners are purely decorative, the simulation never waits for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RaceEvent {
    RaceStart,
    RacePause,
    CheckpointPassed {
        racer: RacerId,
        checkpoint: f64,
    },
    PathObstruction {
        racer: RacerId,
        obstruction: ObstructionKind,
    },
    ObstructionCleared {
        racer: RacerId,
    },
    AbilityActivated {
        racer: RacerId,
        ability: Ability,
    },
    AbilityMiscalculation {
        racer: RacerId,
    },
    ObstacleAppeared {
        racer: RacerId,
        obstacle: ObstacleKind,
    },
    RaceComplete {
        winner: Winner,
        player_progress: f64,
        opponent_progress: f64,
    },
    RaceReset,
}

/// EventRecord is a race event stamped with the race time it occurred at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time_s: f64,
    pub event: RaceEvent,
}

/// EventBus fans race events out to any number of subscribers. Subscribers whose receiver was
/// dropped are removed on the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EventRecord>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// subscribe returns a receiver for all events published from now on.
    pub fn subscribe(&mut self) -> Receiver<EventRecord> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, record: &EventRecord) {
        self.subscribers.retain(|tx| tx.send(record.to_owned()).is_ok());
    }

    pub fn no_subscribers(&self) -> usize {
        self.subscribers.len()
    }
}
