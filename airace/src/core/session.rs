use crate::core::race::{Race, RacePars, RacerSetup, SimConstants};
use crate::core::route_provider::{RouteProvider, RouteSelection};

/// LoadTicket identifies one route loading request. It becomes stale as soon as the session is
/// reset or reconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// LoadedRoutes is the result of a route loading request.
#[derive(Debug, Clone)]
pub struct LoadedRoutes {
    pub ticket: LoadTicket,
    pub player: RouteSelection,
    pub opponent: RouteSelection,
}

/// RaceSession owns the route provider and the race built from the loaded routes. Route loads
/// are guarded by a generation counter, so results of loads that were started before a reset are
/// ignored.
#[derive(Debug)]
pub struct RaceSession {
    race_pars: RacePars,
    sim_consts: SimConstants,
    provider: RouteProvider,
    generation: u64,
    routes: Option<LoadedRoutes>,
    race: Option<Race>,
}

impl RaceSession {
    pub fn new(
        race_pars: &RacePars,
        sim_consts: &SimConstants,
        provider: RouteProvider,
    ) -> RaceSession {
        RaceSession {
            race_pars: race_pars.to_owned(),
            sim_consts: sim_consts.to_owned(),
            provider,
            generation: 0,
            routes: None,
            race: None,
        }
    }

    /// begin_load starts a new route loading request. Earlier requests become stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
        }
    }

    /// fetch_routes selects the routes of both racers for the given request.
    pub fn fetch_routes(&mut self, ticket: LoadTicket) -> LoadedRoutes {
        let player_model = self.race_pars.player_model();
        let player = self
            .provider
            .select_route(player_model, &self.race_pars.player_profile());
        let opponent = self
            .provider
            .select_route(player_model.other(), &self.race_pars.opponent_profile());

        LoadedRoutes {
            ticket,
            player,
            opponent,
        }
    }

    /// complete_load builds a new idle race from the loaded routes. Stale results are discarded
    /// and false is returned.
    pub fn complete_load(&mut self, loaded: LoadedRoutes) -> bool {
        if loaded.ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale route load (generation {}, current {})",
                loaded.ticket.generation,
                self.generation
            );
            return false;
        }

        let race = self.build_race(&loaded);
        self.race = Some(race);
        self.routes = Some(loaded);
        true
    }

    /// load_routes loads the routes and prepares the race in one go.
    pub fn load_routes(&mut self) -> &mut Race {
        let ticket = self.begin_load();
        let loaded = self.fetch_routes(ticket);
        let race = self.build_race(&loaded);
        self.routes = Some(loaded);
        self.race.insert(race)
    }

    fn build_race(&self, loaded: &LoadedRoutes) -> Race {
        let player_model = self.race_pars.player_model();
        let player = RacerSetup {
            model: player_model,
            profile: self.race_pars.player_profile(),
            route: loaded.player.route.to_owned(),
            route_name: loaded.player.name.to_owned(),
        };
        let opponent = RacerSetup {
            model: player_model.other(),
            profile: self.race_pars.opponent_profile(),
            route: loaded.opponent.route.to_owned(),
            route_name: loaded.opponent.name.to_owned(),
        };
        Race::new(player, opponent, &self.sim_consts, self.race_pars.seed)
    }

    /// reset puts the race back into idle state and invalidates pending loads.
    pub fn reset(&mut self) {
        self.generation += 1;
        if let Some(race) = self.race.as_mut() {
            race.reset();
        }
    }

    /// set_race_pars changes the tuning. The current race is dropped and the cached routes are
    /// invalidated, the routes need to be loaded again.
    pub fn set_race_pars(&mut self, race_pars: &RacePars) {
        self.generation += 1;
        self.race_pars = race_pars.to_owned();
        self.race = None;
        self.routes = None;
        self.provider.cache_mut().clear();
    }

    pub fn race(&self) -> Option<&Race> {
        self.race.as_ref()
    }

    pub fn race_mut(&mut self) -> Option<&mut Race> {
        self.race.as_mut()
    }

    pub fn routes(&self) -> Option<&LoadedRoutes> {
        self.routes.as_ref()
    }

    pub fn race_pars(&self) -> &RacePars {
        &self.race_pars
    }

    pub fn provider_mut(&mut self) -> &mut RouteProvider {
        &mut self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::performance::{ModelId, TuningPars};
    use crate::core::race::RaceStatus;
    use crate::core::route_provider::WaypointRouteSource;
    use crate::core::text_gen::MockTextGenerator;

    fn session() -> RaceSession {
        let race_pars = RacePars {
            tuning: TuningPars::default_for(ModelId::Dbrx),
            opponent_profile: None,
            seed: Some(17),
        };
        let provider = RouteProvider::new(
            Box::new(WaypointRouteSource::default()),
            Box::new(MockTextGenerator::new(Some(17))),
        );
        RaceSession::new(&race_pars, &SimConstants::default(), provider)
    }

    #[test]
    fn loading_prepares_idle_race() {
        let mut session = session();
        let race = session.load_routes();
        assert_eq!(race.status(), RaceStatus::Idle);
        assert_eq!(race.player().model, ModelId::Dbrx);
        assert_eq!(race.opponent().model, ModelId::Mistral);
    }

    #[test]
    fn stale_loads_are_discarded() {
        let mut session = session();
        let ticket = session.begin_load();
        let loaded = session.fetch_routes(ticket);
        session.reset();
        assert!(!session.complete_load(loaded));
        assert!(session.race().is_none());

        let ticket = session.begin_load();
        let loaded = session.fetch_routes(ticket);
        assert!(session.complete_load(loaded));
        assert!(session.race().is_some());
    }

    #[test]
    fn newer_load_wins_over_older_one() {
        let mut session = session();
        let first = session.begin_load();
        let second = session.begin_load();
        let loaded_first = session.fetch_routes(first);
        let loaded_second = session.fetch_routes(second);
        assert!(session.complete_load(loaded_second));
        assert!(!session.complete_load(loaded_first));
    }

    #[test]
    fn changing_tuning_drops_race_and_cache() {
        let mut session = session();
        session.load_routes();
        assert!(session.provider_mut().cache().contains(ModelId::Dbrx));

        let race_pars = RacePars {
            tuning: TuningPars::default_for(ModelId::Mistral),
            opponent_profile: None,
            seed: None,
        };
        session.set_race_pars(&race_pars);
        assert!(session.race().is_none());
        assert!(!session.provider_mut().cache().contains(ModelId::Dbrx));
    }
}
