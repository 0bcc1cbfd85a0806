pub mod core {
    pub mod commentary;
    pub mod events;
    pub mod geo;
    pub mod handle_race;
    pub mod interpolation;
    pub mod performance;
    pub mod race;
    pub mod racer;
    pub mod route_provider;
    pub mod session;
    pub mod speed;
    pub mod text_gen;
}
pub mod interfaces {
    pub mod render_interface;
}
pub mod post {
    pub mod race_result;
}
pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}
