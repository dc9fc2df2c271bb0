pub mod core {
    pub mod driver;
    pub mod engine;
    pub mod handle_race;
    pub mod player;
    pub mod sensor;
    pub mod track;
}
pub mod interfaces {
    pub mod gui_interface;
}
pub mod post {
    pub mod race_result;
}
pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}
