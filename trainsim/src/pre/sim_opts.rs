use crate::pre::read_sim_pars::SimPars;
use clap::Parser;
use helpers::general::InputValueError;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Laurens Koppenol",
    name = "train-a-train",
    about = "A 2D top-down train racing game for teaching AI basics"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Run without GUI - turns are simulated as fast as possible
    #[clap(long)]
    pub headless: bool,

    /// Export the results to output/ (CSV table and score plot)
    #[clap(short, long)]
    pub export: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of independent runs with consecutive seeds (only for headless mode, ignored in
    /// GUI mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, one human and two AI
    /// players race on the default track)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set the directory containing the track folders
    #[clap(long, default_value = "tracks")]
    pub tracks_dir: PathBuf,

    /// Set the track name (OPTIONAL: overrides the parameter file)
    #[clap(long)]
    pub track: Option<String>,

    /// Set the turn limit of a run (OPTIONAL: overrides the parameter file)
    #[clap(short, long)]
    pub max_turns: Option<u64>,

    /// Set the number of generations (OPTIONAL: overrides the parameter file)
    #[clap(short, long)]
    pub generations: Option<u32>,

    /// Set real-time factor (only relevant in GUI mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulated seconds per turn, should be in the range [0.001, 1.0] (OPTIONAL: overrides
    /// the parameter file)
    #[clap(short, long)]
    pub timestep_size: Option<f64>,
}

impl SimOpts {
    /// validate checks the value ranges of the options.
    pub fn validate(&self) -> Result<(), InputValueError> {
        if let Some(timestep_size) = self.timestep_size {
            if !(0.001..=1.0).contains(&timestep_size) {
                return Err(InputValueError::new(format!(
                    "timestep size must be in the range [0.001, 1.0], got {}",
                    timestep_size
                )));
            }
        }

        if self.realtime_factor <= 0.0 || !self.realtime_factor.is_finite() {
            return Err(InputValueError::new(format!(
                "realtime factor must be positive, got {}",
                self.realtime_factor
            )));
        }

        if self.no_sim_runs == 0 {
            return Err(InputValueError::new("number of simulation runs must be at least 1"));
        }

        if self.max_turns == Some(0) {
            return Err(InputValueError::new("turn limit must be at least 1"));
        }

        if self.generations == Some(0) {
            return Err(InputValueError::new("generations must be at least 1"));
        }
        Ok(())
    }

    /// apply_overrides writes the options given on the command line into the parameters.
    pub fn apply_overrides(&self, sim_pars: &mut SimPars) {
        if let Some(track) = &self.track {
            sim_pars.race_pars.track_name = track.to_owned();
        }
        if let Some(max_turns) = self.max_turns {
            sim_pars.race_pars.max_turns = Some(max_turns);
        }
        if let Some(generations) = self.generations {
            sim_pars.race_pars.generations = generations;
        }
        if let Some(timestep_size) = self.timestep_size {
            sim_pars.sim_consts.seconds_per_frame = timestep_size;
        }
    }
}
