use crate::core::driver::{HumanDriver, NaiveAi, RuleAi};
use crate::core::engine::SimConstants;
use crate::core::player::Player;
use crate::interfaces::gui_interface::RgbColor;
use anyhow::Context;
use helpers::general::InputValueError;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// Turn limit of a run if the parameter file does not set one (60s at 30 frames per second).
pub const DEFAULT_MAX_TURNS: u64 = 1800;

/// * `track_name` - Name of the track folder below the tracks directory
/// * `stop_on_death` - Stop the run as soon as no player is alive anymore
/// * `max_turns` - Turn limit of a run, null for no limit
/// * `seed` - Seed of the random number generator (colours, AI weights, evolution)
/// * `generations` - Number of runs played in a row, see handle_race
/// * `population` - Number of children of the best player per generation (default: number of
/// configured players)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RacePars {
    #[serde(default = "default_track_name")]
    pub track_name: String,
    #[serde(default = "default_stop_on_death")]
    pub stop_on_death: bool,
    #[serde(default = "default_max_turns")]
    pub max_turns: Option<u64>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_generations")]
    pub generations: u32,
    #[serde(default)]
    pub population: Option<u32>,
}

fn default_track_name() -> String {
    String::from("default")
}

fn default_stop_on_death() -> bool {
    true
}

fn default_max_turns() -> Option<u64> {
    Some(DEFAULT_MAX_TURNS)
}

fn default_seed() -> u64 {
    42
}

fn default_generations() -> u32 {
    1
}

impl Default for RacePars {
    fn default() -> RacePars {
        RacePars {
            track_name: default_track_name(),
            stop_on_death: default_stop_on_death(),
            max_turns: default_max_turns(),
            seed: default_seed(),
            generations: default_generations(),
            population: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Human,
    NaiveAi,
    RuleAi,
}

/// * `kind` - human, naive_ai or rule_ai
/// * `color` - CSS colour, e.g. "#ff8800" (OPTIONAL: random colour if not set)
/// * `sensor_depth` - (px) Sensor depth of AI players
/// * `turning_rate` - (deg/s) Turning rate of AI players
/// * `target_speed` - (px/s) Speed up to which AI players accelerate
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PlayerPars {
    pub kind: PlayerKind,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sensor_depth: Option<f64>,
    #[serde(default)]
    pub turning_rate: Option<f64>,
    #[serde(default)]
    pub target_speed: Option<f64>,
}

impl PlayerPars {
    pub fn new(kind: PlayerKind) -> PlayerPars {
        PlayerPars {
            kind,
            color: None,
            sensor_depth: None,
            turning_rate: None,
            target_speed: None,
        }
    }

    /// create_player builds an unspawned player from the parameters. The RNG is used for the
    /// initial weights of rule based AIs.
    pub fn create_player(&self, rng: &mut StdRng) -> anyhow::Result<Player> {
        let mut player = match self.kind {
            PlayerKind::Human => Player::new(HumanDriver::new()),
            PlayerKind::NaiveAi => {
                let mut driver =
                    NaiveAi::new(self.sensor_depth.unwrap_or(NaiveAi::SENSOR_DEPTH));
                if self.turning_rate.is_some() {
                    driver.turning_rate = self.turning_rate;
                }
                if let Some(target_speed) = self.target_speed {
                    driver.target_speed = target_speed;
                }
                Player::new(driver)
            }
            PlayerKind::RuleAi => {
                let mut driver =
                    RuleAi::new(rng, self.sensor_depth.unwrap_or(RuleAi::SENSOR_DEPTH));
                if self.turning_rate.is_some() {
                    driver.turning_rate = self.turning_rate;
                }
                if let Some(target_speed) = self.target_speed {
                    driver.target_speed = target_speed;
                }
                Player::new(driver)
            }
        };

        if let Some(color) = &self.color {
            player = player.with_color(parse_color(color)?);
        }
        Ok(player)
    }
}

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    #[serde(default)]
    pub sim_consts: SimConstants,
    pub player_pars_all: Vec<PlayerPars>,
}

impl SimPars {
    /// default_race is used if no parameter file is given: one human and two AI players.
    pub fn default_race(track_name: &str) -> SimPars {
        SimPars {
            race_pars: RacePars {
                track_name: track_name.to_owned(),
                ..RacePars::default()
            },
            sim_consts: SimConstants::default(),
            player_pars_all: vec![
                PlayerPars::new(PlayerKind::Human),
                PlayerPars::new(PlayerKind::NaiveAi),
                PlayerPars::new(PlayerKind::RuleAi),
            ],
        }
    }

    /// validate checks the value ranges of parameters that may come from a parameter file as
    /// well as from the command line.
    pub fn validate(&self) -> Result<(), InputValueError> {
        let seconds_per_frame = self.sim_consts.seconds_per_frame;
        if !(0.001..=1.0).contains(&seconds_per_frame) {
            return Err(InputValueError::new(format!(
                "seconds per frame must be in the range [0.001, 1.0], got {}",
                seconds_per_frame
            )));
        }

        if self.race_pars.max_turns == Some(0) {
            return Err(InputValueError::new(
                "turn limit must be at least 1 (use null for no limit)",
            ));
        }

        if self.race_pars.generations == 0 {
            return Err(InputValueError::new("generations must be at least 1"));
        }
        Ok(())
    }
}

/// parse_color converts a CSS colour string into an RGB colour.
pub fn parse_color(color: &str) -> anyhow::Result<RgbColor> {
    let tmp_color = color
        .parse::<css_color_parser::Color>()
        .context(format!("Could not parse colour {}!", color))?;

    Ok(RgbColor {
        r: tmp_color.r,
        g: tmp_color.g,
        b: tmp_color.b,
    })
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn parses_full_parameter_file() {
        let json = r##"{
            "race_pars": {
                "track_name": "oval",
                "stop_on_death": false,
                "max_turns": 600,
                "seed": 7,
                "generations": 5,
                "population": 8
            },
            "sim_consts": {
                "acceleration": 100.0,
                "rotation_speed": 90.0,
                "seconds_per_frame": 0.05
            },
            "player_pars_all": [
                {"kind": "human", "color": "#ff8800"},
                {"kind": "rule_ai", "sensor_depth": 80.0, "target_speed": 60.0}
            ]
        }"##;

        let sim_pars: SimPars = serde_json::from_str(json).unwrap();

        assert_eq!(sim_pars.race_pars.track_name, "oval");
        assert!(!sim_pars.race_pars.stop_on_death);
        assert_eq!(sim_pars.race_pars.max_turns, Some(600));
        assert_eq!(sim_pars.race_pars.population, Some(8));
        assert_eq!(sim_pars.sim_consts.rotation_speed, 90.0);
        assert_eq!(sim_pars.player_pars_all[0].kind, PlayerKind::Human);
        assert_eq!(sim_pars.player_pars_all[1].sensor_depth, Some(80.0));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let json = r#"{"player_pars_all": [{"kind": "naive_ai"}], "race_pars": {"max_turns": null}}"#;

        let sim_pars: SimPars = serde_json::from_str(json).unwrap();

        assert_eq!(sim_pars.race_pars.track_name, "default");
        assert!(sim_pars.race_pars.stop_on_death);
        assert_eq!(sim_pars.race_pars.max_turns, None);
        assert_eq!(sim_pars.race_pars.seed, 42);
        assert_eq!(sim_pars.race_pars.generations, 1);
        assert_eq!(sim_pars.sim_consts, SimConstants::default());
    }

    #[test]
    fn unknown_player_kind_is_rejected() {
        let json = r#"{"player_pars_all": [{"kind": "quantum_ai"}]}"#;
        assert!(serde_json::from_str::<SimPars>(json).is_err());
    }

    #[test]
    fn creates_players_with_colours() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut pars = PlayerPars::new(PlayerKind::NaiveAi);
        pars.color = Some(String::from("#ff8800"));
        pars.turning_rate = Some(45.0);

        let player = pars.create_player(&mut rng).unwrap();

        assert_eq!(player.name, "NaiveAi");
        assert_eq!(
            player.color,
            Some(RgbColor {
                r: 255,
                g: 136,
                b: 0
            })
        );
        assert_eq!(player.turning_rate(), Some(45.0));

        pars.color = Some(String::from("not a colour"));
        assert!(pars.create_player(&mut rng).is_err());
    }

    #[test]
    fn default_race_has_one_human_and_two_ais() {
        let sim_pars = SimPars::default_race("default");
        let kinds: Vec<PlayerKind> = sim_pars.player_pars_all.iter().map(|p| p.kind).collect();

        assert_eq!(
            kinds,
            vec![PlayerKind::Human, PlayerKind::NaiveAi, PlayerKind::RuleAi]
        );
    }

    #[test]
    fn validates_values_from_the_parameter_file() {
        assert!(SimPars::default_race("default").validate().is_ok());

        for seconds_per_frame in [0.0, 5.0, f64::NAN] {
            let mut sim_pars = SimPars::default_race("default");
            sim_pars.sim_consts.seconds_per_frame = seconds_per_frame;
            assert!(sim_pars.validate().is_err());
        }

        let json = r#"{"player_pars_all": [], "race_pars": {"max_turns": 0}}"#;
        let sim_pars: SimPars = serde_json::from_str(json).unwrap();
        assert!(sim_pars.validate().is_err());

        let mut sim_pars = SimPars::default_race("default");
        sim_pars.race_pars.generations = 0;
        assert!(sim_pars.validate().is_err());
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = read_sim_pars(Path::new("input/does_not_exist.json")).unwrap_err();
        assert!(format!("{}", err).contains("does_not_exist.json"));
    }
}
