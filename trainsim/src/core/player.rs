use crate::core::driver::{Command, Driver, KeyState, Pilot, Slot};
use crate::core::sensor::DistanceSensor;
use crate::core::track::{Position, Track};
use crate::interfaces::gui_interface::RgbColor;
use rand::rngs::StdRng;

/// Heading of freshly spawned players, i.e. facing right.
pub const SPAWN_HEADING: f64 = 90.0;

/// Kinematic state of a player.
/// * `x`, `y` - (px) Position in track coordinates
/// * `heading` - (deg) Heading in [0, 360), 0 is up and headings turn clockwise
/// * `speed` - (px/s) Speed along the heading, never negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub speed: f64,
}

impl Default for Kinematics {
    fn default() -> Kinematics {
        Kinematics {
            x: 0.0,
            y: 0.0,
            heading: SPAWN_HEADING,
            speed: 0.0,
        }
    }
}

impl Kinematics {
    pub fn position(&self) -> Position {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Running,
    Crashed { turn: u64 },
    Finished { turn: u64 },
}

impl PlayerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerStatus::Running => "running",
            PlayerStatus::Crashed { .. } => "crashed",
            PlayerStatus::Finished { .. } => "finished",
        }
    }
}

/// Player couples a driver with the kinematic state of its train.
pub struct Player {
    pub id: u32,
    pub name: String,
    pub color: Option<RgbColor>,
    pub kinematics: Kinematics,
    pub status: PlayerStatus,
    pub score: u32,
    pub score_log: Vec<(u64, u32)>,
    pilot: Box<dyn Pilot>,
}

impl Player {
    pub fn new<D: Driver>(driver: D) -> Player {
        Player::from_pilot(Box::new(Slot(driver)))
    }

    pub fn from_pilot(pilot: Box<dyn Pilot>) -> Player {
        Player {
            id: 0,
            name: pilot.name().to_owned(),
            color: None,
            kinematics: Kinematics::default(),
            status: PlayerStatus::Running,
            score: 0,
            score_log: vec![],
            pilot,
        }
    }

    pub fn with_color(mut self, color: RgbColor) -> Player {
        self.color = Some(color);
        self
    }

    pub fn alive(&self) -> bool {
        self.status == PlayerStatus::Running
    }

    /// completion_turn returns the turn in which the player crashed or finished.
    pub fn completion_turn(&self) -> Option<u64> {
        match self.status {
            PlayerStatus::Running => None,
            PlayerStatus::Crashed { turn } | PlayerStatus::Finished { turn } => Some(turn),
        }
    }

    pub fn sensors(&self) -> &[DistanceSensor] {
        self.pilot.sensors()
    }

    /// (deg/s) Turning rate of the driver, None if it uses the engine's rotation speed.
    pub fn turning_rate(&self) -> Option<f64> {
        self.pilot.turning_rate()
    }

    /// spawn places the player at the given position, facing right and standing still.
    pub fn spawn(&mut self, position: Position, score: u32) {
        self.kinematics = Kinematics {
            x: position.0,
            y: position.1,
            ..Kinematics::default()
        };
        self.status = PlayerStatus::Running;
        self.score = score;
        self.score_log.clear();
    }

    /// decide lets the driver sense the environment and plan a command.
    pub fn decide(&mut self, track: &Track, keys: &KeyState) -> anyhow::Result<Command> {
        self.pilot.decide(&self.kinematics, track, keys)
    }

    /// integrate advances the kinematics by one time step. The command is clamped to [-1, 1]
    /// first, speed cannot drop below zero.
    /// * `dt` - (s) Time step size
    /// * `acceleration` - (px/s^2) Acceleration at full throttle
    /// * `turning_rate` - (deg/s) Turning rate at full steering
    pub fn integrate(&mut self, command: Command, dt: f64, acceleration: f64, turning_rate: f64) {
        let command = command.clamped();
        let kin = &mut self.kinematics;

        kin.heading = (kin.heading + command.rotation * turning_rate * dt).rem_euclid(360.0);
        // rem_euclid rounds tiny negative values up to 360
        if kin.heading >= 360.0 {
            kin.heading = 0.0;
        }
        kin.speed = (kin.speed + command.acceleration * acceleration * dt).max(0.0);

        let (x, y) = Track::translate(kin.position(), kin.speed * dt, kin.heading);
        kin.x = x;
        kin.y = y;
    }

    /// give_birth creates an unspawned player whose driver descends from this player's driver.
    pub fn give_birth(&self, rng: &mut StdRng) -> Player {
        Player::from_pilot(self.pilot.give_birth(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::{HumanDriver, RuleAi};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    #[test]
    fn new_players_are_unspawned() {
        let player = Player::new(HumanDriver::new());

        assert_eq!(player.kinematics, Kinematics::default());
        assert_abs_diff_eq!(player.kinematics.heading, 90.0);
        assert!(player.alive());
        assert_eq!(player.completion_turn(), None);
        assert_eq!(player.name, "Human");
    }

    #[test]
    fn integrate_accelerates_along_heading() {
        let mut player = Player::new(HumanDriver::new());
        player.spawn((10.0, 10.0), 0);

        player.integrate(Command::new(1.0, 0.0), 0.1, 50.0, 180.0);

        assert_abs_diff_eq!(player.kinematics.speed, 5.0);
        assert_abs_diff_eq!(player.kinematics.x, 10.5, epsilon = 1e-9);
        assert_abs_diff_eq!(player.kinematics.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn integrate_wraps_heading_and_keeps_speed_non_negative() {
        let mut player = Player::new(HumanDriver::new());
        player.spawn((10.0, 10.0), 0);
        player.kinematics.heading = 10.0;

        player.integrate(Command::new(-1.0, -1.0), 0.5, 50.0, 180.0);

        assert_abs_diff_eq!(player.kinematics.heading, 280.0, epsilon = 1e-9);
        assert_abs_diff_eq!(player.kinematics.speed, 0.0);
        assert_abs_diff_eq!(player.kinematics.x, 10.0);
        assert_abs_diff_eq!(player.kinematics.y, 10.0);
    }

    #[test]
    fn heading_stays_below_360_after_tiny_left_turns() {
        let mut player = Player::new(HumanDriver::new());
        player.spawn((10.0, 10.0), 0);
        player.kinematics.heading = 0.0;

        player.integrate(Command::new(0.0, -1.0), 1.0, 50.0, 1e-18);

        assert!(player.kinematics.heading >= 0.0 && player.kinematics.heading < 360.0);
        assert_abs_diff_eq!(player.kinematics.heading, 0.0);
    }

    #[test]
    fn integrate_clamps_out_of_range_commands() {
        let mut clamped = Player::new(HumanDriver::new());
        let mut reference = Player::new(HumanDriver::new());
        clamped.spawn((0.0, 0.0), 0);
        reference.spawn((0.0, 0.0), 0);

        clamped.integrate(Command::new(25.0, -4.0), 0.1, 50.0, 180.0);
        reference.integrate(Command::new(1.0, -1.0), 0.1, 50.0, 180.0);

        assert_eq!(clamped.kinematics, reference.kinematics);
    }

    #[test]
    fn spawn_resets_state() {
        let mut player = Player::new(HumanDriver::new());
        player.status = PlayerStatus::Crashed { turn: 4 };
        player.score_log.push((4, 17));
        player.kinematics.speed = 12.0;

        player.spawn((3.0, 4.0), 21);

        assert!(player.alive());
        assert_eq!(player.score, 21);
        assert!(player.score_log.is_empty());
        assert_eq!(player.kinematics.position(), (3.0, 4.0));
        assert_abs_diff_eq!(player.kinematics.speed, 0.0);
    }

    #[test]
    fn give_birth_leaves_parent_untouched() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut parent = Player::new(RuleAi::new(&mut rng, RuleAi::SENSOR_DEPTH)).with_color(
            RgbColor {
                r: 200,
                g: 100,
                b: 150,
            },
        );
        parent.id = 3;
        parent.spawn((5.0, 5.0), 40);
        parent.status = PlayerStatus::Finished { turn: 12 };

        let child = parent.give_birth(&mut rng);

        assert_eq!(parent.status, PlayerStatus::Finished { turn: 12 });
        assert_eq!(parent.id, 3);
        assert_eq!(child.name, "RuleAi");
        assert_eq!(child.kinematics, Kinematics::default());
        assert!(child.alive());
        assert!(child.color.is_none());
        assert_eq!(child.sensors().len(), 3);
    }
}
