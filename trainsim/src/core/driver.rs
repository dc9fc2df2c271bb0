use crate::core::player::Kinematics;
use crate::core::sensor::DistanceSensor;
use crate::core::track::Track;
use rand::rngs::StdRng;
use rand::Rng;

/// Command is the output of a driver's decision step, both values are in the range [-1, 1].
/// * `acceleration` - 1 accelerates, -1 brakes
/// * `rotation` - 1 turns clockwise (right), -1 counterclockwise (left)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub acceleration: f64,
    pub rotation: f64,
}

impl Command {
    pub fn new(acceleration: f64, rotation: f64) -> Command {
        Command {
            acceleration,
            rotation,
        }
    }

    /// clamped returns the command limited to [-1, 1]. NaN values are treated as 0.
    pub fn clamped(self) -> Command {
        Command {
            acceleration: clamp_unit(self.acceleration),
            rotation: clamp_unit(self.rotation),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(-1.0).min(1.0)
    }
}

/// Keys the engine knows about. Arrow keys drive human players, the remaining keys can be bound
/// to actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Digit(u8),
    Letter(char),
    Space,
    Escape,
}

/// KeyState holds which arrow keys are currently held down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl KeyState {
    /// set updates the state of an arrow key, other keys are ignored.
    pub fn set(&mut self, key: Key, pressed: bool) {
        match key {
            Key::Up => self.up = pressed,
            Key::Down => self.down = pressed,
            Key::Left => self.left = pressed,
            Key::Right => self.right = pressed,
            _ => {}
        }
    }
}

/// Driver is the decision making part of a player. Implement it to create a new kind of player.
///
/// `sense` turns the environment into a percept of the driver's own choosing, `plan` maps that
/// percept to a command. `plan` only sees the kinematics, moving the player is up to the engine.
pub trait Driver: Send + 'static {
    type Percept;

    fn name(&self) -> &str;

    fn sense(
        &mut self,
        kinematics: &Kinematics,
        track: &Track,
        keys: &KeyState,
    ) -> anyhow::Result<Self::Percept>;

    fn plan(&self, kinematics: &Kinematics, percept: &Self::Percept) -> anyhow::Result<Command>;

    /// give_birth creates a new driver from this driver's strategy parameters. The parent stays
    /// unchanged.
    fn give_birth(&self, rng: &mut StdRng) -> Self
    where
        Self: Sized;

    /// (deg/s) Turning rate of the driver, None uses the engine's rotation speed.
    fn turning_rate(&self) -> Option<f64> {
        None
    }

    /// Sensors of the driver, used for visualisation.
    fn sensors(&self) -> &[DistanceSensor] {
        &[]
    }
}

/// Pilot is the object safe view on a driver that the engine works with. It hides the percept
/// type by running sense and plan in one go.
pub trait Pilot: Send {
    fn name(&self) -> &str;
    fn decide(
        &mut self,
        kinematics: &Kinematics,
        track: &Track,
        keys: &KeyState,
    ) -> anyhow::Result<Command>;
    fn give_birth(&self, rng: &mut StdRng) -> Box<dyn Pilot>;
    fn turning_rate(&self) -> Option<f64>;
    fn sensors(&self) -> &[DistanceSensor];
}

/// Slot wraps any driver into a pilot.
pub struct Slot<D>(pub D);

impl<D: Driver> Pilot for Slot<D> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn decide(
        &mut self,
        kinematics: &Kinematics,
        track: &Track,
        keys: &KeyState,
    ) -> anyhow::Result<Command> {
        let percept = self.0.sense(kinematics, track, keys)?;
        self.0.plan(kinematics, &percept)
    }

    fn give_birth(&self, rng: &mut StdRng) -> Box<dyn Pilot> {
        Box::new(Slot(self.0.give_birth(rng)))
    }

    fn turning_rate(&self) -> Option<f64> {
        self.0.turning_rate()
    }

    fn sensors(&self) -> &[DistanceSensor] {
        self.0.sensors()
    }
}

// -------------------------------------------------------------------------------------------------
// HUMAN -------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// HumanDriver responds to the arrow keys and has no sensors.
#[derive(Debug, Clone, Default)]
pub struct HumanDriver;

impl HumanDriver {
    pub fn new() -> HumanDriver {
        HumanDriver
    }
}

impl Driver for HumanDriver {
    type Percept = KeyState;

    fn name(&self) -> &str {
        "Human"
    }

    fn sense(
        &mut self,
        _kinematics: &Kinematics,
        _track: &Track,
        keys: &KeyState,
    ) -> anyhow::Result<KeyState> {
        Ok(*keys)
    }

    fn plan(&self, _kinematics: &Kinematics, keys: &KeyState) -> anyhow::Result<Command> {
        // holding both keys of a pair cancels out
        let acceleration = keys.up as i8 - keys.down as i8;
        let rotation = keys.right as i8 - keys.left as i8;
        Ok(Command::new(acceleration as f64, rotation as f64))
    }

    fn give_birth(&self, _rng: &mut StdRng) -> HumanDriver {
        HumanDriver
    }
}

// -------------------------------------------------------------------------------------------------
// NAIVE AI ----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// NaiveAi steers away from the nearer of two walls seen by sensors at -30 and +30 degrees and
/// keeps a constant target speed.
/// * `turning_rate` - (deg/s) Turning rate, None uses the engine's rotation speed
/// * `target_speed` - (px/s) Speed up to which the driver accelerates
#[derive(Debug, Clone)]
pub struct NaiveAi {
    sensors: Vec<DistanceSensor>,
    pub turning_rate: Option<f64>,
    pub target_speed: f64,
}

impl NaiveAi {
    pub const SENSOR_ANGLES: [f64; 2] = [-30.0, 30.0];
    pub const SENSOR_DEPTH: f64 = 60.0;
    pub const TURNING_RATE: f64 = 120.0;
    pub const TARGET_SPEED: f64 = 30.0;

    pub fn new(sensor_depth: f64) -> NaiveAi {
        NaiveAi {
            sensors: NaiveAi::SENSOR_ANGLES
                .iter()
                .map(|&angle| DistanceSensor::new(angle, sensor_depth))
                .collect(),
            turning_rate: Some(NaiveAi::TURNING_RATE),
            target_speed: NaiveAi::TARGET_SPEED,
        }
    }
}

impl Default for NaiveAi {
    fn default() -> NaiveAi {
        NaiveAi::new(NaiveAi::SENSOR_DEPTH)
    }
}

impl Driver for NaiveAi {
    type Percept = Vec<f64>;

    fn name(&self) -> &str {
        "NaiveAi"
    }

    fn sense(
        &mut self,
        kinematics: &Kinematics,
        track: &Track,
        _keys: &KeyState,
    ) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .sensors
            .iter_mut()
            .map(|s| s.perceive(track, kinematics.position(), kinematics.heading))
            .collect())
    }

    fn plan(&self, kinematics: &Kinematics, percept: &Vec<f64>) -> anyhow::Result<Command> {
        if percept.len() != 2 {
            anyhow::bail!("NaiveAi expects 2 sensor readings, got {}", percept.len());
        }

        // turn towards the side with more room
        let rotation = if percept[0] > percept[1] { -1.0 } else { 1.0 };
        let acceleration = if kinematics.speed < self.target_speed {
            1.0
        } else {
            0.0
        };

        Ok(Command::new(acceleration, rotation))
    }

    fn give_birth(&self, _rng: &mut StdRng) -> NaiveAi {
        let mut child = self.clone();
        child.sensors.iter_mut().for_each(|s| s.percept = None);
        child
    }

    fn turning_rate(&self) -> Option<f64> {
        self.turning_rate
    }

    fn sensors(&self) -> &[DistanceSensor] {
        &self.sensors
    }
}

// -------------------------------------------------------------------------------------------------
// RULE AI -----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// RuleAi weighs three sensor readings with two linear rules. Rule 0 votes for turning right,
/// rule 1 for turning left, the larger total wins. Children are created by a neighbourhood search
/// around the parent's weights.
/// * `rules` - Per rule three sensor weights followed by a bias
/// * `target_speed` - (px/s) Speed up to which the driver accelerates
/// * `learning_rate` - Scale of the random weight changes in `give_birth`
#[derive(Debug, Clone)]
pub struct RuleAi {
    pub rules: [[f64; 4]; 2],
    sensors: Vec<DistanceSensor>,
    pub target_speed: f64,
    pub learning_rate: f64,
    pub turning_rate: Option<f64>,
}

impl RuleAi {
    pub const SENSOR_ANGLES: [f64; 3] = [-30.0, 0.0, 30.0];
    pub const SENSOR_DEPTH: f64 = 50.0;
    pub const TARGET_SPEED: f64 = 90.0;
    pub const LEARNING_RATE: f64 = 0.5;

    /// new creates a driver with random weights in [-0.5, 0.5).
    pub fn new(rng: &mut StdRng, sensor_depth: f64) -> RuleAi {
        let mut rules = [[0.0; 4]; 2];
        for weight in rules.iter_mut().flat_map(|rule| rule.iter_mut()) {
            *weight = rng.gen_range(-0.5..0.5);
        }
        RuleAi::with_rules(rules, sensor_depth)
    }

    pub fn with_rules(rules: [[f64; 4]; 2], sensor_depth: f64) -> RuleAi {
        RuleAi {
            rules,
            sensors: RuleAi::SENSOR_ANGLES
                .iter()
                .map(|&angle| DistanceSensor::new(angle, sensor_depth))
                .collect(),
            target_speed: RuleAi::TARGET_SPEED,
            learning_rate: RuleAi::LEARNING_RATE,
            turning_rate: None,
        }
    }

    /// rule_totals evaluates both rules for the given sensor readings.
    pub fn rule_totals(&self, percept: &[f64]) -> [f64; 2] {
        let mut totals = [0.0; 2];
        for (total, rule) in totals.iter_mut().zip(self.rules.iter()) {
            *total = rule[..3]
                .iter()
                .zip(percept.iter())
                .map(|(weight, reading)| weight * reading)
                .sum::<f64>()
                + rule[3];
        }
        totals
    }
}

impl Driver for RuleAi {
    type Percept = Vec<f64>;

    fn name(&self) -> &str {
        "RuleAi"
    }

    fn sense(
        &mut self,
        kinematics: &Kinematics,
        track: &Track,
        _keys: &KeyState,
    ) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .sensors
            .iter_mut()
            .map(|s| s.perceive(track, kinematics.position(), kinematics.heading))
            .collect())
    }

    fn plan(&self, kinematics: &Kinematics, percept: &Vec<f64>) -> anyhow::Result<Command> {
        if percept.len() != RuleAi::SENSOR_ANGLES.len() {
            anyhow::bail!("RuleAi expects 3 sensor readings, got {}", percept.len());
        }

        let totals = self.rule_totals(percept);
        let rotation = if totals[0] > totals[1] { 1.0 } else { -1.0 };
        let acceleration = if kinematics.speed < self.target_speed {
            1.0
        } else {
            0.0
        };

        Ok(Command::new(acceleration, rotation))
    }

    fn give_birth(&self, rng: &mut StdRng) -> RuleAi {
        let mut child = self.clone();
        for weight in child.rules.iter_mut().flat_map(|rule| rule.iter_mut()) {
            *weight += self.learning_rate * rng.gen_range(-0.5..0.5);
        }
        child.sensors.iter_mut().for_each(|s| s.percept = None);
        child
    }

    fn turning_rate(&self) -> Option<f64> {
        self.turning_rate
    }

    fn sensors(&self) -> &[DistanceSensor] {
        &self.sensors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn corridor() -> Track {
        Track::from_ascii(
            "corridor",
            &[
                "##########",
                "#S......F#",
                "#.......F#",
                "#.......F#",
                "##########",
            ],
        )
        .unwrap()
    }

    #[test]
    fn commands_are_clamped_to_unit_range() {
        let command = Command::new(3.5, -7.0).clamped();
        assert_eq!(command, Command::new(1.0, -1.0));

        let command = Command::new(0.25, f64::NAN).clamped();
        assert_eq!(command, Command::new(0.25, 0.0));
    }

    #[test]
    fn key_state_ignores_non_arrow_keys() {
        let mut keys = KeyState::default();
        keys.set(Key::Up, true);
        keys.set(Key::Digit(1), true);
        keys.set(Key::Left, true);
        keys.set(Key::Left, false);

        assert_eq!(
            keys,
            KeyState {
                up: true,
                ..KeyState::default()
            }
        );
    }

    #[test]
    fn human_maps_arrow_keys_to_commands() {
        let track = corridor();
        let kinematics = Kinematics::default();
        let mut human = HumanDriver::new();

        let keys = KeyState {
            up: true,
            right: true,
            ..KeyState::default()
        };
        let percept = human.sense(&kinematics, &track, &keys).unwrap();
        assert_eq!(
            human.plan(&kinematics, &percept).unwrap(),
            Command::new(1.0, 1.0)
        );

        // opposite keys cancel out
        let keys = KeyState {
            up: true,
            down: true,
            left: true,
            right: false,
        };
        assert_eq!(
            human.plan(&kinematics, &keys).unwrap(),
            Command::new(0.0, -1.0)
        );
    }

    #[test]
    fn naive_ai_turns_towards_more_room() {
        let naive = NaiveAi::default();
        let kinematics = Kinematics::default();

        let command = naive.plan(&kinematics, &vec![40.0, 10.0]).unwrap();
        assert_eq!(command, Command::new(1.0, -1.0));

        let fast = Kinematics {
            speed: 2.0 * NaiveAi::TARGET_SPEED,
            ..Kinematics::default()
        };
        let command = naive.plan(&fast, &vec![10.0, 40.0]).unwrap();
        assert_eq!(command, Command::new(0.0, 1.0));

        assert!(naive.plan(&kinematics, &vec![1.0]).is_err());
    }

    #[test]
    fn naive_ai_senses_and_caches_readings() {
        let track = corridor();
        let mut naive = NaiveAi::default();
        let kinematics = Kinematics {
            x: 1.0,
            y: 2.0,
            ..Kinematics::default()
        };

        let percept = naive.sense(&kinematics, &track, &KeyState::default()).unwrap();
        assert_eq!(percept.len(), 2);
        for (sensor, reading) in naive.sensors().iter().zip(percept.iter()) {
            assert_eq!(sensor.percept, Some(*reading));
            assert!(*reading <= NaiveAi::SENSOR_DEPTH);
        }
    }

    #[test]
    fn rule_ai_weights_start_in_half_unit_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let rule_ai = RuleAi::new(&mut rng, RuleAi::SENSOR_DEPTH);

        for weight in rule_ai.rules.iter().flat_map(|rule| rule.iter()) {
            assert!(*weight >= -0.5 && *weight < 0.5);
        }
        assert_eq!(rule_ai.sensors().len(), 3);
    }

    #[test]
    fn rule_ai_rotation_follows_rule_totals() {
        let kinematics = Kinematics::default();
        let rule_ai = RuleAi::with_rules(
            [[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            RuleAi::SENSOR_DEPTH,
        );

        let totals = rule_ai.rule_totals(&[30.0, 5.0, 10.0]);
        assert_abs_diff_eq!(totals[0], 30.0);
        assert_abs_diff_eq!(totals[1], 10.0);

        let command = rule_ai.plan(&kinematics, &vec![30.0, 5.0, 10.0]).unwrap();
        assert_eq!(command, Command::new(1.0, 1.0));
        let command = rule_ai.plan(&kinematics, &vec![10.0, 5.0, 30.0]).unwrap();
        assert_eq!(command, Command::new(1.0, -1.0));
    }

    #[test]
    fn rule_ai_children_stay_in_the_neighbourhood() {
        let mut rng = StdRng::seed_from_u64(7);
        let parent = RuleAi::new(&mut rng, RuleAi::SENSOR_DEPTH);
        let parent_rules = parent.rules;

        let child = parent.give_birth(&mut rng);

        assert_eq!(parent.rules, parent_rules);
        assert_ne!(child.rules, parent_rules);
        for (c, p) in child
            .rules
            .iter()
            .flat_map(|rule| rule.iter())
            .zip(parent_rules.iter().flat_map(|rule| rule.iter()))
        {
            assert!((c - p).abs() <= 0.5 * RuleAi::LEARNING_RATE);
        }
    }

    #[test]
    fn slot_erases_the_percept_type() {
        let track = corridor();
        let mut pilots: Vec<Box<dyn Pilot>> = vec![
            Box::new(Slot(HumanDriver::new())),
            Box::new(Slot(NaiveAi::default())),
        ];
        let kinematics = Kinematics {
            x: 1.0,
            y: 2.0,
            ..Kinematics::default()
        };
        let keys = KeyState {
            down: true,
            ..KeyState::default()
        };

        let human_cmd = pilots[0].decide(&kinematics, &track, &keys).unwrap();
        assert_eq!(human_cmd, Command::new(-1.0, 0.0));
        assert_eq!(pilots[0].turning_rate(), None);

        let naive_cmd = pilots[1].decide(&kinematics, &track, &keys).unwrap();
        assert_eq!(naive_cmd.acceleration, 1.0);
        assert_eq!(pilots[1].turning_rate(), Some(NaiveAi::TURNING_RATE));
        assert_eq!(pilots[1].sensors().len(), 2);

        let mut rng = StdRng::seed_from_u64(42);
        let child = pilots[1].give_birth(&mut rng);
        assert_eq!(child.name(), "NaiveAi");
        assert!(child.sensors().iter().all(|s| s.percept.is_none()));
    }
}
