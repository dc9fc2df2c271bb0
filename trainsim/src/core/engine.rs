use crate::core::driver::{Key, KeyState};
use crate::core::player::{Player, PlayerStatus};
use crate::core::track::{Track, UNREACHABLE};
use crate::interfaces::gui_interface::{
    DisplaySettings, GuiEvent, GuiLink, PlayerState, RaceState, RgbColor, SensorState,
};
use crate::post::race_result::{PlayerResult, RaceResult};
use anyhow::Context;
use flume::TryRecvError;
use helpers::buffer::RingBuffer;
use helpers::general::{argmax, argmin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Seed of the engine's random number generator if none is set explicitly.
pub const DEFAULT_SEED: u64 = 42;

/// Number of turns the displayed frame rate is averaged over.
const FPS_WINDOW: usize = 30;

/// * `acceleration` - (px/s^2) Acceleration of a train at full throttle
/// * `rotation_speed` - (deg/s) Turning rate at full steering for drivers without their own rate
/// * `seconds_per_frame` - (s) Simulated time per turn
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SimConstants {
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f64,
    #[serde(default = "default_seconds_per_frame")]
    pub seconds_per_frame: f64,
}

fn default_acceleration() -> f64 {
    150.0
}

fn default_rotation_speed() -> f64 {
    180.0
}

fn default_seconds_per_frame() -> f64 {
    1.0 / 30.0
}

impl Default for SimConstants {
    fn default() -> SimConstants {
        SimConstants {
            acceleration: default_acceleration(),
            rotation_speed: default_rotation_speed(),
            seconds_per_frame: default_seconds_per_frame(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// Display toggles bound to the keys 1 to 4 by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    TrainMode,
    Sensors,
    Background,
    FpsLimiter,
}

/// Callback that can be bound to a key.
pub type Callback = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

enum Action {
    Builtin(Toggle),
    Custom(Callback),
}

/// Engine owns the track and the players and runs the turn loop. Without a GUI link it runs
/// headless, i.e. as fast as possible and without input polling.
pub struct Engine {
    track: Arc<Track>,
    players: Vec<Player>,
    next_player_id: u32,
    sim_consts: SimConstants,
    state: EngineState,
    cur_turn: u64,
    pub max_turns: Option<u64>,
    pub realtime_factor: f64,
    pub generation: u32,
    pub settings: DisplaySettings,
    keys: KeyState,
    key_bindings: HashMap<Key, Action>,
    rng: StdRng,
    gui: Option<GuiLink>,
    gui_closed: bool,
    turn_durations: RingBuffer<f64>,
}

impl Engine {
    pub fn new(
        track: Arc<Track>,
        players: Vec<Player>,
        sim_consts: SimConstants,
        gui: Option<GuiLink>,
    ) -> Engine {
        let mut key_bindings = HashMap::new();
        key_bindings.insert(Key::Digit(1), Action::Builtin(Toggle::TrainMode));
        key_bindings.insert(Key::Digit(2), Action::Builtin(Toggle::Sensors));
        key_bindings.insert(Key::Digit(3), Action::Builtin(Toggle::Background));
        key_bindings.insert(Key::Digit(4), Action::Builtin(Toggle::FpsLimiter));

        let mut engine = Engine {
            track,
            players: Vec::with_capacity(players.len()),
            next_player_id: 0,
            sim_consts,
            state: EngineState::Idle,
            cur_turn: 0,
            max_turns: None,
            realtime_factor: 1.0,
            generation: 1,
            settings: DisplaySettings::default(),
            keys: KeyState::default(),
            key_bindings,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            gui,
            gui_closed: false,
            turn_durations: RingBuffer::new(FPS_WINDOW),
        };

        for player in players {
            engine.add_player(player);
        }
        engine
    }

    /// reseed resets the random number generator used for colours and offspring.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn is_headless(&self) -> bool {
        self.gui.is_none()
    }

    /// True once the GUI asked to quit or disconnected.
    pub fn gui_closed(&self) -> bool {
        self.gui_closed
    }

    pub fn cur_turn(&self) -> u64 {
        self.cur_turn
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn sim_consts(&self) -> &SimConstants {
        &self.sim_consts
    }

    pub fn keys(&self) -> KeyState {
        self.keys
    }

    // ---------------------------------------------------------------------------------------------
    // PLAYERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// add_player spawns the player at the track start and returns its id. Players without a
    /// colour get a random one.
    pub fn add_player(&mut self, mut player: Player) -> u32 {
        player.id = self.next_player_id;
        self.next_player_id += 1;

        if player.color.is_none() {
            player.color = Some(RgbColor {
                r: self.rng.gen_range(100..=255),
                g: self.rng.gen_range(100..=255),
                b: self.rng.gen_range(100..=255),
            });
        }

        let start = self.track.start_position();
        let start_score = self
            .track
            .score_at(Track::location_to_pixel(start))
            .unwrap_or(UNREACHABLE);
        player.spawn(start, start_score);

        let id = player.id;
        self.players.push(player);
        id
    }

    /// remove_all_players removes every player whose id is not contained in `keep`.
    pub fn remove_all_players(&mut self, keep: &[u32]) {
        self.players.retain(|player| keep.contains(&player.id));
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get_player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn get_player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// get_scores returns (id, score) of all players in insertion order.
    pub fn get_scores(&self) -> Vec<(u32, u32)> {
        self.players
            .iter()
            .map(|player| (player.id, player.score))
            .collect()
    }

    /// Players the best or worst player is picked from: the live ones, or all if none is alive.
    fn candidates(&self) -> Vec<&Player> {
        let live: Vec<&Player> = self.players.iter().filter(|p| p.alive()).collect();
        if live.is_empty() {
            self.players.iter().collect()
        } else {
            live
        }
    }

    /// get_best_player returns the player with the lowest score. Ties go to the player added
    /// first.
    pub fn get_best_player(&self) -> Option<&Player> {
        let candidates = self.candidates();
        let scores: Vec<u32> = candidates.iter().map(|p| p.score).collect();
        argmin(&scores).map(|idx| candidates[idx])
    }

    /// get_worst_player returns the player with the highest score. Ties go to the player added
    /// first.
    pub fn get_worst_player(&self) -> Option<&Player> {
        let candidates = self.candidates();
        let scores: Vec<u32> = candidates.iter().map(|p| p.score).collect();
        argmax(&scores).map(|idx| candidates[idx])
    }

    /// give_birth creates an unspawned child of the given player.
    pub fn give_birth(&mut self, id: u32) -> Option<Player> {
        let rng = &mut self.rng;
        self.players
            .iter()
            .find(|player| player.id == id)
            .map(|player| player.give_birth(rng))
    }

    // ---------------------------------------------------------------------------------------------
    // INPUT ---------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// bind_action registers a callback that is run whenever the key is pressed. A later binding
    /// for the same key replaces the earlier one, including the built-in toggles.
    pub fn bind_action<F>(&mut self, key: Key, callback: F)
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.key_bindings
            .insert(key, Action::Custom(Box::new(callback)));
    }

    /// handle_key updates the arrow key state and runs the action bound to a pressed key.
    pub fn handle_key(&mut self, key: Key, pressed: bool) -> anyhow::Result<()> {
        self.keys.set(key, pressed);

        if !pressed {
            return Ok(());
        }

        let toggle = match self.key_bindings.get_mut(&key) {
            Some(Action::Builtin(toggle)) => Some(*toggle),
            Some(Action::Custom(callback)) => {
                callback().context(format!("Action bound to key {:?} failed!", key))?;
                None
            }
            None => None,
        };

        if let Some(toggle) = toggle {
            self.apply_toggle(toggle);
        }
        Ok(())
    }

    fn apply_toggle(&mut self, toggle: Toggle) {
        match toggle {
            Toggle::TrainMode => self.settings.train_mode = self.settings.train_mode.next(),
            Toggle::Sensors => self.settings.show_sensors = !self.settings.show_sensors,
            Toggle::Background => {
                self.settings.background_mode = self.settings.background_mode.next()
            }
            Toggle::FpsLimiter => self.settings.fps_limiter = !self.settings.fps_limiter,
        }
        tracing::debug!("Toggled {:?}, display settings now {:?}", toggle, self.settings);
    }

    /// poll_gui handles all events the GUI sent since the last turn. Returns false if the GUI
    /// asked to quit or is gone.
    fn poll_gui(&mut self) -> anyhow::Result<bool> {
        let mut events = vec![];
        let mut disconnected = false;

        if let Some(gui) = &self.gui {
            loop {
                match gui.rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        for event in events {
            match event {
                GuiEvent::Key { key, pressed } => self.handle_key(key, pressed)?,
                GuiEvent::Quit => {
                    tracing::info!("GUI closed, stopping in turn {}", self.cur_turn);
                    self.gui_closed = true;
                    return Ok(false);
                }
            }
        }

        if disconnected {
            tracing::warn!("GUI disconnected, stopping in turn {}", self.cur_turn);
            self.gui_closed = true;
            return Ok(false);
        }
        Ok(true)
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHODS --------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// play runs turns until the engine stops and returns the result of the run. The turn counter
    /// starts at zero on every call.
    /// * `stop_on_death` - Stop as soon as no player is alive anymore
    pub fn play(&mut self, stop_on_death: bool) -> anyhow::Result<RaceResult> {
        if self.state == EngineState::Running {
            anyhow::bail!("Engine is already running!");
        }

        self.state = EngineState::Running;
        self.cur_turn = 0;
        tracing::info!(
            "Starting generation {} on track {} with {} players ({})",
            self.generation,
            self.track.name,
            self.players.len(),
            if self.is_headless() { "headless" } else { "GUI" }
        );

        let outcome = self.run_turns(stop_on_death);
        self.state = EngineState::Stopped;
        outcome?;

        let result = self.race_result();
        tracing::info!(
            "Stopped generation {} after {} turns",
            self.generation,
            self.cur_turn
        );

        if let Some(gui) = &self.gui {
            let mut final_state = self.race_state();
            final_state.final_result = Some(result.clone());
            if gui.tx.send(final_state).is_err() {
                tracing::debug!("GUI is gone, final result not sent");
            }
        }

        Ok(result)
    }

    fn run_turns(&mut self, stop_on_death: bool) -> anyhow::Result<()> {
        while self.state == EngineState::Running {
            let t_start = Instant::now();

            if self.turn_limit_reached() {
                break;
            }

            if !self.poll_gui()? {
                break;
            }

            self.simulate_turn()?;

            if !self.send_state() {
                break;
            }

            if stop_on_death && !self.players.iter().any(|player| player.alive()) {
                tracing::debug!("No player alive anymore in turn {}", self.cur_turn);
                break;
            }

            if self.turn_limit_reached() {
                break;
            }

            self.limit_frame_rate(t_start);
            self.turn_durations.push(t_start.elapsed().as_secs_f64());
        }
        Ok(())
    }

    fn turn_limit_reached(&self) -> bool {
        match self.max_turns {
            Some(max_turns) if self.cur_turn >= max_turns => {
                tracing::debug!("Reached turn limit of {} turns", max_turns);
                true
            }
            _ => false,
        }
    }

    /// simulate_turn moves every live player once, in insertion order.
    fn simulate_turn(&mut self) -> anyhow::Result<()> {
        self.cur_turn += 1;
        let turn = self.cur_turn;
        let track = &self.track;
        let sim_consts = self.sim_consts;
        let keys = self.keys;

        for player in self.players.iter_mut().filter(|player| player.alive()) {
            let pixel = Track::location_to_pixel(player.kinematics.position());
            if track.is_wall(pixel) {
                player.status = PlayerStatus::Crashed { turn };
                player.score_log.push((turn, player.score));
                tracing::debug!("Player {} starts turn {} on a wall", player.id, turn);
                continue;
            }

            let command = player.decide(track, &keys).context(format!(
                "Player {} ({}) failed to decide in turn {}!",
                player.id, player.name, turn
            ))?;
            let turning_rate = player
                .turning_rate()
                .unwrap_or(sim_consts.rotation_speed);
            player.integrate(
                command,
                sim_consts.seconds_per_frame,
                sim_consts.acceleration,
                turning_rate,
            );

            // collision is checked before the finish
            let pixel = Track::location_to_pixel(player.kinematics.position());
            if track.is_wall(pixel) {
                player.status = PlayerStatus::Crashed { turn };
                tracing::debug!("Player {} crashed in turn {} at {:?}", player.id, turn, pixel);
            } else if track.is_finish(pixel) {
                player.status = PlayerStatus::Finished { turn };
                player.score = 0;
                tracing::debug!("Player {} finished in turn {}", player.id, turn);
            } else if let Some(score) = track.score_at(pixel) {
                player.score = score;
            }
            player.score_log.push((turn, player.score));
        }
        Ok(())
    }

    /// send_state sends the current snapshot to the GUI. Returns false if the GUI is gone.
    fn send_state(&mut self) -> bool {
        match &self.gui {
            Some(gui) => {
                if gui.tx.send(self.race_state()).is_err() {
                    tracing::warn!("GUI disconnected, stopping in turn {}", self.cur_turn);
                    self.gui_closed = true;
                    false
                } else {
                    true
                }
            }
            None => true,
        }
    }

    /// limit_frame_rate sleeps for the rest of the frame if a GUI is attached and the limiter is
    /// active.
    fn limit_frame_rate(&self, t_start: Instant) {
        if self.is_headless() || !self.settings.fps_limiter {
            return;
        }

        let t_frame = self.sim_consts.seconds_per_frame / self.realtime_factor;
        let t_elapsed = t_start.elapsed().as_secs_f64();

        if t_elapsed < t_frame {
            sleep(Duration::from_secs_f64(t_frame - t_elapsed));
        } else {
            let no_dropped = (t_elapsed / t_frame).floor() as u64;
            tracing::warn!(
                "Could not keep up with real-time, dropped {} frame(s) in turn {}",
                no_dropped,
                self.cur_turn
            );
        }
    }

    // ---------------------------------------------------------------------------------------------
    // SNAPSHOTS -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn race_state(&self) -> RaceState {
        let player_states = self
            .players
            .iter()
            .map(|player| PlayerState {
                id: player.id,
                name: player.name.to_owned(),
                color: player.color.unwrap_or_default(),
                x: player.kinematics.x,
                y: player.kinematics.y,
                heading: player.kinematics.heading,
                speed: player.kinematics.speed,
                status: player.status,
                score: player.score,
                sensor_states: player
                    .sensors()
                    .iter()
                    .map(|sensor| SensorState {
                        absolute_angle: sensor.absolute_angle(player.kinematics.heading),
                        depth: sensor.depth,
                        percept: sensor.percept,
                    })
                    .collect(),
            })
            .collect();

        RaceState {
            turn: self.cur_turn,
            generation: self.generation,
            fps: self.turn_durations.get_avg().map(|t| 1.0 / t.max(1e-9)),
            settings: self.settings,
            player_states,
            final_result: None,
        }
    }

    /// race_result summarises the current run.
    pub fn race_result(&self) -> RaceResult {
        RaceResult {
            track_name: self.track.name.to_owned(),
            generation: self.generation,
            turns: self.cur_turn,
            player_results: self
                .players
                .iter()
                .map(|player| PlayerResult {
                    id: player.id,
                    name: player.name.to_owned(),
                    status: player.status.label().to_owned(),
                    score: player.score,
                    completion_turn: player.completion_turn(),
                })
                .collect(),
            score_logs: self
                .players
                .iter()
                .map(|player| player.score_log.to_owned())
                .collect(),
        }
    }
}
