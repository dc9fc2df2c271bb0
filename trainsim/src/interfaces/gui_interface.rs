use crate::core::driver::Key;
use crate::core::player::PlayerStatus;
use crate::post::race_result::RaceResult;
use flume::{Receiver, Sender};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// How trains are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainMode {
    Sprite,
    Line,
    Hidden,
}

impl TrainMode {
    pub fn next(self) -> TrainMode {
        match self {
            TrainMode::Sprite => TrainMode::Line,
            TrainMode::Line => TrainMode::Hidden,
            TrainMode::Hidden => TrainMode::Sprite,
        }
    }
}

/// What is drawn underneath the trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    Background,
    Raw,
    Distance,
}

impl BackgroundMode {
    pub fn next(self) -> BackgroundMode {
        match self {
            BackgroundMode::Background => BackgroundMode::Raw,
            BackgroundMode::Raw => BackgroundMode::Distance,
            BackgroundMode::Distance => BackgroundMode::Background,
        }
    }
}

/// DisplaySettings are toggled at runtime with the keys 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub train_mode: TrainMode,
    pub show_sensors: bool,
    pub background_mode: BackgroundMode,
    pub fps_limiter: bool,
}

impl Default for DisplaySettings {
    fn default() -> DisplaySettings {
        DisplaySettings {
            train_mode: TrainMode::Sprite,
            show_sensors: false,
            background_mode: BackgroundMode::Background,
            fps_limiter: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SensorState {
    pub absolute_angle: f64,
    pub depth: f64,
    pub percept: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: u32,
    pub name: String,
    pub color: RgbColor,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub speed: f64,
    pub status: PlayerStatus,
    pub score: u32,
    pub sensor_states: Vec<SensorState>,
}

/// RaceState is the snapshot the engine sends to the GUI after every turn.
#[derive(Debug, Clone, Default)]
pub struct RaceState {
    pub turn: u64,
    pub generation: u32,
    pub fps: Option<f64>,
    pub settings: DisplaySettings,
    pub player_states: Vec<PlayerState>,

    // final results payload (sent once when the engine stops)
    pub final_result: Option<RaceResult>,
}

/// Messages from the GUI to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiEvent {
    Key { key: Key, pressed: bool },
    Quit,
}

/// GuiLink is the engine's end of the two channels to the GUI.
#[derive(Debug, Clone)]
pub struct GuiLink {
    pub tx: Sender<RaceState>,
    pub rx: Receiver<GuiEvent>,
}

/// gui_channels creates both channels and returns the engine's end together with the GUI's ends.
pub fn gui_channels() -> (GuiLink, Sender<GuiEvent>, Receiver<RaceState>) {
    let (tx_state, rx_state) = flume::unbounded();
    let (tx_event, rx_event) = flume::unbounded();

    (
        GuiLink {
            tx: tx_state,
            rx: rx_event,
        },
        tx_event,
        rx_state,
    )
}
