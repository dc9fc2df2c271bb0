use crate::interfaces::trainsim_interface::TrainsimInterface;
use eframe::{egui, epi};
use flume::{Receiver, Sender};
use helpers::buffer::RingBuffer;
use helpers::general::{argsort, SortOrder};
use std::sync::Arc;
use std::time::Instant;
use trainsim::core::driver::Key;
use trainsim::core::player::PlayerStatus;
use trainsim::core::track::{Track, UNREACHABLE};
use trainsim::interfaces::gui_interface::{
    BackgroundMode, GuiEvent, PlayerState, RaceState, TrainMode,
};

/// (px) Length and width of a train drawn in sprite mode, in track pixels.
const TRAIN_LENGTH: f32 = 12.0;
const TRAIN_WIDTH: f32 = 6.0;

/// (px) Height of one line of the score panel.
const LINE_HEIGHT: f32 = 18.0;

#[derive(Debug, Clone, Copy)]
struct TrackTextures {
    background: egui::TextureId,
    raw: egui::TextureId,
    distance: egui::TextureId,
}

/// RaceView draws the track, the trains, their sensors and a score panel, and forwards key input
/// to the engine.
#[derive(Debug)]
pub struct RaceView {
    pub trainsim_interface: TrainsimInterface,
    pub track: Arc<Track>,
    textures: Option<TrackTextures>,
    prev_update: Instant,
    prev_update_durations: RingBuffer<u32>,
}

impl RaceView {
    pub fn new(rx: Receiver<RaceState>, tx: Sender<GuiEvent>, track: Arc<Track>) -> RaceView {
        RaceView {
            trainsim_interface: TrainsimInterface::new(rx, tx),
            track,
            textures: None,
            prev_update: Instant::now(),
            prev_update_durations: RingBuffer::new(10),
        }
    }

    /// alloc_textures uploads the three possible backgrounds once.
    fn alloc_textures(&mut self, frame: &mut epi::Frame<'_>) -> TrackTextures {
        if let Some(textures) = self.textures {
            return textures;
        }

        let size = (self.track.width, self.track.height);
        let background: Vec<egui::Color32> = self
            .track
            .background()
            .pixels()
            .map(|p| egui::Color32::from_rgb(p.0[0], p.0[1], p.0[2]))
            .collect();
        let raw: Vec<egui::Color32> = self
            .track
            .raw()
            .pixels()
            .map(|p| egui::Color32::from_rgb(p.0[0], p.0[1], p.0[2]))
            .collect();
        let max_score = self.track.max_score();
        let mut distance = Vec::with_capacity(size.0 * size.1);
        for y in 0..self.track.height {
            for x in 0..self.track.width {
                distance.push(distance_color(self.track.raw_score(x, y), max_score));
            }
        }

        let tex_allocator = frame.tex_allocator();
        let textures = TrackTextures {
            background: tex_allocator.alloc_srgba_premultiplied(size, &background),
            raw: tex_allocator.alloc_srgba_premultiplied(size, &raw),
            distance: tex_allocator.alloc_srgba_premultiplied(size, &distance),
        };
        self.textures = Some(textures);
        textures
    }

    /// forward_keys sends key presses and releases of the current frame to the engine.
    fn forward_keys(&mut self, ctx: &egui::CtxRef) {
        let key_events: Vec<(Key, bool)> = ctx
            .input()
            .events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key { key, pressed, .. } => map_key(*key).map(|k| (k, *pressed)),
                _ => None,
            })
            .collect();

        for (key, pressed) in key_events {
            self.trainsim_interface.send_key(key, pressed);
        }
    }

    fn set_ui_content(&mut self, ui: &mut egui::Ui, textures: TrackTextures) -> egui::Response {
        // PREPARATIONS ----------------------------------------------------------------------------
        // get UI handles
        let (response, painter) =
            ui.allocate_painter(ui.available_size_before_wrap_finite(), egui::Sense::hover());

        // fit the track into the window while preserving its aspect ratio
        let track_width = self.track.width as f32;
        let track_height = self.track.height as f32;
        let track_aspect = if track_height > 0.0 {
            track_width / track_height
        } else {
            1.0
        };

        let screen_width = response.rect.width();
        let screen_height = response.rect.height();
        let screen_aspect = screen_width / screen_height;

        let dest_rect = if screen_aspect > track_aspect {
            // screen is wider -> fit height
            let new_width = screen_height * track_aspect;
            let offset_x = (screen_width - new_width) / 2.0;
            egui::Rect::from_min_size(
                egui::Pos2::new(response.rect.min.x + offset_x, response.rect.min.y),
                egui::Vec2::new(new_width, screen_height),
            )
        } else {
            // screen is taller -> fit width
            let new_height = screen_width / track_aspect;
            let offset_y = (screen_height - new_height) / 2.0;
            egui::Rect::from_min_size(
                egui::Pos2::new(response.rect.min.x, response.rect.min.y + offset_y),
                egui::Vec2::new(screen_width, new_height),
            )
        };

        // pixel (x, y) covers [x - 0.5, x + 0.5] in track coordinates
        let to_screen = egui::emath::RectTransform::from_to(
            egui::Rect::from_min_max(
                egui::Pos2::new(-0.5, -0.5),
                egui::Pos2::new(track_width - 0.5, track_height - 0.5),
            ),
            dest_rect,
        );
        let scale = dest_rect.width() / track_width.max(1.0);

        let race_state = &self.trainsim_interface.race_state;
        let settings = race_state.settings;

        // create vector for drawn shapes
        let mut shapes = vec![];

        // TRACK DRAWING ---------------------------------------------------------------------------
        let texture_id = match settings.background_mode {
            BackgroundMode::Background => textures.background,
            BackgroundMode::Raw => textures.raw,
            BackgroundMode::Distance => textures.distance,
        };
        let mut mesh = egui::epaint::Mesh::with_texture(texture_id);
        mesh.add_rect_with_uv(
            dest_rect,
            egui::Rect::from_min_max(egui::Pos2::new(0.0, 0.0), egui::Pos2::new(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        shapes.push(egui::Shape::Mesh(mesh));

        // SENSORS DRAWING -------------------------------------------------------------------------
        if settings.show_sensors {
            for player_state in race_state.player_states.iter().filter(|p| is_running(p)) {
                let origin = egui::Pos2::new(player_state.x as f32, player_state.y as f32);

                for sensor_state in player_state.sensor_states.iter() {
                    let reach = sensor_state.percept.unwrap_or(sensor_state.depth) as f32;
                    let hit = sensor_state.percept.map_or(false, |p| p < sensor_state.depth);
                    let color = if hit {
                        egui::Color32::from_rgb(255, 80, 80)
                    } else {
                        egui::Color32::from_gray(200)
                    };

                    shapes.push(egui::Shape::line_segment(
                        [
                            to_screen * origin,
                            to_screen * (origin + heading_vec(sensor_state.absolute_angle) * reach),
                        ],
                        egui::Stroke::new(1.0, color),
                    ));
                }
            }
        }

        // TRAINS DRAWING --------------------------------------------------------------------------
        for player_state in race_state.player_states.iter() {
            let color = player_color(player_state);
            let center = egui::Pos2::new(player_state.x as f32, player_state.y as f32);
            let forward = heading_vec(player_state.heading);
            let side = egui::Vec2::new(-forward.y, forward.x);

            match settings.train_mode {
                TrainMode::Sprite => {
                    let half_len = forward * (TRAIN_LENGTH / 2.0);
                    let half_width = side * (TRAIN_WIDTH / 2.0);
                    let corners = vec![
                        to_screen * (center + half_len + half_width),
                        to_screen * (center + half_len - half_width),
                        to_screen * (center - half_len - half_width),
                        to_screen * (center - half_len + half_width),
                    ];
                    shapes.push(egui::Shape::convex_polygon(
                        corners,
                        color,
                        egui::Stroke::new(1.0, egui::Color32::BLACK),
                    ));
                    // front marker
                    shapes.push(egui::Shape::circle_filled(
                        to_screen * (center + half_len),
                        (TRAIN_WIDTH / 4.0 * scale).max(1.5),
                        egui::Color32::WHITE,
                    ));
                }
                TrainMode::Line => {
                    shapes.push(egui::Shape::line_segment(
                        [
                            to_screen * center,
                            to_screen * (center + forward * TRAIN_LENGTH),
                        ],
                        egui::Stroke::new(2.0, color),
                    ));
                }
                TrainMode::Hidden => {}
            }
        }

        // SCORE PANEL -----------------------------------------------------------------------------
        // calculate current UI update duration, append it to the buffer, and set update time
        self.prev_update_durations
            .push(self.prev_update.elapsed().as_millis() as u32);
        self.prev_update = Instant::now();

        let mut header = format!(
            "Generation {}, turn {}",
            race_state.generation, race_state.turn
        );
        if let Some(fps) = race_state.fps {
            header.push_str(&format!(", {:.0} fps", fps));
        }
        if !settings.fps_limiter {
            header.push_str(" (unlimited)");
        }
        if let Some(fps_ui) = ui_fps(self.prev_update_durations.get_avg()) {
            header.push_str(&format!(", GUI {:.0} fps", fps_ui));
        }
        if race_state.final_result.is_some() {
            header.push_str(", finished");
        }

        let panel_origin = dest_rect.min + egui::Vec2::new(8.0, 8.0);
        shapes.push(egui::Shape::text(
            ui.fonts(),
            panel_origin,
            egui::Align2::LEFT_TOP,
            &header,
            egui::TextStyle::Body,
            egui::Color32::WHITE,
        ));

        for (row, line) in score_lines(&race_state.player_states).iter().enumerate() {
            shapes.push(egui::Shape::text(
                ui.fonts(),
                panel_origin + egui::Vec2::new(0.0, (row + 1) as f32 * LINE_HEIGHT),
                egui::Align2::LEFT_TOP,
                &line.0,
                egui::TextStyle::Monospace,
                line.1,
            ));
        }

        shapes.push(egui::Shape::text(
            ui.fonts(),
            egui::Pos2::new(dest_rect.min.x + 8.0, dest_rect.max.y - 8.0),
            egui::Align2::LEFT_BOTTOM,
            "1: trains  2: sensors  3: background  4: fps limiter  arrows: drive",
            egui::TextStyle::Small,
            egui::Color32::from_gray(220),
        ));

        // DRAWING ---------------------------------------------------------------------------------
        // update shapes in UI painter and return response
        painter.extend(shapes);
        response
    }
}

impl epi::App for RaceView {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::CtxRef, frame: &mut epi::Frame<'_>) {
        // update engine interface
        self.trainsim_interface.update();
        self.forward_keys(ctx);

        let textures = self.alloc_textures(frame);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::dark_canvas(ui.style()).show(ui, |ui| {
                self.set_ui_content(ui, textures);
            });
        });

        // request repaint of the UI
        ctx.request_repaint();
    }

    fn on_exit(&mut self) {
        self.trainsim_interface.quit();
    }

    fn name(&self) -> &str {
        "Train-a-Train"
    }
}

// -------------------------------------------------------------------------------------------------
// HELPERS -----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// map_key translates the keys the engine knows about.
pub fn map_key(key: egui::Key) -> Option<Key> {
    use egui::Key as K;

    let mapped = match key {
        K::ArrowUp => Key::Up,
        K::ArrowDown => Key::Down,
        K::ArrowLeft => Key::Left,
        K::ArrowRight => Key::Right,
        K::Space => Key::Space,
        K::Escape => Key::Escape,
        K::Num0 => Key::Digit(0),
        K::Num1 => Key::Digit(1),
        K::Num2 => Key::Digit(2),
        K::Num3 => Key::Digit(3),
        K::Num4 => Key::Digit(4),
        K::Num5 => Key::Digit(5),
        K::Num6 => Key::Digit(6),
        K::Num7 => Key::Digit(7),
        K::Num8 => Key::Digit(8),
        K::Num9 => Key::Digit(9),
        K::A => Key::Letter('a'),
        K::B => Key::Letter('b'),
        K::C => Key::Letter('c'),
        K::D => Key::Letter('d'),
        K::E => Key::Letter('e'),
        K::F => Key::Letter('f'),
        K::G => Key::Letter('g'),
        K::H => Key::Letter('h'),
        K::I => Key::Letter('i'),
        K::J => Key::Letter('j'),
        K::K => Key::Letter('k'),
        K::L => Key::Letter('l'),
        K::M => Key::Letter('m'),
        K::N => Key::Letter('n'),
        K::O => Key::Letter('o'),
        K::P => Key::Letter('p'),
        K::Q => Key::Letter('q'),
        K::R => Key::Letter('r'),
        K::S => Key::Letter('s'),
        K::T => Key::Letter('t'),
        K::U => Key::Letter('u'),
        K::V => Key::Letter('v'),
        K::W => Key::Letter('w'),
        K::X => Key::Letter('x'),
        K::Y => Key::Letter('y'),
        K::Z => Key::Letter('z'),
        _ => return None,
    };
    Some(mapped)
}

/// distance_color maps a score to a green (close to the finish) to red (far away) gradient.
/// Walls and unreachable pixels are black.
pub fn distance_color(score: u32, max_score: u32) -> egui::Color32 {
    if score == UNREACHABLE {
        return egui::Color32::BLACK;
    }

    let frac = if max_score == 0 {
        0.0
    } else {
        (score as f32 / max_score as f32).min(1.0)
    };
    egui::Color32::from_rgb((255.0 * frac) as u8, (255.0 * (1.0 - frac)) as u8, 40)
}

/// ui_fps converts the average UI update duration in ms into a frame rate.
fn ui_fps(avg_update_duration: Option<f64>) -> Option<f64> {
    avg_update_duration.map(|t_ms| 1000.0 / t_ms.max(1.0))
}

/// Unit vector in screen coordinates for a heading in degrees (0 up, clockwise).
fn heading_vec(heading: f64) -> egui::Vec2 {
    let heading_rad = (heading - 90.0).to_radians();
    egui::Vec2::new(heading_rad.cos() as f32, heading_rad.sin() as f32)
}

fn is_running(player_state: &PlayerState) -> bool {
    player_state.status == PlayerStatus::Running
}

fn player_color(player_state: &PlayerState) -> egui::Color32 {
    let c = player_state.color;
    if is_running(player_state) {
        egui::Color32::from_rgb(c.r, c.g, c.b)
    } else {
        // dead players are drawn dimmed
        egui::Color32::from_rgb(c.r / 2, c.g / 2, c.b / 2)
    }
}

/// score_lines returns one text line per player, best score first.
fn score_lines(player_states: &[PlayerState]) -> Vec<(String, egui::Color32)> {
    let scores: Vec<u32> = player_states.iter().map(|p| p.score).collect();

    argsort(&scores, SortOrder::Ascending)
        .into_iter()
        .map(|idx| {
            let p = &player_states[idx];
            let score = if p.score == UNREACHABLE {
                String::from("-")
            } else {
                p.score.to_string()
            };
            let status = match p.status {
                PlayerStatus::Running => String::new(),
                PlayerStatus::Crashed { turn } => format!(" crashed ({})", turn),
                PlayerStatus::Finished { turn } => format!(" finished ({})", turn),
            };
            (
                format!("{:>3} {:<8} {:>5}{}", p.id, p.name, score, status),
                egui::Color32::from_rgb(p.color.r, p.color.g, p.color.b),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trainsim::interfaces::gui_interface::RgbColor;

    fn player_state(id: u32, score: u32, status: PlayerStatus) -> PlayerState {
        PlayerState {
            id,
            name: String::from("NaiveAi"),
            color: RgbColor {
                r: 200,
                g: 120,
                b: 100,
            },
            x: 0.0,
            y: 0.0,
            heading: 90.0,
            speed: 0.0,
            status,
            score,
            sensor_states: vec![],
        }
    }

    #[test]
    fn maps_arrow_and_digit_keys() {
        assert_eq!(map_key(egui::Key::ArrowUp), Some(Key::Up));
        assert_eq!(map_key(egui::Key::Num3), Some(Key::Digit(3)));
        assert_eq!(map_key(egui::Key::R), Some(Key::Letter('r')));
        assert_eq!(map_key(egui::Key::Tab), None);
    }

    #[test]
    fn distance_gradient_runs_from_green_to_red() {
        assert_eq!(distance_color(0, 100), egui::Color32::from_rgb(0, 255, 40));
        assert_eq!(distance_color(100, 100), egui::Color32::from_rgb(255, 0, 40));
        assert_eq!(distance_color(UNREACHABLE, 100), egui::Color32::BLACK);
        assert_eq!(distance_color(0, 0), egui::Color32::from_rgb(0, 255, 40));
    }

    #[test]
    fn ui_fps_follows_average_update_duration() {
        let mut durations = RingBuffer::new(10);
        assert_eq!(ui_fps(durations.get_avg()), None);

        for t_ms in [20u32, 20, 20] {
            durations.push(t_ms);
        }
        assert_eq!(ui_fps(durations.get_avg()), Some(50.0));

        // sub-millisecond updates are capped at 1000 fps
        assert_eq!(ui_fps(Some(0.0)), Some(1000.0));
    }

    #[test]
    fn heading_vec_points_right_at_90_degrees() {
        let v = heading_vec(90.0);
        assert!((v.x - 1.0).abs() < 1e-6 && v.y.abs() < 1e-6);

        let v = heading_vec(180.0);
        assert!(v.x.abs() < 1e-6 && (v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn score_lines_are_sorted_by_score() {
        let states = vec![
            player_state(0, 50, PlayerStatus::Running),
            player_state(1, 0, PlayerStatus::Finished { turn: 30 }),
            player_state(2, UNREACHABLE, PlayerStatus::Crashed { turn: 2 }),
        ];

        let lines = score_lines(&states);

        assert!(lines[0].0.contains("finished (30)"));
        assert!(lines[1].0.trim_start().starts_with('0'));
        assert!(lines[2].0.contains("crashed (2)"));
    }
}
