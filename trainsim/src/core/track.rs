use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Score of pixels that cannot reach the finish (walls and enclosed pockets).
pub const UNREACHABLE: u32 = u32::MAX;

/// Channel value from which a colour channel counts as "on" when classifying pixels.
pub const CHANNEL_THRESHOLD: u8 = 128;

/// Continuous position in track pixel coordinates (x to the right, y downwards).
pub type Position = (f64, f64);

/// Integer pixel coordinate. Signed because rounded positions may lie outside the track.
pub type Pixel = (i64, i64);

/// AssetLoadError is returned if a track folder or one of its images is missing or corrupt.
#[derive(Debug, Clone)]
pub struct AssetLoadError {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for AssetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Failed to load track asset {}: {}",
            self.path.display(),
            self.reason
        )
    }
}

impl Error for AssetLoadError {}

/// TrackDefinitionError is returned if a track image lacks a start or a finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackDefinitionError {
    NoStart,
    NoFinish,
}

impl fmt::Display for TrackDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackDefinitionError::NoStart => {
                write!(f, "Track has no start pixel (green channel >= 128)")
            }
            TrackDefinitionError::NoFinish => {
                write!(f, "Track has no finish pixel (blue channel >= 128)")
            }
        }
    }
}

impl Error for TrackDefinitionError {}

/// Logical layer a single pixel of `track.png` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelKind {
    Drivable,
    Wall,
    Start,
    Finish,
}

impl PixelKind {
    /// classify maps a track colour to its layer. Red marks walls, blue marks the finish and
    /// green marks start candidates; anything else (black in authored tracks) is drivable.
    pub fn classify(rgb: [u8; 3]) -> PixelKind {
        let [r, g, b] = rgb;

        if r >= CHANNEL_THRESHOLD {
            PixelKind::Wall
        } else if b >= CHANNEL_THRESHOLD {
            PixelKind::Finish
        } else if g >= CHANNEL_THRESHOLD {
            PixelKind::Start
        } else {
            PixelKind::Drivable
        }
    }
}

/// Track holds the collision layers, the start position and the distance-to-finish raster of a
/// racing map. It is immutable after loading.
#[derive(Debug)]
pub struct Track {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub start: (usize, usize),
    walls: Vec<bool>,
    finish: Vec<bool>,
    scores: Vec<u32>,
    max_score: u32,
    raw: RgbImage,
    background: RgbImage,
}

impl Track {
    /// load reads `<tracks_dir>/<name>/track.png` (collision, start and finish) and
    /// `<tracks_dir>/<name>/track_bg.png` (background for drawing only).
    pub fn load(tracks_dir: &Path, name: &str) -> anyhow::Result<Track> {
        let track_dir = tracks_dir.join(name);

        if !track_dir.is_dir() {
            return Err(AssetLoadError {
                path: track_dir,
                reason: String::from("track folder does not exist"),
            }
            .into());
        }

        let raw = read_image(&track_dir.join("track.png"))?;
        let background = read_image(&track_dir.join("track_bg.png"))?;

        let track = Track::from_images(name, raw, background)?;
        tracing::info!(
            "Loaded track {} ({}x{} px, start at {:?})",
            track.name,
            track.width,
            track.height,
            track.start
        );
        Ok(track)
    }

    /// from_images builds a track from already decoded images. Both images must have the same
    /// dimensions.
    pub fn from_images(name: &str, raw: RgbImage, background: RgbImage) -> anyhow::Result<Track> {
        if raw.dimensions() != background.dimensions() {
            return Err(AssetLoadError {
                path: PathBuf::from(name).join("track_bg.png"),
                reason: format!(
                    "background is {:?} px but track is {:?} px",
                    background.dimensions(),
                    raw.dimensions()
                ),
            }
            .into());
        }

        let width = raw.width() as usize;
        let height = raw.height() as usize;
        let mut walls = vec![false; width * height];
        let mut finish = vec![false; width * height];

        for (x, y, pixel) in raw.enumerate_pixels() {
            let idx = y as usize * width + x as usize;
            match PixelKind::classify(pixel.0) {
                PixelKind::Wall => walls[idx] = true,
                PixelKind::Finish => finish[idx] = true,
                _ => {}
            }
        }

        if !finish.iter().any(|&f| f) {
            return Err(TrackDefinitionError::NoFinish.into());
        }

        // column-major scan, the first start candidate wins
        let mut start = None;
        'scan: for x in 0..width {
            for y in 0..height {
                let pixel = raw.get_pixel(x as u32, y as u32);
                if PixelKind::classify(pixel.0) == PixelKind::Start {
                    start = Some((x, y));
                    break 'scan;
                }
            }
        }
        let start = start.ok_or(TrackDefinitionError::NoStart)?;

        let scores = calc_score_raster(width, height, &walls, &finish);
        let max_score = scores
            .iter()
            .copied()
            .filter(|&s| s != UNREACHABLE)
            .max()
            .unwrap_or(0);

        Ok(Track {
            name: name.to_owned(),
            width,
            height,
            start,
            walls,
            finish,
            scores,
            max_score,
            raw,
            background,
        })
    }

    /// from_ascii is a quick way to author small tracks in code: `#` is a wall, `S` a start
    /// candidate, `F` finish and every other character drivable surface. All rows must have the
    /// same length.
    pub fn from_ascii(name: &str, rows: &[&str]) -> anyhow::Result<Track> {
        let height = rows.len();
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);

        if rows.iter().any(|row| row.chars().count() != width) {
            anyhow::bail!("All rows of ASCII track {} must have the same length", name);
        }

        let mut raw = RgbImage::new(width as u32, height as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let color = match c {
                    '#' => Rgb([255, 0, 0]),
                    'S' => Rgb([0, 255, 0]),
                    'F' => Rgb([0, 0, 255]),
                    _ => Rgb([0, 0, 0]),
                };
                raw.put_pixel(x as u32, y as u32, color);
            }
        }

        let background = raw.clone();
        Track::from_images(name, raw, background)
    }

    // ---------------------------------------------------------------------------------------------
    // QUERIES -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn pixel_index(&self, pixel: Pixel) -> Option<usize> {
        let (x, y) = pixel;
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    /// is_wall checks whether the pixel blocks a player. Pixels outside the image count as
    /// walls.
    pub fn is_wall(&self, pixel: Pixel) -> bool {
        self.pixel_index(pixel).map_or(true, |idx| self.walls[idx])
    }

    pub fn is_finish(&self, pixel: Pixel) -> bool {
        self.pixel_index(pixel).map_or(false, |idx| self.finish[idx])
    }

    /// score_at returns the number of pixel steps to the nearest finish pixel, or None for walls,
    /// pixels outside the track and pockets that cannot reach the finish.
    pub fn score_at(&self, pixel: Pixel) -> Option<u32> {
        self.pixel_index(pixel)
            .map(|idx| self.scores[idx])
            .filter(|&score| score != UNREACHABLE)
    }

    /// Raw score including the `UNREACHABLE` sentinel, for pixels inside the track.
    pub fn raw_score(&self, x: usize, y: usize) -> u32 {
        self.scores[y * self.width + x]
    }

    /// Largest reachable score on the track.
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    pub fn start_position(&self) -> Position {
        (self.start.0 as f64, self.start.1 as f64)
    }

    /// Image the collision layers were parsed from.
    pub fn raw(&self) -> &RgbImage {
        &self.raw
    }

    pub fn background(&self) -> &RgbImage {
        &self.background
    }

    // ---------------------------------------------------------------------------------------------
    // GEOMETRY ------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// translate moves a position by a distance along a heading in degrees. A heading of 0 points
    /// up, 90 to the right, i.e. headings turn clockwise on screen.
    pub fn translate(position: Position, distance: f64, heading: f64) -> Position {
        let heading_rad = (heading - 90.0).to_radians();
        (
            position.0 + heading_rad.cos() * distance,
            position.1 + heading_rad.sin() * distance,
        )
    }

    /// location_to_pixel rounds a continuous position to the pixel it lies on.
    pub fn location_to_pixel(position: Position) -> Pixel {
        (position.0.round() as i64, position.1.round() as i64)
    }
}

fn read_image(path: &Path) -> Result<RgbImage, AssetLoadError> {
    if !path.is_file() {
        return Err(AssetLoadError {
            path: path.to_path_buf(),
            reason: String::from("file does not exist"),
        });
    }

    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| AssetLoadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// calc_score_raster runs a breadth-first search from all finish pixels over 4-connected
/// non-wall pixels. Finish pixels score 0, every step away adds 1.
fn calc_score_raster(width: usize, height: usize, walls: &[bool], finish: &[bool]) -> Vec<u32> {
    let mut scores = vec![UNREACHABLE; width * height];
    let mut queue = VecDeque::new();

    for (idx, &is_finish) in finish.iter().enumerate() {
        if is_finish {
            scores[idx] = 0;
            queue.push_back(idx);
        }
    }

    while let Some(idx) = queue.pop_front() {
        let (x, y) = (idx % width, idx / width);
        let score_next = scores[idx] + 1;

        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];

        for &(x_next, y_next) in neighbours.iter() {
            if x_next >= width || y_next >= height {
                continue;
            }
            let idx_next = y_next * width + x_next;
            if walls[idx_next] || scores[idx_next] != UNREACHABLE {
                continue;
            }
            scores[idx_next] = score_next;
            queue.push_back(idx_next);
        }
    }

    scores
}
