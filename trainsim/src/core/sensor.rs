use crate::core::track::{Position, Track};

/// Default distance in pixels between two samples along a sensor ray.
pub const SENSOR_STEP: f64 = 0.5;

/// DistanceSensor is a linear ray-cast probe mounted on a player.
/// * `angle` - (deg) Offset relative to the player heading
/// * `depth` - (px) Maximum probe distance
/// * `step` - (px) Sampling distance along the ray
/// * `percept` - (px) Last reading, kept for visualisation
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSensor {
    pub angle: f64,
    pub depth: f64,
    pub step: f64,
    pub percept: Option<f64>,
}

impl DistanceSensor {
    pub fn new(angle: f64, depth: f64) -> DistanceSensor {
        DistanceSensor {
            angle,
            depth,
            step: SENSOR_STEP,
            percept: None,
        }
    }

    /// perceive updates the cached reading and returns it. The reading is the depth if no wall
    /// lies within reach.
    pub fn perceive(&mut self, track: &Track, position: Position, heading: f64) -> f64 {
        let percept =
            ray_trace_to_wall(track, position, heading + self.angle, self.depth, self.step)
                .unwrap_or(self.depth);
        self.percept = Some(percept);
        percept
    }

    /// Absolute ray direction for a player facing `heading`.
    pub fn absolute_angle(&self, heading: f64) -> f64 {
        heading + self.angle
    }
}

/// probe casts one ray per angle offset and returns the distance to the first wall pixel along
/// each ray, or `max_depth` if none is hit.
pub fn probe(
    track: &Track,
    position: Position,
    heading: f64,
    angle_offsets: &[f64],
    max_depth: f64,
    step: f64,
) -> Vec<f64> {
    angle_offsets
        .iter()
        .map(|offset| {
            ray_trace_to_wall(track, position, heading + offset, max_depth, step)
                .unwrap_or(max_depth)
        })
        .collect()
}

/// ray_trace_to_wall walks from `position` along `heading` in steps of `step` pixels and returns
/// the first sampled distance whose rounded pixel is a wall. Positions outside the track count as
/// walls.
pub fn ray_trace_to_wall(
    track: &Track,
    position: Position,
    heading: f64,
    max_depth: f64,
    step: f64,
) -> Option<f64> {
    if step.is_nan() || step <= 0.0 {
        return None;
    }

    let mut no_steps = 1u32;
    loop {
        let distance = no_steps as f64 * step;
        if distance > max_depth {
            return None;
        }

        let sample = Track::translate(position, distance, heading);
        if track.is_wall(Track::location_to_pixel(sample)) {
            return Some(distance);
        }
        no_steps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};

    // 60x20 open field with a wall column at x = 30
    fn wall_column_track() -> Track {
        let raw = RgbImage::from_fn(60, 20, |x, _| match x {
            30 => Rgb([255, 0, 0]),
            2 => Rgb([0, 255, 0]),
            55 => Rgb([0, 0, 255]),
            _ => Rgb([0, 0, 0]),
        });
        Track::from_images("wall-column", raw.clone(), raw).unwrap()
    }

    #[test]
    fn reads_distance_to_wall_within_one_step() {
        let track = wall_column_track();

        let readings = probe(&track, (10.0, 10.0), 90.0, &[0.0], 60.0, SENSOR_STEP);

        // the wall column begins at 29.5 after rounding, so the reading is quantised by the step
        assert_abs_diff_eq!(readings[0], 20.0, epsilon = SENSOR_STEP);
    }

    #[test]
    fn returns_depth_without_a_wall_in_reach() {
        let track = wall_column_track();

        let readings = probe(&track, (10.0, 10.0), 90.0, &[0.0], 15.0, SENSOR_STEP);
        assert_abs_diff_eq!(readings[0], 15.0);

        let mut sensor = DistanceSensor::new(0.0, 15.0);
        assert_eq!(sensor.percept, None);
        let percept = sensor.perceive(&track, (10.0, 10.0), 90.0);
        assert_abs_diff_eq!(percept, 15.0);
        assert_eq!(sensor.percept, Some(15.0));
    }

    #[test]
    fn out_of_bounds_counts_as_wall() {
        let track = wall_column_track();

        // heading 0 points up, the top edge is 10 px away
        let readings = probe(&track, (10.0, 10.0), 0.0, &[0.0], 60.0, SENSOR_STEP);
        assert_abs_diff_eq!(readings[0], 10.5, epsilon = SENSOR_STEP);
    }

    #[test]
    fn offsets_are_relative_to_the_heading() {
        let track = wall_column_track();

        // facing up, +90 looks right towards the wall and -90 looks left towards the image edge
        let readings = probe(&track, (10.0, 10.0), 0.0, &[-90.0, 90.0], 60.0, SENSOR_STEP);
        assert_abs_diff_eq!(readings[0], 10.5, epsilon = SENSOR_STEP);
        assert_abs_diff_eq!(readings[1], 20.0, epsilon = SENSOR_STEP);

        let sensor = DistanceSensor::new(30.0, 60.0);
        assert_abs_diff_eq!(sensor.absolute_angle(90.0), 120.0);
    }

    #[test]
    fn invalid_step_reads_full_depth() {
        let track = wall_column_track();

        for step in [0.0, -1.0, f64::NAN] {
            assert_eq!(ray_trace_to_wall(&track, (10.0, 10.0), 90.0, 60.0, step), None);

            let mut sensor = DistanceSensor::new(0.0, 60.0);
            sensor.step = step;
            assert_abs_diff_eq!(sensor.perceive(&track, (10.0, 10.0), 90.0), 60.0);
        }
    }

    #[test]
    fn probing_is_deterministic() {
        let track = wall_column_track();

        let offsets = [-30.0, 0.0, 30.0];
        let first = probe(&track, (12.3, 7.9), 75.0, &offsets, 50.0, SENSOR_STEP);
        let second = probe(&track, (12.3, 7.9), 75.0, &offsets, 50.0, SENSOR_STEP);
        assert_eq!(first, second);
    }
}
