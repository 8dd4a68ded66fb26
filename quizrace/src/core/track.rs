use crate::core::car::CarState;
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;

/// * `world_width` - (px) Width of the world plane
/// * `world_height` - (px) Height of the world plane
/// * `margin` - (px) Inset of the drivable bounds from the world edges
/// * `finish_y` - (px) Finish line, i.e. crossing below this y ends the race
/// * `start_x` - (px) Player start position x
/// * `start_y` - (px) Player start position y (near the bottom of the world)
/// * `start_rotation` - (rad) Initial heading, -pi/2 points towards the finish line
/// * `bot_grid_x` - (px) x position of the first bot on the starting grid
/// * `bot_grid_spacing` - (px) Distance between two bot grid positions
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackPars {
    pub world_width: f64,
    pub world_height: f64,
    pub margin: f64,
    pub finish_y: f64,
    pub start_x: f64,
    pub start_y: f64,
    pub start_rotation: f64,
    pub bot_grid_x: f64,
    pub bot_grid_spacing: f64,
}

impl Default for TrackPars {
    fn default() -> TrackPars {
        TrackPars {
            world_width: 1600.0,
            world_height: 2400.0,
            margin: 100.0,
            finish_y: 150.0,
            start_x: 200.0,
            start_y: 2300.0,
            start_rotation: -FRAC_PI_2,
            bot_grid_x: 300.0,
            bot_grid_spacing: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub world_width: f64,
    pub world_height: f64,
    pub finish_y: f64,
    pub start_x: f64,
    pub start_y: f64,
    pub start_rotation: f64,
    pub bot_grid_x: f64,
    pub bot_grid_spacing: f64,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub centerline_x: f64,
    pub progress_span: f64,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> Track {
        if track_pars.margin * 2.0 >= track_pars.world_width
            || track_pars.margin * 2.0 >= track_pars.world_height
        {
            panic!(
                "Track margin {} does not fit into the world {}x{}!",
                track_pars.margin, track_pars.world_width, track_pars.world_height
            );
        }

        if track_pars.finish_y >= track_pars.start_y {
            panic!(
                "Finish line y {} must lie above the start y {}!",
                track_pars.finish_y, track_pars.start_y
            );
        }

        // determine drivable bounds (inset from the world edges)
        let min_x = track_pars.margin;
        let max_x = track_pars.world_width - track_pars.margin;
        let min_y = track_pars.margin;
        let max_y = track_pars.world_height - track_pars.margin;

        // create track
        Track {
            world_width: track_pars.world_width,
            world_height: track_pars.world_height,
            finish_y: track_pars.finish_y,
            start_x: track_pars.start_x,
            start_y: track_pars.start_y,
            start_rotation: track_pars.start_rotation,
            bot_grid_x: track_pars.bot_grid_x,
            bot_grid_spacing: track_pars.bot_grid_spacing,
            min_x,
            max_x,
            min_y,
            max_y,
            centerline_x: track_pars.world_width / 2.0,
            progress_span: track_pars.start_y - track_pars.finish_y,
        }
    }

    /// The method clamps a car to the drivable bounds and returns true if any clamping
    /// happened (the caller decides about the speed penalty).
    pub fn clamp_to_bounds(&self, car: &mut CarState) -> bool {
        let mut clamped = false;

        if car.x < self.min_x {
            car.x = self.min_x;
            clamped = true;
        } else if car.x > self.max_x {
            car.x = self.max_x;
            clamped = true;
        }

        if car.y < self.min_y {
            car.y = self.min_y;
            clamped = true;
        } else if car.y > self.max_y {
            car.y = self.max_y;
            clamped = true;
        }

        clamped
    }

    /// The method checks if a car has crossed the finish line at the top of the world.
    pub fn crossed_finish(&self, car: &CarState) -> bool {
        car.y <= self.finish_y && car.x >= self.min_x && car.x <= self.max_x
    }

    /// The method returns the race progress in [0.0, 1.0] for a given y position.
    pub fn progress_of(&self, y: f64) -> f64 {
        ((self.start_y - y) / self.progress_span).clamp(0.0, 1.0)
    }

    /// The method returns the start state of the player car.
    pub fn player_start(&self) -> CarState {
        CarState::new(self.start_x, self.start_y, self.start_rotation)
    }

    /// The method returns the start state for the bot on grid position idx.
    pub fn bot_start(&self, idx: usize) -> CarState {
        CarState::new(
            self.bot_grid_x + idx as f64 * self.bot_grid_spacing,
            self.start_y,
            self.start_rotation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track() -> Track {
        Track::new(&TrackPars::default())
    }

    #[test]
    fn clamping_only_touches_cars_outside_the_bounds() {
        let track = track();

        let mut inside = CarState::new(800.0, 1200.0, 0.0);
        assert!(!track.clamp_to_bounds(&mut inside));
        assert_relative_eq!(inside.x, 800.0);
        assert_relative_eq!(inside.y, 1200.0);

        let mut outside = CarState::new(5000.0, -20.0, 0.0);
        assert!(track.clamp_to_bounds(&mut outside));
        assert_relative_eq!(outside.x, track.max_x);
        assert_relative_eq!(outside.y, track.min_y);
    }

    #[test]
    fn finish_line_requires_low_y_within_bounds() {
        let track = track();

        assert!(track.crossed_finish(&CarState::new(800.0, 150.0, 0.0)));
        assert!(track.crossed_finish(&CarState::new(800.0, 120.0, 0.0)));
        assert!(!track.crossed_finish(&CarState::new(800.0, 151.0, 0.0)));
        assert!(!track.crossed_finish(&CarState::new(20.0, 120.0, 0.0)));
    }

    #[test]
    fn progress_runs_from_start_to_finish() {
        let track = track();

        assert_relative_eq!(track.progress_of(track.start_y), 0.0);
        assert_relative_eq!(track.progress_of(track.finish_y), 1.0);
        assert_relative_eq!(track.progress_of(track.finish_y - 500.0), 1.0);

        let halfway = (track.start_y + track.finish_y) / 2.0;
        assert_relative_eq!(track.progress_of(halfway), 0.5);
    }

    #[test]
    #[should_panic]
    fn finish_above_start_is_rejected() {
        let mut track_pars = TrackPars::default();
        track_pars.finish_y = 2350.0;
        Track::new(&track_pars);
    }
}
