//! Simulation driver: release N particles, fly each to the ground and fold
//! the landings into one density grid.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::grid::{BoundsPolicy, DensityGrid, DEFAULT_EXTENT};
use crate::particle::{FlightConditions, Landing, Particle, Position};
use crate::rng::RngStreams;
use crate::wind::WindWeights;

/// Highest release altitude accepted, in metres.
pub const MAX_ALTITUDE: u32 = 10_000;

/// Largest grid accepted, in cells (5000 x 5000).
pub const MAX_GRID_CELLS: usize = 25_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub bounds: BoundsPolicy,
}

impl GridSpec {
    pub fn build(&self) -> DensityGrid {
        DensityGrid::with_policy(self.width, self.height, self.bounds)
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_EXTENT,
            height: DEFAULT_EXTENT,
            bounds: BoundsPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseParams {
    pub origin: Position,
    pub altitude: u32,
    pub weights: WindWeights,
    pub speed: u32,
    pub count: u32,
    pub seed: u64,
    pub grid: GridSpec,
    pub mode: ExecutionMode,
}

impl ReleaseParams {
    pub fn new(
        origin: Position,
        altitude: u32,
        weights: WindWeights,
        speed: u32,
        count: u32,
    ) -> Self {
        Self {
            origin,
            altitude,
            weights,
            speed,
            count,
            seed: 0,
            grid: GridSpec::default(),
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(SimError::invalid(format!(
                "grid extent must be non-zero, got {}x{}",
                self.grid.width, self.grid.height
            )));
        }
        match self.grid.width.checked_mul(self.grid.height) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(SimError::invalid(format!(
                    "grid extent {}x{} exceeds the {MAX_GRID_CELLS} cell ceiling",
                    self.grid.width, self.grid.height
                )));
            }
        }
        if self.speed == 0 {
            return Err(SimError::invalid("wind speed must be at least 1"));
        }
        if self.altitude > MAX_ALTITUDE {
            return Err(SimError::invalid(format!(
                "altitude {} exceeds the {MAX_ALTITUDE} m ceiling",
                self.altitude
            )));
        }
        let inside = (0..self.grid.width as i64).contains(&self.origin.x)
            && (0..self.grid.height as i64).contains(&self.origin.y);
        if !inside {
            return Err(SimError::invalid(format!(
                "origin ({}, {}) lies outside the {}x{} grid",
                self.origin.x, self.origin.y, self.grid.width, self.grid.height
            )));
        }
        // Re-check weights that were built field by field.
        WindWeights::new(
            self.weights.north,
            self.weights.south,
            self.weights.east,
            self.weights.west,
        )?;
        Ok(())
    }
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub grid: DensityGrid,
    /// Seconds airborne of the longest flight, 0 for an empty run.
    pub max_duration: u64,
    /// The flight behind `max_duration`; lowest particle id wins ties.
    pub longest: Option<Landing>,
    pub landed: u64,
    pub mean_distance: f64,
}

impl RunOutcome {
    pub fn rejected(&self) -> u64 {
        self.grid.rejected()
    }

    pub fn clamped(&self) -> u64 {
        self.grid.clamped()
    }
}

pub struct Simulation {
    params: ReleaseParams,
    conditions: FlightConditions,
    streams: RngStreams,
}

impl Simulation {
    pub fn new(params: ReleaseParams) -> SimResult<Self> {
        params.validate()?;
        let sampler = params.weights.sampler()?;
        let conditions = FlightConditions::new(sampler, params.speed)?;
        let streams = RngStreams::new(params.seed);
        Ok(Self {
            params,
            conditions,
            streams,
        })
    }

    pub fn run(&self) -> SimResult<RunOutcome> {
        let started = Instant::now();
        info!(
            particles = self.params.count,
            altitude = self.params.altitude,
            speed = self.params.speed,
            mode = ?self.params.mode,
            "starting release"
        );

        let tally = match self.params.mode {
            ExecutionMode::Sequential => self.run_sequential(),
            ExecutionMode::Parallel => self.run_parallel()?,
        };
        let outcome = tally.finish();

        if outcome.rejected() > 0 {
            warn!(
                rejected = outcome.rejected(),
                "landings fell outside the grid and were not counted"
            );
        }
        info!(
            landed = outcome.landed,
            max_duration_s = outcome.max_duration,
            clamped = outcome.clamped(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0,
            "release complete"
        );
        Ok(outcome)
    }

    fn run_sequential(&self) -> Tally {
        let mut tally = Tally::new(&self.params);
        for id in 0..self.params.count {
            tally.record(self.fly(id));
        }
        tally
    }

    fn run_parallel(&self) -> SimResult<Tally> {
        (0..self.params.count)
            .into_par_iter()
            .with_min_len(256)
            .fold(
                || Tally::new(&self.params),
                |mut tally, id| {
                    tally.record(self.fly(id));
                    tally
                },
            )
            .map(Ok::<Tally, SimError>)
            .try_reduce(|| Tally::new(&self.params), Tally::merge)
    }

    fn fly(&self, id: u32) -> Landing {
        let mut rng = self.streams.particle(id);
        let mut particle = Particle::new(id, self.params.origin, self.params.altitude);
        let landing = particle.fly(&self.conditions, &mut rng);
        debug!(
            particle = id,
            x = landing.position.x,
            y = landing.position.y,
            seconds = landing.elapsed,
            "particle landed"
        );
        landing
    }
}

/// Run a release with the given parameters.
pub fn run(params: ReleaseParams) -> SimResult<RunOutcome> {
    Simulation::new(params)?.run()
}

// Partial aggregate owned by one worker.
struct Tally {
    origin: Position,
    grid: DensityGrid,
    longest: Option<Landing>,
    landed: u64,
    distance_sum: f64,
}

impl Tally {
    fn new(params: &ReleaseParams) -> Self {
        Self {
            origin: params.origin,
            grid: params.grid.build(),
            longest: None,
            landed: 0,
            distance_sum: 0.0,
        }
    }

    fn record(&mut self, landing: Landing) {
        self.grid.accumulate(landing.position.x, landing.position.y);
        self.landed += 1;
        self.distance_sum += landing.position.distance_to(self.origin);
        self.longest = Some(longer(self.longest, landing));
    }

    fn merge(mut self, other: Tally) -> SimResult<Tally> {
        self.grid.merge(&other.grid)?;
        self.landed += other.landed;
        self.distance_sum += other.distance_sum;
        if let Some(candidate) = other.longest {
            self.longest = Some(longer(self.longest, candidate));
        }
        Ok(self)
    }

    fn finish(self) -> RunOutcome {
        let mean_distance = if self.landed == 0 {
            0.0
        } else {
            self.distance_sum / self.landed as f64
        };
        RunOutcome {
            max_duration: self.longest.map(|l| l.elapsed).unwrap_or(0),
            longest: self.longest,
            landed: self.landed,
            mean_distance,
            grid: self.grid,
        }
    }
}

// Longer flight wins; equal flights go to the lower id whatever the merge order.
fn longer(current: Option<Landing>, candidate: Landing) -> Landing {
    match current {
        Some(best)
            if best.elapsed > candidate.elapsed
                || (best.elapsed == candidate.elapsed && best.particle_id < candidate.particle_id) =>
        {
            best
        }
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(altitude: u32, count: u32) -> ReleaseParams {
        ReleaseParams::new(
            Position::new(250, 250),
            altitude,
            WindWeights::uniform(),
            1,
            count,
        )
        .with_seed(17)
    }

    #[test]
    fn ground_release_stacks_on_origin() {
        let outcome = run(params(0, 1)).unwrap();
        assert_eq!(outcome.grid.get(250, 250), Some(1));
        assert_eq!(outcome.grid.total(), 1);
        assert_eq!(outcome.max_duration, 0);
        assert_eq!(outcome.longest.map(|l| l.particle_id), Some(0));
    }

    #[test]
    fn empty_release_has_no_longest_flight() {
        let outcome = run(params(80, 0)).unwrap();
        assert_eq!(outcome.grid.total(), 0);
        assert_eq!(outcome.max_duration, 0);
        assert!(outcome.longest.is_none());
        assert_eq!(outcome.mean_distance, 0.0);
    }

    #[test]
    fn every_particle_is_accounted_for() {
        let outcome = run(params(120, 400)).unwrap();
        assert_eq!(outcome.landed, 400);
        assert_eq!(outcome.grid.total() + outcome.rejected(), 400);
    }

    #[test]
    fn invalid_origin_fails_before_running() {
        let mut bad = params(10, 10);
        bad.origin = Position::new(500, 3);
        assert!(matches!(run(bad), Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn invalid_speed_and_altitude_fail() {
        let mut bad = params(10, 10);
        bad.speed = 0;
        assert!(run(bad).is_err());

        let bad = params(MAX_ALTITUDE + 1, 10);
        assert!(run(bad).is_err());

        let mut bad = params(10, 10);
        bad.weights.east = -2.0;
        assert!(run(bad).is_err());
    }

    #[test]
    fn oversized_grid_fails_before_running() {
        let overflowing = params(0, 1).with_grid(GridSpec {
            width: 1 << 40,
            height: 1 << 25,
            bounds: BoundsPolicy::Reject,
        });
        assert!(matches!(
            Simulation::new(overflowing),
            Err(SimError::InvalidParameter(_))
        ));

        let huge = params(0, 1).with_grid(GridSpec {
            width: 10_000_000,
            height: 10_000_000,
            bounds: BoundsPolicy::Reject,
        });
        assert!(run(huge).is_err());

        let largest = params(0, 1).with_grid(GridSpec {
            width: 5_000,
            height: 5_000,
            bounds: BoundsPolicy::Reject,
        });
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn ties_go_to_the_lowest_id() {
        let first = Landing {
            particle_id: 3,
            position: Position::new(0, 0),
            elapsed: 9,
        };
        let second = Landing {
            particle_id: 1,
            ..first
        };
        let shorter = Landing {
            particle_id: 0,
            elapsed: 4,
            ..first
        };
        assert_eq!(longer(Some(first), second).particle_id, 1);
        assert_eq!(longer(Some(second), first).particle_id, 1);
        assert_eq!(longer(Some(first), shorter).particle_id, 3);
        assert_eq!(longer(None, shorter).particle_id, 0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let base = params(90, 300).with_seed(5);
        let sequential = run(base.clone()).unwrap();
        let parallel = run(base.with_mode(ExecutionMode::Parallel)).unwrap();
        assert_eq!(sequential.grid, parallel.grid);
        assert_eq!(sequential.max_duration, parallel.max_duration);
        assert_eq!(sequential.longest, parallel.longest);
        assert!((sequential.mean_distance - parallel.mean_distance).abs() < 1e-9);
    }
}
