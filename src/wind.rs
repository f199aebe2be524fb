//! Wind direction weighting.
//!
//! Two balance sliders (north/south and west/east, each 0..=100) are turned
//! into four relative weights. Raising a balance to the fifth power makes
//! any deviation from 50 dominate the draw, which reads as a prevailing wind
//! rather than a linear blend.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub const BALANCE_MAX: f64 = 100.0;
const WEIGHT_EXPONENT: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Draw order used by [`DirectionSampler`]; matches the field order of
    /// [`WindWeights`].
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Unit step on the (x, y) plane. North increases y, east increases x.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindWeights {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl WindWeights {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> SimResult<Self> {
        let weights = Self {
            north,
            south,
            east,
            west,
        };
        for (direction, value) in Direction::ALL.iter().zip(weights.as_array()) {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::invalid(format!(
                    "{direction:?} weight must be a non-negative finite number, got {value}"
                )));
            }
        }
        if weights.as_array().iter().all(|w| *w == 0.0) {
            return Err(SimError::invalid("at least one wind weight must be positive"));
        }
        Ok(weights)
    }

    /// Derive weights from the two balance inputs.
    ///
    /// `north_south` at 100 sends everything south, at 0 everything north;
    /// `west_east` at 100 sends everything east.
    pub fn from_balance(north_south: f64, west_east: f64) -> SimResult<Self> {
        let ns = check_balance("north_south", north_south)?;
        let ew = check_balance("west_east", west_east)?;
        Ok(Self {
            north: (BALANCE_MAX - ns).powi(WEIGHT_EXPONENT),
            south: ns.powi(WEIGHT_EXPONENT),
            east: ew.powi(WEIGHT_EXPONENT),
            west: (BALANCE_MAX - ew).powi(WEIGHT_EXPONENT),
        })
    }

    pub fn uniform() -> Self {
        Self {
            north: 1.0,
            south: 1.0,
            east: 1.0,
            west: 1.0,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.north, self.south, self.east, self.west]
    }

    pub fn sampler(&self) -> SimResult<DirectionSampler> {
        DirectionSampler::new(self)
    }
}

fn check_balance(name: &str, value: f64) -> SimResult<f64> {
    if value.is_nan() || !(0.0..=BALANCE_MAX).contains(&value) {
        return Err(SimError::invalid(format!(
            "{name} balance must be within 0..=100, got {value}"
        )));
    }
    Ok(value)
}

/// Weighted categorical draw over the four directions, built once per run
/// and shared read-only by every particle.
#[derive(Debug, Clone)]
pub struct DirectionSampler {
    index: WeightedIndex<f64>,
}

impl DirectionSampler {
    pub fn new(weights: &WindWeights) -> SimResult<Self> {
        let index = WeightedIndex::new(weights.as_array())
            .map_err(|err| SimError::invalid(format!("wind weights rejected: {err}")))?;
        Ok(Self { index })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        Direction::ALL[self.index.sample(rng)]
    }
}
