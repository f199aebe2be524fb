//! Single-particle flight model.
//!
//! Each simulated second a particle first moves vertically, then maybe
//! drifts horizontally with the wind, then ages by one second. Above the
//! obstruction height the vertical move is a three-way draw (fall, hold,
//! rise); below it the particle falls a metre every second.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::wind::DirectionSampler;

/// Altitude (m) at and above which turbulence applies.
pub const TURBULENCE_FLOOR: u32 = 75;
const DESCENT_BELOW: f64 = 0.7;
const ASCENT_ABOVE: f64 = 0.8;
const DRIFT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Airborne,
    Landed,
}

/// Terminal record of one particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landing {
    pub particle_id: u32,
    pub position: Position,
    pub elapsed: u64,
}

/// Per-run constants every particle reads.
#[derive(Debug, Clone)]
pub struct FlightConditions {
    sampler: DirectionSampler,
    speed: u32,
}

impl FlightConditions {
    pub fn new(sampler: DirectionSampler, speed: u32) -> SimResult<Self> {
        if speed == 0 {
            return Err(SimError::invalid("wind speed must be at least 1"));
        }
        Ok(Self { sampler, speed })
    }

    fn drift_threshold(&self) -> f64 {
        DRIFT_THRESHOLD / f64::from(self.speed)
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    id: u32,
    position: Position,
    altitude: u32,
    elapsed: u64,
    state: FlightState,
}

impl Particle {
    pub fn new(id: u32, origin: Position, altitude: u32) -> Self {
        let state = if altitude == 0 {
            FlightState::Landed
        } else {
            FlightState::Airborne
        };
        Self {
            id,
            position: origin,
            altitude,
            elapsed: 0,
            state,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn altitude(&self) -> u32 {
        self.altitude
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    /// Advance one simulated second. Does nothing once landed.
    pub fn step<R: Rng + ?Sized>(&mut self, conditions: &FlightConditions, rng: &mut R) {
        if self.state == FlightState::Landed {
            return;
        }

        self.altitude = next_altitude(self.altitude, rng);
        self.drift(conditions, rng);
        self.elapsed += 1;

        if self.altitude == 0 {
            self.state = FlightState::Landed;
        }
    }

    /// Run the particle until it touches the ground.
    pub fn fly<R: Rng + ?Sized>(&mut self, conditions: &FlightConditions, rng: &mut R) -> Landing {
        while self.state == FlightState::Airborne {
            self.step(conditions, rng);
        }
        self.landing()
    }

    pub fn landing(&self) -> Landing {
        Landing {
            particle_id: self.id,
            position: self.position,
            elapsed: self.elapsed,
        }
    }

    fn drift<R: Rng + ?Sized>(&mut self, conditions: &FlightConditions, rng: &mut R) {
        if rng.gen::<f64>() <= conditions.drift_threshold() {
            return;
        }
        let direction = conditions.sampler.draw(rng);
        let magnitude = i64::from(rng.gen_range(1..=conditions.speed));
        let (dx, dy) = direction.offset();
        self.position.x += dx * magnitude;
        self.position.y += dy * magnitude;
    }
}

fn next_altitude<R: Rng + ?Sized>(altitude: u32, rng: &mut R) -> u32 {
    if altitude < TURBULENCE_FLOOR {
        return altitude - 1;
    }
    let roll = rng.gen::<f64>();
    if roll < DESCENT_BELOW {
        altitude - 1
    } else if roll > ASCENT_ABOVE {
        altitude + 1
    } else {
        altitude
    }
}
