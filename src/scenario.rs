use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    engine::{ExecutionMode, GridSpec, ReleaseParams},
    grid::{BoundsPolicy, DEFAULT_EXTENT},
    particle::Position,
    site,
    wind::WindWeights,
};

fn default_particles() -> u32 {
    5_000
}

fn default_altitude() -> u32 {
    75
}

fn default_north_south() -> f64 {
    50.0
}

fn default_west_east() -> f64 {
    95.0
}

fn default_speed() -> u32 {
    1
}

fn default_extent() -> usize {
    DEFAULT_EXTENT
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_particles")]
    pub particles: u32,
    #[serde(default = "default_altitude")]
    pub altitude: u32,
    #[serde(default)]
    pub wind: WindConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub origin: Option<OriginConfig>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory the scenario was read from; `site` paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindConfig {
    #[serde(default = "default_north_south")]
    pub north_south: f64,
    #[serde(default = "default_west_east")]
    pub west_east: f64,
    #[serde(default = "default_speed")]
    pub speed: u32,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            north_south: default_north_south(),
            west_east: default_west_east(),
            speed: default_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_extent")]
    pub width: usize,
    #[serde(default = "default_extent")]
    pub height: usize,
    #[serde(default)]
    pub bounds: BoundsPolicy,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: default_extent(),
            height: default_extent(),
            bounds: BoundsPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OriginConfig {
    Point { x: i64, y: i64 },
    Site { site: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Per-run tweaks layered over a loaded scenario (CLI flags, query strings).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Overrides {
    pub particles: Option<u32>,
    pub seed: Option<u64>,
    pub altitude: Option<u32>,
    pub north_south: Option<f64>,
    pub west_east: Option<f64>,
    pub speed: Option<u32>,
    pub parallel: Option<bool>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        Ok(scenario)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(particles) = overrides.particles {
            self.particles = particles;
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        if let Some(altitude) = overrides.altitude {
            self.altitude = altitude;
        }
        if let Some(ns) = overrides.north_south {
            self.wind.north_south = ns;
        }
        if let Some(ew) = overrides.west_east {
            self.wind.west_east = ew;
        }
        if let Some(speed) = overrides.speed {
            self.wind.speed = speed;
        }
        if let Some(parallel) = overrides.parallel {
            self.parallel = parallel;
        }
    }

    /// Release point: the explicit point, the marker of the site raster, or
    /// the grid centre when the scenario names neither.
    pub fn origin(&self) -> Result<Position> {
        match &self.origin {
            Some(OriginConfig::Point { x, y }) => Ok(Position::new(*x, *y)),
            Some(OriginConfig::Site { site: raster }) => {
                let path = self.base_dir.join(raster);
                site::load_release_site(&path)
                    .with_context(|| format!("Failed to locate release site in {}", path.display()))
            }
            None => Ok(Position::new(
                (self.grid.width / 2) as i64,
                (self.grid.height / 2) as i64,
            )),
        }
    }

    pub fn release_params(&self) -> Result<ReleaseParams> {
        let weights = WindWeights::from_balance(self.wind.north_south, self.wind.west_east)?;
        let mode = if self.parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        let params = ReleaseParams::new(
            self.origin()?,
            self.altitude,
            weights,
            self.wind.speed,
            self.particles,
        )
        .with_seed(self.seed)
        .with_grid(GridSpec {
            width: self.grid.width,
            height: self.grid.height,
            bounds: self.grid.bounds,
        })
        .with_mode(mode);
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_takes_release_defaults() {
        let scenario = Scenario::from_yaml("name: minimal\n").unwrap();
        assert_eq!(scenario.particles, 5_000);
        assert_eq!(scenario.altitude, 75);
        assert_eq!(scenario.wind.north_south, 50.0);
        assert_eq!(scenario.wind.west_east, 95.0);
        assert_eq!(scenario.wind.speed, 1);
        assert_eq!(scenario.grid.width, 500);
        assert_eq!(scenario.grid.bounds, BoundsPolicy::Reject);
        assert_eq!(scenario.logging.level, "info");
        assert!(!scenario.parallel);

        let params = scenario.release_params().unwrap();
        assert_eq!(params.origin, Position::new(250, 250));
        assert_eq!(params.mode, ExecutionMode::Sequential);
    }

    #[test]
    fn point_origin_and_clamp_policy_parse() {
        let yaml = "name: pt\norigin:\n  x: 12\n  y: 40\ngrid:\n  width: 64\n  height: 64\n  bounds: clamp\n";
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let params = scenario.release_params().unwrap();
        assert_eq!(params.origin, Position::new(12, 40));
        assert_eq!(params.grid.bounds, BoundsPolicy::Clamp);
    }

    #[test]
    fn overrides_replace_fields() {
        let mut scenario = Scenario::from_yaml("name: o\n").unwrap();
        scenario.apply(&Overrides {
            particles: Some(10),
            north_south: Some(100.0),
            parallel: Some(true),
            ..Overrides::default()
        });
        let params = scenario.release_params().unwrap();
        assert_eq!(params.count, 10);
        assert_eq!(params.weights.north, 0.0);
        assert_eq!(params.mode, ExecutionMode::Parallel);
    }

    #[test]
    fn out_of_range_balance_is_rejected() {
        let scenario = Scenario::from_yaml("name: bad\nwind:\n  north_south: 140\n").unwrap();
        assert!(scenario.release_params().is_err());
    }
}
