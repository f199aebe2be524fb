//! Run outputs: the density grid as CSV and a JSON run report.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ReleaseParams, RunOutcome};
use crate::error::SimResult;
use crate::grid::DensityGrid;
use crate::particle::Landing;

pub const GRID_FILE: &str = "density.csv";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub generated_at: DateTime<Utc>,
    pub params: ReleaseParams,
    pub max_duration_s: u64,
    pub longest_flight: Option<Landing>,
    pub landed: u64,
    pub on_grid: u64,
    pub rejected: u64,
    pub clamped: u64,
    pub peak_cell: u32,
    pub mean_distance: f64,
}

impl RunReport {
    pub fn new(scenario: &str, params: &ReleaseParams, outcome: &RunOutcome) -> Self {
        Self {
            scenario: scenario.to_string(),
            generated_at: Utc::now(),
            params: params.clone(),
            max_duration_s: outcome.max_duration,
            longest_flight: outcome.longest,
            landed: outcome.landed,
            on_grid: outcome.grid.total(),
            rejected: outcome.rejected(),
            clamped: outcome.clamped(),
            peak_cell: outcome.grid.max_cell(),
            mean_distance: outcome.mean_distance,
        }
    }

    /// One-line summary of the longest flight.
    pub fn duration_line(&self) -> String {
        format!("Longest flight: {} seconds.", self.max_duration_s)
    }
}

/// Write the grid row-major: one line per row, cells separated by commas.
pub fn write_grid_csv<W: Write>(grid: &DensityGrid, mut out: W) -> io::Result<()> {
    out.write_all(grid_csv(grid).as_bytes())?;
    out.flush()
}

pub fn grid_csv(grid: &DensityGrid) -> String {
    let mut csv = String::new();
    for row in grid.rows() {
        let line = row
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        csv.push_str(&line);
        csv.push('\n');
    }
    csv
}

pub fn write_report(report: &RunReport, path: impl AsRef<Path>) -> SimResult<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::from)?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes `<dir>/<scenario>/density.csv` and `report.json`.
pub struct ExportWriter {
    output_dir: PathBuf,
}

impl ExportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn write(&self, report: &RunReport, grid: &DensityGrid) -> SimResult<PathBuf> {
        let dir = self.output_dir.join(&report.scenario);
        fs::create_dir_all(&dir)?;
        let file = fs::File::create(dir.join(GRID_FILE))?;
        write_grid_csv(grid, io::BufWriter::new(file))?;
        write_report(report, dir.join(REPORT_FILE))?;
        Ok(dir)
    }
}
