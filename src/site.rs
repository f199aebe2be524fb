//! Release-site lookup from a marker raster.
//!
//! The raster is comma-separated numbers, one grid row per line, with
//! exactly one non-zero cell marking the release point. The marker's
//! column is x and its row is y.

use std::fs;
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::particle::Position;

pub fn load_release_site(path: impl AsRef<Path>) -> SimResult<Position> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_release_site(&text).map_err(|err| match err {
        SimError::Site(msg) => SimError::Site(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_release_site(text: &str) -> SimResult<Position> {
    let mut marker: Option<Position> = None;
    for (row, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        for (column, field) in line.split(',').enumerate() {
            let value = parse_cell(field, row, column)?;
            if value == 0.0 {
                continue;
            }
            let found = Position::new(column as i64, row as i64);
            if let Some(existing) = marker {
                return Err(SimError::Site(format!(
                    "more than one release marker: ({}, {}) and ({}, {})",
                    existing.x, existing.y, found.x, found.y
                )));
            }
            marker = Some(found);
        }
    }
    marker.ok_or_else(|| SimError::Site("no release marker in raster".to_string()))
}

fn parse_cell(field: &str, row: usize, column: usize) -> SimResult<f64> {
    let trimmed = field.trim().trim_matches('"');
    trimmed.parse::<f64>().map_err(|_| {
        SimError::Site(format!(
            "cell at row {row}, column {column} is not a number: '{trimmed}'"
        ))
    })
}
