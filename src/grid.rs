//! Landing density grid.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub const DEFAULT_EXTENT: usize = 500;

/// What to do with a landing that falls outside the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Leave the grid untouched and count the landing as rejected.
    #[default]
    Reject,
    /// Record the landing on the nearest edge cell and count it as clamped.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inside,
    Clamped { x: usize, y: usize },
    Rejected,
}

/// Counts of landings per cell, indexed as `cells[row][column]` with
/// row = y and column = x.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityGrid {
    width: usize,
    height: usize,
    cells: Vec<u32>,
    policy: BoundsPolicy,
    rejected: u64,
    clamped: u64,
}

impl DensityGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_policy(width, height, BoundsPolicy::default())
    }

    pub fn with_policy(width: usize, height: usize, policy: BoundsPolicy) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
            policy,
            rejected: 0,
            clamped: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64
    }

    /// Count one landing at (x, y).
    pub fn accumulate(&mut self, x: i64, y: i64) -> Placement {
        if self.contains(x, y) {
            let index = self.index(x as usize, y as usize);
            self.cells[index] += 1;
            return Placement::Inside;
        }
        match self.policy {
            BoundsPolicy::Reject => {
                self.rejected += 1;
                Placement::Rejected
            }
            BoundsPolicy::Clamp if self.cells.is_empty() => {
                self.rejected += 1;
                Placement::Rejected
            }
            BoundsPolicy::Clamp => {
                let cx = x.clamp(0, self.width as i64 - 1) as usize;
                let cy = y.clamp(0, self.height as i64 - 1) as usize;
                let index = self.index(cx, cy);
                self.cells[index] += 1;
                self.clamped += 1;
                Placement::Clamped { x: cx, y: cy }
            }
        }
    }

    pub fn get(&self, x: i64, y: i64) -> Option<u32> {
        if self.contains(x, y) {
            Some(self.cells[self.index(x as usize, y as usize)])
        } else {
            None
        }
    }

    /// Row-major view, one slice per y.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> + '_ {
        // chunks() panics on zero, and a zero-width grid has no cells anyway.
        self.cells.chunks(self.width.max(1))
    }

    /// Snapshot of the whole grid as nested rows.
    pub fn read(&self) -> Vec<Vec<u32>> {
        self.rows().map(<[u32]>::to_vec).collect()
    }

    /// Sum of all cells.
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&count| u64::from(count)).sum()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    pub fn max_cell(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Add another grid of the same extent into this one.
    pub fn merge(&mut self, other: &DensityGrid) -> SimResult<()> {
        if self.width != other.width || self.height != other.height {
            return Err(SimError::GridMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        for (cell, extra) in self.cells.iter_mut().zip(&other.cells) {
            *cell += extra;
        }
        self.rejected += other.rejected;
        self.clamped += other.clamped;
        Ok(())
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}
