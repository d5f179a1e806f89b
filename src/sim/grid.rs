//! Board geometry and random cell selection

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Board dimensions, fixed for the lifetime of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: usize,
    pub rows: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            cols: FULL_GRID_SIDE,
            rows: FULL_GRID_SIDE,
        }
    }
}

impl GridSpec {
    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }

    /// (col, row) of a cell index
    pub fn position(&self, cell: usize) -> (usize, usize) {
        (cell % self.cols, cell / self.cols)
    }

    pub fn contains(&self, cell: usize) -> bool {
        cell < self.cell_count()
    }
}

/// Grid for a viewport width, using the default compact threshold
pub fn compute_grid(viewport_width: f64) -> GridSpec {
    compute_grid_with(viewport_width, COMPACT_GRID_MAX_WIDTH)
}

/// Grid for a viewport width: compact at or below `compact_max_width`
pub fn compute_grid_with(viewport_width: f64, compact_max_width: f64) -> GridSpec {
    let side = if viewport_width <= compact_max_width {
        COMPACT_GRID_SIDE
    } else {
        FULL_GRID_SIDE
    };
    GridSpec {
        cols: side,
        rows: side,
    }
}

/// Pick a random cell in `[0, count)` that is neither `previous` nor in `excluded`.
///
/// Gives up after [`PICK_ATTEMPTS`] draws and returns `previous`. With no
/// previous cell that fallback is `None`.
pub fn pick_cell<R: Rng>(
    rng: &mut R,
    previous: Option<usize>,
    excluded: &[usize],
    count: usize,
) -> Option<usize> {
    if count == 0 {
        return previous;
    }
    let allowed = |cell: usize| Some(cell) != previous && !excluded.contains(&cell);
    for _ in 0..PICK_ATTEMPTS {
        let cell = rng.random_range(0..count);
        if allowed(cell) {
            return Some(cell);
        }
    }
    previous
}
