//! Compaction of sparse LED observations into a dense ledmap grid.
//!
//! The mapping loop yields one observation per LED index, each carrying at
//! most one pixel coordinate. The controller consumes a dense rectangular
//! matrix where every cell holds either an LED index or the empty sentinel.
//! This module shrinks the sparse coordinates to the smallest such matrix.

use crate::mapping::Observation;

/// Sentinel marking a grid cell with no LED.
pub const EMPTY_CELL: i32 = -1;

/// Errors that can occur during grid compaction.
#[derive(Debug, PartialEq, Eq)]
pub enum GridError {
    /// No observation carried a coordinate, so there is nothing to compact
    EmptyResultSet,
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::EmptyResultSet => {
                write!(
                    f,
                    "No LED was located in any frame. Re-run calibration with a lower threshold, or check that the camera can see the strip."
                )
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Two LED indices resolved to the same compacted cell.
///
/// The later index in observation order wins; the earlier one is discarded.
/// Non-fatal, surfaced so the operator can re-run with a better camera angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    /// Cell position within the compacted grid
    pub cell: (usize, usize),
    /// Index that occupies the cell
    pub kept: usize,
    /// Index that was displaced
    pub discarded: usize,
}

impl std::fmt::Display for Collision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LEDs {} and {} both landed on cell ({}, {}); keeping {}",
            self.discarded, self.kept, self.cell.0, self.cell.1, self.kept
        )
    }
}

/// A dense, minimal LED index matrix.
///
/// `cells` is the row-major flattening of the matrix: the cell at `(x, y)`
/// lives at `y * width + x`. Row-major order is part of the wire contract
/// shared with the ledmap JSON consumer, which fills its output row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactGrid {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

impl CompactGrid {
    /// Grid width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major cell values; length is always `width * height`.
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    /// Value at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `x >= width` or `y >= height`.
    pub fn get(&self, x: usize, y: usize) -> i32 {
        assert!(x < self.width && y < self.height);
        self.cells[y * self.width + x]
    }

    /// Consume the grid, returning the row-major cell sequence.
    pub fn into_cells(self) -> Vec<i32> {
        self.cells
    }
}

/// Compact the observations into the smallest dense grid containing them.
///
/// Observations without a coordinate are ignored. Returns the grid together
/// with any cell collisions that were resolved last-write-wins.
///
/// # Errors
/// Returns [`GridError::EmptyResultSet`] when no observation carries a
/// coordinate. This is checked before any allocation, so callers can report
/// the failure without a partial grid existing.
pub fn compact(observations: &[Observation]) -> Result<(CompactGrid, Vec<Collision>), GridError> {
    let (min_x, min_y, max_x, max_y) =
        bounding_box(observations).ok_or(GridError::EmptyResultSet)?;

    let width = (max_x - min_x + 1) as usize;
    let height = (max_y - min_y + 1) as usize;
    let mut cells = vec![EMPTY_CELL; width * height];
    let mut collisions = Vec::new();

    for obs in observations {
        let Some((x, y)) = obs.coordinate else {
            continue;
        };
        let cx = (x - min_x) as usize;
        let cy = (y - min_y) as usize;
        let cell = &mut cells[cy * width + cx];
        if *cell != EMPTY_CELL {
            collisions.push(Collision {
                cell: (cx, cy),
                kept: obs.index,
                discarded: *cell as usize,
            });
        }
        *cell = obs.index as i32;
    }

    let grid = trim(CompactGrid {
        width,
        height,
        cells,
    });

    Ok((grid, collisions))
}

/// Bounding box `(min_x, min_y, max_x, max_y)` over present coordinates.
fn bounding_box(observations: &[Observation]) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y) in observations.iter().filter_map(|o| o.coordinate) {
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }
    bounds
}

/// Strip fully-empty border rows and columns until none remain.
///
/// Idempotent: trimming an already-trimmed grid returns it unchanged.
pub fn trim(grid: CompactGrid) -> CompactGrid {
    let CompactGrid {
        width,
        height,
        cells,
    } = grid;

    let row_occupied = |y: usize| (0..width).any(|x| cells[y * width + x] != EMPTY_CELL);
    let col_occupied = |x: usize| (0..height).any(|y| cells[y * width + x] != EMPTY_CELL);

    let Some(first_row) = (0..height).find(|&y| row_occupied(y)) else {
        // Every cell is empty; collapse to the zero-size grid.
        return CompactGrid {
            width: 0,
            height: 0,
            cells: Vec::new(),
        };
    };
    let last_row = (0..height)
        .rev()
        .find(|&y| row_occupied(y))
        .unwrap_or(first_row);
    let first_col = (0..width).find(|&x| col_occupied(x)).unwrap_or(0);
    let last_col = (0..width)
        .rev()
        .find(|&x| col_occupied(x))
        .unwrap_or(first_col);

    let new_width = last_col - first_col + 1;
    let new_height = last_row - first_row + 1;
    let mut trimmed = Vec::with_capacity(new_width * new_height);
    for y in first_row..=last_row {
        for x in first_col..=last_col {
            trimmed.push(cells[y * width + x]);
        }
    }

    CompactGrid {
        width: new_width,
        height: new_height,
        cells: trimmed,
    }
}
