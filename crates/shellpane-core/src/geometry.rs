//! Geometry types for terminal coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Position in the terminal grid (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    /// Row index (0-based)
    pub row: u16,
    /// Column index (0-based)
    pub col: u16,
}

impl Position {
    /// Create a new position.
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Origin position (0, 0).
    pub fn origin() -> Self {
        Self { row: 0, col: 0 }
    }
}

/// Dimensions of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    /// Number of columns
    pub cols: u16,
    /// Number of rows
    pub rows: u16,
}

impl Dimensions {
    /// Create new dimensions.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Total cell count (rows * cols).
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Check that both axes are non-zero.
    pub fn is_valid(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }

    /// Dimensions with each axis raised to at least one.
    pub fn at_least_one(self) -> Self {
        Self {
            cols: self.cols.max(1),
            rows: self.rows.max(1),
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
