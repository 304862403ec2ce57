//! Screen snapshots published to the rendering layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Cell, Dimensions, Position};

/// Immutable copy of the virtual screen taken after an output chunk was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenSnapshot {
    /// Number of columns
    pub cols: u16,
    /// Number of rows
    pub rows: u16,
    /// Cursor position
    pub cursor: Position,
    /// Visible grid, exactly `rows` rows of exactly `cols` cells
    pub cells: Vec<Vec<Cell>>,
    /// Most recent scrollback rows, oldest first
    pub scrollback: Vec<Vec<Cell>>,
    /// Total rows held in scrollback when the snapshot was taken
    pub scrollback_total: usize,
    /// Window title set through OSC 0/2
    pub title: Option<String>,
    /// Working directory reported through OSC 7
    pub working_directory: Option<String>,
}

impl ScreenSnapshot {
    /// Blank snapshot for a screen of the given size.
    pub fn blank(dimensions: Dimensions) -> Self {
        let dimensions = dimensions.at_least_one();
        Self {
            cols: dimensions.cols,
            rows: dimensions.rows,
            cursor: Position::origin(),
            cells: vec![vec![Cell::default(); dimensions.cols as usize]; dimensions.rows as usize],
            scrollback: Vec::new(),
            scrollback_total: 0,
            title: None,
            working_directory: None,
        }
    }

    /// Screen dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.cols, self.rows)
    }

    /// Text of a visible row with trailing whitespace trimmed.
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.cells.get(row).map(|cells| row_to_string(cells))
    }

    /// Visible screen as plain text, one line per row.
    ///
    /// Trailing whitespace is trimmed from each line.
    pub fn to_plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|row| row_to_string(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Scrollback window followed by the visible screen as plain text.
    pub fn to_text_with_scrollback(&self) -> String {
        self.scrollback
            .iter()
            .chain(self.cells.iter())
            .map(|row| row_to_string(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the scrollback window or the visible screen contains `text` on one line.
    pub fn contains(&self, text: &str) -> bool {
        self.scrollback
            .iter()
            .chain(self.cells.iter())
            .any(|row| row_to_string(row).contains(text))
    }
}

fn row_to_string(cells: &[Cell]) -> String {
    let line: String = cells.iter().map(|c| c.character).collect();
    line.trim_end().to_string()
}
