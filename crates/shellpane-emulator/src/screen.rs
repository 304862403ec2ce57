//! Virtual screen buffer, cursor tracking and scrollback.

use std::collections::VecDeque;

use tracing::trace;

use shellpane_core::{Cell, CellStyle, Dimensions, Position, ScreenSnapshot};

/// Default number of rows kept in scrollback.
pub const DEFAULT_SCROLLBACK_LIMIT: usize = 10_000;

/// Distance between horizontal tab stops.
const TAB_WIDTH: u16 = 8;

/// A single row of cells.
pub type Row = Vec<Cell>;

/// Terminal screen state: the visible grid, scrollback, cursor and current style.
///
/// Every operation clamps its arguments, so the cursor always stays inside
/// `[0, rows-1] x [0, cols-1]` and the grid always has exactly `rows` rows of
/// exactly `cols` cells.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    /// Grid dimensions
    dimensions: Dimensions,
    /// Cursor position
    cursor: Position,
    /// Set after a character was written into the last column; the next
    /// printable character wraps to the following line first
    wrap_pending: bool,
    /// Visible rows, top to bottom
    screen: Vec<Row>,
    /// Rows scrolled off the top, oldest first
    scrollback: VecDeque<Row>,
    /// Maximum scrollback rows
    scrollback_limit: usize,
    /// Style applied to newly written cells
    current_style: CellStyle,
    /// Title set through OSC 0/2
    title: Option<String>,
    /// Working directory reported through OSC 7
    working_directory: Option<String>,
}

impl ScreenBuffer {
    /// Create a new buffer with the default scrollback limit.
    ///
    /// Zero dimensions are raised to one.
    pub fn new(dimensions: Dimensions) -> Self {
        Self::with_scrollback_limit(dimensions, DEFAULT_SCROLLBACK_LIMIT)
    }

    /// Create a new buffer keeping at most `limit` scrollback rows.
    pub fn with_scrollback_limit(dimensions: Dimensions, limit: usize) -> Self {
        let dimensions = dimensions.at_least_one();
        Self {
            dimensions,
            cursor: Position::origin(),
            wrap_pending: false,
            screen: blank_grid(dimensions),
            scrollback: VecDeque::new(),
            scrollback_limit: limit,
            current_style: CellStyle::default(),
            title: None,
            working_directory: None,
        }
    }

    /// Get dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of columns.
    pub fn cols(&self) -> u16 {
        self.dimensions.cols
    }

    /// Number of rows.
    pub fn rows(&self) -> u16 {
        self.dimensions.rows
    }

    /// Cursor position.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Get cell at position.
    ///
    /// Returns None if position is out of bounds.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.screen
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
    }

    /// Get an entire visible row.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        self.screen.get(row as usize).map(Vec::as_slice)
    }

    /// All visible rows, top to bottom.
    pub fn screen(&self) -> &[Row] {
        &self.screen
    }

    /// Scrollback rows, oldest first.
    pub fn scrollback(&self) -> &VecDeque<Row> {
        &self.scrollback
    }

    /// Maximum scrollback rows.
    pub fn scrollback_limit(&self) -> usize {
        self.scrollback_limit
    }

    /// Style applied to newly written cells.
    pub fn current_style(&self) -> CellStyle {
        self.current_style
    }

    /// Set the style applied to newly written cells.
    pub fn set_current_style(&mut self, style: CellStyle) {
        self.current_style = style;
    }

    /// Window title, if one was set.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set the window title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Working directory reported by the shell, if any.
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    /// Set the reported working directory.
    pub fn set_working_directory(&mut self, directory: impl Into<String>) {
        self.working_directory = Some(directory.into());
    }

    /// Write a character at the cursor and advance.
    ///
    /// `\n`, `\r`, backspace and tab move the cursor instead of writing.
    /// Other control characters are dropped.
    pub fn write_character(&mut self, ch: char) {
        match ch {
            '\n' => self.line_feed(),
            '\r' => self.carriage_return(),
            '\u{8}' => self.backspace(),
            '\t' => self.tab(),
            c if c.is_control() => trace!("dropping control character {:?}", c),
            c => self.put_char(c),
        }
    }

    fn put_char(&mut self, ch: char) {
        if self.wrap_pending {
            self.line_feed();
            self.carriage_return();
        }

        let Position { row, col } = self.cursor;
        self.screen[row as usize][col as usize] = Cell::styled(ch, self.current_style);

        if col + 1 >= self.dimensions.cols {
            self.wrap_pending = true;
        } else {
            self.cursor.col = col + 1;
        }
    }

    /// Move to the next row, scrolling when already on the bottom row.
    pub fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row + 1 >= self.dimensions.rows {
            self.scroll_up();
        } else {
            self.cursor.row += 1;
        }
    }

    /// Move to column 0.
    pub fn carriage_return(&mut self) {
        self.wrap_pending = false;
        self.cursor.col = 0;
    }

    /// Move one column left without erasing.
    pub fn backspace(&mut self) {
        self.cursor_backward(1);
    }

    /// Advance to the next tab stop, clamped to the last column.
    pub fn tab(&mut self) {
        self.wrap_pending = false;
        let next = (self.cursor.col / TAB_WIDTH + 1).saturating_mul(TAB_WIDTH);
        self.cursor.col = next.min(self.last_col());
    }

    /// Move the top row into scrollback and append a blank row at the bottom.
    pub fn scroll_up(&mut self) {
        let blank = vec![Cell::default(); self.dimensions.cols as usize];
        let top = std::mem::replace(&mut self.screen[0], blank);
        self.screen.rotate_left(1);

        if self.scrollback_limit == 0 {
            return;
        }
        self.scrollback.push_back(top);
        while self.scrollback.len() > self.scrollback_limit {
            self.scrollback.pop_front();
        }
    }

    /// Move cursor up by n rows.
    pub fn cursor_up(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor.row = self.cursor.row.saturating_sub(n);
    }

    /// Move cursor down by n rows.
    pub fn cursor_down(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor.row = self.cursor.row.saturating_add(n).min(self.last_row());
    }

    /// Move cursor forward by n columns.
    pub fn cursor_forward(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor.col = self.cursor.col.saturating_add(n).min(self.last_col());
    }

    /// Move cursor backward by n columns.
    pub fn cursor_backward(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor.col = self.cursor.col.saturating_sub(n);
    }

    /// Move cursor to an absolute 0-indexed position, clamped to the grid.
    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.wrap_pending = false;
        self.cursor = Position::new(row.min(self.last_row()), col.min(self.last_col()));
    }

    /// Move cursor to an absolute row, keeping the column.
    pub fn set_cursor_row(&mut self, row: u16) {
        self.set_cursor(row, self.cursor.col);
    }

    /// Move cursor to an absolute column, keeping the row.
    pub fn set_cursor_col(&mut self, col: u16) {
        self.set_cursor(self.cursor.row, col);
    }

    /// Erase in display.
    ///
    /// Mode 0 erases from the cursor to the end of the screen, mode 1 from the
    /// start of the screen through the cursor, mode 2 the whole screen.
    /// Scrollback is never touched; other modes are ignored.
    pub fn erase_in_display(&mut self, mode: u16) {
        let Position { row, col } = self.cursor;
        let row = row as usize;
        match mode {
            0 => {
                self.clear_cells(row, col as usize, self.dimensions.cols as usize);
                for r in row + 1..self.screen.len() {
                    self.clear_row(r);
                }
            }
            1 => {
                for r in 0..row {
                    self.clear_row(r);
                }
                self.clear_cells(row, 0, col as usize + 1);
            }
            2 => {
                for r in 0..self.screen.len() {
                    self.clear_row(r);
                }
            }
            other => trace!("ignoring erase-in-display mode {}", other),
        }
    }

    /// Erase in line.
    ///
    /// Mode 0 erases from the cursor to the end of the line, mode 1 from the
    /// start of the line through the cursor, mode 2 the whole line.
    pub fn erase_in_line(&mut self, mode: u16) {
        let Position { row, col } = self.cursor;
        let (row, col) = (row as usize, col as usize);
        match mode {
            0 => self.clear_cells(row, col, self.dimensions.cols as usize),
            1 => self.clear_cells(row, 0, col + 1),
            2 => self.clear_row(row),
            other => trace!("ignoring erase-in-line mode {}", other),
        }
    }

    /// Resize the grid, preserving the overlapping top-left region.
    ///
    /// Content outside the new bounds is discarded rather than moved to
    /// scrollback. The cursor is clamped to the new bounds.
    pub fn resize(&mut self, dimensions: Dimensions) {
        let dimensions = dimensions.at_least_one();
        let mut screen = blank_grid(dimensions);

        let copy_rows = self.dimensions.rows.min(dimensions.rows) as usize;
        let copy_cols = self.dimensions.cols.min(dimensions.cols) as usize;
        for (new_row, old_row) in screen.iter_mut().zip(&self.screen).take(copy_rows) {
            new_row[..copy_cols].copy_from_slice(&old_row[..copy_cols]);
        }

        self.screen = screen;
        self.dimensions = dimensions;
        self.set_cursor(self.cursor.row, self.cursor.col);
    }

    /// Full reset: blank grid and scrollback, cursor home, plain style.
    ///
    /// Dimensions, scrollback limit, title and working directory are kept.
    pub fn reset(&mut self) {
        self.screen = blank_grid(self.dimensions);
        self.scrollback.clear();
        self.cursor = Position::origin();
        self.wrap_pending = false;
        self.current_style = CellStyle::default();
    }

    /// Take a snapshot including at most `scrollback_window` recent scrollback rows.
    pub fn snapshot(&self, scrollback_window: usize) -> ScreenSnapshot {
        let skip = self.scrollback.len().saturating_sub(scrollback_window);
        ScreenSnapshot {
            cols: self.dimensions.cols,
            rows: self.dimensions.rows,
            cursor: self.cursor,
            cells: self.screen.clone(),
            scrollback: self.scrollback.iter().skip(skip).cloned().collect(),
            scrollback_total: self.scrollback.len(),
            title: self.title.clone(),
            working_directory: self.working_directory.clone(),
        }
    }

    /// Convert the visible grid to plain text.
    ///
    /// Trailing whitespace is trimmed from each line.
    pub fn to_plain_text(&self) -> String {
        self.screen
            .iter()
            .map(|row| {
                let line: String = row.iter().map(|c| c.character).collect();
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn last_row(&self) -> u16 {
        self.dimensions.rows - 1
    }

    fn last_col(&self) -> u16 {
        self.dimensions.cols - 1
    }

    fn clear_row(&mut self, row: usize) {
        if let Some(cells) = self.screen.get_mut(row) {
            cells.fill(Cell::default());
        }
    }

    fn clear_cells(&mut self, row: usize, from: usize, to: usize) {
        if let Some(cells) = self.screen.get_mut(row) {
            let to = to.min(cells.len());
            if from < to {
                cells[from..to].fill(Cell::default());
            }
        }
    }
}

fn blank_grid(dimensions: Dimensions) -> Vec<Row> {
    vec![vec![Cell::default(); dimensions.cols as usize]; dimensions.rows as usize]
}
