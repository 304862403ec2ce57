//! Cell, style and color types for the virtual screen.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Terminal color supporting the 16 ANSI colors, the 256-color palette and true RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default foreground color
    Default,

    /// Default background color
    DefaultBackground,

    /// Standard ANSI color (0-7 normal, 8-15 bright)
    Standard(u8),

    /// 256-color palette index (0-255)
    Palette(u8),

    /// True color RGB (24-bit)
    Rgb {
        /// Red component
        r: u8,
        /// Green component
        g: u8,
        /// Blue component
        b: u8,
    },
}

impl Color {
    /// Standard ANSI color, clamped to the 0-15 range.
    pub fn standard(index: u8) -> Self {
        Self::Standard(index.min(15))
    }

    /// Check if this is one of the two default colors.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default | Self::DefaultBackground)
    }
}

/// Rendering style applied to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CellStyle {
    /// Foreground color
    pub foreground: Color,
    /// Background color
    pub background: Color,
    /// Bold/bright text
    pub bold: bool,
    /// Underlined text
    pub underline: bool,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            foreground: Color::Default,
            background: Color::DefaultBackground,
            bold: false,
            underline: false,
        }
    }
}

impl CellStyle {
    /// Check if the style is plain (no colors, no attributes).
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    /// Create style with bold enabled.
    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Create style with underline enabled.
    pub fn with_underline(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Create style with the given foreground color.
    pub fn with_foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    /// Create style with the given background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }
}

/// Single character cell in the screen grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Cell {
    /// Unicode scalar value (space if empty)
    pub character: char,
    /// Rendering style
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            style: CellStyle::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and plain style.
    pub fn new(character: char) -> Self {
        Self {
            character,
            style: CellStyle::default(),
        }
    }

    /// Create a cell with character and style.
    pub fn styled(character: char, style: CellStyle) -> Self {
        Self { character, style }
    }

    /// Check if cell is blank (space with plain style).
    pub fn is_blank(&self) -> bool {
        self.character == ' ' && self.style.is_plain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_standard_clamps() {
        assert_eq!(Color::standard(3), Color::Standard(3));
        assert_eq!(Color::standard(200), Color::Standard(15));
    }

    #[test]
    fn test_color_is_default() {
        assert!(Color::Default.is_default());
        assert!(Color::DefaultBackground.is_default());
        assert!(!Color::Palette(0).is_default());
    }

    #[test]
    fn test_color_serialization() {
        let color = Color::Rgb {
            r: 255,
            g: 128,
            b: 0,
        };
        let json = serde_json::to_string(&color).unwrap();
        let deserialized: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(color, deserialized);
    }

    #[test]
    fn test_style_default_is_plain() {
        let style = CellStyle::default();
        assert!(style.is_plain());
        assert_eq!(style.foreground, Color::Default);
        assert_eq!(style.background, Color::DefaultBackground);
    }

    #[test]
    fn test_style_builders() {
        let style = CellStyle::default()
            .with_bold()
            .with_underline()
            .with_foreground(Color::Standard(1));

        assert!(style.bold);
        assert!(style.underline);
        assert_eq!(style.foreground, Color::Standard(1));
        assert!(!style.is_plain());
    }

    #[test]
    fn test_cell_default() {
        let cell = Cell::default();
        assert_eq!(cell.character, ' ');
        assert!(cell.is_blank());
    }

    #[test]
    fn test_cell_is_blank() {
        assert!(!Cell::new('X').is_blank());

        let styled_space = Cell::styled(' ', CellStyle::default().with_underline());
        assert!(!styled_space.is_blank());
    }
}
