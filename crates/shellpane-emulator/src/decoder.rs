//! Incremental ANSI/VT100 escape sequence decoder.
//!
//! The decoder is a byte-at-a-time state machine that mutates a
//! [`ScreenBuffer`] directly. All partial state (an unfinished escape
//! sequence, its parameters, a half-received UTF-8 character) lives in the
//! decoder between calls to [`EscapeSequenceDecoder::feed`], so output split
//! at any byte boundary decodes exactly like the unsplit stream.
//!
//! Malformed input never produces an error. Uninterpretable bytes are
//! consumed and decoding resumes from the next byte.

use tracing::{debug, trace};

use shellpane_core::{CellStyle, Color};

use crate::screen::ScreenBuffer;

/// Maximum bytes kept for CSI parameters.
const MAX_PARAMS_LEN: usize = 64;

/// Maximum bytes kept for an OSC payload.
const MAX_OSC_LEN: usize = 4096;

const BEL: u8 = 0x07;
const BS: u8 = 0x08;
const HT: u8 = 0x09;
const LF: u8 = 0x0A;
const VT: u8 = 0x0B;
const FF: u8 = 0x0C;
const CR: u8 = 0x0D;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;
const ESC: u8 = 0x1B;
const DEL: u8 = 0x7F;

/// Decoder state between bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderState {
    /// Printing characters and executing C0 controls
    #[default]
    Ground,
    /// An ESC byte was seen
    Escape,
    /// Collecting CSI parameters until a final byte
    CsiEntry,
    /// Collecting an OSC payload until BEL or ESC
    OscString,
}

/// Streaming escape sequence decoder.
#[derive(Debug, Clone, Default)]
pub struct EscapeSequenceDecoder {
    /// Current state
    state: DecoderState,
    /// CSI parameter bytes collected so far
    params: String,
    /// OSC payload bytes collected so far
    osc: Vec<u8>,
    /// Pending UTF-8 bytes
    utf8: [u8; 4],
    /// Number of pending UTF-8 bytes
    utf8_len: usize,
    /// Length of the UTF-8 sequence being collected
    utf8_expected: usize,
}

impl EscapeSequenceDecoder {
    /// Create a decoder in the ground state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Drop all partial state and return to ground.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Decode `bytes` and apply them to `buffer`.
    pub fn feed(&mut self, bytes: &[u8], buffer: &mut ScreenBuffer) {
        for &byte in bytes {
            self.advance(byte, buffer);
        }
    }

    fn advance(&mut self, byte: u8, buffer: &mut ScreenBuffer) {
        match self.state {
            DecoderState::Ground => self.ground(byte, buffer),
            DecoderState::Escape => self.escape(byte, buffer),
            DecoderState::CsiEntry => self.csi(byte, buffer),
            DecoderState::OscString => self.osc_string(byte, buffer),
        }
    }

    fn ground(&mut self, byte: u8, buffer: &mut ScreenBuffer) {
        if self.utf8_expected > 0 {
            if byte & 0xC0 == 0x80 {
                self.utf8[self.utf8_len] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_expected {
                    let ch = std::str::from_utf8(&self.utf8[..self.utf8_len])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    self.clear_utf8();
                    buffer.write_character(ch);
                }
                return;
            }
            // Interrupted sequence
            self.clear_utf8();
            buffer.write_character(char::REPLACEMENT_CHARACTER);
        }

        match byte {
            ESC => self.state = DecoderState::Escape,
            BEL => {}
            BS => buffer.backspace(),
            HT => buffer.tab(),
            LF | VT | FF => buffer.line_feed(),
            CR => buffer.carriage_return(),
            0x00..=0x1F | DEL => trace!("ignoring control byte {:#04x}", byte),
            0x20..=0x7E => buffer.write_character(byte as char),
            0x80..=0xBF => buffer.write_character(char::REPLACEMENT_CHARACTER),
            0xC0..=0xDF => self.start_utf8(byte, 2),
            0xE0..=0xEF => self.start_utf8(byte, 3),
            0xF0..=0xF7 => self.start_utf8(byte, 4),
            0xF8..=0xFF => buffer.write_character(char::REPLACEMENT_CHARACTER),
        }
    }

    fn start_utf8(&mut self, lead: u8, expected: usize) {
        self.utf8[0] = lead;
        self.utf8_len = 1;
        self.utf8_expected = expected;
    }

    fn clear_utf8(&mut self) {
        self.utf8_len = 0;
        self.utf8_expected = 0;
    }

    fn escape(&mut self, byte: u8, buffer: &mut ScreenBuffer) {
        match byte {
            b'[' => {
                self.params.clear();
                self.state = DecoderState::CsiEntry;
            }
            b']' => {
                self.osc.clear();
                self.state = DecoderState::OscString;
            }
            b'c' => {
                debug!("full terminal reset");
                buffer.reset();
                self.reset();
            }
            other => {
                trace!("ignoring escape {:#04x}", other);
                self.state = DecoderState::Ground;
            }
        }
    }

    fn csi(&mut self, byte: u8, buffer: &mut ScreenBuffer) {
        match byte {
            0x30..=0x3F => {
                if self.params.len() < MAX_PARAMS_LEN {
                    self.params.push(byte as char);
                }
            }
            0x40..=0x7E => {
                self.state = DecoderState::Ground;
                let params = parse_params(&self.params);
                self.params.clear();
                dispatch_csi(byte, &params, buffer);
            }
            ESC => {
                self.params.clear();
                self.state = DecoderState::Escape;
            }
            CAN | SUB => {
                self.params.clear();
                self.state = DecoderState::Ground;
            }
            _ => {}
        }
    }

    fn osc_string(&mut self, byte: u8, buffer: &mut ScreenBuffer) {
        match byte {
            BEL => {
                self.dispatch_osc(buffer);
                self.state = DecoderState::Ground;
            }
            // A following `\` is absorbed by the escape state
            ESC => {
                self.dispatch_osc(buffer);
                self.state = DecoderState::Escape;
            }
            _ => {
                if self.osc.len() < MAX_OSC_LEN {
                    self.osc.push(byte);
                }
            }
        }
    }

    fn dispatch_osc(&mut self, buffer: &mut ScreenBuffer) {
        let payload = String::from_utf8_lossy(&self.osc).into_owned();
        self.osc.clear();

        let Some((code, text)) = payload.split_once(';') else {
            trace!("ignoring OSC without code: {:?}", payload);
            return;
        };

        match code.trim().parse::<u16>() {
            Ok(0) | Ok(2) => {
                debug!("title changed: {:?}", text);
                buffer.set_title(text);
            }
            Ok(7) => {
                debug!("working directory changed: {:?}", text);
                buffer.set_working_directory(text);
            }
            _ => trace!("ignoring OSC {}", code),
        }
    }
}

/// Split CSI parameters on `;`.
///
/// A leading `?` is stripped. Empty and non-numeric tokens are skipped, so
/// `;5` yields `[5]`. Values saturate at `u16::MAX`.
fn parse_params(raw: &str) -> Vec<u16> {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    raw.split(';')
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .map(|token| {
            token.bytes().fold(0u16, |acc, b| {
                acc.saturating_mul(10).saturating_add(u16::from(b - b'0'))
            })
        })
        .collect()
}

fn param_or(params: &[u16], index: usize, default: u16) -> u16 {
    params.get(index).copied().unwrap_or(default)
}

/// Count for relative movement: missing or zero means one.
fn count(params: &[u16]) -> u16 {
    param_or(params, 0, 1).max(1)
}

fn dispatch_csi(final_byte: u8, params: &[u16], buffer: &mut ScreenBuffer) {
    match final_byte {
        b'A' => buffer.cursor_up(count(params)),
        b'B' => buffer.cursor_down(count(params)),
        b'C' => buffer.cursor_forward(count(params)),
        b'D' => buffer.cursor_backward(count(params)),
        b'G' => buffer.set_cursor_col(param_or(params, 0, 1).saturating_sub(1)),
        b'd' => buffer.set_cursor_row(param_or(params, 0, 1).saturating_sub(1)),
        b'H' | b'f' => {
            let row = param_or(params, 0, 1).saturating_sub(1);
            let col = param_or(params, 1, 1).saturating_sub(1);
            buffer.set_cursor(row, col);
        }
        b'J' => buffer.erase_in_display(param_or(params, 0, 0)),
        b'K' => buffer.erase_in_line(param_or(params, 0, 0)),
        b'm' => apply_sgr(params, buffer),
        other => trace!("unsupported CSI final {:?} params={:?}", other as char, params),
    }
}

/// Apply Select Graphic Rendition parameters left to right.
fn apply_sgr(params: &[u16], buffer: &mut ScreenBuffer) {
    let mut style = buffer.current_style();

    if params.is_empty() {
        style = CellStyle::default();
    }

    let mut i = 0;
    while i < params.len() {
        match params[i] {
            0 => style = CellStyle::default(),
            1 => style.bold = true,
            4 => style.underline = true,
            22 => style.bold = false,
            24 => style.underline = false,
            n @ 30..=37 => style.foreground = Color::standard((n - 30) as u8),
            39 => style.foreground = Color::Default,
            n @ 40..=47 => style.background = Color::standard((n - 40) as u8),
            49 => style.background = Color::DefaultBackground,
            n @ 90..=97 => style.foreground = Color::standard((n - 90 + 8) as u8),
            n @ 100..=107 => style.background = Color::standard((n - 100 + 8) as u8),
            selector @ (38 | 48) => {
                let (color, consumed) = extended_color(&params[i + 1..]);
                if let Some(color) = color {
                    if selector == 38 {
                        style.foreground = color;
                    } else {
                        style.background = color;
                    }
                }
                i += consumed;
            }
            other => trace!("ignoring SGR {}", other),
        }
        i += 1;
    }

    buffer.set_current_style(style);
}

/// Parse the tail of a 38/48 sequence.
///
/// Returns the color, if complete, and how many parameters were consumed.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    let channel = |v: u16| v.min(255) as u8;
    match rest {
        [5, index, ..] => (Some(Color::Palette(channel(*index))), 2),
        [2, r, g, b, ..] => (
            Some(Color::Rgb {
                r: channel(*r),
                g: channel(*g),
                b: channel(*b),
            }),
            4,
        ),
        [5] => (None, 1),
        [2, partial @ ..] => (None, 1 + partial.len()),
        [_, ..] => (None, 1),
        [] => (None, 0),
    }
}
