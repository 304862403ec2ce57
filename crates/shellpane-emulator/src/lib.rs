//! # shellpane-emulator
//!
//! Terminal emulator implementation for shellpane.
//!
//! This crate provides:
//! - An incremental ANSI/VT100 escape sequence decoder
//! - The virtual screen buffer with bounded scrollback
//! - PTY (pseudo-terminal) lifecycle management
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on shellpane-core.
//! The decoder and screen buffer are pure state machines; only the pty
//! module touches the operating system.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
#[cfg(unix)]
pub mod environment;
#[cfg(unix)]
pub mod pty;
pub mod screen;

// Re-export commonly used types
pub use decoder::{DecoderState, EscapeSequenceDecoder};
#[cfg(unix)]
pub use pty::PtySession;
pub use screen::{ScreenBuffer, DEFAULT_SCROLLBACK_LIMIT};
