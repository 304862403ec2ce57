//! # shellpane-session
//!
//! Terminal session control for shellpane.
//!
//! This crate provides:
//! - The terminal controller tying a pty session to the decoder and screen
//! - Snapshot and lifecycle publication over watch channels
//! - A cloneable handle that runs the controller on its own thread
//! - Wait helpers for screen content and lifecycle state
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on shellpane-core
//! and shellpane-emulator to manage one shell per controller.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(unix)]
pub mod controller;
#[cfg(unix)]
pub mod handle;
pub mod wait;

// Re-export commonly used types
#[cfg(unix)]
pub use controller::TerminalController;
#[cfg(unix)]
pub use handle::TerminalHandle;
pub use wait::{TerminalWatcher, WaitCondition, WaitResult};
