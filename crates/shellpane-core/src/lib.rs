//! # shellpane-core
//!
//! Core types for the shellpane embedded terminal.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other shellpane crates. It provides:
//!
//! - Geometry types (Position, Dimensions)
//! - Cell, style and color types for the virtual screen
//! - Screen snapshots published to renderers
//! - Session lifecycle state
//! - Terminal settings
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other shellpane crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod config;
pub mod error;
pub mod geometry;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use cell::{Cell, CellStyle, Color};
pub use config::TerminalSettings;
pub use error::{Error, Result};
pub use geometry::{Dimensions, Position};
pub use session::SessionState;
pub use snapshot::ScreenSnapshot;
