//! Session lifecycle state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a pty session.
///
/// Transitions only move forward: `NotStarted → Running → Stopping → Stopped`.
/// A stopped session may be spawned again, which starts a fresh `Running` cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No process has been spawned yet
    #[default]
    NotStarted,
    /// The shell is running and its output is being read
    Running,
    /// `stop()` is tearing the session down
    Stopping,
    /// The shell has exited or was stopped
    Stopped,
}

impl SessionState {
    /// Check if the session accepts input and resize requests.
    pub fn is_running(&self) -> bool {
        *self == Self::Running
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
