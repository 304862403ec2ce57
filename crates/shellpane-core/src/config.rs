//! Configuration types for shellpane.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Dimensions, Error};

/// Upper bound on the time `stop()` may block its caller.
pub const STOP_BUDGET: Duration = Duration::from_secs(3);

/// Terminal settings loaded from a YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Shell to run (falls back to `$SHELL`, then `/bin/sh`)
    pub shell: Option<String>,
    /// Extra arguments passed to the shell
    pub args: Vec<String>,
    /// Working directory for the shell (falls back to `$HOME`)
    pub working_directory: Option<String>,
    /// Default terminal columns
    pub default_cols: u16,
    /// Default terminal rows
    pub default_rows: u16,
    /// Scrollback buffer lines
    pub scrollback_lines: usize,
    /// Scrollback rows included in each published snapshot
    pub snapshot_scrollback: usize,
    /// TERM environment variable value
    pub term: String,
    /// Size of a single pty read
    pub read_buffer_size: usize,
    /// Time to wait for the shell to exit after SIGHUP
    pub hangup_grace_ms: u64,
    /// Time to wait for the shell to be reaped after SIGKILL
    pub kill_grace_ms: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            shell: None,
            args: vec![],
            working_directory: None,
            default_cols: 80,
            default_rows: 24,
            scrollback_lines: 10_000,
            snapshot_scrollback: 200,
            term: "xterm-256color".to_string(),
            read_buffer_size: 4096,
            hangup_grace_ms: 2000,
            kill_grace_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl TerminalSettings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let settings: TerminalSettings =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.default_cols == 0 || self.default_rows == 0 {
            return Err(Error::Config("terminal dimensions must be > 0".to_string()));
        }

        if self.read_buffer_size == 0 {
            return Err(Error::Config("read_buffer_size must be > 0".to_string()));
        }

        if self.term.trim().is_empty() {
            return Err(Error::Config("term cannot be empty".to_string()));
        }

        if self.hangup_grace() + self.kill_grace() > STOP_BUDGET {
            return Err(Error::Config(format!(
                "hangup_grace_ms + kill_grace_ms must not exceed {}ms",
                STOP_BUDGET.as_millis()
            )));
        }

        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(Error::Config("shell cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Default terminal dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.default_cols, self.default_rows)
    }

    /// Grace period after SIGHUP.
    pub fn hangup_grace(&self) -> Duration {
        Duration::from_millis(self.hangup_grace_ms)
    }

    /// Grace period after SIGKILL.
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
