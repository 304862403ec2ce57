//! Output of a headless run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use shellpane_core::{ScreenSnapshot, SessionState};

/// Final state of a headless run, printed with `--json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    /// Visible screen as plain text
    pub text: String,
    /// Whether the `--wait` text appeared (always true without `--wait`)
    pub condition_met: bool,
    /// Time spent waiting for output, in milliseconds
    pub waited_ms: u64,
    /// Lifecycle state before the shell was stopped
    pub state: SessionState,
    /// Shell exit code
    pub exit_code: Option<i32>,
    /// Final screen
    pub snapshot: ScreenSnapshot,
}

impl RunReport {
    /// Text output, optionally preceded by the scrollback window.
    pub fn render_text(&self, scrollback: bool) -> String {
        if scrollback {
            self.snapshot.to_text_with_scrollback()
        } else {
            self.text.clone()
        }
    }

    /// JSON schema of the report.
    pub fn schema_json() -> serde_json::Result<String> {
        serde_json::to_string_pretty(&schemars::schema_for!(RunReport))
    }
}
