//! # shellpane
//!
//! Headless front end for the shellpane embedded terminal.
//!
//! Runs a shell behind a pty, types commands into it, waits for the screen
//! to settle and reports the final screen as text or JSON.
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - shellpane-core: Core types and settings
//! - shellpane-emulator: Decoder, screen buffer and pty (through the session crate)
//! - shellpane-session: Terminal controller and handle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod report;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use shellpane_core::TerminalSettings;
use shellpane_session::{TerminalHandle, TerminalWatcher};

pub use cli::RunOptions;
pub use report::RunReport;

/// Run one headless session and collect its final screen.
pub async fn run(options: &RunOptions, settings: TerminalSettings) -> Result<RunReport> {
    let handle = TerminalHandle::start(settings).context("failed to start terminal")?;
    let mut watcher = handle.subscribe();

    handle.spawn().await.context("failed to spawn shell")?;
    info!("Shell running: commands={}", options.commands.len());

    for command in &options.commands {
        debug!("Typing command: {:?}", command);
        handle
            .write(format!("{command}\n"))
            .context("failed to write to shell")?;
    }

    let (condition_met, waited_ms) = match &options.wait_for {
        Some(text) => {
            let result = watcher.wait_for_text(text, options.timeout).await;
            (result.condition_met, result.waited_ms)
        }
        None => (
            true,
            wait_for_idle(&mut watcher, options.idle, options.timeout).await,
        ),
    };

    let snapshot = handle.snapshot();
    let state = handle.state();
    let exit_code = handle.stop().await.context("failed to stop shell")?;
    info!("Run finished: waited_ms={}, exit_code={:?}", waited_ms, exit_code);

    Ok(RunReport {
        text: snapshot.to_plain_text(),
        condition_met,
        waited_ms,
        state,
        exit_code,
        snapshot: (*snapshot).clone(),
    })
}

/// Wait until no snapshot has been published for `idle`, bounded by `timeout`.
///
/// Returns the time waited in milliseconds.
async fn wait_for_idle(watcher: &mut TerminalWatcher, idle: Duration, timeout: Duration) -> u64 {
    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            debug!("Timed out waiting for idle screen");
            break;
        }
        match tokio::time::timeout(idle.min(remaining), watcher.next_snapshot()).await {
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => break,
        }
    }

    start.elapsed().as_millis() as u64
}
