//! Terminal controller: one shell, one decoder, one screen.
//!
//! The controller wires a [`PtySession`] to an [`EscapeSequenceDecoder`] and
//! [`ScreenBuffer`]. The pty reader thread is the only code that feeds the
//! decoder; every chunk it applies is followed by a freshly published
//! [`ScreenSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use shellpane_core::{
    Dimensions, Error, Result, ScreenSnapshot, SessionState, TerminalSettings,
};
use shellpane_emulator::{EscapeSequenceDecoder, PtySession, ScreenBuffer};

use crate::wait::TerminalWatcher;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Decoder and screen, mutated together under one lock.
#[derive(Debug)]
struct TerminalState {
    decoder: EscapeSequenceDecoder,
    buffer: ScreenBuffer,
}

impl TerminalState {
    fn new(dimensions: Dimensions, scrollback_lines: usize) -> Self {
        Self {
            decoder: EscapeSequenceDecoder::new(),
            buffer: ScreenBuffer::with_scrollback_limit(dimensions, scrollback_lines),
        }
    }
}

/// Owns a shell session and publishes its screen.
#[derive(Debug)]
pub struct TerminalController {
    /// Identifier used in log lines
    id: u64,
    /// Settings for every spawn
    settings: TerminalSettings,
    /// Shell process and pty
    pty: PtySession,
    /// Decoder and screen, shared with the pty reader thread
    terminal: Arc<Mutex<TerminalState>>,
    /// Latest screen snapshot
    snapshots: Arc<watch::Sender<Arc<ScreenSnapshot>>>,
    /// Latest lifecycle state
    states: Arc<watch::Sender<SessionState>>,
}

impl TerminalController {
    /// Create a controller. The shell is not started until [`spawn`](Self::spawn).
    pub fn new(settings: TerminalSettings) -> Result<Self> {
        settings.validate()?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let dimensions = settings.dimensions();
        let terminal = TerminalState::new(dimensions, settings.scrollback_lines);
        let snapshot = Arc::new(terminal.buffer.snapshot(settings.snapshot_scrollback));

        let (snapshots, _) = watch::channel(snapshot);
        let (states, _) = watch::channel(SessionState::NotStarted);

        debug!("Created terminal controller: id={}, dimensions={}", id, dimensions);

        Ok(Self {
            id,
            pty: PtySession::new(settings.clone()),
            settings,
            terminal: Arc::new(Mutex::new(terminal)),
            snapshots: Arc::new(snapshots),
            states: Arc::new(states),
        })
    }

    /// Controller identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start the shell.
    ///
    /// Does nothing if it is already running. Spawning again after a stop
    /// starts from a blank screen.
    pub fn spawn(&mut self) -> Result<()> {
        if self.pty.state().is_running() {
            return Ok(());
        }

        if self.pty.state() != SessionState::NotStarted {
            let mut terminal = lock(&self.terminal);
            *terminal = TerminalState::new(self.pty.dimensions(), self.settings.scrollback_lines);
            self.snapshots.send_replace(Arc::new(
                terminal.buffer.snapshot(self.settings.snapshot_scrollback),
            ));
        }

        info!("Spawning terminal: id={}", self.id);

        let on_output = {
            let terminal = Arc::clone(&self.terminal);
            let snapshots = Arc::clone(&self.snapshots);
            let window = self.settings.snapshot_scrollback;
            move |bytes: &[u8]| {
                let mut terminal = lock(&terminal);
                let TerminalState { decoder, buffer } = &mut *terminal;
                decoder.feed(bytes, buffer);
                snapshots.send_replace(Arc::new(buffer.snapshot(window)));
            }
        };
        let on_exit = {
            let terminal = Arc::clone(&self.terminal);
            let states = Arc::clone(&self.states);
            let id = self.id;
            move || {
                let _terminal = lock(&terminal);
                info!("Shell exited: id={}", id);
                states.send_replace(SessionState::Stopped);
            }
        };

        let result = self.pty.spawn(on_output, on_exit);
        self.publish_state();
        result
    }

    /// Send input bytes to the shell. Does nothing unless running.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.pty.write(bytes)
    }

    /// Resize the pty and the screen, then publish a snapshot.
    ///
    /// Does nothing unless running.
    pub fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                cols: dimensions.cols,
                rows: dimensions.rows,
            });
        }
        if !self.pty.state().is_running() {
            debug!("Resize ignored: id={}, state={}", self.id, self.pty.state());
            return Ok(());
        }

        self.pty.resize(dimensions)?;

        let mut terminal = lock(&self.terminal);
        terminal.buffer.resize(dimensions);
        self.snapshots.send_replace(Arc::new(
            terminal.buffer.snapshot(self.settings.snapshot_scrollback),
        ));
        debug!("Resized terminal: id={}, dimensions={}", self.id, dimensions);
        Ok(())
    }

    /// Stop the shell and release the pty.
    ///
    /// Blocks for at most three seconds. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.pty.state() == SessionState::NotStarted {
            return;
        }
        {
            let _terminal = lock(&self.terminal);
            if self.pty.state().is_running() {
                self.states.send_replace(SessionState::Stopping);
            }
        }

        info!("Stopping terminal: id={}", self.id);
        self.pty.stop();
        self.publish_state();

        if let Some(code) = self.pty.exit_code() {
            info!("Terminal stopped: id={}, exit_code={}", self.id, code);
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ScreenSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Subscribe to snapshots and state changes.
    pub fn subscribe(&self) -> TerminalWatcher {
        TerminalWatcher::new(self.snapshots.subscribe(), self.states.subscribe())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.pty.state()
    }

    /// Current dimensions.
    pub fn dimensions(&self) -> Dimensions {
        lock(&self.terminal).buffer.dimensions()
    }

    /// Window title set by the shell.
    pub fn title(&self) -> Option<String> {
        lock(&self.terminal).buffer.title().map(str::to_string)
    }

    /// Working directory reported by the shell.
    pub fn working_directory(&self) -> Option<String> {
        lock(&self.terminal).buffer.working_directory().map(str::to_string)
    }

    /// Process id of the running shell.
    pub fn pid(&self) -> Option<u32> {
        self.pty.pid()
    }

    /// Exit code of the last shell, once it has been reaped.
    pub fn exit_code(&self) -> Option<i32> {
        self.pty.exit_code()
    }

    /// Publish the pty state.
    ///
    /// Holding the terminal lock orders this against the exit callback.
    fn publish_state(&self) {
        let _terminal = lock(&self.terminal);
        let state = self.pty.state();
        self.states.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

impl Drop for TerminalController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(terminal: &Mutex<TerminalState>) -> MutexGuard<'_, TerminalState> {
    terminal.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!("terminal state lock poisoned, recovering");
        poisoned.into_inner()
    })
}
