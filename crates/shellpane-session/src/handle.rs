//! Cross-thread handle to a terminal controller.
//!
//! The controller lives on its own thread and receives commands over a
//! channel, so every caller's writes, resizes and stops are applied in the
//! order they were sent.

use std::io;
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use shellpane_core::{Dimensions, Error, Result, ScreenSnapshot, SessionState, TerminalSettings};

use crate::controller::TerminalController;
use crate::wait::TerminalWatcher;

/// Commands executed on the controller thread.
#[derive(Debug)]
enum Command {
    Spawn(oneshot::Sender<Result<()>>),
    Write(Vec<u8>),
    Resize(Dimensions),
    Stop(oneshot::Sender<Option<i32>>),
}

/// Cloneable handle to a terminal running on a dedicated thread.
///
/// The controller stops its shell once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct TerminalHandle {
    /// Controller identifier
    id: u64,
    /// Command queue
    commands: mpsc::UnboundedSender<Command>,
    /// Published snapshots and state
    watcher: TerminalWatcher,
}

impl TerminalHandle {
    /// Create a controller and start its thread. The shell is not spawned yet.
    pub fn start(settings: TerminalSettings) -> Result<Self> {
        let controller = TerminalController::new(settings)?;
        let id = controller.id();
        let watcher = controller.subscribe();
        let (commands, receiver) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name(format!("terminal-{id}"))
            .spawn(move || run(controller, receiver))?;

        Ok(Self {
            id,
            commands,
            watcher,
        })
    }

    /// Controller identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Spawn the shell.
    pub async fn spawn(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Spawn(reply))?;
        response.await.map_err(|_| controller_gone())?
    }

    /// Queue input bytes for the shell.
    pub fn write(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Command::Write(bytes.into()))
    }

    /// Queue a resize.
    pub fn resize(&self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                cols: dimensions.cols,
                rows: dimensions.rows,
            });
        }
        self.send(Command::Resize(dimensions))
    }

    /// Stop the shell, returning its exit code.
    ///
    /// Completes after every previously queued command has been applied.
    pub async fn stop(&self) -> Result<Option<i32>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stop(reply))?;
        response.await.map_err(|_| controller_gone())
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ScreenSnapshot> {
        self.watcher.snapshot()
    }

    /// Latest published lifecycle state.
    pub fn state(&self) -> SessionState {
        self.watcher.state()
    }

    /// Subscribe to snapshots and state changes.
    pub fn subscribe(&self) -> TerminalWatcher {
        self.watcher.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| controller_gone())
    }
}

fn controller_gone() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "terminal controller thread has exited",
    ))
}

fn run(mut controller: TerminalController, mut receiver: mpsc::UnboundedReceiver<Command>) {
    debug!("Controller thread started: id={}", controller.id());

    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::Spawn(reply) => {
                let _ = reply.send(controller.spawn());
            }
            Command::Write(bytes) => {
                if let Err(e) = controller.write(&bytes) {
                    warn!("Write failed: id={}, error={}", controller.id(), e);
                }
            }
            Command::Resize(dimensions) => {
                if let Err(e) = controller.resize(dimensions) {
                    warn!("Resize failed: id={}, error={}", controller.id(), e);
                }
            }
            Command::Stop(reply) => {
                controller.stop();
                let _ = reply.send(controller.exit_code());
            }
        }
    }

    debug!("Controller thread exiting: id={}", controller.id());
    controller.stop();
}
