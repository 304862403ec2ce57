//! PTY (pseudo-terminal) session: spawning, I/O, resizing and teardown.
//!
//! The session exclusively owns the master side of the pty and the child
//! process. Output is read on a dedicated blocking thread and handed to a
//! callback in delivery order.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, ExitStatus, MasterPty, PtySize};
use tracing::{debug, error, info, trace, warn};

use shellpane_core::config::STOP_BUDGET;
use shellpane_core::{Dimensions, Error, Result, SessionState, TerminalSettings};

use crate::environment::{child_environment, resolve_shell};

/// Interval between non-blocking exit checks while stopping.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A shell process attached to a pseudo-terminal.
pub struct PtySession {
    /// Settings used for every spawn
    settings: TerminalSettings,
    /// Current pty dimensions
    dimensions: Dimensions,
    /// Lifecycle state, shared with the reader thread
    state: Arc<Mutex<SessionState>>,
    /// Master side of the pty
    master: Option<Box<dyn MasterPty + Send>>,
    /// Input side of the master
    writer: Option<Mutex<Box<dyn Write + Send>>>,
    /// Child shell process
    child: Option<Box<dyn Child + Send + Sync>>,
    /// Reader thread
    reader: Option<JoinHandle<()>>,
    /// Signalled by the reader thread when its loop ends
    reader_done: Option<mpsc::Receiver<()>>,
    /// Exit code of the last reaped child
    exit_code: Option<i32>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("dimensions", &self.dimensions)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl PtySession {
    /// Create a session that has not been spawned yet.
    pub fn new(settings: TerminalSettings) -> Self {
        let dimensions = settings.dimensions().at_least_one();
        Self {
            settings,
            dimensions,
            state: Arc::new(Mutex::new(SessionState::NotStarted)),
            master: None,
            writer: None,
            child: None,
            reader: None,
            reader_done: None,
            exit_code: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Current pty dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Process id of the running shell.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.process_id())
    }

    /// Exit code of the shell, once it has been reaped.
    ///
    /// A shell killed by the hangup or kill sent from [`stop`](Self::stop)
    /// reports `128 + signal`.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Spawn the shell and start reading its output.
    ///
    /// `on_output` receives every chunk read from the pty, in order, on the
    /// reader thread. `on_exit` runs on the same thread once, when the shell
    /// side of the pty closes without `stop()` having been called.
    ///
    /// Does nothing if the session is already running. A session that has
    /// stopped releases its previous resources before spawning again.
    pub fn spawn<O, E>(&mut self, on_output: O, on_exit: E) -> Result<()>
    where
        O: FnMut(&[u8]) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        if self.state().is_running() {
            debug!("spawn ignored, shell already running: pid={:?}", self.pid());
            return Ok(());
        }
        self.release();

        // Everything the child needs is computed before forking
        let shell = resolve_shell(self.settings.shell.as_deref(), env_lookup)?;
        let env = child_environment(&shell, self.dimensions, &self.settings.term, env_lookup);
        let cwd = self
            .settings
            .working_directory
            .clone()
            .or_else(|| env_lookup("HOME"))
            .filter(|dir| Path::new(dir).is_dir());

        info!(
            "Spawning shell: shell={} args={:?} dimensions={} cwd={:?}",
            shell.display(),
            self.settings.args,
            self.dimensions,
            cwd
        );

        let pair = native_pty_system()
            .openpty(pty_size(self.dimensions))
            .map_err(|e| {
                error!("Failed to open PTY: {}", e);
                Error::ForkFailed(format!("openpty: {e}"))
            })?;

        let mut command = CommandBuilder::new(&shell);
        command.args(&self.settings.args);
        command.env_clear();
        for (key, value) in env {
            command.env(key, value);
        }
        if let Some(dir) = &cwd {
            command.cwd(dir);
        }

        // The child becomes a session leader with the slave as its controlling tty
        let child = pair.slave.spawn_command(command).map_err(|e| {
            error!("Failed to spawn shell '{}': {}", shell.display(), e);
            match e.downcast_ref::<io::Error>() {
                Some(err) if err.kind() == io::ErrorKind::NotFound => {
                    Error::ShellNotFound(shell.display().to_string())
                }
                _ => Error::ForkFailed(e.to_string()),
            }
        })?;

        // The parent keeps no slave descriptor
        drop(pair.slave);
        let master = pair.master;

        let handles = master
            .take_writer()
            .and_then(|writer| master.try_clone_reader().map(|reader| (writer, reader)))
            .map_err(|e| Error::ForkFailed(format!("pty handles: {e}")));
        let pid = child.process_id();
        self.master = Some(master);
        self.child = Some(child);
        self.exit_code = None;
        *lock(&self.state) = SessionState::Running;

        let started = handles.and_then(|(writer, reader)| {
            self.writer = Some(Mutex::new(writer));
            self.start_reader(reader, on_output, on_exit)
        });
        if let Err(e) = started {
            self.stop();
            return Err(e);
        }

        info!("Shell spawned: pid={:?}", pid);
        Ok(())
    }

    fn start_reader<O, E>(
        &mut self,
        reader: Box<dyn Read + Send>,
        on_output: O,
        on_exit: E,
    ) -> Result<()>
    where
        O: FnMut(&[u8]) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel();
        let state = Arc::clone(&self.state);
        let buffer_size = self.settings.read_buffer_size.max(1);

        let handle = thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                read_loop(reader, buffer_size, on_output);

                let exited = {
                    let mut state = lock(&state);
                    let running = state.is_running();
                    if running {
                        *state = SessionState::Stopped;
                    }
                    running
                };
                if exited {
                    info!("Shell exited");
                    on_exit();
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| Error::ForkFailed(format!("reader thread: {e}")))?;

        self.reader = Some(handle);
        self.reader_done = Some(done_rx);
        Ok(())
    }

    /// Send bytes to the shell.
    ///
    /// Does nothing unless the session is running.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if !self.state().is_running() {
            trace!("write ignored, session {}", self.state());
            return Ok(());
        }
        let Some(writer) = self.writer.as_ref() else {
            return Ok(());
        };
        let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Resize the pty and notify the foreground process group.
    ///
    /// Does nothing unless the session is running.
    pub fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                cols: dimensions.cols,
                rows: dimensions.rows,
            });
        }
        if !self.state().is_running() {
            trace!("resize ignored, session {}", self.state());
            return Ok(());
        }
        let Some(master) = self.master.as_ref() else {
            return Ok(());
        };

        master
            .resize(pty_size(dimensions))
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
        self.dimensions = dimensions;

        let target = master
            .process_group_leader()
            .filter(|pgrp| *pgrp > 0)
            .map(|pgrp| -pgrp)
            .or_else(|| self.pid().map(|pid| pid as libc::pid_t));
        if let Some(target) = target {
            // SAFETY: plain kill(2); a negative pid addresses the process group
            unsafe {
                libc::kill(target, libc::SIGWINCH);
            }
        }

        debug!("Resized pty: dimensions={}", dimensions);
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Closes the master, hangs up the shell, escalates to SIGKILL when the
    /// hangup grace period runs out, reaps the child and joins the reader.
    /// Blocks for at most three seconds. Calling it again is a no-op.
    ///
    /// The reader thread holds the only other handle on the master. It is
    /// unblocked by the kernel hangup of the slave once the shell's session
    /// ends, and closes that handle when its loop returns.
    pub fn stop(&mut self) {
        if self.master.is_none() && self.child.is_none() && self.reader.is_none() {
            return;
        }
        let deadline = Instant::now() + STOP_BUDGET;

        {
            let mut state = lock(&self.state);
            if state.is_running() {
                *state = SessionState::Stopping;
            }
        }
        info!("Stopping shell: pid={:?}", self.pid());

        self.writer.take();
        self.master.take();

        if let Some(mut child) = self.child.take() {
            self.exit_code =
                reap(child.as_mut(), self.settings.hangup_grace(), self.settings.kill_grace());
        }

        if let Some(handle) = self.reader.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let finished = match self.reader_done.take() {
                Some(done) => match done.recv_timeout(remaining) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                    Err(RecvTimeoutError::Timeout) => false,
                },
                None => true,
            };
            if finished {
                if handle.join().is_err() {
                    warn!("pty reader thread panicked");
                }
            } else {
                warn!("pty reader still blocked after stop budget, detaching");
            }
        }

        *lock(&self.state) = SessionState::Stopped;
        info!("Shell stopped: exit_code={:?}", self.exit_code);
    }

    /// Release leftovers of a session whose shell already exited.
    fn release(&mut self) {
        if self.master.is_some() || self.child.is_some() || self.reader.is_some() {
            debug!("Releasing resources of previous shell");
            self.stop();
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn pty_size(dimensions: Dimensions) -> PtySize {
    PtySize {
        rows: dimensions.rows,
        cols: dimensions.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn read_loop<O: FnMut(&[u8])>(
    mut reader: Box<dyn Read + Send>,
    buffer_size: usize,
    mut on_output: O,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("pty reader reached end of stream");
                break;
            }
            Ok(n) => on_output(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side is closed
            Err(e) => {
                debug!("pty read ended: {}", e);
                break;
            }
        }
    }
}

/// Hang up the child, escalate to SIGKILL, and reap it.
fn reap(
    child: &mut (dyn Child + Send + Sync),
    hangup_grace: Duration,
    kill_grace: Duration,
) -> Option<i32> {
    if let Ok(Some(status)) = child.try_wait() {
        return Some(exit_code(&status, None));
    }
    let Some(pid) = child.process_id().map(|pid| pid as libc::pid_t) else {
        warn!("Shell has no process id, cannot signal it");
        return None;
    };

    // SAFETY: signalling our own child
    unsafe {
        libc::kill(pid, libc::SIGHUP);
    }
    if let Some(status) = wait_for_exit(child, hangup_grace) {
        return Some(exit_code(&status, Some(libc::SIGHUP)));
    }

    warn!("Shell ignored SIGHUP, killing: pid={}", pid);
    // The child is a session leader, so its pid is also its process group
    // SAFETY: signalling our own child and its process group
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
        libc::kill(pid, libc::SIGKILL);
    }
    if let Some(status) = wait_for_exit(child, kill_grace) {
        return Some(exit_code(&status, Some(libc::SIGKILL)));
    }

    error!("Shell could not be reaped: pid={}", pid);
    None
}

fn wait_for_exit(child: &mut (dyn Child + Send + Sync), grace: Duration) -> Option<ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!("waitpid failed: {}", e);
                return None;
            }
        }
        if start.elapsed() >= grace {
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Shell exit code; a death by the signal we sent maps to `128 + signal`.
fn exit_code(status: &ExitStatus, sent: Option<libc::c_int>) -> i32 {
    match (status.signal(), sent) {
        (Some(_), Some(signal)) => 128 + signal,
        _ => status.exit_code() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;

    fn settings_with(shell: &str, args: &[&str]) -> TerminalSettings {
        TerminalSettings {
            shell: Some(shell.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    fn spawn_collecting(session: &mut PtySession) -> (Receiver<Vec<u8>>, Receiver<()>) {
        let (out_tx, out_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        session
            .spawn(
                move |bytes| {
                    let _ = out_tx.send(bytes.to_vec());
                },
                move || {
                    let _ = exit_tx.send(());
                },
            )
            .unwrap();
        (out_rx, exit_rx)
    }

    fn collect_until(rx: &Receiver<Vec<u8>>, needle: &str, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        let mut output = Vec::new();
        while Instant::now() < deadline {
            if let Ok(chunk) = rx.recv_timeout(Duration::from_millis(50)) {
                output.extend(chunk);
                if String::from_utf8_lossy(&output).contains(needle) {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_new_session() {
        let session = PtySession::new(TerminalSettings::default());
        assert_eq!(session.state(), SessionState::NotStarted);
        assert_eq!(session.dimensions(), Dimensions::new(80, 24));
        assert_eq!(session.pid(), None);
        assert_eq!(session.exit_code(), None);
    }

    #[test]
    fn test_spawn_write_and_stop() {
        let mut session = PtySession::new(settings_with("/bin/sh", &[]));
        let (out_rx, _exit_rx) = spawn_collecting(&mut session);
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.pid().is_some());

        session.write(b"echo hel''lo\n").unwrap();
        let output = collect_until(&out_rx, "hello", Duration::from_secs(5));
        assert!(output.contains("hello"), "output was {output:?}");

        let start = Instant::now();
        session.stop();
        assert!(start.elapsed() <= STOP_BUDGET);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.pid(), None);
        assert!(session.exit_code().is_some());
    }

    #[test]
    fn test_child_environment_contract() {
        let mut session = PtySession::new(settings_with("/bin/sh", &["-c", "env; sleep 1"]));
        let (out_rx, _exit_rx) = spawn_collecting(&mut session);

        let output = collect_until(&out_rx, "LINES=24", Duration::from_secs(5));
        assert!(output.contains("TERM=xterm-256color"), "output was {output:?}");
        assert!(output.contains("COLUMNS=80"));
        assert!(output.contains("LINES=24"));
        assert!(output.contains("SHELL=/bin/sh"));
        session.stop();
    }

    #[test]
    fn test_natural_exit() {
        let mut session = PtySession::new(settings_with("/bin/sh", &["-c", "exit 3"]));
        let (_out_rx, exit_rx) = spawn_collecting(&mut session);

        exit_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        session.stop();
        assert_eq!(session.exit_code(), Some(3));
    }

    #[test]
    fn test_shell_not_found() {
        let mut session = PtySession::new(settings_with("/no/such/shell", &[]));
        let result = session.spawn(|_| {}, || {});
        assert!(matches!(result, Err(Error::ShellNotFound(_))));
        assert_eq!(session.state(), SessionState::NotStarted);
    }

    #[test]
    fn test_write_and_resize_before_spawn_are_noops() {
        let mut session = PtySession::new(TerminalSettings::default());
        assert!(session.write(b"ignored").is_ok());
        assert!(session.resize(Dimensions::new(40, 10)).is_ok());
        assert_eq!(session.dimensions(), Dimensions::new(80, 24));
        assert_eq!(session.state(), SessionState::NotStarted);
    }

    #[test]
    fn test_resize_rejects_zero() {
        let mut session = PtySession::new(TerminalSettings::default());
        let result = session.resize(Dimensions::new(0, 10));
        assert!(matches!(result, Err(Error::InvalidDimensions { cols: 0, rows: 10 })));
    }

    #[test]
    fn test_resize_running_session() {
        let mut session = PtySession::new(settings_with("/bin/sh", &[]));
        let (out_rx, _exit_rx) = spawn_collecting(&mut session);

        session.resize(Dimensions::new(40, 10)).unwrap();
        assert_eq!(session.dimensions(), Dimensions::new(40, 10));

        session.write(b"stty size\n").unwrap();
        let output = collect_until(&out_rx, "10 40", Duration::from_secs(5));
        assert!(output.contains("10 40"), "output was {output:?}");
        session.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = PtySession::new(TerminalSettings::default());
        session.stop();
        assert_eq!(session.state(), SessionState::NotStarted);

        let mut session = PtySession::new(settings_with("/bin/sh", &[]));
        let _channels = spawn_collecting(&mut session);
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.write(b"ignored").is_ok());
    }

    #[test]
    fn test_stop_kills_shell_ignoring_hangup() {
        let mut session = PtySession::new(settings_with(
            "/bin/sh",
            &["-c", "trap '' HUP; echo ready; while :; do sleep 1; done"],
        ));
        let (out_rx, _exit_rx) = spawn_collecting(&mut session);
        collect_until(&out_rx, "ready", Duration::from_secs(5));

        let start = Instant::now();
        session.stop();
        assert!(start.elapsed() <= STOP_BUDGET + Duration::from_millis(200));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.exit_code(), Some(128 + libc::SIGKILL));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reader_ends_when_detached_grandchild_holds_slave() {
        let mut session = PtySession::new(settings_with(
            "/bin/sh",
            &["-c", "setsid sleep 5 & echo started"],
        ));
        let (out_rx, exit_rx) = spawn_collecting(&mut session);
        collect_until(&out_rx, "started", Duration::from_secs(5));

        // The sleep keeps a slave descriptor open in its own session
        let _ = exit_rx.recv_timeout(Duration::from_secs(2));

        let start = Instant::now();
        session.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.exit_code(), Some(0));
    }

    #[test]
    fn test_respawn_after_stop() {
        let mut session = PtySession::new(settings_with("/bin/sh", &[]));
        let _first = spawn_collecting(&mut session);
        let first_pid = session.pid();
        session.stop();

        let (out_rx, _exit_rx) = spawn_collecting(&mut session);
        assert_eq!(session.state(), SessionState::Running);
        assert_ne!(session.pid(), first_pid);

        session.write(b"echo again\n").unwrap();
        assert!(collect_until(&out_rx, "again", Duration::from_secs(5)).contains("again"));
    }

    #[test]
    fn test_spawn_when_running_is_noop() {
        let mut session = PtySession::new(settings_with("/bin/sh", &[]));
        let _channels = spawn_collecting(&mut session);
        let pid = session.pid();

        session.spawn(|_| {}, || {}).unwrap();
        assert_eq!(session.pid(), pid);
    }
}
