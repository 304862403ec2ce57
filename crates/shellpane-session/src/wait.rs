//! Waiting for screen content or lifecycle changes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use shellpane_core::{ScreenSnapshot, SessionState};

/// Condition to wait for.
#[derive(Debug, Clone)]
pub struct WaitCondition {
    /// Text that must appear on one line of the screen or scrollback window
    pub text: Option<String>,

    /// Wait for the text to disappear instead of appear
    pub gone: bool,

    /// Lifecycle state to wait for
    pub state: Option<SessionState>,

    /// Maximum time to wait
    pub timeout: Duration,
}

impl Default for WaitCondition {
    fn default() -> Self {
        Self {
            text: None,
            gone: false,
            state: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl WaitCondition {
    /// Wait for text to appear.
    pub fn for_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Wait for text to disappear.
    pub fn for_text_gone(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            gone: true,
            ..Self::default()
        }
    }

    /// Wait for a lifecycle state.
    pub fn for_state(state: SessionState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Set timeout duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the condition against a snapshot and state.
    pub fn is_met(&self, snapshot: &ScreenSnapshot, state: SessionState) -> bool {
        let text_ok = self
            .text
            .as_deref()
            .map_or(true, |text| snapshot.contains(text) != self.gone);
        let state_ok = self.state.map_or(true, |wanted| wanted == state);
        text_ok && state_ok
    }
}

/// Result of a wait operation.
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the condition was met
    pub condition_met: bool,

    /// Time waited in milliseconds
    pub waited_ms: u64,

    /// Latest snapshot when the wait ended
    pub snapshot: Arc<ScreenSnapshot>,

    /// Lifecycle state when the wait ended
    pub state: SessionState,
}

/// Read side of a terminal's published snapshots and lifecycle state.
#[derive(Debug, Clone)]
pub struct TerminalWatcher {
    snapshots: watch::Receiver<Arc<ScreenSnapshot>>,
    states: watch::Receiver<SessionState>,
}

impl TerminalWatcher {
    /// Create a watcher from the two publication channels.
    pub fn new(
        snapshots: watch::Receiver<Arc<ScreenSnapshot>>,
        states: watch::Receiver<SessionState>,
    ) -> Self {
        Self { snapshots, states }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ScreenSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Latest published lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.states.borrow()
    }

    /// Wait until the next snapshot is published.
    ///
    /// Returns `None` once the terminal has been dropped.
    pub async fn next_snapshot(&mut self) -> Option<Arc<ScreenSnapshot>> {
        self.snapshots.changed().await.ok()?;
        Some(Arc::clone(&self.snapshots.borrow_and_update()))
    }

    /// Wait for a condition to be met.
    ///
    /// Re-checks the condition on every published snapshot or state change
    /// and returns when it holds, the timeout elapses, or the terminal is
    /// dropped.
    pub async fn wait_for(&mut self, condition: &WaitCondition) -> WaitResult {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + condition.timeout;

        loop {
            let snapshot = Arc::clone(&self.snapshots.borrow_and_update());
            let state = *self.states.borrow_and_update();
            if condition.is_met(&snapshot, state) {
                return finish(true, start, snapshot, state);
            }

            let changed = tokio::time::timeout_at(deadline, async {
                tokio::select! {
                    result = self.snapshots.changed() => result.is_ok(),
                    result = self.states.changed() => result.is_ok(),
                }
            })
            .await;

            match changed {
                Ok(true) => continue,
                Ok(false) => {
                    let snapshot = self.snapshot();
                    let state = self.state();
                    let met = condition.is_met(&snapshot, state);
                    return finish(met, start, snapshot, state);
                }
                Err(_) => return finish(false, start, snapshot, state),
            }
        }
    }

    /// Wait for text to appear on screen.
    pub async fn wait_for_text(&mut self, text: &str, timeout: Duration) -> WaitResult {
        self.wait_for(&WaitCondition::for_text(text).with_timeout(timeout))
            .await
    }

    /// Wait for a lifecycle state.
    pub async fn wait_for_state(&mut self, state: SessionState, timeout: Duration) -> WaitResult {
        self.wait_for(&WaitCondition::for_state(state).with_timeout(timeout))
            .await
    }
}

fn finish(
    condition_met: bool,
    start: Instant,
    snapshot: Arc<ScreenSnapshot>,
    state: SessionState,
) -> WaitResult {
    WaitResult {
        condition_met,
        waited_ms: start.elapsed().as_millis() as u64,
        snapshot,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellpane_core::{Cell, Dimensions};

    fn snapshot_with(text: &str) -> Arc<ScreenSnapshot> {
        let mut snapshot = ScreenSnapshot::blank(Dimensions::new(20, 2));
        for (col, ch) in text.chars().enumerate() {
            snapshot.cells[0][col] = Cell::new(ch);
        }
        Arc::new(snapshot)
    }

    fn channels() -> (
        watch::Sender<Arc<ScreenSnapshot>>,
        watch::Sender<SessionState>,
        TerminalWatcher,
    ) {
        let (snap_tx, snap_rx) = watch::channel(snapshot_with(""));
        let (state_tx, state_rx) = watch::channel(SessionState::NotStarted);
        (snap_tx, state_tx, TerminalWatcher::new(snap_rx, state_rx))
    }

    #[test]
    fn test_condition_builders() {
        let cond = WaitCondition::for_text("ready").with_timeout(Duration::from_secs(2));
        assert_eq!(cond.text.as_deref(), Some("ready"));
        assert!(!cond.gone);
        assert_eq!(cond.timeout, Duration::from_secs(2));

        let cond = WaitCondition::for_text_gone("loading");
        assert!(cond.gone);

        let cond = WaitCondition::for_state(SessionState::Stopped);
        assert_eq!(cond.state, Some(SessionState::Stopped));
        assert_eq!(cond.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_condition_is_met() {
        let snapshot = snapshot_with("$ echo hi");
        assert!(WaitCondition::for_text("echo").is_met(&snapshot, SessionState::Running));
        assert!(!WaitCondition::for_text("bye").is_met(&snapshot, SessionState::Running));
        assert!(WaitCondition::for_text_gone("bye").is_met(&snapshot, SessionState::Running));
        assert!(WaitCondition::default().is_met(&snapshot, SessionState::NotStarted));
        assert!(!WaitCondition::for_state(SessionState::Stopped)
            .is_met(&snapshot, SessionState::Running));
    }

    #[tokio::test]
    async fn test_wait_already_met() {
        let (_snap_tx, _state_tx, mut watcher) = channels();
        let result = watcher
            .wait_for_state(SessionState::NotStarted, Duration::from_millis(10))
            .await;
        assert!(result.condition_met);
    }

    #[tokio::test]
    async fn test_wait_for_published_text() {
        let (snap_tx, _state_tx, mut watcher) = channels();

        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            snap_tx.send_replace(snapshot_with("loading"));
            tokio::time::sleep(Duration::from_millis(20)).await;
            snap_tx.send_replace(snapshot_with("hi there"));
            snap_tx
        });

        let result = watcher.wait_for_text("hi", Duration::from_secs(5)).await;
        assert!(result.condition_met);
        assert!(result.snapshot.contains("hi there"));
        let _ = publisher.await;
    }

    #[tokio::test]
    async fn test_wait_for_state_change() {
        let (_snap_tx, state_tx, mut watcher) = channels();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            state_tx.send_replace(SessionState::Running);
            tokio::time::sleep(Duration::from_millis(20)).await;
            state_tx.send_replace(SessionState::Stopped);
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let result = watcher
            .wait_for_state(SessionState::Stopped, Duration::from_secs(5))
            .await;
        assert!(result.condition_met);
        assert_eq!(result.state, SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (_snap_tx, _state_tx, mut watcher) = channels();
        let result = watcher.wait_for_text("never", Duration::from_millis(50)).await;
        assert!(!result.condition_met);
        assert!(result.waited_ms >= 50);
    }

    #[tokio::test]
    async fn test_wait_ends_when_publisher_dropped() {
        let (snap_tx, state_tx, mut watcher) = channels();
        drop(snap_tx);
        drop(state_tx);

        let result = watcher.wait_for_text("never", Duration::from_secs(30)).await;
        assert!(!result.condition_met);
        assert!(result.waited_ms < 30_000);
    }

    #[tokio::test]
    async fn test_next_snapshot() {
        let (snap_tx, _state_tx, mut watcher) = channels();
        snap_tx.send_replace(snapshot_with("next"));
        let snapshot = watcher.next_snapshot().await.unwrap();
        assert!(snapshot.contains("next"));

        drop(snap_tx);
        assert!(watcher.next_snapshot().await.is_none());
    }
}
