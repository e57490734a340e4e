//! Cooperative pause for long rebuilds.

use tokio::sync::watch;

/// Shared pause switch.
///
/// Cloned handles observe the same state. A paused rebuild finishes its
/// in-flight batch, then waits at the next batch boundary until resumed.
#[derive(Debug, Clone)]
pub struct PauseHandle {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl PauseHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the switch is released. Returns immediately when not paused.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.rx.clone();
        if !*rx.borrow_and_update() {
            return;
        }
        tracing::info!("Rebuild paused");
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|paused| !*paused).await;
        tracing::info!("Rebuild resumed");
    }
}

impl Default for PauseHandle {
    fn default() -> Self {
        Self::new()
    }
}
