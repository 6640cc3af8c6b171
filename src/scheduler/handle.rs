//! Client side of the refresh scheduler.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::warn;

use super::{RefreshMessage, RefreshReport, RefreshState};

/// Cloneable handle for requesting refreshes and reading their results.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    sender: mpsc::Sender<RefreshMessage>,
    state: Arc<RwLock<RefreshState>>,
}

impl RefreshHandle {
    #[must_use]
    pub const fn new(sender: mpsc::Sender<RefreshMessage>, state: Arc<RwLock<RefreshState>>) -> Self {
        Self { sender, state }
    }

    /// Queues a refresh without waiting for it.
    ///
    /// Returns false if the scheduler is gone.
    pub async fn request_refresh(&self) -> bool {
        let sent = self.sender.send(RefreshMessage::RefreshNow(None)).await.is_ok();
        if !sent {
            warn!("Refresh scheduler is not running");
        }
        sent
    }

    /// Runs a refresh and waits for its report.
    pub async fn refresh_and_wait(&self) -> Option<RefreshReport> {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(RefreshMessage::RefreshNow(Some(tx))).await.is_err() {
            warn!("Refresh scheduler is not running");
            return None;
        }
        rx.await.ok()
    }

    /// Asks the scheduler to stop.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(RefreshMessage::Shutdown).await;
    }

    /// Returns the shared refresh history.
    #[must_use]
    pub const fn state(&self) -> &Arc<RwLock<RefreshState>> {
        &self.state
    }
}
