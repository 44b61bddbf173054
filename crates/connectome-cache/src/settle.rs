//! Debounced follow-up actions.
//!
//! While the ring is scrolled quickly, expensive work (restoring visibility of
//! every layer, for instance) should run once the selection stops moving.
//! Every `schedule` call replaces the pending action.

use connectome_core::{ConnectomeError, Result};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

pub struct SettleScheduler {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl SettleScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` after the settle delay unless another action is scheduled
    /// first. Requires a running tokio runtime.
    pub fn schedule<F>(&mut self, action: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| {
            ConnectomeError::InvalidOperation(format!("settle scheduling needs a tokio runtime: {}", e))
        })?;

        self.cancel();
        let delay = self.delay;
        self.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
        trace!(delay_ms = delay.as_millis() as u64, "settle action scheduled");
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SettleScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
