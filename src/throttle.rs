//! Pause between consecutive generator calls.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait before the next job. Returns early once `cancel` fires.
    async fn wait(&self, cancel: &CancellationToken);
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn wait(&self, cancel: &CancellationToken) {
        if self.0.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.0) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Throttle for NoDelay {
    async fn wait(&self, _cancel: &CancellationToken) {}
}
