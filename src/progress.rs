//! Progress events published by a batch run.
//!
//! The receiver is a plain synchronous callback. [`ProgressTracker`] builds
//! every event a run emits and refuses any event that would break the
//! lifecycle: `current` never decreases or exceeds `total`, status only
//! moves forward, and exactly one terminal event is produced.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::BatchStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub status: BatchStatus,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl BatchProgress {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whole-number percentage; an empty batch reports 0.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current * 100) / self.total).min(100) as u8
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("run already reached terminal status {0}")]
    AlreadyTerminal(BatchStatus),
    #[error("progress went backwards from {from} to {to}")]
    Regressed { from: usize, to: usize },
    #[error("progress {current} exceeds total {total}")]
    Overflow { current: usize, total: usize },
    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },
}

/// Run-local builder for progress events.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    last: Option<BatchProgress>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self { total, last: None }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn status(&self) -> BatchStatus {
        self.last
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(BatchStatus::Pending)
    }

    pub fn last(&self) -> Option<&BatchProgress> {
        self.last.as_ref()
    }

    pub fn start(&mut self) -> Result<BatchProgress, ProgressError> {
        self.advance(0, BatchStatus::Generating, None, None)
    }

    /// Emitted before job `index` is attempted.
    pub fn generating(&mut self, index: usize) -> Result<BatchProgress, ProgressError> {
        let message = format!("generating job {} of {}", index + 1, self.total);
        self.advance(index, BatchStatus::Generating, Some(message), None)
    }

    pub fn failed(&mut self, current: usize, error: String) -> Result<BatchProgress, ProgressError> {
        self.advance(current, BatchStatus::Failed, None, Some(error))
    }

    pub fn completed(&mut self) -> Result<BatchProgress, ProgressError> {
        let message = format!("{} jobs generated", self.total);
        self.advance(self.total, BatchStatus::Completed, Some(message), None)
    }

    pub fn cancelled(&mut self, current: usize) -> Result<BatchProgress, ProgressError> {
        let message = format!("cancelled after {} of {} jobs", current, self.total);
        self.advance(current, BatchStatus::Cancelled, Some(message), None)
    }

    fn advance(
        &mut self,
        current: usize,
        status: BatchStatus,
        message: Option<String>,
        error: Option<String>,
    ) -> Result<BatchProgress, ProgressError> {
        let (prev_current, prev_status) = self
            .last
            .as_ref()
            .map(|p| (p.current, p.status))
            .unwrap_or((0, BatchStatus::Pending));

        if prev_status.is_terminal() {
            return Err(ProgressError::AlreadyTerminal(prev_status));
        }
        if status.rank() < prev_status.rank() {
            return Err(ProgressError::InvalidTransition {
                from: prev_status,
                to: status,
            });
        }
        if current < prev_current {
            return Err(ProgressError::Regressed {
                from: prev_current,
                to: current,
            });
        }
        if current > self.total {
            return Err(ProgressError::Overflow {
                current,
                total: self.total,
            });
        }

        let event = BatchProgress {
            current,
            total: self.total,
            status,
            message,
            error,
        };
        self.last = Some(event.clone());
        Ok(event)
    }
}

/// Cloneable recorder of every event it receives.
#[derive(Debug, Clone, Default)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<BatchProgress>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, progress: &BatchProgress) {
        let mut guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(progress.clone());
    }

    pub fn sink(&self) -> impl FnMut(&BatchProgress) + Send + 'static {
        let log = self.clone();
        move |p: &BatchProgress| log.record(p)
    }

    pub fn events(&self) -> Vec<BatchProgress> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn terminal(&self) -> Option<BatchProgress> {
        self.events().into_iter().rev().find(|p| p.is_terminal())
    }
}

/// Progress sink that writes each event to the tracing subscriber.
pub fn log_progress(progress: &BatchProgress) {
    match progress.status {
        BatchStatus::Failed => warn!(
            current = progress.current,
            total = progress.total,
            error = progress.error.as_deref().unwrap_or(""),
            "batch failed"
        ),
        status => info!(
            current = progress.current,
            total = progress.total,
            percent = progress.percent(),
            status = %status,
            message = progress.message.as_deref().unwrap_or(""),
            "batch progress"
        ),
    }
}
