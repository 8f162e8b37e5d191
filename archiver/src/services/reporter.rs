//! Progress reporter implementations

use tokio::sync::mpsc;

use shared::MigrationState;

use crate::traits::ProgressReporter;

/// Writes progress and state changes to the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn on_progress(&self, processed: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 * 100.0 / total as f64
        };
        tracing::info!("📊 Processed {}/{} records ({:.0}%)", processed, total, percent);
    }

    fn on_state_change(&self, state: MigrationState) {
        tracing::info!("🔀 Orchestrator state: {}", state);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn on_progress(&self, _processed: usize, _total: usize) {}

    fn on_state_change(&self, _state: MigrationState) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress { processed: usize, total: usize },
    StateChanged(MigrationState),
}

/// Forwards events to a channel, e.g. for a UI task
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_progress(&self, processed: usize, total: usize) {
        // Receiver gone means nobody is watching; the run continues
        let _ = self.tx.send(ProgressEvent::Progress { processed, total });
    }

    fn on_state_change(&self, state: MigrationState) {
        let _ = self.tx.send(ProgressEvent::StateChanged(state));
    }
}
