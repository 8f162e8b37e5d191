//! Tests for progress reporters

use shared::MigrationState;

use crate::services::{ChannelReporter, ProgressEvent, SilentReporter, TracingReporter};
use crate::traits::ProgressReporter;

#[tokio::test]
async fn test_channel_reporter_forwards_events_in_order() {
    let (reporter, mut rx) = ChannelReporter::new();

    reporter.on_state_change(MigrationState::CopyInProgress);
    reporter.on_progress(50, 120);
    reporter.on_progress(100, 120);

    assert_eq!(rx.recv().await, Some(ProgressEvent::StateChanged(MigrationState::CopyInProgress)));
    assert_eq!(rx.recv().await, Some(ProgressEvent::Progress { processed: 50, total: 120 }));
    assert_eq!(rx.recv().await, Some(ProgressEvent::Progress { processed: 100, total: 120 }));
}

#[test]
fn test_channel_reporter_survives_dropped_receiver() {
    let (reporter, rx) = ChannelReporter::new();
    drop(rx);
    reporter.on_progress(1, 1);
    reporter.on_state_change(MigrationState::Completed);
}

#[test]
fn test_tracing_and_silent_reporters_accept_empty_totals() {
    shared::logging::init_tracing_with_level(Some("debug"));
    TracingReporter.on_progress(0, 0);
    TracingReporter.on_state_change(MigrationState::Idle);
    SilentReporter.on_progress(0, 0);
    SilentReporter.on_state_change(MigrationState::Idle);
}
