use playmidi::midi::{MidiError, MockClock, MockPlayer, MockService, SequenceService};
use playmidi::playback::SessionState;
use playmidi::ui::LineProgress;
use playmidi::{drive_playback, PlayerSession, PollSettings};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn session(service: &mut MockService) -> PlayerSession<MockPlayer> {
    let sequence = service.load_sequence(Path::new("song.mid")).unwrap();
    PlayerSession::new(service.create_player(sequence).unwrap())
}

fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        stall_timeout: Duration::from_millis(200),
    }
}

fn progress_values(output: &[u8]) -> Vec<f64> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .trim_end()
        .split('\r')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap())
        .collect()
}

fn count_calls(service: &MockService, name: &str) -> usize {
    service.calls().iter().filter(|c| c.as_str() == name).count()
}

#[test]
fn test_zero_length_polls_exactly_once() {
    let mut service = MockService::new();
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    let summary = drive_playback(
        &mut session,
        0.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.polls, 1);
    assert_eq!(summary.final_time, 0.0);
    assert_eq!(progress.into_inner(), b"\r0.000000\n".to_vec());
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(count_calls(&service, "start"), 1);
    assert_eq!(count_calls(&service, "stop"), 1);
}

#[test]
fn test_stops_once_time_reaches_length() {
    let mut service = MockService::new().with_clock(MockClock::Steps {
        start: 0.0,
        step: 2.5,
    });
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    let summary = drive_playback(
        &mut session,
        10.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.polls, 5);
    assert_eq!(summary.final_time, 10.0);
    assert_eq!(
        progress_values(&progress.into_inner()),
        vec![0.0, 2.5, 5.0, 7.5, 10.0]
    );
    assert_eq!(count_calls(&service, "stop"), 1);
}

#[test]
fn test_overshoot_terminates() {
    let mut service = MockService::new().with_clock(MockClock::Script(vec![0.4, 3.9, 11.2]));
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    let summary = drive_playback(
        &mut session,
        10.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.polls, 3);
    assert_eq!(summary.final_time, 11.2);
}

#[test]
fn test_progress_is_monotonic() {
    let mut service = MockService::new().with_clock(MockClock::Script(vec![
        0.0, 0.0, 0.5, 0.5, 0.75, 1.0, 1.0, 1.5, 2.0,
    ]));
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    drive_playback(
        &mut session,
        2.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(false),
    )
    .unwrap();

    let values = progress_values(&progress.into_inner());
    assert_eq!(values.len(), 9);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_start_failure_still_stops_player() {
    let mut service = MockService::new().failing_start();
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    let err = drive_playback(
        &mut session,
        4.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(false),
    )
    .unwrap_err();

    assert!(matches!(err, MidiError::PlayerError(_)));
    assert_eq!(session.state(), SessionState::Stopped);
    let calls = service.calls();
    let start = calls.iter().position(|c| c == "start").unwrap();
    assert_eq!(calls[start + 1], "stop");
    // Nothing was polled
    assert!(progress.into_inner().is_empty());
}

#[test]
fn test_frozen_clock_is_fatal() {
    let mut service = MockService::new().with_clock(MockClock::Steps {
        start: 1.0,
        step: 0.0,
    });
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());
    let poll = PollSettings {
        interval: Duration::from_millis(1),
        stall_timeout: Duration::from_millis(25),
    };

    let err = drive_playback(&mut session, 8.0, &poll, &mut progress, &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(err, MidiError::Stalled { time, .. } if time == 1.0));
    assert_eq!(count_calls(&service, "stop"), 1);
}

#[test]
fn test_interrupt_is_stop_then_exit() {
    let mut service = MockService::new();
    let mut session = session(&mut service);
    let mut progress = LineProgress::new(Vec::new());

    let err = drive_playback(
        &mut session,
        100.0,
        &fast_poll(),
        &mut progress,
        &AtomicBool::new(true),
    )
    .unwrap_err();

    assert_eq!(err, MidiError::Interrupted);
    assert_eq!(count_calls(&service, "stop"), 1);
    assert!(!session.player().is_running());
}
