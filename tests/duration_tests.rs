use playmidi::midi::{MidiError, MockService, MusicTime, Result, SequenceService};
use playmidi::sequence_length;
use std::path::Path;

fn length_of(service: &mut MockService) -> Result<MusicTime> {
    let sequence = service.load_sequence(Path::new("song.mid")).unwrap();
    sequence_length(service, &sequence)
}

#[test]
fn test_longest_track_wins() {
    let mut service = MockService::new().with_tracks(&[4.0, 10.0, 7.0]);
    assert_eq!(length_of(&mut service).unwrap(), 10.0);
}

#[test]
fn test_zero_tracks_is_zero() {
    let mut service = MockService::new().with_tracks(&[]);
    assert_eq!(length_of(&mut service).unwrap(), 0.0);
}

#[test]
fn test_single_track() {
    let mut service = MockService::new().with_tracks(&[3.25]);
    assert_eq!(length_of(&mut service).unwrap(), 3.25);
}

#[test]
fn test_equal_lengths() {
    let mut service = MockService::new().with_tracks(&[5.0, 5.0, 5.0]);
    assert_eq!(length_of(&mut service).unwrap(), 5.0);
}

#[test]
fn test_all_empty_tracks() {
    let mut service = MockService::new().with_tracks(&[0.0, 0.0]);
    assert_eq!(length_of(&mut service).unwrap(), 0.0);
}

#[test]
fn test_track_order_does_not_matter() {
    let lengths = [4.0, 10.0, 7.0, 2.5];
    let mut permutations = Vec::new();
    for a in 0..4 {
        for b in 0..4 {
            for c in 0..4 {
                for d in 0..4 {
                    let idx = [a, b, c, d];
                    let mut seen = idx.to_vec();
                    seen.sort();
                    seen.dedup();
                    if seen.len() == 4 {
                        permutations.push(idx.map(|i| lengths[i]));
                    }
                }
            }
        }
    }
    assert_eq!(permutations.len(), 24);

    for order in permutations {
        let mut service = MockService::new().with_tracks(&order);
        assert_eq!(length_of(&mut service).unwrap(), 10.0, "order {:?}", order);
    }
}

#[test]
fn test_failed_track_query_is_an_error() {
    let mut service = MockService::new()
        .with_tracks(&[4.0, 10.0, 7.0])
        .with_failing_track(1);
    let err = length_of(&mut service).unwrap_err();
    assert!(matches!(err, MidiError::TrackLengthError { index: 1, .. }));
}

#[test]
fn test_failure_after_longest_track_still_fails() {
    let mut service = MockService::new()
        .with_tracks(&[10.0, 1.0])
        .with_failing_track(1);
    assert!(length_of(&mut service).is_err());
}
