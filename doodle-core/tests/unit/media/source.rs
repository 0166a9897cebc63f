use super::*;

fn solid(v: u8) -> Vec<u8> {
    [v, v, v, 255].repeat(4)
}

fn source(n: u8) -> MemorySource {
    let frames = (0..n).map(solid).collect();
    MemorySource::new(2, 2, Fps::whole(10).unwrap(), frames).unwrap()
}

#[test]
fn memory_source_rejects_mismatched_frames() {
    let err = MemorySource::new(2, 2, Fps::whole(10).unwrap(), vec![vec![0; 3]]).unwrap_err();
    assert!(matches!(err, DoodleError::SourceLoad(_)));
}

#[test]
fn playback_starts_at_the_seeked_frame() {
    let mut src = source(3);
    assert!((src.info().duration_secs - 0.3).abs() < 1e-9);
    assert_eq!(src.seek_to_start().unwrap(), Some(solid(0).as_slice()));
    assert_eq!(src.state(), PlaybackState::Ready);
    assert_eq!(src.next_frame(), None, "not playing yet");

    src.play().unwrap();
    assert_eq!(src.next_frame(), Some(solid(0).as_slice()));
    assert_eq!(src.current_time(), 0.0);
    assert_eq!(src.next_frame(), Some(solid(1).as_slice()));
    assert_eq!(src.next_frame(), Some(solid(2).as_slice()));
    assert!((src.current_time() - 0.2).abs() < 1e-9);
    assert_eq!(src.next_frame(), None);
    assert_eq!(src.state(), PlaybackState::Ended);
}

#[test]
fn empty_source_ends_immediately() {
    let mut src = source(0);
    assert_eq!(src.seek_to_start().unwrap(), None);
    src.play().unwrap();
    assert_eq!(src.next_frame(), None);
    assert_eq!(src.state(), PlaybackState::Ended);
}

#[test]
fn play_without_seek_starts_from_zero() {
    let mut src = source(2);
    src.play().unwrap();
    assert_eq!(src.next_frame(), Some(solid(0).as_slice()));
    assert_eq!(src.canvas(), Canvas { width: 2, height: 2 });
}
