use super::*;

#[test]
fn wall_clock_ticks_are_paced() {
    let mut t = WallClockTicker::new(Duration::from_millis(5), CancellationToken::new());
    let start = Instant::now();
    for _ in 0..4 {
        assert_eq!(t.paced_tick(Duration::from_millis(10)), Tick::Fired);
    }
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn cancellation_stops_a_wall_clock_wait() {
    let cancel = CancellationToken::new();
    let mut t = WallClockTicker::new(Duration::from_secs(60), cancel.clone());
    let trigger = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        trigger.cancel();
    });
    let start = Instant::now();
    assert_eq!(t.animation_tick(), Tick::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
}

#[test]
fn unpaced_ticker_counts_ticks_by_kind() {
    let cancel = CancellationToken::new();
    let mut t = UnpacedTicker::new(cancel.clone());
    t.paced_tick(Duration::from_secs(1));
    t.paced_tick(Duration::from_secs(1));
    t.animation_tick();
    assert_eq!((t.paced_ticks(), t.animation_ticks()), (2, 1));

    cancel.cancel();
    assert_eq!(t.paced_tick(Duration::ZERO), Tick::Cancelled);
    assert_eq!(t.paced_ticks(), 2);
}
