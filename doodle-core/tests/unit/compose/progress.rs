use super::*;

#[test]
fn progress_never_decreases_and_is_clamped() {
    let mut seen = Vec::new();
    let mut cb = |p: f64| seen.push(p);
    let mut r = ProgressReporter::new(&mut cb);
    r.report(0.0);
    r.report(40.0);
    r.report(20.0);
    r.report(40.0);
    r.report(f64::NAN);
    r.report(250.0);
    assert_eq!(r.last(), Some(100.0));
    drop(r);
    assert_eq!(seen, vec![0.0, 40.0, 100.0]);
}

#[test]
fn report_within_scales_into_band() {
    let mut seen = Vec::new();
    let mut cb = |p: f64| seen.push(p);
    let mut r = ProgressReporter::new(&mut cb);
    r.report_within(SETUP_END, HOLD_END, 0.5);
    r.report_within(HOLD_END, TRANSITION_END, 2.0);
    drop(r);
    assert_eq!(seen, vec![40.0, 60.0]);
}
