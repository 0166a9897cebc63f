use super::*;

#[test]
fn over_at_zero_opacity_keeps_destination() {
    let dst = [10, 20, 30, 255];
    assert_eq!(over(dst, [200, 100, 50, 255], 0.0), dst);
}

#[test]
fn over_opaque_at_full_opacity_replaces_destination() {
    assert_eq!(over([10, 20, 30, 255], [200, 100, 50, 255], 1.0), [200, 100, 50, 255]);
}

#[test]
fn over_half_opacity_blends_linearly() {
    let out = over([0, 0, 0, 255], [255, 255, 255, 255], 0.5);
    assert_eq!(out[3], 255);
    assert!((127..=129).contains(&out[0]), "got {out:?}");
}

#[test]
fn over_self_is_identity_for_opaque_pixels() {
    let px = [40, 80, 120, 255];
    for op in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let out = over(px, px, op);
        for c in 0..3 {
            assert!(out[c].abs_diff(px[c]) <= 1, "opacity {op}: {out:?}");
        }
    }
}

#[test]
fn over_in_place_checks_lengths() {
    let mut dst = vec![0u8; 8];
    assert!(over_in_place(&mut dst, &[0u8; 4], 1.0).is_err());
    over_in_place(&mut dst, &[9u8, 9, 9, 255, 1, 2, 3, 255], 1.0).unwrap();
    assert_eq!(dst, vec![9, 9, 9, 255, 1, 2, 3, 255]);
}
