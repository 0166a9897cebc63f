use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(0, 255), 0);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(255, 128), 128);
}

#[test]
fn gcd_reduces_common_video_sizes() {
    assert_eq!(gcd(1920, 1080), 120);
    assert_eq!(gcd(1080, 1080), 1080);
    assert_eq!(gcd(640, 480), 160);
    assert_eq!(gcd(7, 0), 7);
    assert_eq!(gcd(0, 0), 0);
}

#[test]
fn opacity_maps_to_full_byte_range() {
    assert_eq!(opacity_to_u8(0.0), 0);
    assert_eq!(opacity_to_u8(1.0), 255);
    assert_eq!(opacity_to_u8(2.0), 255);
    assert_eq!(opacity_to_u8(-1.0), 0);
}
