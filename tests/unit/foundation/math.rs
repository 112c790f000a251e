use super::*;

#[test]
fn premultiply_then_unpremultiply_is_close() {
    let mut px = vec![200u8, 100, 50, 128, 10, 20, 30, 0, 1, 2, 3, 255];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[4..8], &[0, 0, 0, 0]);
    assert_eq!(&px[8..12], &[1, 2, 3, 255]);
    unpremultiply_rgba8_in_place(&mut px);
    for (got, want) in px[..3].iter().zip([200u8, 100, 50]) {
        assert!((i32::from(*got) - i32::from(want)).abs() <= 2);
    }
}

#[test]
fn round_px_saturates_and_rounds() {
    assert_eq!(round_px(-3.0), 0);
    assert_eq!(round_px(f64::NAN), 0);
    assert_eq!(round_px(2.5), 3);
    assert_eq!(round_px(39.4), 39);
}

#[test]
fn mul_div255_bounds() {
    assert_eq!(mul_div255(255, 255), 255);
    assert_eq!(mul_div255(0, 255), 0);
    assert_eq!(mul_div255(128, 255), 128);
}
