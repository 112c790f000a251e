use super::*;
use crate::foundation::core::Dimensions;

fn two_tone() -> SourceImage {
    // Left pixel red, right pixel half-transparent blue (premultiplied).
    let bytes = [255u8, 0, 0, 255, 0, 0, 128, 128];
    SourceImage::from_premul_rgba8(Dimensions::new(2, 1), &bytes).unwrap()
}

#[test]
fn picks_by_display_coordinates() {
    let img = two_tone();
    assert_eq!(pick_color(&img, 10.0, 5.0, 100.0, 10.0).unwrap(), Rgb8::new(255, 0, 0));
    assert_eq!(pick_color(&img, 90.0, 5.0, 100.0, 10.0).unwrap(), Rgb8::new(0, 0, 255));
}

#[test]
fn out_of_range_points_clamp() {
    let img = two_tone();
    assert_eq!(pick_color(&img, -50.0, 0.0, 100.0, 10.0).unwrap(), Rgb8::new(255, 0, 0));
    assert_eq!(pick_color(&img, 500.0, 99.0, 100.0, 10.0).unwrap(), Rgb8::new(0, 0, 255));
}

#[test]
fn zero_display_box_is_rejected() {
    assert!(pick_color(&two_tone(), 0.0, 0.0, 0.0, 10.0).is_err());
}
