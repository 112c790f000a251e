use super::*;
use crate::foundation::core::{Dimensions, Rgb8};
use crate::foundation::error::StoryError;
use crate::params::{AmbientBase, BackgroundKind, CornerRadius};

fn gradient_image(w: u32, h: u32) -> SourceImage {
    let mut bytes = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            bytes.extend_from_slice(&[(x * 255 / w) as u8, (y * 255 / h) as u8, 128, 255]);
        }
    }
    SourceImage::from_premul_rgba8(Dimensions::new(w, h), &bytes).unwrap()
}

#[test]
fn zero_sized_images_never_reach_the_compositor() {
    let err = SourceImage::from_premul_rgba8(Dimensions::new(0, 5), &[]).unwrap_err();
    assert!(matches!(err, StoryError::InvalidImageDimensions { .. }));
}

#[test]
fn compositing_twice_is_pixel_identical() {
    let img = gradient_image(40, 60);
    for background in [
        BackgroundKind::CoverBlur,
        BackgroundKind::AmbientGlow,
        BackgroundKind::CustomColor,
    ] {
        let params = CompositingParameters {
            background,
            scale: 0.7,
            corner_radius: CornerRadius::Medium,
            blur_percent: 10.0,
            ..Default::default()
        };
        let (_, a) = render_canvas(&img, &params).unwrap();
        let (_, b) = render_canvas(&img, &params).unwrap();
        assert_eq!(a, b, "{background:?}");
    }
}

#[test]
fn canvas_matches_layout() {
    let img = gradient_image(100, 200);
    let (layout, canvas) = render_canvas(&img, &CompositingParameters::default()).unwrap();
    assert_eq!(canvas.dimensions(), layout.canvas);
    assert_eq!(layout.canvas, Dimensions::new(100, 233));
}

#[test]
fn flat_backgrounds_use_resolved_color() {
    let img = gradient_image(20, 20);
    let cases = [
        (BackgroundKind::FlatBlack, None, [0, 0, 0, 255]),
        (BackgroundKind::FlatWhite, None, [255, 255, 255, 255]),
        (BackgroundKind::CustomColor, Some(Rgb8::new(10, 200, 30)), [10, 200, 30, 255]),
        (BackgroundKind::CustomColor, None, [0, 0, 0, 255]),
    ];
    for (background, custom_color, expected) in cases {
        let params = CompositingParameters {
            background,
            custom_color,
            scale: 0.5,
            ..Default::default()
        };
        let (_, canvas) = render_canvas(&img, &params).unwrap();
        assert_eq!(canvas.pixel(0, 0).unwrap(), expected, "{background:?}");
    }
}

#[test]
fn ambient_base_shows_in_far_corner() {
    let img = gradient_image(20, 20);
    let params = CompositingParameters {
        background: BackgroundKind::AmbientGlow,
        ambient_base: AmbientBase::White,
        scale: 0.5,
        blur_percent: 5.0,
        ..Default::default()
    };
    let (_, canvas) = render_canvas(&img, &params).unwrap();
    assert_eq!(canvas.pixel(0, 0).unwrap(), [255, 255, 255, 255]);
}

#[test]
fn every_canvas_pixel_is_opaque() {
    let img = gradient_image(30, 20);
    for background in [BackgroundKind::CoverBlur, BackgroundKind::AmbientGlow] {
        let params = CompositingParameters {
            background,
            corner_radius: CornerRadius::Large,
            ..Default::default()
        };
        let (_, canvas) = render_canvas(&img, &params).unwrap();
        assert!(canvas.data().chunks_exact(4).all(|p| p[3] == 255), "{background:?}");
    }
}

#[test]
fn quality_cap_shrinks_output() {
    let img = gradient_image(300, 600);
    let params = CompositingParameters {
        max_dimension: Some(100),
        ..Default::default()
    };
    let enc = composite(&img, &params, OutputFormat::Png).unwrap();
    assert_eq!((enc.width, enc.height), (50, 117));
}

#[test]
fn invalid_parameters_are_rejected() {
    let img = gradient_image(10, 10);
    let params = CompositingParameters {
        scale: 0.1,
        ..Default::default()
    };
    assert!(matches!(
        render_canvas(&img, &params),
        Err(StoryError::Validation(_))
    ));
}
