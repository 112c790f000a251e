use super::*;
use crate::params::{AmbientBase, CornerRadius};

#[test]
fn canvas_for_1000x2000_is_1000x2333() {
    let c = canvas_dimensions(Dimensions::new(1000, 2000)).unwrap();
    assert_eq!(c, Dimensions::new(1000, 2333));
}

#[test]
fn canvas_keeps_height_for_very_tall_sources() {
    let c = canvas_dimensions(Dimensions::new(300, 2100)).unwrap();
    assert_eq!(c, Dimensions::new(900, 2100));
}

#[test]
fn canvas_rejects_zero_sides() {
    assert!(canvas_dimensions(Dimensions::new(0, 100)).is_err());
    assert!(canvas_dimensions(Dimensions::new(100, 0)).is_err());
}

#[test]
fn canvas_hits_target_ratio_and_contains_source() {
    let sides = [1u32, 2, 7, 9, 21, 100, 333, 640, 1080, 1920, 4000];
    for &w in &sides {
        for &h in &sides {
            let src = Dimensions::new(w, h);
            let c = canvas_dimensions(src).unwrap();
            assert!(c.width >= w && c.height >= h, "{src:?} -> {c:?}");
            assert!(c.area() >= src.area());
            let err = (f64::from(c.width) - f64::from(c.height) * TARGET_ASPECT_RATIO).abs();
            assert!(err <= 0.5 + 1e-9, "{src:?} -> {c:?} off by {err}");
        }
    }
}

#[test]
fn blur_five_percent_of_800x1200_is_40() {
    assert_eq!(blur_pixels(5.0, Dimensions::new(800, 1200)), 40);
    assert_eq!(blur_pixels(5.0, Dimensions::new(1200, 800)), 40);
    assert_eq!(blur_pixels(0.0, Dimensions::new(1200, 800)), 0);
}

#[test]
fn radius_tier_zero_is_zero_and_tiers_increase() {
    for (w, h) in [(1, 1), (10, 10), (600, 1400), (1400, 600), (4000, 3000)] {
        let fg = Dimensions::new(w, h);
        assert_eq!(border_radius_pixels(CornerRadius::None, fg), 0);
        if fg.shorter_side() >= 100 {
            let r: Vec<u32> = CornerRadius::ALL
                .iter()
                .map(|t| border_radius_pixels(*t, fg))
                .collect();
            assert!(r.windows(2).all(|p| p[0] < p[1]), "{fg:?}: {r:?}");
        }
    }
    assert_eq!(
        border_radius_pixels(CornerRadius::Large, Dimensions::new(600, 1400)),
        60
    );
}

#[test]
fn cap_scales_longer_side_only_when_needed() {
    let img = Dimensions::new(1000, 2000);
    assert_eq!(capped_dimensions(img, None), img);
    assert_eq!(capped_dimensions(img, Some(4000)), img);
    assert_eq!(capped_dimensions(img, Some(400)), Dimensions::new(200, 400));
    assert_eq!(
        capped_dimensions(Dimensions::new(1000, 1), Some(100)),
        Dimensions::new(100, 1)
    );
}

#[test]
fn cover_rect_covers_canvas() {
    let canvas = Dimensions::new(900, 2100);
    let r = cover_rect(canvas, Dimensions::new(1600, 900));
    assert!(r.x <= 0 && r.y <= 0);
    assert!(r.x + r.width as i32 >= 900);
    assert!(r.y + r.height as i32 >= 2100);
}

#[test]
fn radius_uses_scaled_foreground() {
    let params = CompositingParameters {
        scale: 0.5,
        corner_radius: CornerRadius::Large,
        background: BackgroundKind::FlatBlack,
        ..Default::default()
    };
    let layout = plan_layout(Dimensions::new(800, 1200), &params).unwrap();
    assert_eq!(layout.foreground.dimensions(), Dimensions::new(400, 600));
    assert_eq!(layout.radius_px, 40);
}

#[test]
fn blur_uses_capped_image_not_canvas() {
    let params = CompositingParameters {
        blur_percent: 10.0,
        max_dimension: Some(600),
        ..Default::default()
    };
    let layout = plan_layout(Dimensions::new(800, 1200), &params).unwrap();
    assert_eq!(layout.image, Dimensions::new(400, 600));
    assert!(matches!(
        layout.background,
        BackgroundPlan::CoverBlur { blur_px: 40, .. }
    ));
}

#[test]
fn ambient_glow_rect_matches_foreground_for_every_combination() {
    let sizes = [(1000, 2000), (800, 1200), (1920, 1080), (37, 91), (1, 1)];
    let scales = [0.5, 0.55, 0.75, 0.9, 1.0];
    let bases = [AmbientBase::Black, AmbientBase::White, AmbientBase::Custom];
    let caps = [None, Some(100), Some(400)];
    for (w, h) in sizes {
        for scale in scales {
            for base in bases {
                for radius in CornerRadius::ALL {
                    for cap in caps {
                        let params = CompositingParameters {
                            background: BackgroundKind::AmbientGlow,
                            ambient_base: base,
                            scale,
                            corner_radius: radius,
                            max_dimension: cap,
                            ..Default::default()
                        };
                        let layout = plan_layout(Dimensions::new(w, h), &params).unwrap();
                        assert_eq!(layout.glow_rect(), Some(layout.foreground));
                    }
                }
            }
        }
    }
}

#[test]
fn foreground_is_centered() {
    let canvas = Dimensions::new(900, 2100);
    let r = foreground_rect(canvas, Dimensions::new(600, 1400), 1.0);
    assert_eq!(r, PixelRect::new(150, 350, 600, 1400));
}

#[test]
fn layout_validates_inputs() {
    let bad = CompositingParameters {
        scale: 2.0,
        ..Default::default()
    };
    assert!(plan_layout(Dimensions::new(10, 10), &bad).is_err());
    assert!(matches!(
        plan_layout(Dimensions::new(0, 10), &CompositingParameters::default()),
        Err(crate::foundation::error::StoryError::InvalidImageDimensions { .. })
    ));
}
