use super::*;
use crate::foundation::core::Dimensions;

fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> SourceImage {
    let bytes = rgba.repeat((w * h) as usize);
    SourceImage::from_premul_rgba8(Dimensions::new(w, h), &bytes).unwrap()
}

fn close(a: [u8; 4], b: [u8; 4], tol: i32) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() <= tol)
}

#[test]
fn solid_fill_covers_every_pixel() {
    let mut c = PixelCanvas::new(Dimensions::new(4, 4)).unwrap();
    draw_solid(&mut c, Rgb8::new(1, 2, 3));
    assert!(c.data().chunks_exact(4).all(|p| p == [1, 2, 3, 255]));
}

#[test]
fn zero_radius_draws_square_corners() {
    let mut c = PixelCanvas::new(Dimensions::new(30, 30)).unwrap();
    let img = solid_image(10, 10, [255, 0, 0, 255]);
    let rect = PixelRect::new(5, 5, 20, 20);
    clip_rounded_foreground(&mut c, rect, 0, |ctx| draw_image(ctx, &img, rect)).unwrap();
    assert!(close(c.pixel(5, 5).unwrap(), [255, 0, 0, 255], 2));
    assert_eq!(c.pixel(4, 4).unwrap(), [0, 0, 0, 0]);
}

#[test]
fn rounded_clip_cuts_corners_but_keeps_center() {
    let mut c = PixelCanvas::new(Dimensions::new(30, 30)).unwrap();
    draw_solid(&mut c, Rgb8::WHITE);
    let img = solid_image(10, 10, [255, 0, 0, 255]);
    let rect = PixelRect::new(5, 5, 20, 20);
    clip_rounded_foreground(&mut c, rect, 8, |ctx| draw_image(ctx, &img, rect)).unwrap();
    assert_eq!(c.pixel(5, 5).unwrap(), [255, 255, 255, 255]);
    assert!(close(c.pixel(15, 15).unwrap(), [255, 0, 0, 255], 2));
    assert!(close(c.pixel(15, 5).unwrap(), [255, 0, 0, 255], 2));
}

#[test]
fn rounded_path_is_closed_and_bounded() {
    let rect = PixelRect::new(0, 0, 10, 40);
    let path = rounded_rect_path(rect, 100.0);
    let bbox = vello_cpu::kurbo::Shape::bounding_box(&path);
    assert_eq!((bbox.x0, bbox.y0, bbox.x1, bbox.y1), (0.0, 0.0, 10.0, 40.0));
    assert!(matches!(
        path.elements().last(),
        Some(vello_cpu::kurbo::PathEl::ClosePath)
    ));
}

#[test]
fn cover_blur_of_flat_image_is_flat_and_darkened() {
    let mut c = PixelCanvas::new(Dimensions::new(18, 42)).unwrap();
    let img = solid_image(16, 9, [255, 0, 0, 255]);
    let cover = crate::geometry::cover_rect(c.dimensions(), img.dimensions());
    draw_cover_blur(&mut c, &img, cover, 3).unwrap();
    for (x, y) in [(0, 0), (9, 21), (17, 41)] {
        let p = c.pixel(x, y).unwrap();
        assert!(close(p, [217, 0, 0, 255], 2), "({x},{y}) = {p:?}");
    }
}

#[test]
fn ambient_keeps_base_outside_glow_reach() {
    let mut c = PixelCanvas::new(Dimensions::new(40, 40)).unwrap();
    let img = solid_image(10, 10, [0, 0, 255, 255]);
    let fg = PixelRect::new(15, 15, 10, 10);
    draw_ambient(&mut c, &img, Rgb8::WHITE, fg, 2).unwrap();
    assert_eq!(c.pixel(0, 0).unwrap(), [255, 255, 255, 255]);
    let center = c.pixel(20, 20).unwrap();
    assert!(center[2] > 200 && center[0] < 60, "{center:?}");
}
