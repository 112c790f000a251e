use super::*;

#[test]
fn blur_sigma_0_is_identity() {
    let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    let out = blur_rgba8_premul(&src, 1, 2, 0.0).unwrap();
    assert_eq!(out, src);
}

#[test]
fn blur_rejects_mismatched_buffer() {
    assert!(blur_rgba8_premul(&[0u8; 7], 1, 2, 1.0).is_err());
}

#[test]
fn blur_constant_image_is_identity_on_both_paths() {
    let (w, h) = (9u32, 7u32);
    let px = [10u8, 20u8, 30u8, 40u8];
    let src = px.repeat((w * h) as usize);
    for sigma in [1.5, 20.0] {
        let out = blur_rgba8_premul(&src, w, h, sigma).unwrap();
        assert_eq!(out, src, "sigma {sigma}");
    }
}

#[test]
fn blur_spreads_energy_from_single_pixel() {
    let (w, h) = (15u32, 15u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((7 * w + 7) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let out = blur_rgba8_premul(&src, w, h, 1.2).unwrap();

    let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
    assert!(nonzero > 1);
    let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 12);
}

#[test]
fn large_sigma_box_path_smooths_a_step_edge() {
    let (w, h) = (64u32, 4u32);
    let mut src = Vec::with_capacity((w * h * 4) as usize);
    for _y in 0..h {
        for x in 0..w {
            let v = if x < w / 2 { 0u8 } else { 255u8 };
            src.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let out = blur_rgba8_premul(&src, w, h, 10.0).unwrap();
    let row: Vec<u8> = out[..(w * 4) as usize].chunks_exact(4).map(|p| p[0]).collect();
    assert!(row.windows(2).all(|p| p[0] <= p[1]));
    assert!(row[(w / 2) as usize] > 64 && row[(w / 2) as usize] < 192);
    assert!(out.chunks_exact(4).all(|p| p[3] == 255));
}

#[test]
fn box_sizes_are_odd_and_grow_with_sigma() {
    let small = box_sizes_for_gauss(9.0);
    let large = box_sizes_for_gauss(40.0);
    for s in small.iter().chain(large.iter()) {
        assert_eq!(s % 2, 1);
    }
    assert!(large.iter().sum::<usize>() > small.iter().sum::<usize>());
}

#[test]
fn blurred_channels_never_exceed_alpha() {
    let (w, h) = (20u32, 20u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    for (i, px) in src.chunks_exact_mut(4).enumerate() {
        if i % 3 == 0 {
            px.copy_from_slice(&[200, 100, 50, 200]);
        }
    }
    for sigma in [2.0, 12.0] {
        let out = blur_rgba8_premul(&src, w, h, sigma).unwrap();
        assert!(out.chunks_exact(4).all(|p| p[0] <= p[3] && p[1] <= p[3] && p[2] <= p[3]));
    }
}
