use rayon::prelude::*;

use crate::foundation::error::{StoryError, StoryResult};

/// Above this sigma the exact kernel gets too wide; switch to three box passes.
pub(crate) const EXACT_SIGMA_LIMIT: f32 = 8.0;

/// Gaussian blur of a premultiplied RGBA8 buffer with standard deviation `sigma`. Edges clamp.
pub fn blur_rgba8_premul(src: &[u8], width: u32, height: u32, sigma: f32) -> StoryResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| StoryError::validation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(StoryError::validation(
            "blur_rgba8_premul expects src matching width*height*4",
        ));
    }
    if !sigma.is_finite() || sigma <= 0.0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let (w, h) = (width as usize, height as usize);
    let mut out = if sigma <= EXACT_SIGMA_LIMIT {
        let radius = (3.0 * sigma).ceil() as u32;
        let kernel = gaussian_kernel_q16(radius, sigma)?;
        let mut tmp = vec![0u8; expected_len];
        let mut out = vec![0u8; expected_len];
        horizontal_pass(src, &mut tmp, w, &kernel);
        vertical_pass(&tmp, &mut out, w, h, &kernel);
        out
    } else {
        box_blur_3(src, w, h, sigma)
    };
    clamp_channels_to_alpha(&mut out);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> StoryResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(StoryError::unknown("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&q| i64::from(q)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], w: usize, k: &[u32]) {
    let radius = (k.len() / 2) as isize;
    let row_len = w * 4;
    dst.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(out_row, in_row)| {
            for x in 0..w as isize {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as isize - radius).clamp(0, w as isize - 1) as usize;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(in_row[sx * 4 + c]);
                    }
                }
                let o = x as usize * 4;
                for c in 0..4 {
                    out_row[o + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], w: usize, h: usize, k: &[u32]) {
    let radius = (k.len() / 2) as isize;
    let row_len = w * 4;
    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..w {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius).clamp(0, h as isize - 1) as usize;
                    let idx = sy * row_len + x * 4;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                    }
                }
                for c in 0..4 {
                    out_row[x * 4 + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

/// Box widths whose triple convolution approximates a Gaussian of `sigma`.
pub(crate) fn box_sizes_for_gauss(sigma: f32) -> [usize; 3] {
    let sigma = f64::from(sigma.abs());
    if sigma <= 0.0 {
        return [1, 1, 1];
    }
    let n = 3.0f64;
    let w_ideal = ((12.0 * sigma * sigma / n) + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wl = wl.max(1);
    let wu = wl + 2;
    let wlf = wl as f64;
    let m_ideal =
        (12.0 * sigma * sigma - n * wlf * wlf - 4.0 * n * wlf - 3.0 * n) / (-4.0 * wlf - 4.0);
    let m = m_ideal.round().clamp(0.0, n) as usize;

    let mut sizes = [wu as usize; 3];
    for s in sizes.iter_mut().take(m) {
        *s = wl as usize;
    }
    sizes
}

fn box_blur_3(src: &[u8], w: usize, h: usize, sigma: f32) -> Vec<u8> {
    let sizes = box_sizes_for_gauss(sigma);
    let mut a = src.to_vec();
    let mut b = vec![0u8; src.len()];
    for size in sizes {
        box_blur_rows(&a, &mut b, w, (size - 1) / 2);
        std::mem::swap(&mut a, &mut b);
    }
    let mut t = transpose_rgba8(&a, w, h);
    let mut tb = vec![0u8; t.len()];
    for size in sizes {
        box_blur_rows(&t, &mut tb, h, (size - 1) / 2);
        std::mem::swap(&mut t, &mut tb);
    }
    transpose_rgba8(&t, h, w)
}

fn box_blur_rows(src: &[u8], dst: &mut [u8], w: usize, radius: usize) {
    let row_len = w * 4;
    if radius == 0 {
        dst.copy_from_slice(src);
        return;
    }
    let window = (2 * radius + 1) as u32;
    let last = w as isize - 1;
    let r = radius as isize;
    dst.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(out_row, in_row)| {
            for c in 0..4 {
                let at = |x: isize| u32::from(in_row[x.clamp(0, last) as usize * 4 + c]);
                let mut sum: u32 = (-r..=r).map(&at).sum();
                for x in 0..w as isize {
                    out_row[x as usize * 4 + c] = ((sum + window / 2) / window) as u8;
                    sum = sum + at(x + r + 1) - at(x - r);
                }
            }
        });
}

fn transpose_rgba8(src: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(h * 4).enumerate().for_each(|(x, col)| {
        for y in 0..h {
            let s = (y * w + x) * 4;
            col[y * 4..y * 4 + 4].copy_from_slice(&src[s..s + 4]);
        }
    });
    out
}

fn clamp_channels_to_alpha(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = (*c).min(a);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/blur.rs"]
mod tests;
