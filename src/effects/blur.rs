use crate::effects::composite::{premultiply_in_place, unpremultiply_in_place};
use crate::foundation::core::{Bitmap, PixelFormat};
use crate::foundation::error::{PixmarkError, PixmarkResult};

/// Largest sigma any blur accepts. Beyond this the kernel and its padding outgrow any
/// reasonable image.
pub const MAX_SIGMA: f64 = 250.0;

/// Kernel half-width used for a given sigma: `ceil(3 * sigma)`.
pub fn kernel_radius(sigma: f64) -> u32 {
    (3.0 * sigma).ceil().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// `kernel_radius` as a signed pixel margin.
pub fn kernel_margin(sigma: f64) -> PixmarkResult<i32> {
    i32::try_from(kernel_radius(sigma))
        .map_err(|_| PixmarkError::invalid_argument(format!("blur radius {sigma} is too large")))
}

/// `what` must be a finite sigma in `(0, MAX_SIGMA]`, or `[0, MAX_SIGMA]` with `allow_zero`.
pub fn check_sigma(what: &str, sigma: f64, allow_zero: bool) -> PixmarkResult<()> {
    let low_ok = if allow_zero { sigma >= 0.0 } else { sigma > 0.0 };
    if !(sigma.is_finite() && low_ok) {
        let bound = if allow_zero { ">= 0" } else { "> 0" };
        return Err(PixmarkError::invalid_argument(format!(
            "{what} must be {bound} (got {sigma})"
        )));
    }
    if sigma > MAX_SIGMA {
        return Err(PixmarkError::invalid_argument(format!(
            "{what} must be at most {MAX_SIGMA} (got {sigma})"
        )));
    }
    Ok(())
}

/// Blur premultiplied RGBA8 bytes with a `2 * radius + 1` tap kernel.
pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> PixmarkResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| PixmarkError::evaluation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(PixmarkError::evaluation(
            "blur_rgba8_premul expects src matching width*height*4",
        ));
    }
    if radius == 0 || expected_len == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    convolve_pass(src, &mut tmp, width, height, &kernel, Axis::Horizontal);
    convolve_pass(&tmp, &mut out, width, height, &kernel, Axis::Vertical);
    Ok(out)
}

/// Gaussian blur of a whole bitmap (any format) with edge clamping; returns RGBA8.
pub fn blur_bitmap(src: &Bitmap, sigma: f64) -> PixmarkResult<Bitmap> {
    check_sigma("blur radius", sigma, false)?;
    let mut data = src.to_format(PixelFormat::Rgba8).into_data();
    premultiply_in_place(&mut data);
    let mut out = blur_rgba8_premul(
        &data,
        src.width(),
        src.height(),
        kernel_radius(sigma),
        sigma as f32,
    )?;
    unpremultiply_in_place(&mut out);
    Bitmap::new(src.width(), src.height(), PixelFormat::Rgba8, out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> PixmarkResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(PixmarkError::invalid_argument("blur sigma must be > 0"));
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
        return Err(PixmarkError::evaluation("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Put the rounding residue on the centre tap so the kernel sums to exactly 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn convolve_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let (w, h) = (width as i32, height as i32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x + d).clamp(0, w - 1), y),
                    Axis::Vertical => (x, (y + d).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for (c, a) in acc.iter().enumerate() {
                dst[out_idx + c] = q16_to_u8(*a);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Color;

    #[test]
    fn kernel_weights_sum_to_one_in_q16() {
        for (radius, sigma) in [(3, 1.0), (30, 10.0), (1, 0.2)] {
            let k = gaussian_kernel_q16(radius, sigma).unwrap();
            assert_eq!(k.len(), 2 * radius as usize + 1);
            assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 65536);
        }
    }

    #[test]
    fn two_tone_edge_is_softened_but_far_side_holds() {
        let mut src = Bitmap::filled(20, 1, PixelFormat::Rgba8, Color::BLACK);
        for x in 10..20 {
            src.set_pixel(x, 0, [255, 255, 255, 255]);
        }
        let out = blur_bitmap(&src, 1.5).unwrap();
        assert_eq!(out.get_pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(19, 0), [255, 255, 255, 255]);
        let left = out.get_pixel(9, 0)[0];
        let right = out.get_pixel(10, 0)[0];
        assert!(left > 0 && left < 128, "{left}");
        assert!(right > 128 && right < 255, "{right}");
    }

    #[test]
    fn transparent_neighbours_do_not_darken_colour() {
        let mut src = Bitmap::transparent(9, 9);
        src.set_pixel(4, 4, [255, 0, 0, 255]);
        let out = blur_bitmap(&src, 1.0).unwrap();
        let px = out.get_pixel(5, 4);
        assert!(px[3] > 0 && px[3] < 255);
        assert!(px[0] >= 250 && px[1] == 0 && px[2] == 0, "{px:?}");
    }

    #[test]
    fn packed_bgra_input_comes_back_as_rgba() {
        let src = Bitmap::filled(4, 4, PixelFormat::Bgra8, Color::rgb(10, 20, 30));
        let out = blur_bitmap(&src, 2.0).unwrap();
        assert_eq!(out.format(), PixelFormat::Rgba8);
        assert_eq!(out.get_pixel(1, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn sigma_must_be_positive_and_bounded() {
        let b = Bitmap::transparent(2, 2);
        assert!(blur_bitmap(&b, 0.0).unwrap_err().is_invalid_argument());
        assert!(blur_bitmap(&b, f64::NAN).is_err());
        assert!(blur_bitmap(&b, 1e7).unwrap_err().is_invalid_argument());
        assert!(check_sigma("shadow radius", 0.0, true).is_ok());
        assert_eq!(kernel_margin(MAX_SIGMA).unwrap(), 750);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(blur_rgba8_premul(&[0u8; 7], 1, 2, 1, 1.0).is_err());
    }
}
