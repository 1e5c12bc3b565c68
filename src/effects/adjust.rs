use crate::effects::pixel_ops::{ColorMatrix, Lut, map_pixels};
use crate::foundation::core::{Bitmap, luma};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::clamp_u8;

fn ensure_finite(name: &str, v: f32) -> PixmarkResult<()> {
    if !v.is_finite() {
        return Err(PixmarkError::invalid_argument(format!(
            "{name} must be finite (got {v})"
        )));
    }
    Ok(())
}

/// Shift R, G and B by `amount * 255`; `amount` in `[-1, 1]`.
pub fn brightness(src: &Bitmap, amount: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("brightness", amount)?;
    let delta = amount.clamp(-1.0, 1.0) * 255.0;
    Ok(Lut::from_fn(|v| v + delta).apply_bitmap(src))
}

/// Stretch channel values away from mid-grey by `factor` (1 is identity, 0 is flat grey).
pub fn contrast(src: &Bitmap, factor: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("contrast", factor)?;
    if factor < 0.0 {
        return Err(PixmarkError::invalid_argument("contrast must be >= 0"));
    }
    Ok(Lut::from_fn(|v| (v - 127.5) * factor + 127.5).apply_bitmap(src))
}

pub fn gamma(src: &Bitmap, gamma: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("gamma", gamma)?;
    if gamma <= 0.0 {
        return Err(PixmarkError::invalid_argument("gamma must be > 0"));
    }
    let inv = 1.0 / gamma;
    Ok(Lut::from_fn(|v| 255.0 * (v / 255.0).powf(inv)).apply_bitmap(src))
}

/// Input/output levels: `[in_black, in_white]` is mapped linearly onto
/// `[out_black, out_white]`, clamping outside.
pub fn levels(
    src: &Bitmap,
    in_black: u8,
    in_white: u8,
    out_black: u8,
    out_white: u8,
) -> PixmarkResult<Bitmap> {
    if in_black >= in_white {
        return Err(PixmarkError::invalid_argument(format!(
            "levels input range is empty ({in_black}..{in_white})"
        )));
    }
    let (ib, iw) = (f32::from(in_black), f32::from(in_white));
    let (ob, ow) = (f32::from(out_black), f32::from(out_white));
    Ok(Lut::from_fn(|v| {
        let t = ((v - ib) / (iw - ib)).clamp(0.0, 1.0);
        ob + t * (ow - ob)
    })
    .apply_bitmap(src))
}

/// Multiply linear light by `2^stops`.
pub fn exposure(src: &Bitmap, stops: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("exposure", stops)?;
    let gain = 2f32.powf(stops);
    Ok(Lut::from_fn(|v| v * gain).apply_bitmap(src))
}

/// Lift (positive) or crush (negative) dark and bright tones independently.
///
/// Both amounts are in `[-1, 1]`; the weight of each falls off quadratically with the
/// pixel's luma so mid-tones move least.
pub fn shadows_highlights(src: &Bitmap, shadows: f32, highlights: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("shadows", shadows)?;
    ensure_finite("highlights", highlights)?;
    let (s, h) = (shadows.clamp(-1.0, 1.0), highlights.clamp(-1.0, 1.0));
    Ok(map_pixels(src, |px| {
        let l = f32::from(luma(px)) / 255.0;
        let delta = 128.0 * (s * (1.0 - l) * (1.0 - l) + h * l * l);
        [
            clamp_u8(f32::from(px[0]) + delta),
            clamp_u8(f32::from(px[1]) + delta),
            clamp_u8(f32::from(px[2]) + delta),
            px[3],
        ]
    }))
}

pub fn color_matrix(src: &Bitmap, matrix: &ColorMatrix) -> PixmarkResult<Bitmap> {
    if !matrix.is_finite() {
        return Err(PixmarkError::invalid_argument(
            "colour matrix entries must be finite",
        ));
    }
    Ok(map_pixels(src, |px| matrix.apply(px)))
}

pub fn grayscale(src: &Bitmap) -> Bitmap {
    let m = ColorMatrix::grayscale();
    map_pixels(src, |px| m.apply(px))
}

pub fn sepia(src: &Bitmap) -> Bitmap {
    let m = ColorMatrix::sepia();
    map_pixels(src, |px| m.apply(px))
}

pub fn invert(src: &Bitmap) -> Bitmap {
    map_pixels(src, |[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
}

pub fn saturation(src: &Bitmap, amount: f32) -> PixmarkResult<Bitmap> {
    ensure_finite("saturation", amount)?;
    if amount < 0.0 {
        return Err(PixmarkError::invalid_argument("saturation must be >= 0"));
    }
    color_matrix(src, &ColorMatrix::saturation(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Color, PixelFormat};

    fn grey(v: u8) -> Bitmap {
        Bitmap::filled(4, 4, PixelFormat::Rgba8, Color::rgba(v, v, v, 200))
    }

    #[test]
    fn brightness_shifts_and_saturates() {
        let out = brightness(&grey(200), 0.5).unwrap();
        assert_eq!(out.get_pixel(0, 0), [255, 255, 255, 200]);
        let out = brightness(&grey(100), -0.2).unwrap();
        assert_eq!(out.get_pixel(0, 0)[0], 49);
    }

    #[test]
    fn contrast_zero_is_flat_grey() {
        let out = contrast(&grey(10), 0.0).unwrap();
        assert_eq!(out.get_pixel(3, 3)[0], 128);
        assert!(contrast(&grey(10), -1.0).is_err());
    }

    #[test]
    fn gamma_one_is_identity() {
        let src = grey(77);
        assert_eq!(gamma(&src, 1.0).unwrap(), src);
        assert!(gamma(&src, 0.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn levels_stretches_range() {
        let out = levels(&grey(64), 64, 192, 0, 255).unwrap();
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        let out = levels(&grey(192), 64, 192, 0, 255).unwrap();
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert!(levels(&grey(1), 10, 10, 0, 255).is_err());
    }

    #[test]
    fn exposure_one_stop_doubles() {
        let out = exposure(&grey(60), 1.0).unwrap();
        assert_eq!(out.get_pixel(0, 0)[0], 120);
    }

    #[test]
    fn shadows_lift_dark_pixels_more_than_bright_ones() {
        let dark = shadows_highlights(&grey(20), 0.5, 0.0).unwrap().get_pixel(0, 0)[0];
        let bright = shadows_highlights(&grey(230), 0.5, 0.0).unwrap().get_pixel(0, 0)[0];
        assert!(dark - 20 > bright - 230);
    }

    #[test]
    fn invert_keeps_alpha() {
        assert_eq!(invert(&grey(5)).get_pixel(1, 1), [250, 250, 250, 200]);
    }

    #[test]
    fn adjustments_keep_input_format() {
        let src = Bitmap::filled(2, 2, PixelFormat::Rgb8, Color::rgb(10, 100, 200));
        assert_eq!(sepia(&src).format(), PixelFormat::Rgb8);
        assert_eq!(saturation(&src, 2.0).unwrap().format(), PixelFormat::Rgb8);
    }
}
