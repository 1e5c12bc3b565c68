use crate::effects::blur::{blur_bitmap, blur_rgba8_premul, check_sigma, kernel_margin};
use crate::effects::composite::{blit, over_at, premultiply_in_place, unpremultiply_in_place};
use crate::foundation::core::{Bitmap, Color, IRect, PixelFormat};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::{clamp_u8, hash01, mul_div255_u8};

pub fn blur(src: &Bitmap, radius: f64) -> PixmarkResult<Bitmap> {
    blur_bitmap(src, radius)
}

/// Unsharp mask: `x + amount * (x - blur(x))` on the colour channels.
pub fn sharpen(src: &Bitmap, amount: f32, radius: f64) -> PixmarkResult<Bitmap> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(PixmarkError::invalid_argument("sharpen amount must be >= 0"));
    }
    let blurred = blur_bitmap(src, radius)?;
    let mut out = src.to_rgba8();
    for (px, b) in out.data_mut().chunks_exact_mut(4).zip(blurred.data().chunks_exact(4)) {
        for c in 0..3 {
            let x = f32::from(px[c]);
            px[c] = clamp_u8(x + amount * (x - f32::from(b[c])));
        }
    }
    Ok(out)
}

pub fn pixelate(src: &Bitmap, block_size: u32) -> PixmarkResult<Bitmap> {
    if block_size == 0 {
        return Err(PixmarkError::invalid_argument(
            "pixelate block size must be > 0",
        ));
    }
    let mut out = src.to_rgba8();
    pixelate_blocks(&mut out, 0, 0, block_size);
    Ok(out)
}

/// Replace each `block`-sized cell of an RGBA8 bitmap with its alpha-weighted mean.
///
/// `(ox, oy)` is how far into the first cell the bitmap starts, so a patch cut out of a
/// larger grid stays aligned with it.
pub(crate) fn pixelate_blocks(bitmap: &mut Bitmap, ox: i32, oy: i32, block: u32) {
    let block = block.max(1) as i32;
    let (w, h) = (bitmap.width() as i32, bitmap.height() as i32);
    let full = IRect::new(0, 0, w, h);
    let mut by = -oy.rem_euclid(block);
    while by < h {
        let mut bx = -ox.rem_euclid(block);
        while bx < w {
            let cell = IRect::new(bx, by, bx + block, by + block).intersect(full);
            let mean = block_mean(bitmap, cell);
            let data = bitmap.data_mut();
            for y in cell.y0..cell.y1 {
                for x in cell.x0..cell.x1 {
                    let i = ((y * w + x) as usize) * 4;
                    data[i..i + 4].copy_from_slice(&mean);
                }
            }
            bx += block;
        }
        by += block;
    }
}

fn block_mean(bitmap: &Bitmap, cell: IRect) -> [u8; 4] {
    let mut acc = [0u64; 4];
    let mut n = 0u64;
    for y in cell.y0..cell.y1 {
        for x in cell.x0..cell.x1 {
            let px = bitmap.get_pixel(x as u32, y as u32);
            let a = u64::from(px[3]);
            for c in 0..3 {
                acc[c] += u64::from(px[c]) * a;
            }
            acc[3] += a;
            n += 1;
        }
    }
    if n == 0 || acc[3] == 0 {
        return [0, 0, 0, 0];
    }
    let a = acc[3];
    [
        ((acc[0] + a / 2) / a) as u8,
        ((acc[1] + a / 2) / a) as u8,
        ((acc[2] + a / 2) / a) as u8,
        ((a + n / 2) / n) as u8,
    ]
}

/// Frame the image with a solid `width`-pixel border; the canvas grows on every side.
pub fn border(src: &Bitmap, width: u32, color: Color) -> PixmarkResult<Bitmap> {
    if width == 0 {
        return Err(PixmarkError::invalid_argument("border width must be > 0"));
    }
    let mut out = Bitmap::filled(
        src.width() + 2 * width,
        src.height() + 2 * width,
        PixelFormat::Rgba8,
        color,
    );
    blit(&mut out, &src.to_rgba8(), width as i32, width as i32)?;
    Ok(out)
}

/// Blurred, tinted copy of the alpha mask offset by `(dx, dy)` behind the image. The canvas
/// grows to fit the shadow.
pub fn drop_shadow(
    src: &Bitmap,
    dx: i32,
    dy: i32,
    radius: f64,
    color: Color,
) -> PixmarkResult<Bitmap> {
    check_sigma("shadow radius", radius, true)?;
    behind(src, dx, dy, radius, color, 1)
}

/// Like [`drop_shadow`] without an offset and with a doubled halo strength.
pub fn glow(src: &Bitmap, radius: f64, color: Color) -> PixmarkResult<Bitmap> {
    check_sigma("glow radius", radius, false)?;
    behind(src, 0, 0, radius, color, 2)
}

fn behind(
    src: &Bitmap,
    dx: i32,
    dy: i32,
    sigma: f64,
    color: Color,
    gain: u16,
) -> PixmarkResult<Bitmap> {
    let margin = if sigma > 0.0 { kernel_margin(sigma)? } else { 0 };
    let extent = src.extent();
    let canvas = extent.union(extent.translate(dx, dy).inflate(margin));
    let (w, h) = (canvas.width(), canvas.height());
    let rgba = src.to_rgba8();

    let c = color.to_array();
    let mut layer = vec![0u8; w as usize * h as usize * 4];
    for y in 0..src.height() {
        for x in 0..src.width() {
            let mask = u16::from(rgba.get_pixel(x, y)[3]);
            let a = (u16::from(mul_div255_u8(mask, u16::from(c[3]))) * gain).min(255);
            if a == 0 {
                continue;
            }
            let tx = x as i32 + dx - canvas.x0;
            let ty = y as i32 + dy - canvas.y0;
            let i = (ty as usize * w as usize + tx as usize) * 4;
            layer[i] = mul_div255_u8(u16::from(c[0]), a);
            layer[i + 1] = mul_div255_u8(u16::from(c[1]), a);
            layer[i + 2] = mul_div255_u8(u16::from(c[2]), a);
            layer[i + 3] = a as u8;
        }
    }
    if margin > 0 {
        layer = blur_rgba8_premul(&layer, w, h, margin as u32, sigma as f32)?;
    }

    let mut fg = rgba.into_data();
    premultiply_in_place(&mut fg);
    over_at(&mut layer, w, h, &fg, src.width(), -canvas.x0, -canvas.y0)?;
    unpremultiply_in_place(&mut layer);
    Bitmap::new(w, h, PixelFormat::Rgba8, layer)
}

/// Solid `color` contour `width` pixels wide around the opaque parts of the image.
pub fn outline(src: &Bitmap, width: u32, color: Color) -> PixmarkResult<Bitmap> {
    if width == 0 {
        return Err(PixmarkError::invalid_argument("outline width must be > 0"));
    }
    let r = width as i32;
    let rgba = src.to_rgba8();
    let (sw, sh) = (rgba.width() as i32, rgba.height() as i32);
    let (w, h) = (sw + 2 * r, sh + 2 * r);
    let c = color.to_array();
    let mut layer = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            // Dilated mask: the strongest source alpha within the disk of radius `r`.
            let mut m = 0u8;
            for oy in -r..=r {
                let sy = y - r + oy;
                if sy < 0 || sy >= sh {
                    continue;
                }
                for ox in -r..=r {
                    let sx = x - r + ox;
                    if sx < 0 || sx >= sw || ox * ox + oy * oy > r * r {
                        continue;
                    }
                    m = m.max(rgba.get_pixel(sx as u32, sy as u32)[3]);
                }
            }
            let a = mul_div255_u8(u16::from(m), u16::from(c[3]));
            let i = ((y * w + x) * 4) as usize;
            layer[i] = mul_div255_u8(u16::from(c[0]), u16::from(a));
            layer[i + 1] = mul_div255_u8(u16::from(c[1]), u16::from(a));
            layer[i + 2] = mul_div255_u8(u16::from(c[2]), u16::from(a));
            layer[i + 3] = a;
        }
    }
    let mut fg = rgba.into_data();
    premultiply_in_place(&mut fg);
    over_at(&mut layer, w as u32, h as u32, &fg, sw as u32, r, r)?;
    unpremultiply_in_place(&mut layer);
    Bitmap::new(w as u32, h as u32, PixelFormat::Rgba8, layer)
}

/// Knot spacing of the torn-edge profile, in pixels.
const TEAR_KNOT_PX: u32 = 12;

/// Tear off the bottom edge along a ragged, seed-determined profile at most `amplitude`
/// pixels deep.
pub fn torn_edge(src: &Bitmap, amplitude: u32, seed: u64) -> PixmarkResult<Bitmap> {
    if amplitude == 0 {
        return Err(PixmarkError::invalid_argument(
            "torn edge amplitude must be > 0",
        ));
    }
    let mut out = src.to_rgba8();
    let (w, h) = (out.width(), out.height());
    let amp = f64::from(amplitude.min(h));
    let depths: Vec<f64> = (0..w)
        .map(|x| {
            let k = u64::from(x / TEAR_KNOT_PX);
            let t = f64::from(x % TEAR_KNOT_PX) / f64::from(TEAR_KNOT_PX);
            let coarse = hash01(seed, k) * (1.0 - t) + hash01(seed, k + 1) * t;
            let fine = hash01(seed ^ 0x5EED, u64::from(x));
            amp * (0.3 + 0.55 * coarse + 0.15 * fine)
        })
        .collect();
    let data = out.data_mut();
    for y in 0..h {
        for x in 0..w {
            let edge = f64::from(h) - depths[x as usize];
            let coverage = (edge - f64::from(y)).clamp(0.0, 1.0);
            if coverage < 1.0 {
                let i = ((y * w + x) * 4 + 3) as usize;
                data[i] = clamp_u8((f64::from(data[i]) * coverage) as f32);
            }
        }
    }
    Ok(out)
}

/// Cut the image horizontally at `position` (fraction of the height), push the lower half
/// down by `gap` and sideways by `offset`.
pub fn slice(src: &Bitmap, position: f32, gap: u32, offset: i32) -> PixmarkResult<Bitmap> {
    if !(position.is_finite() && position > 0.0 && position < 1.0) {
        return Err(PixmarkError::invalid_argument(
            "slice position must be inside (0, 1)",
        ));
    }
    if src.height() < 2 {
        return Err(PixmarkError::invalid_argument(
            "slice needs an image at least 2 pixels tall",
        ));
    }
    let (w, h) = (src.width(), src.height());
    let cut = ((position * h as f32).round() as u32).clamp(1, h - 1);
    let rgba = src.to_rgba8();
    let top = rgba.crop(IRect::from_xywh(0, 0, w, cut))?;
    let bottom = rgba.crop(IRect::from_xywh(0, cut as i32, w, h - cut))?;

    let mut out = Bitmap::transparent(w + offset.unsigned_abs(), h + gap);
    let top_x = (-offset).max(0);
    blit(&mut out, &top, top_x, 0)?;
    blit(&mut out, &bottom, top_x + offset, (cut + gap) as i32)?;
    Ok(out)
}
