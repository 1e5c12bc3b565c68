use image::imageops::{self, FilterType};

use crate::effects::composite::{blit, premultiply_in_place, unpremultiply_in_place};
use crate::foundation::core::{Affine, Bitmap, Color, IRect, PixelFormat, Point, Rect};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::clamp_u8;

pub fn flip_horizontal(src: &Bitmap) -> Bitmap {
    let bpp = src.format().bytes_per_pixel();
    let row = src.width() as usize * bpp;
    let mut out = src.clone();
    if row == 0 {
        return out;
    }
    for line in out.data_mut().chunks_exact_mut(row) {
        let copy = line.to_vec();
        for (dst, s) in line.chunks_exact_mut(bpp).zip(copy.chunks_exact(bpp).rev()) {
            dst.copy_from_slice(s);
        }
    }
    out
}

pub fn flip_vertical(src: &Bitmap) -> Bitmap {
    let row = src.width() as usize * src.format().bytes_per_pixel();
    let mut out = src.clone();
    if row == 0 {
        return out;
    }
    let rows: Vec<Vec<u8>> = src.data().chunks_exact(row).rev().map(<[u8]>::to_vec).collect();
    for (dst, s) in out.data_mut().chunks_exact_mut(row).zip(rows) {
        dst.copy_from_slice(&s);
    }
    out
}

/// Rotate clockwise by `degrees`. The canvas grows to the rotated bounding box and the
/// uncovered corners are filled with `background`. Quarter turns are exact.
pub fn rotate(src: &Bitmap, degrees: f64, background: Color) -> PixmarkResult<Bitmap> {
    if !degrees.is_finite() {
        return Err(PixmarkError::invalid_argument("rotation must be finite"));
    }
    let deg = degrees.rem_euclid(360.0);
    if let Some(turns) = quarter_turns(deg) {
        return Ok(rotate_quarters(src, turns));
    }
    warp_affine(src, Affine::rotate(deg.to_radians()), background)
}

/// Number of clockwise quarter turns `deg` (already in `[0, 360)`) amounts to, if exact.
pub(crate) fn quarter_turns(deg: f64) -> Option<u32> {
    let q = deg / 90.0;
    ((q - q.round()).abs() < 1e-9).then(|| (q.round() as u32) % 4)
}

fn rotate_quarters(src: &Bitmap, turns: u32) -> Bitmap {
    let (w, h) = (src.width(), src.height());
    if turns == 0 {
        return src.clone();
    }
    let (ow, oh) = if turns % 2 == 1 { (h, w) } else { (w, h) };
    let mut out = Bitmap::filled(ow, oh, src.format(), Color::TRANSPARENT);
    for y in 0..h {
        for x in 0..w {
            let (tx, ty) = match turns {
                1 => (h - 1 - y, x),
                2 => (w - 1 - x, h - 1 - y),
                _ => (y, w - 1 - x),
            };
            out.set_pixel(tx, ty, src.get_pixel(x, y));
        }
    }
    out
}

/// Shear by the given angles (degrees, each in `(-89, 89)`).
pub fn skew(src: &Bitmap, x_degrees: f64, y_degrees: f64, background: Color) -> PixmarkResult<Bitmap> {
    for d in [x_degrees, y_degrees] {
        if !(d.is_finite() && d.abs() < 89.0) {
            return Err(PixmarkError::invalid_argument(format!(
                "skew angle must be within (-89, 89) degrees (got {d})"
            )));
        }
    }
    let t = Affine::skew(x_degrees.to_radians().tan(), y_degrees.to_radians().tan());
    warp_affine(src, t, background)
}

fn warp_affine(src: &Bitmap, forward: Affine, background: Color) -> PixmarkResult<Bitmap> {
    let extent = Rect::new(0.0, 0.0, f64::from(src.width()), f64::from(src.height()));
    let bbox = forward.transform_rect_bbox(extent);
    let (w, h) = output_size(bbox)?;
    let inverse = (Affine::translate((-bbox.x0, -bbox.y0)) * forward).inverse();
    warp(src, w, h, background, |p| Some(inverse * p))
}

fn output_size(bbox: Rect) -> PixmarkResult<(u32, u32)> {
    let w = (bbox.width() - 1e-6).ceil().max(1.0);
    let h = (bbox.height() - 1e-6).ceil().max(1.0);
    if !(w.is_finite() && h.is_finite()) || w * h > f64::from(u32::MAX) {
        return Err(PixmarkError::invalid_argument(
            "transformed image is too large",
        ));
    }
    Ok((w as u32, h as u32))
}

/// Inverse-map every output pixel centre through `inverse` and sample the source
/// bilinearly. Taps outside the source read as `background`.
fn warp(
    src: &Bitmap,
    width: u32,
    height: u32,
    background: Color,
    inverse: impl Fn(Point) -> Option<Point>,
) -> PixmarkResult<Bitmap> {
    let mut premul = src.to_rgba8().into_data();
    premultiply_in_place(&mut premul);
    let mut bg = background.to_array();
    premultiply_in_place(&mut bg);

    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));
    let tap = |x: i64, y: i64| -> [f32; 4] {
        if x < 0 || y < 0 || x >= sw || y >= sh {
            return bg.map(f32::from);
        }
        let i = ((y * sw + x) * 4) as usize;
        [
            f32::from(premul[i]),
            f32::from(premul[i + 1]),
            f32::from(premul[i + 2]),
            f32::from(premul[i + 3]),
        ]
    };

    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let Some(p) = inverse(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)) else {
                out.extend_from_slice(&bg);
                continue;
            };
            let (fx, fy) = (p.x - 0.5, p.y - 0.5);
            let (x0, y0) = (fx.floor(), fy.floor());
            let (tx, ty) = ((fx - x0) as f32, (fy - y0) as f32);
            let (x0, y0) = (x0 as i64, y0 as i64);
            let (a, b) = (tap(x0, y0), tap(x0 + 1, y0));
            let (c, d) = (tap(x0, y0 + 1), tap(x0 + 1, y0 + 1));
            for k in 0..4 {
                let top = a[k] + (b[k] - a[k]) * tx;
                let bottom = c[k] + (d[k] - c[k]) * tx;
                out.push(clamp_u8(top + (bottom - top) * ty));
            }
        }
    }
    unpremultiply_in_place(&mut out);
    Bitmap::new(width, height, PixelFormat::Rgba8, out)
}

/// Tilt the image plane in 3-D (about the horizontal axis by `x_degrees`, then the
/// vertical axis by `y_degrees`) and project it back with a pinhole camera placed twice
/// the larger image side away.
pub fn perspective(
    src: &Bitmap,
    x_degrees: f64,
    y_degrees: f64,
    background: Color,
) -> PixmarkResult<Bitmap> {
    for d in [x_degrees, y_degrees] {
        if !(d.is_finite() && d.abs() <= 80.0) {
            return Err(PixmarkError::invalid_argument(format!(
                "perspective angle must be within [-80, 80] degrees (got {d})"
            )));
        }
    }
    let (sw, sh) = (f64::from(src.width()), f64::from(src.height()));
    let focal = 2.0 * sw.max(sh);
    let (sa, ca) = x_degrees.to_radians().sin_cos();
    let (sb, cb) = y_degrees.to_radians().sin_cos();
    // Columns of Ry * Rx applied to the plane's x and y axes.
    let ax = [cb, 0.0, -sb];
    let ay = [sb * sa, ca, cb * sa];

    let project = |x: f64, y: f64| {
        let z = focal + x * ax[2] + y * ay[2];
        Point::new(
            focal * (x * ax[0] + y * ay[0]) / z,
            focal * (x * ax[1] + y * ay[1]) / z,
        )
    };
    let (hw, hh) = (sw / 2.0, sh / 2.0);
    let corners = [
        project(-hw, -hh),
        project(hw, -hh),
        project(hw, hh),
        project(-hw, hh),
    ];
    let bbox = corners[1..]
        .iter()
        .fold(Rect::from_points(corners[0], corners[0]), |r, p| r.union_pt(*p));
    let (w, h) = output_size(bbox)?;

    warp(src, w, h, background, |p| {
        let (u, v) = (p.x + bbox.x0, p.y + bbox.y0);
        let (m00, m01) = (focal * ax[0] - u * ax[2], focal * ay[0] - u * ay[2]);
        let (m10, m11) = (focal * ax[1] - v * ax[2], focal * ay[1] - v * ay[2]);
        let det = m00 * m11 - m01 * m10;
        if det.abs() < 1e-9 {
            return None;
        }
        let (r0, r1) = (u * focal, v * focal);
        let x = (r0 * m11 - m01 * r1) / det;
        let y = (m00 * r1 - r0 * m10) / det;
        Some(Point::new(x + hw, y + hh))
    })
}

pub fn resize(src: &Bitmap, width: u32, height: u32) -> PixmarkResult<Bitmap> {
    if width == 0 || height == 0 {
        return Err(PixmarkError::invalid_argument(format!(
            "resize target must be non-empty (got {width}x{height})"
        )));
    }
    let img = src.to_rgba_image()?;
    Ok(Bitmap::from_rgba_image(imageops::resize(
        &img,
        width,
        height,
        FilterType::Triangle,
    )))
}

pub fn scale(src: &Bitmap, factor: f64) -> PixmarkResult<Bitmap> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(PixmarkError::invalid_argument("scale factor must be > 0"));
    }
    let w = (f64::from(src.width()) * factor).round().max(1.0);
    let h = (f64::from(src.height()) * factor).round().max(1.0);
    if w > f64::from(u32::MAX) || h > f64::from(u32::MAX) {
        return Err(PixmarkError::invalid_argument("scaled image is too large"));
    }
    resize(src, w as u32, h as u32)
}

/// Trim uniform borders: rows and columns whose every pixel is within `tolerance` (per
/// channel) of the top-left pixel. A uniform image is returned unchanged.
pub fn auto_crop(src: &Bitmap, tolerance: u8) -> PixmarkResult<Bitmap> {
    Ok(match content_rect(src, tolerance) {
        Some(r) if r != src.extent() => src.crop(r)?,
        _ => src.clone(),
    })
}

fn content_rect(src: &Bitmap, tolerance: u8) -> Option<IRect> {
    if src.is_empty() {
        return None;
    }
    let reference = src.get_pixel(0, 0);
    let differs = |x: u32, y: u32| {
        src.get_pixel(x, y)
            .iter()
            .zip(reference)
            .any(|(&a, b)| a.abs_diff(b) > tolerance)
    };
    let (w, h) = (src.width(), src.height());
    let row_has = |y: u32| (0..w).any(|x| differs(x, y));
    let col_has = |x: u32, y0: u32, y1: u32| (y0..y1).any(|y| differs(x, y));

    let y0 = (0..h).find(|&y| row_has(y))?;
    let y1 = (0..h).rev().find(|&y| row_has(y))? + 1;
    let x0 = (0..w).find(|&x| col_has(x, y0, y1))?;
    let x1 = (0..w).rev().find(|&x| col_has(x, y0, y1))? + 1;
    Some(IRect::new(x0 as i32, y0 as i32, x1 as i32, y1 as i32))
}

/// Place `src` at `(offset_x, offset_y)` on a `width` x `height` canvas filled with `fill`.
/// Parts of `src` falling outside the new canvas are dropped.
pub fn expand_canvas(
    src: &Bitmap,
    width: u32,
    height: u32,
    offset_x: i32,
    offset_y: i32,
    fill: Color,
) -> PixmarkResult<Bitmap> {
    if width == 0 || height == 0 {
        return Err(PixmarkError::invalid_argument(format!(
            "canvas must be non-empty (got {width}x{height})"
        )));
    }
    let mut out = Bitmap::filled(width, height, src.format(), fill);
    blit(&mut out, src, offset_x, offset_y)?;
    Ok(out)
}
