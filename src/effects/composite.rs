use crate::foundation::core::{Bitmap, Color, IRect};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        a => {
            let keep = u16::from(255 - a);
            std::array::from_fn(|i| src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), keep)))
        }
    }
}

/// `over` for every pixel of two equally sized premultiplied RGBA8 buffers.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> PixmarkResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PixmarkError::evaluation(format!(
            "over_in_place: buffer lengths {} and {} do not match",
            dst.len(),
            src.len()
        )));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Source-over `src` (premultiplied, `src_w` wide) onto `dst` at `(x, y)`, clipped to `dst`.
pub fn over_at(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    x: i32,
    y: i32,
) -> PixmarkResult<()> {
    if src_w == 0 || !src.len().is_multiple_of(src_w as usize * 4) {
        return Err(PixmarkError::evaluation("over_at source is not whole rows"));
    }
    let src_h = (src.len() / (src_w as usize * 4)) as u32;
    let target = IRect::from_xywh(x, y, src_w, src_h).intersect(IRect::from_xywh(0, 0, dst_w, dst_h));
    for ty in target.y0..target.y1 {
        for tx in target.x0..target.x1 {
            let si = (((ty - y) as usize) * src_w as usize + (tx - x) as usize) * 4;
            let di = ((ty as usize) * dst_w as usize + tx as usize) * 4;
            let out = over(
                [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]],
                [src[si], src[si + 1], src[si + 2], src[si + 3]],
            );
            dst[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

/// Darken blend of a flat straight-alpha `color` over a straight-alpha pixel: per-channel
/// minimum, mixed in by the color's alpha. The pixel keeps its own alpha.
pub fn darken(px: [u8; 4], color: Color) -> [u8; 4] {
    let a = u16::from(color.a);
    let inv = 255 - a;
    let c = color.to_array();
    let mut out = px;
    for i in 0..3 {
        let dark = px[i].min(c[i]);
        out[i] = mul_div255_u8(u16::from(dark), a).saturating_add(mul_div255_u8(u16::from(px[i]), inv));
    }
    out
}

pub fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = mul_div255_u8(u16::from(*c), a);
        }
    }
}

pub fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Copy `src` into `dst` with its top-left at `(x, y)`, clipped. Formats must match.
pub fn blit(dst: &mut Bitmap, src: &Bitmap, x: i32, y: i32) -> PixmarkResult<()> {
    if dst.format() != src.format() {
        return Err(PixmarkError::evaluation(format!(
            "blit format mismatch ({:?} onto {:?})",
            src.format(),
            dst.format()
        )));
    }
    let target = IRect::from_xywh(x, y, src.width(), src.height()).intersect(dst.extent());
    if target.is_empty() {
        return Ok(());
    }
    let bpp = dst.format().bytes_per_pixel();
    let (dw, sw) = (dst.width() as usize, src.width() as usize);
    let row = target.width() as usize * bpp;
    let src_data = src.data();
    let dst_data = dst.data_mut();
    for ty in target.y0..target.y1 {
        let si = (((ty - y) as usize) * sw + (target.x0 - x) as usize) * bpp;
        let di = ((ty as usize) * dw + target.x0 as usize) * bpp;
        dst_data[di..di + row].copy_from_slice(&src_data[si..si + row]);
    }
    Ok(())
}
