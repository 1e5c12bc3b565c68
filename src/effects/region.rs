//! Region effect compositor. Patches always match the integer bounds; anything outside
//! the source stays transparent.

use image::imageops::{self, FilterType};

use crate::annotation::model::{Annotation, AnnotationKind, CachedPatch, PatchKey};
use crate::effects::blur::{blur_rgba8_premul, check_sigma, kernel_margin};
use crate::effects::composite::{
    blit, darken, over, premultiply_in_place, unpremultiply_in_place,
};
use crate::effects::filter::pixelate_blocks;
use crate::foundation::core::{Bitmap, Color, IRect, PixelFormat};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::clamp_u8;

impl Annotation {
    /// Integer rectangle the patch covers.
    pub fn patch_bounds(&self) -> IRect {
        IRect::covering(self.bounds())
    }

    /// Recompute the cached patch if its bounds, parameters or the source changed.
    ///
    /// Returns `Ok(true)` when a new patch was rendered. Plain-geometry annotations never
    /// hold a patch and return `Ok(false)`.
    #[tracing::instrument(level = "debug", skip(self, source), fields(id = self.id.0, kind = self.kind.discriminator()))]
    pub fn refresh_patch(&mut self, source: &Bitmap) -> PixmarkResult<bool> {
        if !self.is_region_effect() {
            self.patch.entry = None;
            return Ok(false);
        }
        let key = PatchKey {
            bounds: self.patch_bounds(),
            kind: self.kind.clone(),
            source_revision: source.revision(),
        };
        if self.patch.entry.as_ref().is_some_and(|c| c.key == key) {
            return Ok(false);
        }
        let patch = render_patch(self, source)?;
        self.patch.entry = Some(CachedPatch { key, patch });
        Ok(true)
    }
}

/// Render the patch for a region-effect annotation without touching its cache.
pub fn render_patch(ann: &Annotation, source: &Bitmap) -> PixmarkResult<Bitmap> {
    source.ensure_not_empty("source bitmap")?;
    validate_params(&ann.kind)?;

    let bounds = ann.patch_bounds();
    let mut patch = Bitmap::transparent(bounds.width(), bounds.height());
    let valid = bounds.intersect(source.extent());
    if valid.is_empty() {
        tracing::trace!(?bounds, "region effect lies outside the source; transparent patch");
        return Ok(patch);
    }

    let region = match &ann.kind {
        AnnotationKind::Blur { radius } => blur_region(source, valid, *radius)?,
        AnnotationKind::Magnify { zoom } => magnify_region(source, valid, *zoom)?,
        AnnotationKind::Highlight { color } => highlight_region(source, valid, *color)?,
        AnnotationKind::Pixelate { block_size } => {
            pixelate_region(source, bounds, valid, *block_size)?
        }
        AnnotationKind::Spotlight { dim } => spotlight_region(source, bounds, valid, *dim)?,
        AnnotationKind::SmartEraser => erase_region(source, valid)?,
        other => {
            return Err(PixmarkError::invalid_argument(format!(
                "'{}' is not a region effect",
                other.discriminator()
            )));
        }
    };
    blit(&mut patch, &region, valid.x0 - bounds.x0, valid.y0 - bounds.y0)?;
    Ok(patch)
}

fn validate_params(kind: &AnnotationKind) -> PixmarkResult<()> {
    match *kind {
        AnnotationKind::Blur { radius } => check_sigma("blur radius", radius, false),
        AnnotationKind::Magnify { zoom } if !(zoom.is_finite() && zoom >= 1.0) => Err(
            PixmarkError::invalid_argument(format!("magnify zoom must be >= 1 (got {zoom})")),
        ),
        AnnotationKind::Pixelate { block_size: 0 } => Err(PixmarkError::invalid_argument(
            "pixelate block size must be > 0",
        )),
        _ => Ok(()),
    }
}

/// Gaussian blur of `valid`, read through an edge-replicated padded region.
fn blur_region(source: &Bitmap, valid: IRect, radius: f64) -> PixmarkResult<Bitmap> {
    let margin = kernel_margin(radius)?;
    let padded = valid.inflate(margin);
    let clamped = padded.intersect(source.extent());
    let extracted = source.crop(clamped)?.to_rgba8();

    let mut expanded = edge_extend(&extracted, clamped, padded);
    premultiply_in_place(&mut expanded);
    let mut blurred = blur_rgba8_premul(
        &expanded,
        padded.width(),
        padded.height(),
        margin.unsigned_abs(),
        radius as f32,
    )?;
    unpremultiply_in_place(&mut blurred);

    let blurred = Bitmap::new(padded.width(), padded.height(), PixelFormat::Rgba8, blurred)?;
    blurred.crop(valid.translate(-padded.x0, -padded.y0))
}

/// Grow `patch` (covering `at`) to cover `to` by replicating its border pixels.
fn edge_extend(patch: &Bitmap, at: IRect, to: IRect) -> Vec<u8> {
    let mut out = Vec::with_capacity(to.area() as usize * 4);
    for y in to.y0..to.y1 {
        for x in to.x0..to.x1 {
            let px = patch.pixel_clamped(i64::from(x - at.x0), i64::from(y - at.y0));
            out.extend_from_slice(&px);
        }
    }
    out
}

/// Source rectangle a magnifier over `valid` captures: `valid / zoom` around its centre,
/// clamped to `extent`.
pub fn magnify_capture_rect(valid: IRect, zoom: f64, extent: IRect) -> IRect {
    let w = (f64::from(valid.width()) / zoom).round().max(1.0);
    let h = (f64::from(valid.height()) / zoom).round().max(1.0);
    let c = valid.center();
    let x0 = (c.x - w / 2.0).floor() as i32;
    let y0 = (c.y - h / 2.0).floor() as i32;
    IRect::from_xywh(x0, y0, w as u32, h as u32).intersect(extent)
}

fn magnify_region(source: &Bitmap, valid: IRect, zoom: f64) -> PixmarkResult<Bitmap> {
    let capture = magnify_capture_rect(valid, zoom, source.extent());
    let captured = source.crop(capture)?.to_rgba_image()?;
    let scaled = imageops::resize(&captured, valid.width(), valid.height(), FilterType::Triangle);
    Ok(Bitmap::from_rgba_image(scaled))
}

fn highlight_region(source: &Bitmap, valid: IRect, color: Color) -> PixmarkResult<Bitmap> {
    let mut region = source.crop(valid)?.to_rgba8();
    for px in region.data_mut().chunks_exact_mut(4) {
        let out = darken([px[0], px[1], px[2], px[3]], color);
        px.copy_from_slice(&out);
    }
    Ok(region)
}

/// Blocks are aligned to the bounds origin; each block takes the alpha-weighted mean of
/// its in-source pixels.
fn pixelate_region(
    source: &Bitmap,
    bounds: IRect,
    valid: IRect,
    block: u32,
) -> PixmarkResult<Bitmap> {
    let mut region = source.crop(valid)?.to_rgba8();
    pixelate_blocks(&mut region, valid.x0 - bounds.x0, valid.y0 - bounds.y0, block);
    Ok(region)
}

/// Source pixels inside the ellipse inscribed in `bounds`; the corners are dimmed by `dim`.
fn spotlight_region(source: &Bitmap, bounds: IRect, valid: IRect, dim: u8) -> PixmarkResult<Bitmap> {
    let mut region = source.crop(valid)?.to_rgba8();
    let c = bounds.center();
    let (rx, ry) = (
        f64::from(bounds.width()) / 2.0,
        f64::from(bounds.height()) / 2.0,
    );
    let w = region.width() as i32;
    let shade = [0, 0, 0, dim];
    let data = region.data_mut();
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        let x = valid.x0 + (i as i32 % w);
        let y = valid.y0 + (i as i32 / w);
        let nx = (f64::from(x) + 0.5 - c.x) / rx;
        let ny = (f64::from(y) + 0.5 - c.y) / ry;
        if nx * nx + ny * ny > 1.0 {
            let mut p = [px[0], px[1], px[2], px[3]];
            premultiply_in_place(&mut p);
            let mut out = over(p, shade);
            unpremultiply_in_place(&mut out);
            px.copy_from_slice(&out);
        }
    }
    Ok(region)
}

/// Fill `valid` from the ring of source pixels just outside it: a blend of the horizontal
/// and vertical interpolations between opposite edges.
fn erase_region(source: &Bitmap, valid: IRect) -> PixmarkResult<Bitmap> {
    let (w, h) = (valid.width(), valid.height());
    let mut out = Vec::with_capacity(valid.area() as usize * 4);
    let left = i64::from(valid.x0) - 1;
    let right = i64::from(valid.x1);
    let top = i64::from(valid.y0) - 1;
    let bottom = i64::from(valid.y1);
    for j in 0..h {
        let y = i64::from(valid.y0) + i64::from(j);
        let ty = (f64::from(j) + 0.5) / f64::from(h);
        let l = source.pixel_clamped(left, y);
        let r = source.pixel_clamped(right, y);
        for i in 0..w {
            let x = i64::from(valid.x0) + i64::from(i);
            let tx = (f64::from(i) + 0.5) / f64::from(w);
            let t = source.pixel_clamped(x, top);
            let b = source.pixel_clamped(x, bottom);
            for c in 0..4 {
                let horiz = f64::from(l[c]) * (1.0 - tx) + f64::from(r[c]) * tx;
                let vert = f64::from(t[c]) * (1.0 - ty) + f64::from(b[c]) * ty;
                out.push(clamp_u8(((horiz + vert) / 2.0) as f32));
            }
        }
    }
    Bitmap::new(w, h, PixelFormat::Rgba8, out)
}
