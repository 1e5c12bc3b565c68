//! Flattening of the annotation layer over the source bitmap (export path).
//!
//! Annotations are drawn in ascending z order (list order breaks ties). Consecutive
//! geometry annotations are rasterized together with `vello_cpu` into one premultiplied
//! layer which is then composited over the canvas; region effects composite their patch
//! directly. Text glyphs are not laid out here; text and callouts only draw their box.

use kurbo::{Affine, BezPath, Circle, Ellipse, Point, Rect, RoundedRect, Shape, Vec2};

use crate::annotation::model::{Annotation, AnnotationKind, ArrowHeads};
use crate::effects::composite::{
    over, over_at, over_in_place, premultiply_in_place, unpremultiply_in_place,
};
use crate::effects::region::render_patch;
use crate::foundation::core::{Bitmap, Color, PixelFormat};
use crate::foundation::error::{PixmarkError, PixmarkResult};

const SHADOW_OFFSET: Vec2 = Vec2::new(3.0, 3.0);
const SHADOW_COLOR: Color = Color::rgba(0, 0, 0, 80);
const ARROW_HEAD_MIN_PX: f64 = 10.0;
const ARROW_HEAD_ANGLE_DEG: f64 = 25.0;
const CALLOUT_CORNER_PX: f64 = 8.0;
const PATH_TOLERANCE: f64 = 0.1;

/// The source with every annotation burned in, as straight-alpha RGBA8.
#[tracing::instrument(level = "debug", skip(source, annotations), fields(w = source.width(), h = source.height(), count = annotations.len()))]
pub fn flatten(source: &Bitmap, annotations: &[Annotation]) -> PixmarkResult<Bitmap> {
    source.ensure_not_empty("source bitmap")?;
    let (w, h) = (source.width(), source.height());
    let (w16, h16) = match (u16::try_from(w), u16::try_from(h)) {
        (Ok(w16), Ok(h16)) => (w16, h16),
        _ => {
            return Err(PixmarkError::evaluation(format!(
                "{w}x{h} exceeds the rasterizer's 65535 px limit"
            )));
        }
    };

    let mut canvas = source.to_rgba8().into_data();
    premultiply_in_place(&mut canvas);

    let mut ordered: Vec<&Annotation> = annotations.iter().collect();
    ordered.sort_by_key(|a| a.z);

    let mut run: Vec<&Annotation> = Vec::new();
    for ann in ordered {
        if !ann.is_region_effect() {
            run.push(ann);
            continue;
        }
        flush_run(&mut canvas, &run, w16, h16)?;
        run.clear();
        composite_region(&mut canvas, w, h, ann, source)?;
    }
    flush_run(&mut canvas, &run, w16, h16)?;

    unpremultiply_in_place(&mut canvas);
    Bitmap::new(w, h, PixelFormat::Rgba8, canvas)
}

fn flush_run(canvas: &mut [u8], run: &[&Annotation], w: u16, h: u16) -> PixmarkResult<()> {
    if run.is_empty() {
        return Ok(());
    }
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    for ann in run {
        draw_annotation(&mut ctx, ann);
    }
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    tracing::trace!(count = run.len(), "rasterized geometry run");
    over_in_place(canvas, pixmap.data_as_u8_slice())
}

fn composite_region(
    canvas: &mut [u8],
    w: u32,
    h: u32,
    ann: &Annotation,
    source: &Bitmap,
) -> PixmarkResult<()> {
    let bounds = ann.patch_bounds();
    let fresh;
    let patch = match current_patch(ann, source) {
        Some(p) => p,
        None => {
            fresh = render_patch(ann, source)?;
            &fresh
        }
    };

    if let AnnotationKind::Spotlight { dim } = ann.kind {
        let shade = [0, 0, 0, dim];
        for (i, px) in canvas.chunks_exact_mut(4).enumerate() {
            let (x, y) = ((i as u32 % w) as i32, (i as u32 / w) as i32);
            if !bounds.contains(x, y) {
                let out = over([px[0], px[1], px[2], px[3]], shade);
                px.copy_from_slice(&out);
            }
        }
    }

    let mut premul = patch.data().to_vec();
    premultiply_in_place(&mut premul);
    over_at(canvas, w, h, &premul, patch.width(), bounds.x0, bounds.y0)
}

/// The cached patch, when it was rendered for exactly this geometry and source.
fn current_patch<'a>(ann: &'a Annotation, source: &Bitmap) -> Option<&'a Bitmap> {
    let cached = ann.patch.entry.as_ref()?;
    let fits = cached.key.bounds == ann.patch_bounds()
        && cached.key.kind == ann.kind
        && cached.key.source_revision == source.revision();
    fits.then_some(&cached.patch)
}

fn draw_annotation(ctx: &mut vello_cpu::RenderContext, ann: &Annotation) {
    let rotation = ann.rotation_transform();
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    if ann.style.shadow {
        ctx.set_transform(affine_to_cpu(Affine::translate(SHADOW_OFFSET) * rotation));
        paint_shape(ctx, ann, Some(SHADOW_COLOR));
    }
    ctx.set_transform(affine_to_cpu(rotation));
    paint_shape(ctx, ann, None);
}

/// Fill and stroke one annotation. `tint` replaces every color (used for the shadow pass).
fn paint_shape(ctx: &mut vello_cpu::RenderContext, ann: &Annotation, tint: Option<Color>) {
    let style = &ann.style;
    let stroke_color = tint.unwrap_or(style.stroke);
    let fill_color = style.fill.map(|c| tint.unwrap_or(c));
    let width = style.stroke_width.max(0.0);
    let box_rect = Rect::from_points(ann.start, ann.end);

    match &ann.kind {
        AnnotationKind::Rectangle { corner_radius } => {
            let path = if *corner_radius > 0.0 {
                RoundedRect::from_rect(box_rect, *corner_radius).to_path(PATH_TOLERANCE)
            } else {
                box_rect.to_path(PATH_TOLERANCE)
            };
            fill(ctx, &path, fill_color);
            stroke(ctx, &path, stroke_color, width, false);
        }
        AnnotationKind::Ellipse => {
            let path = Ellipse::from_rect(box_rect).to_path(PATH_TOLERANCE);
            fill(ctx, &path, fill_color);
            stroke(ctx, &path, stroke_color, width, false);
        }
        AnnotationKind::Line => {
            stroke(ctx, &segment(ann.start, ann.end), stroke_color, width, true);
        }
        AnnotationKind::Arrow { heads } => {
            stroke(ctx, &segment(ann.start, ann.end), stroke_color, width, true);
            let len = ARROW_HEAD_MIN_PX.max(4.0 * width);
            if matches!(heads, ArrowHeads::End | ArrowHeads::Both)
                && let Some(head) = arrow_head(ann.start, ann.end, len)
            {
                fill(ctx, &head, Some(stroke_color));
            }
            if matches!(heads, ArrowHeads::Start | ArrowHeads::Both)
                && let Some(head) = arrow_head(ann.end, ann.start, len)
            {
                fill(ctx, &head, Some(stroke_color));
            }
        }
        AnnotationKind::Freehand { points } => match points.as_slice() {
            [] => {}
            [p] => {
                let dot = Circle::new(*p, width / 2.0).to_path(PATH_TOLERANCE);
                fill(ctx, &dot, Some(stroke_color));
            }
            [first, rest @ ..] => {
                let mut path = BezPath::new();
                path.move_to(*first);
                for p in rest {
                    path.line_to(*p);
                }
                stroke(ctx, &path, stroke_color, width, true);
            }
        },
        AnnotationKind::Text { .. } => {
            fill(ctx, &box_rect.to_path(PATH_TOLERANCE), fill_color);
        }
        AnnotationKind::Number { .. } => {
            let disc = Circle::new(ann.start, ann.marker_radius()).to_path(PATH_TOLERANCE);
            fill(ctx, &disc, Some(fill_color.unwrap_or(stroke_color)));
            stroke(ctx, &disc, stroke_color, width, false);
        }
        AnnotationKind::Callout { tail, .. } => {
            let tail_path = callout_tail(box_rect, *tail);
            fill(ctx, &tail_path, fill_color);
            stroke(ctx, &tail_path, stroke_color, width, false);
            let corner = CALLOUT_CORNER_PX.min(box_rect.width().min(box_rect.height()) / 2.0);
            let bubble = RoundedRect::from_rect(box_rect, corner).to_path(PATH_TOLERANCE);
            fill(ctx, &bubble, fill_color);
            stroke(ctx, &bubble, stroke_color, width, false);
        }
        // Region effects are composited from their patch.
        _ => {}
    }
}

fn fill(ctx: &mut vello_cpu::RenderContext, path: &BezPath, color: Option<Color>) {
    let Some(c) = color.filter(|c| c.a > 0) else {
        return;
    };
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
    ctx.fill_path(&bezpath_to_cpu(path));
}

fn stroke(ctx: &mut vello_cpu::RenderContext, path: &BezPath, color: Color, width: f64, round: bool) {
    if width <= 0.0 || color.a == 0 {
        return;
    }
    let mut style = vello_cpu::kurbo::Stroke::new(width);
    if round {
        style = style
            .with_caps(vello_cpu::kurbo::Cap::Round)
            .with_join(vello_cpu::kurbo::Join::Round);
    }
    ctx.set_stroke(style);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, color.a));
    ctx.stroke_path(&bezpath_to_cpu(path));
}

fn segment(a: Point, b: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(a);
    path.line_to(b);
    path
}

/// Filled triangle with its tip at `tip`, opening back toward `from`.
fn arrow_head(from: Point, tip: Point, len: f64) -> Option<BezPath> {
    let dir = tip - from;
    if dir.hypot() < f64::EPSILON {
        return None;
    }
    let back = -dir.normalize() * len;
    let spread = ARROW_HEAD_ANGLE_DEG.to_radians();
    let mut path = BezPath::new();
    path.move_to(tip);
    path.line_to(tip + rotate(back, spread));
    path.line_to(tip + rotate(back, -spread));
    path.close_path();
    Some(path)
}

fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Wedge from the bubble's centre out to the tail point; its base is a quarter of the
/// bubble's shorter side.
fn callout_tail(bubble: Rect, tail: Point) -> BezPath {
    let c = bubble.center();
    let dir = tail - c;
    let mut path = BezPath::new();
    if dir.hypot() < f64::EPSILON {
        return path;
    }
    let half_base = bubble.width().min(bubble.height()) / 8.0;
    let n = dir.normalize();
    let perp = Vec2::new(-n.y, n.x) * half_base;
    path.move_to(c + perp);
    path.line_to(tail);
    path.line_to(c - perp);
    path.close_path();
    path
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
