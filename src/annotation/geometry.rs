//! Bounds, hit testing and in-place edits.
//!
//! All coordinates are source-bitmap pixels. Rotation is applied about the centre of the
//! unrotated geometry, so the centre of [`Annotation::bounds`] is also the rotation pivot.

use crate::annotation::model::{Annotation, AnnotationKind};
use crate::foundation::core::{Affine, Point, Rect, Vec2};

/// Degenerate bounds are grown to at least this size (px) so they stay selectable.
pub const MIN_BOUNDS_PX: f64 = 10.0;

impl Annotation {
    /// Minimal axis-aligned rectangle around the visible geometry, floored to
    /// [`MIN_BOUNDS_PX`] per axis.
    pub fn bounds(&self) -> Rect {
        let local = self.local_bounds();
        if self.rotation == 0.0 || self.is_region_effect() {
            return local;
        }
        floor_size(self.rotation_transform().transform_rect_bbox(local))
    }

    /// Bounds before rotation is applied.
    fn local_bounds(&self) -> Rect {
        let half_stroke = self.style.stroke_width.max(0.0) / 2.0;
        let raw = match &self.kind {
            AnnotationKind::Number { .. } => {
                let r = self.marker_radius();
                Rect::new(
                    self.start.x - r,
                    self.start.y - r,
                    self.start.x + r,
                    self.start.y + r,
                )
            }
            AnnotationKind::Freehand { points } => points_bbox(points)
                .unwrap_or_else(|| Rect::from_points(self.start, self.end))
                .inflate(half_stroke, half_stroke),
            AnnotationKind::Callout { tail, .. } => Rect::from_points(self.start, self.end)
                .union_pt(*tail)
                .inflate(half_stroke, half_stroke),
            AnnotationKind::Text { .. } => Rect::from_points(self.start, self.end),
            k if k.is_region_effect() => Rect::from_points(self.start, self.end),
            _ => Rect::from_points(self.start, self.end).inflate(half_stroke, half_stroke),
        };
        floor_size(raw)
    }

    /// Radius of a numbered marker: the configured minimum or the drag distance.
    pub fn marker_radius(&self) -> f64 {
        let min = match self.kind {
            AnnotationKind::Number { radius, .. } => radius,
            _ => 0.0,
        };
        min.max(self.start.distance(self.end))
    }

    /// Rotation about the centre of the unrotated geometry (identity for region effects).
    pub(crate) fn rotation_transform(&self) -> Affine {
        if self.is_region_effect() {
            return Affine::IDENTITY;
        }
        Affine::rotate_about(self.rotation.to_radians(), self.local_bounds().center())
    }

    /// Map an image-space point into the annotation's unrotated frame.
    fn to_local(&self, p: Point) -> Point {
        if self.rotation == 0.0 || self.is_region_effect() {
            return p;
        }
        self.rotation_transform().inverse() * p
    }

    /// `true` when `point` is within `tolerance` px of the visible geometry.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let tol = tolerance.max(0.0);
        let p = self.to_local(point);
        let local = self.local_bounds();
        match &self.kind {
            AnnotationKind::Ellipse => {
                let r = local.inflate(tol, tol);
                let (rx, ry) = (r.width() / 2.0, r.height() / 2.0);
                let c = r.center();
                let nx = (p.x - c.x) / rx;
                let ny = (p.y - c.y) / ry;
                nx * nx + ny * ny <= 1.0
            }
            AnnotationKind::Line | AnnotationKind::Arrow { .. } => {
                let reach = tol + self.style.stroke_width.max(0.0) / 2.0;
                distance_to_segment(p, self.start, self.end) <= reach
            }
            AnnotationKind::Number { .. } => p.distance(self.start) <= self.marker_radius() + tol,
            AnnotationKind::Callout { tail, .. } => {
                let bubble = Rect::from_points(self.start, self.end).inflate(tol, tol);
                if bubble.contains(p) {
                    return true;
                }
                let hull = convex_hull(&[
                    Point::new(bubble.x0, bubble.y0),
                    Point::new(bubble.x1, bubble.y0),
                    Point::new(bubble.x1, bubble.y1),
                    Point::new(bubble.x0, bubble.y1),
                    *tail,
                ]);
                inside_convex(&hull, p) || distance_to_polygon(&hull, p) <= tol
            }
            AnnotationKind::Freehand { points } => {
                let reach = tol + self.style.stroke_width.max(0.0) / 2.0;
                // The centre of the box is a grab handle even when the stroke misses it.
                p.distance(local.center()) <= reach.max(0.5)
                    || distance_to_polyline(points, self.start, self.end, p) <= reach
            }
            _ => rect_contains_closed(local.inflate(tol, tol), p),
        }
    }

    /// Move the second anchor (freehand strokes also record the point).
    pub fn update_drag(&mut self, point: Point) {
        if let AnnotationKind::Freehand { points } = &mut self.kind
            && points.last() != Some(&point)
        {
            points.push(point);
        }
        self.end = point;
    }

    /// Shift every coordinate by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.start += delta;
        self.end += delta;
        match &mut self.kind {
            AnnotationKind::Freehand { points } => {
                for p in points.iter_mut() {
                    *p += delta;
                }
            }
            AnnotationKind::Callout { tail, .. } => *tail += delta,
            _ => {}
        }
    }

    /// Scale every coordinate by `(sx, sy)` about the image origin (canvas resizes).
    pub fn scale(&mut self, sx: f64, sy: f64) {
        let s = |p: Point| Point::new(p.x * sx, p.y * sy);
        self.start = s(self.start);
        self.end = s(self.end);
        match &mut self.kind {
            AnnotationKind::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = s(*p);
                }
            }
            AnnotationKind::Callout { tail, .. } => *tail = s(*tail),
            _ => {}
        }
    }

    /// Set the rotation angle in degrees, normalized into `[0, 360)`.
    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees.rem_euclid(360.0);
    }
}

/// Grow a rectangle around its centre until both sides are at least [`MIN_BOUNDS_PX`].
pub fn floor_size(r: Rect) -> Rect {
    let c = r.center();
    let w = r.width().max(MIN_BOUNDS_PX) / 2.0;
    let h = r.height().max(MIN_BOUNDS_PX) / 2.0;
    if r.width() >= MIN_BOUNDS_PX && r.height() >= MIN_BOUNDS_PX {
        return r;
    }
    Rect::new(c.x - w, c.y - h, c.x + w, c.y + h)
}

fn points_bbox(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(
        rest.iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
    )
}

fn rect_contains_closed(r: Rect, p: Point) -> bool {
    p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
}

/// Euclidean distance from `p` to the segment `a..b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq < 1e-12 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn distance_to_polyline(points: &[Point], start: Point, end: Point, p: Point) -> f64 {
    match points {
        [] => distance_to_segment(p, start, end),
        [only] => p.distance(*only),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_polygon(poly: &[Point], p: Point) -> f64 {
    let n = poly.len();
    (0..n)
        .map(|i| distance_to_segment(p, poly[i], poly[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Monotone-chain convex hull, counter-clockwise.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn inside_convex(hull: &[Point], p: Point) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let n = hull.len();
    (0..n).all(|i| cross(hull[i], hull[(i + 1) % n], p) >= 0.0)
}
