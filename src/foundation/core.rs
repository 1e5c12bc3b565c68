use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::foundation::math::Fnv1a64;

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Integer pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IRect {
    pub const EMPTY: Self = Self {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    /// Build from two corners in any order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width.min(i32::MAX as u32) as i32),
            y1: y.saturating_add(height.min(i32::MAX as u32) as i32),
        }
    }

    /// Smallest integer rectangle covering `r` (floor of the min corner, ceil of the max).
    pub fn covering(r: Rect) -> Self {
        let r = r.abs();
        Self::new(
            r.x0.floor() as i32,
            r.y0.floor() as i32,
            r.x1.ceil() as i32,
            r.y1.ceil() as i32,
        )
    }

    pub fn width(self) -> u32 {
        (i64::from(self.x1) - i64::from(self.x0)).max(0) as u32
    }

    pub fn height(self) -> u32 {
        (i64::from(self.y1) - i64::from(self.y0)).max(0) as u32
    }

    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn area(self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Intersection; [`IRect::EMPTY`] when the rectangles do not overlap.
    pub fn intersect(self, other: Self) -> Self {
        let out = Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if out.is_empty() { Self::EMPTY } else { out }
    }

    /// Grow every side by `margin` pixels.
    pub fn inflate(self, margin: i32) -> Self {
        Self {
            x0: self.x0.saturating_sub(margin),
            y0: self.y0.saturating_sub(margin),
            x1: self.x1.saturating_add(margin),
            y1: self.y1.saturating_add(margin),
        }
    }

    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Smallest rectangle covering both; an empty side is ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn contains_rect(self, other: Self) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    pub fn center(self) -> Point {
        Point::new(
            (f64::from(self.x0) + f64::from(self.x1)) / 2.0,
            (f64::from(self.y0) + f64::from(self.y1)) / 2.0,
        )
    }
}

/// Straight-alpha RGBA8 color. Persisted as `#RRGGBBAA`; defaults to transparent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> PixmarkResult<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(PixmarkError::decode(format!("invalid color '{s}'")));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| PixmarkError::decode(format!("invalid color '{s}'")))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Pixel layout of a [`Bitmap`]. All formats carry straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Rgb8 => 3,
            Self::Gray8 => 1,
        }
    }
}

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Owned raster buffer.
///
/// `revision` identifies the pixel content: it is fresh for every new buffer and changes on
/// every mutable access, so caches keyed on it notice when a source is replaced or edited.
/// Equality compares dimensions, format and bytes only.
#[derive(Clone, Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    revision: u64,
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.data == other.data
    }
}

impl Eq for Bitmap {}

impl Bitmap {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> PixmarkResult<Self> {
        let expected = buffer_len(width, height, format)?;
        if data.len() != expected {
            return Err(PixmarkError::invalid_argument(format!(
                "bitmap data length {} does not match {width}x{height} {format:?} ({expected})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            revision: next_revision(),
        })
    }

    /// Fully transparent RGBA8 buffer.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, PixelFormat::Rgba8, Color::TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Color) -> Self {
        let len = width as usize * height as usize;
        let mut out = Self {
            width,
            height,
            format,
            data: vec![0; len * format.bytes_per_pixel()],
            revision: next_revision(),
        };
        if color != Color::TRANSPARENT || format != PixelFormat::Rgba8 {
            let px = encode_pixel(format, color.to_array());
            for chunk in out.data.chunks_exact_mut(format.bytes_per_pixel()) {
                chunk.copy_from_slice(&px[..format.bytes_per_pixel()]);
            }
        }
        out
    }

    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            data: img.into_raw(),
            revision: next_revision(),
        }
    }

    pub fn to_rgba_image(&self) -> PixmarkResult<image::RgbaImage> {
        let rgba = self.to_format(PixelFormat::Rgba8);
        image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .ok_or_else(|| PixmarkError::evaluation("rgba image buffer size mismatch"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn extent(&self) -> IRect {
        IRect::from_xywh(0, 0, self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes; gives the buffer a new revision.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.revision = next_revision();
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Reject zero-sized buffers.
    pub fn ensure_not_empty(&self, what: &str) -> PixmarkResult<()> {
        if self.is_empty() {
            return Err(PixmarkError::invalid_argument(format!(
                "{what} must not be zero-sized (got {}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }

    /// Pixel at `(x, y)` as straight RGBA. Panics when out of range.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of range");
        let i = self.offset(x, y);
        decode_pixel(self.format, &self.data[i..i + self.format.bytes_per_pixel()])
    }

    /// Edge-clamped read: coordinates outside the extent address the nearest border pixel.
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        use crate::foundation::math::clamp_index;
        self.get_pixel(clamp_index(x, self.width), clamp_index(y, self.height))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of range");
        let i = self.offset(x, y);
        let bpp = self.format.bytes_per_pixel();
        let px = encode_pixel(self.format, rgba);
        self.data_mut()[i..i + bpp].copy_from_slice(&px[..bpp]);
    }

    /// Convert to another layout (copying; a same-format call still returns a fresh buffer).
    pub fn to_format(&self, format: PixelFormat) -> Bitmap {
        if format == self.format {
            return self.clone();
        }
        let src_bpp = self.format.bytes_per_pixel();
        let dst_bpp = format.bytes_per_pixel();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * dst_bpp);
        for px in self.data.chunks_exact(src_bpp) {
            let rgba = decode_pixel(self.format, px);
            data.extend_from_slice(&encode_pixel(format, rgba)[..dst_bpp]);
        }
        Bitmap {
            width: self.width,
            height: self.height,
            format,
            data,
            revision: next_revision(),
        }
    }

    pub fn to_rgba8(&self) -> Bitmap {
        self.to_format(PixelFormat::Rgba8)
    }

    /// Copy out `rect`, which must lie inside the extent and be non-empty.
    pub fn crop(&self, rect: IRect) -> PixmarkResult<Bitmap> {
        if rect.is_empty() || !self.extent().contains_rect(rect) {
            return Err(PixmarkError::invalid_argument(format!(
                "crop rectangle {rect:?} is empty or outside {}x{}",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let row_len = rect.width() as usize * bpp;
        let mut data = Vec::with_capacity(row_len * rect.height() as usize);
        for y in rect.y0..rect.y1 {
            let start = self.offset(rect.x0 as u32, y as u32);
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Bitmap::new(rect.width(), rect.height(), self.format, data)
    }

    /// Content hash over dimensions, format and pixel bytes.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        h.write_bytes(&self.width.to_le_bytes());
        h.write_bytes(&self.height.to_le_bytes());
        h.write_bytes(&[self.format.bytes_per_pixel() as u8, self.format as u8]);
        h.write_bytes(&self.data);
        h.finish()
    }
}

fn buffer_len(width: u32, height: u32, format: PixelFormat) -> PixmarkResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| PixmarkError::invalid_argument("bitmap size overflow"))
}

fn decode_pixel(format: PixelFormat, px: &[u8]) -> [u8; 4] {
    match format {
        PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
        PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
        PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
        PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
    }
}

fn encode_pixel(format: PixelFormat, rgba: [u8; 4]) -> [u8; 4] {
    match format {
        PixelFormat::Rgba8 => rgba,
        PixelFormat::Bgra8 => [rgba[2], rgba[1], rgba[0], rgba[3]],
        PixelFormat::Rgb8 => [rgba[0], rgba[1], rgba[2], 0],
        PixelFormat::Gray8 => [luma(rgba), 0, 0, 0],
    }
}

/// Rec. 601 luma in 8-bit fixed point.
pub(crate) fn luma(rgba: [u8; 4]) -> u8 {
    ((u32::from(rgba[0]) * 299 + u32::from(rgba[1]) * 587 + u32::from(rgba[2]) * 114 + 500)
        / 1000) as u8
}

/// Points persist as `[x, y]` pairs.
pub(crate) mod serde_point {
    use super::Point;

    pub(crate) fn serialize<S: serde::Serializer>(p: &Point, s: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&(p.x, p.y), s)
    }

    pub(crate) fn deserialize<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Point, D::Error> {
        let (x, y): (f64, f64) = serde::Deserialize::deserialize(d)?;
        Ok(Point::new(x, y))
    }
}

pub(crate) mod serde_points {
    use super::Point;

    pub(crate) fn serialize<S: serde::Serializer>(pts: &[Point], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(pts.iter().map(|p| (p.x, p.y)))
    }

    pub(crate) fn deserialize<'de, D: serde::Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<Point>, D::Error> {
        let raw: Vec<(f64, f64)> = serde::Deserialize::deserialize(d)?;
        Ok(raw.into_iter().map(|(x, y)| Point::new(x, y)).collect())
    }
}
