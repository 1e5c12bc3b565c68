use crate::foundation::core::{Bitmap, PixelFormat};
use crate::foundation::math::clamp_u8;

/// Map every pixel through `f` (straight RGBA in, straight RGBA out) into a new bitmap of
/// the same size and format.
///
/// Packed 32-bit layouts run a tight loop over the byte chunks; the other layouts go
/// through `get_pixel`/`set_pixel`.
pub fn map_pixels(src: &Bitmap, f: impl Fn([u8; 4]) -> [u8; 4]) -> Bitmap {
    let mut out = src.clone();
    match out.format() {
        PixelFormat::Rgba8 => {
            for px in out.data_mut().chunks_exact_mut(4) {
                let o = f([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&o);
            }
        }
        PixelFormat::Bgra8 => {
            for px in out.data_mut().chunks_exact_mut(4) {
                let o = f([px[2], px[1], px[0], px[3]]);
                px.copy_from_slice(&[o[2], o[1], o[0], o[3]]);
            }
        }
        PixelFormat::Rgb8 | PixelFormat::Gray8 => {
            for y in 0..out.height() {
                for x in 0..out.width() {
                    let o = f(out.get_pixel(x, y));
                    out.set_pixel(x, y, o);
                }
            }
        }
    }
    out
}

/// 256-entry channel lookup table applied to R, G and B (alpha passes through).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lut([u8; 256]);

impl Lut {
    pub fn from_fn(f: impl Fn(f32) -> f32) -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = clamp_u8(f(i as f32));
        }
        Self(table)
    }

    pub fn identity() -> Self {
        Self::from_fn(|v| v)
    }

    pub fn get(&self, v: u8) -> u8 {
        self.0[usize::from(v)]
    }

    pub fn apply(&self, px: [u8; 4]) -> [u8; 4] {
        [self.get(px[0]), self.get(px[1]), self.get(px[2]), px[3]]
    }

    pub fn apply_bitmap(&self, src: &Bitmap) -> Bitmap {
        map_pixels(src, |px| self.apply(px))
    }
}

/// Affine colour transform: each output channel is a weighted sum of the RGBA inputs
/// plus an offset (in 0..255 units). Rows are R, G, B, A.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ColorMatrix(pub [[f32; 5]; 4]);

impl ColorMatrix {
    pub const IDENTITY: Self = Self([
        [1.0, 0.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 1.0, 0.0],
    ]);

    /// Saturation scale: 0 is grayscale, 1 is identity, above 1 boosts colour.
    pub fn saturation(s: f32) -> Self {
        const LR: f32 = 0.2126;
        const LG: f32 = 0.7152;
        const LB: f32 = 0.0722;
        let i = 1.0 - s;
        Self([
            [LR * i + s, LG * i, LB * i, 0.0, 0.0],
            [LR * i, LG * i + s, LB * i, 0.0, 0.0],
            [LR * i, LG * i, LB * i + s, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
        ])
    }

    pub fn grayscale() -> Self {
        Self::saturation(0.0)
    }

    pub fn sepia() -> Self {
        Self([
            [0.393, 0.769, 0.189, 0.0, 0.0],
            [0.349, 0.686, 0.168, 0.0, 0.0],
            [0.272, 0.534, 0.131, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
        ])
    }

    pub fn invert() -> Self {
        Self([
            [-1.0, 0.0, 0.0, 0.0, 255.0],
            [0.0, -1.0, 0.0, 0.0, 255.0],
            [0.0, 0.0, -1.0, 0.0, 255.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
        ])
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let a = &self.0;
        let b = &next.0;
        let mut out = [[0.0f32; 5]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for c in 0..5 {
                let mut v: f32 = (0..4).map(|k| b[r][k] * a[k][c]).sum();
                if c == 4 {
                    v += b[r][4];
                }
                row[c] = v;
            }
        }
        ColorMatrix(out)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|v| v.is_finite())
    }

    pub fn apply(&self, px: [u8; 4]) -> [u8; 4] {
        let v = px.map(f32::from);
        let m = &self.0;
        let mut out = [0u8; 4];
        for (o, row) in out.iter_mut().zip(m) {
            *o = clamp_u8(row[0] * v[0] + row[1] * v[1] + row[2] * v[2] + row[3] * v[3] + row[4]);
        }
        out
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
