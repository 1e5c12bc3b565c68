use crate::effects::accel::EffectContext;
use crate::effects::blur::check_sigma;
use crate::effects::pixel_ops::ColorMatrix;
use crate::effects::{adjust, filter, manipulate};
use crate::foundation::core::{Bitmap, Color, PixelFormat};
use crate::foundation::error::{PixmarkError, PixmarkResult};

/// One whole-image effect and its parameters. `apply` never mutates its input.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageEffect {
    // Adjustments.
    Brightness {
        amount: f32,
    },
    Contrast {
        factor: f32,
    },
    Gamma {
        gamma: f32,
    },
    Levels {
        in_black: u8,
        in_white: u8,
        #[serde(default)]
        out_black: u8,
        #[serde(default = "full_scale")]
        out_white: u8,
    },
    Exposure {
        stops: f32,
    },
    ShadowsHighlights {
        #[serde(default)]
        shadows: f32,
        #[serde(default)]
        highlights: f32,
    },
    ColorMatrix {
        matrix: ColorMatrix,
    },
    Grayscale,
    Sepia,
    Invert,
    Saturation {
        amount: f32,
    },

    // Filters.
    Blur {
        radius: f64,
    },
    Sharpen {
        amount: f32,
        #[serde(default = "one")]
        radius: f64,
    },
    Pixelate {
        block_size: u32,
    },
    Border {
        width: u32,
        color: Color,
    },
    DropShadow {
        dx: i32,
        dy: i32,
        radius: f64,
        color: Color,
    },
    Glow {
        radius: f64,
        color: Color,
    },
    Outline {
        width: u32,
        color: Color,
    },
    TornEdge {
        amplitude: u32,
        #[serde(default)]
        seed: u64,
    },
    Slice {
        position: f32,
        gap: u32,
        #[serde(default)]
        offset: i32,
    },

    // Manipulations.
    FlipHorizontal,
    FlipVertical,
    Rotate {
        degrees: f64,
        #[serde(default)]
        background: Color,
    },
    Skew {
        #[serde(default)]
        x_degrees: f64,
        #[serde(default)]
        y_degrees: f64,
        #[serde(default)]
        background: Color,
    },
    Perspective {
        #[serde(default)]
        x_degrees: f64,
        #[serde(default)]
        y_degrees: f64,
        #[serde(default)]
        background: Color,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Scale {
        factor: f64,
    },
    AutoCrop {
        #[serde(default)]
        tolerance: u8,
    },
}

fn full_scale() -> u8 {
    255
}

fn one() -> f64 {
    1.0
}

impl ImageEffect {
    /// The serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Gamma { .. } => "gamma",
            Self::Levels { .. } => "levels",
            Self::Exposure { .. } => "exposure",
            Self::ShadowsHighlights { .. } => "shadows_highlights",
            Self::ColorMatrix { .. } => "color_matrix",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Invert => "invert",
            Self::Saturation { .. } => "saturation",
            Self::Blur { .. } => "blur",
            Self::Sharpen { .. } => "sharpen",
            Self::Pixelate { .. } => "pixelate",
            Self::Border { .. } => "border",
            Self::DropShadow { .. } => "drop_shadow",
            Self::Glow { .. } => "glow",
            Self::Outline { .. } => "outline",
            Self::TornEdge { .. } => "torn_edge",
            Self::Slice { .. } => "slice",
            Self::FlipHorizontal => "flip_horizontal",
            Self::FlipVertical => "flip_vertical",
            Self::Rotate { .. } => "rotate",
            Self::Skew { .. } => "skew",
            Self::Perspective { .. } => "perspective",
            Self::Resize { .. } => "resize",
            Self::Scale { .. } => "scale",
            Self::AutoCrop { .. } => "auto_crop",
        }
    }

    /// Pixel format of the result for an input in `input`.
    pub fn output_format(&self, input: PixelFormat) -> PixelFormat {
        match self {
            Self::Brightness { .. }
            | Self::Contrast { .. }
            | Self::Gamma { .. }
            | Self::Levels { .. }
            | Self::Exposure { .. }
            | Self::ShadowsHighlights { .. }
            | Self::ColorMatrix { .. }
            | Self::Grayscale
            | Self::Sepia
            | Self::Invert
            | Self::Saturation { .. }
            | Self::FlipHorizontal
            | Self::FlipVertical
            | Self::AutoCrop { .. } => input,
            Self::Rotate { degrees, .. }
                if manipulate::quarter_turns(degrees.rem_euclid(360.0)).is_some() =>
            {
                input
            }
            _ => PixelFormat::Rgba8,
        }
    }

    /// Reject parameters no execution path accepts. Runs before any path is chosen, so the
    /// accelerated surface only ever sees valid effects.
    pub fn validate(&self, src: &Bitmap) -> PixmarkResult<()> {
        match *self {
            Self::Brightness { amount } => finite("brightness", amount),
            Self::Contrast { factor } => at_least("contrast", factor, 0.0),
            Self::Gamma { gamma } => above("gamma", gamma, 0.0),
            Self::Levels {
                in_black, in_white, ..
            } if in_black >= in_white => Err(PixmarkError::invalid_argument(format!(
                "levels input range is empty ({in_black}..{in_white})"
            ))),
            Self::Exposure { stops } => finite("exposure", stops),
            Self::ShadowsHighlights {
                shadows,
                highlights,
            } => finite("shadows", shadows).and_then(|()| finite("highlights", highlights)),
            Self::ColorMatrix { ref matrix } if !matrix.is_finite() => Err(
                PixmarkError::invalid_argument("colour matrix entries must be finite"),
            ),
            Self::Saturation { amount } => at_least("saturation", amount, 0.0),
            Self::Blur { radius } => check_sigma("blur radius", radius, false),
            Self::Sharpen { amount, radius } => at_least("sharpen amount", amount, 0.0)
                .and_then(|()| check_sigma("blur radius", radius, false)),
            Self::Pixelate { block_size: 0 } => nonzero("pixelate block size"),
            Self::Border { width: 0, .. } => nonzero("border width"),
            Self::Outline { width: 0, .. } => nonzero("outline width"),
            Self::TornEdge { amplitude: 0, .. } => nonzero("torn edge amplitude"),
            Self::DropShadow { radius, .. } => check_sigma("shadow radius", radius, true),
            Self::Glow { radius, .. } => check_sigma("glow radius", radius, false),
            Self::Slice { position, .. } => {
                if !(position.is_finite() && position > 0.0 && position < 1.0) {
                    Err(PixmarkError::invalid_argument(
                        "slice position must be inside (0, 1)",
                    ))
                } else if src.height() < 2 {
                    Err(PixmarkError::invalid_argument(
                        "slice needs an image at least 2 pixels tall",
                    ))
                } else {
                    Ok(())
                }
            }
            Self::Rotate { degrees, .. } if !degrees.is_finite() => {
                Err(PixmarkError::invalid_argument("rotation must be finite"))
            }
            Self::Skew {
                x_degrees,
                y_degrees,
                ..
            } => angles("skew", [x_degrees, y_degrees], |d| d.abs() < 89.0),
            Self::Perspective {
                x_degrees,
                y_degrees,
                ..
            } => angles("perspective", [x_degrees, y_degrees], |d| d.abs() <= 80.0),
            Self::Resize { width, height } if width == 0 || height == 0 => Err(
                PixmarkError::invalid_argument(format!(
                    "resize target must be non-empty (got {width}x{height})"
                )),
            ),
            Self::Scale { factor } if !(factor.is_finite() && factor > 0.0) => {
                Err(PixmarkError::invalid_argument("scale factor must be > 0"))
            }
            _ => Ok(()),
        }
    }

    /// Apply on the CPU.
    pub fn apply(&self, src: &Bitmap) -> PixmarkResult<Bitmap> {
        self.apply_with(src, &EffectContext::cpu())
    }

    /// Apply, trying the context's accelerated surface first for large images.
    #[tracing::instrument(level = "debug", skip(self, src, ctx), fields(effect = self.name(), w = src.width(), h = src.height()))]
    pub fn apply_with(&self, src: &Bitmap, ctx: &EffectContext<'_>) -> PixmarkResult<Bitmap> {
        src.ensure_not_empty("effect input")?;
        self.validate(src)?;
        if let Some(out) = ctx.try_accelerated(self, src) {
            return Ok(out);
        }
        self.apply_cpu(src)
    }

    fn apply_cpu(&self, src: &Bitmap) -> PixmarkResult<Bitmap> {
        match self {
            Self::Brightness { amount } => adjust::brightness(src, *amount),
            Self::Contrast { factor } => adjust::contrast(src, *factor),
            Self::Gamma { gamma } => adjust::gamma(src, *gamma),
            Self::Levels {
                in_black,
                in_white,
                out_black,
                out_white,
            } => adjust::levels(src, *in_black, *in_white, *out_black, *out_white),
            Self::Exposure { stops } => adjust::exposure(src, *stops),
            Self::ShadowsHighlights {
                shadows,
                highlights,
            } => adjust::shadows_highlights(src, *shadows, *highlights),
            Self::ColorMatrix { matrix } => adjust::color_matrix(src, matrix),
            Self::Grayscale => Ok(adjust::grayscale(src)),
            Self::Sepia => Ok(adjust::sepia(src)),
            Self::Invert => Ok(adjust::invert(src)),
            Self::Saturation { amount } => adjust::saturation(src, *amount),
            Self::Blur { radius } => filter::blur(src, *radius),
            Self::Sharpen { amount, radius } => filter::sharpen(src, *amount, *radius),
            Self::Pixelate { block_size } => filter::pixelate(src, *block_size),
            Self::Border { width, color } => filter::border(src, *width, *color),
            Self::DropShadow {
                dx,
                dy,
                radius,
                color,
            } => filter::drop_shadow(src, *dx, *dy, *radius, *color),
            Self::Glow { radius, color } => filter::glow(src, *radius, *color),
            Self::Outline { width, color } => filter::outline(src, *width, *color),
            Self::TornEdge { amplitude, seed } => filter::torn_edge(src, *amplitude, *seed),
            Self::Slice {
                position,
                gap,
                offset,
            } => filter::slice(src, *position, *gap, *offset),
            Self::FlipHorizontal => Ok(manipulate::flip_horizontal(src)),
            Self::FlipVertical => Ok(manipulate::flip_vertical(src)),
            Self::Rotate {
                degrees,
                background,
            } => manipulate::rotate(src, *degrees, *background),
            Self::Skew {
                x_degrees,
                y_degrees,
                background,
            } => manipulate::skew(src, *x_degrees, *y_degrees, *background),
            Self::Perspective {
                x_degrees,
                y_degrees,
                background,
            } => manipulate::perspective(src, *x_degrees, *y_degrees, *background),
            Self::Resize { width, height } => manipulate::resize(src, *width, *height),
            Self::Scale { factor } => manipulate::scale(src, *factor),
            Self::AutoCrop { tolerance } => manipulate::auto_crop(src, *tolerance),
        }
    }
}

fn finite(what: &str, v: f32) -> PixmarkResult<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(PixmarkError::invalid_argument(format!(
            "{what} must be finite (got {v})"
        )))
    }
}

fn at_least(what: &str, v: f32, min: f32) -> PixmarkResult<()> {
    finite(what, v)?;
    if v < min {
        return Err(PixmarkError::invalid_argument(format!(
            "{what} must be >= {min} (got {v})"
        )));
    }
    Ok(())
}

fn above(what: &str, v: f32, min: f32) -> PixmarkResult<()> {
    finite(what, v)?;
    if v <= min {
        return Err(PixmarkError::invalid_argument(format!(
            "{what} must be > {min} (got {v})"
        )));
    }
    Ok(())
}

fn nonzero(what: &str) -> PixmarkResult<()> {
    Err(PixmarkError::invalid_argument(format!("{what} must be > 0")))
}

fn angles(what: &str, degrees: [f64; 2], within: impl Fn(f64) -> bool) -> PixmarkResult<()> {
    match degrees.into_iter().find(|d| !(d.is_finite() && within(*d))) {
        Some(d) => Err(PixmarkError::invalid_argument(format!(
            "{what} angle is out of range (got {d})"
        ))),
        None => Ok(()),
    }
}
