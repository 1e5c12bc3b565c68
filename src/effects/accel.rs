//! Optional accelerated execution of whole-image effects, lent by the host per call.

use crate::effects::library::ImageEffect;
use crate::foundation::core::Bitmap;
use crate::settings::{DEFAULT_ACCEL_MIN_PIXELS, EngineOpts};

/// Why the accelerated path could not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum AccelError {
    #[error("accelerated context is unavailable")]
    Unavailable,
    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),
    #[error("readback failed: {0}")]
    Readback(String),
    #[error("effect '{0}' is not supported by the accelerated surface")]
    Unsupported(&'static str),
}

/// A host-provided surface able to run some effects faster than the CPU path.
///
/// Implementations must produce the same pixels the CPU path would (within rounding); a
/// result that does not even have the expected shape is treated as a readback failure.
pub trait AcceleratedSurface {
    fn label(&self) -> &str;

    /// Checked before every call; the surface may go away between calls.
    fn is_available(&self) -> bool {
        true
    }

    fn apply(&self, effect: &ImageEffect, src: &Bitmap) -> Result<Bitmap, AccelError>;
}

/// Per-call execution context for [`ImageEffect::apply_with`].
#[derive(Clone, Copy)]
pub struct EffectContext<'a> {
    accel: Option<&'a dyn AcceleratedSurface>,
    min_pixels: u64,
}

impl std::fmt::Debug for EffectContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectContext")
            .field("accel", &self.accel.map(|a| a.label()))
            .field("min_pixels", &self.min_pixels)
            .finish()
    }
}

impl Default for EffectContext<'_> {
    fn default() -> Self {
        Self::cpu()
    }
}

impl<'a> EffectContext<'a> {
    /// CPU only.
    pub fn cpu() -> Self {
        Self {
            accel: None,
            min_pixels: DEFAULT_ACCEL_MIN_PIXELS,
        }
    }

    pub fn new(accel: Option<&'a dyn AcceleratedSurface>, opts: &EngineOpts) -> Self {
        Self {
            accel,
            min_pixels: opts.accel_min_pixels,
        }
    }

    pub fn with_accel(mut self, accel: &'a dyn AcceleratedSurface) -> Self {
        self.accel = Some(accel);
        self
    }

    pub fn with_min_pixels(mut self, min_pixels: u64) -> Self {
        self.min_pixels = min_pixels;
        self
    }

    /// Run `effect` on the accelerated surface when one is present, available, and the
    /// image is above the size threshold. `None` means "use the CPU path".
    pub(crate) fn try_accelerated(&self, effect: &ImageEffect, src: &Bitmap) -> Option<Bitmap> {
        let accel = self.accel?;
        if src.pixel_count() <= self.min_pixels {
            return None;
        }
        let attempt = if accel.is_available() {
            accel.apply(effect, src).and_then(|out| {
                if out.is_empty() {
                    Err(AccelError::Readback("empty result".to_string()))
                } else {
                    Ok(out)
                }
            })
        } else {
            Err(AccelError::Unavailable)
        };
        match attempt {
            Ok(out) => {
                tracing::trace!(surface = accel.label(), effect = effect.name(), "accelerated");
                Some(out.to_format(effect.output_format(src.format())))
            }
            Err(err) => {
                tracing::debug!(
                    surface = accel.label(),
                    effect = effect.name(),
                    %err,
                    "accelerated path failed; falling back to cpu"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Color, PixelFormat};
    use std::cell::Cell;

    struct Flaky {
        available: bool,
        calls: Cell<u32>,
    }

    impl AcceleratedSurface for Flaky {
        fn label(&self) -> &str {
            "flaky"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn apply(&self, _effect: &ImageEffect, src: &Bitmap) -> Result<Bitmap, AccelError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Bitmap::filled(src.width(), src.height(), PixelFormat::Rgba8, Color::RED))
        }
    }

    #[test]
    fn small_images_stay_on_cpu() {
        let s = Flaky {
            available: true,
            calls: Cell::new(0),
        };
        let ctx = EffectContext::cpu().with_accel(&s);
        let src = Bitmap::transparent(10, 10);
        assert!(ctx.try_accelerated(&ImageEffect::Invert, &src).is_none());
        assert_eq!(s.calls.get(), 0);
    }

    #[test]
    fn unavailable_surface_is_skipped() {
        let s = Flaky {
            available: false,
            calls: Cell::new(0),
        };
        let ctx = EffectContext::cpu().with_accel(&s).with_min_pixels(0);
        assert!(ctx
            .try_accelerated(&ImageEffect::Invert, &Bitmap::transparent(2, 2))
            .is_none());
        assert_eq!(s.calls.get(), 0);
    }

    #[test]
    fn accelerated_result_takes_expected_format() {
        let s = Flaky {
            available: true,
            calls: Cell::new(0),
        };
        let ctx = EffectContext::cpu().with_accel(&s).with_min_pixels(1);
        let src = Bitmap::filled(2, 2, PixelFormat::Bgra8, Color::WHITE);
        let out = ctx.try_accelerated(&ImageEffect::Invert, &src).unwrap();
        assert_eq!(out.format(), PixelFormat::Bgra8);
        assert_eq!(s.calls.get(), 1);
    }
}
