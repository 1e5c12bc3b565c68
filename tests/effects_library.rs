use std::cell::Cell;

use pixmark::{
    AccelError, AcceleratedSurface, Bitmap, Color, EffectContext, EngineOpts, ImageEffect,
    PixelFormat,
};

fn noise(w: u32, h: u32, format: PixelFormat) -> Bitmap {
    let mut bm = Bitmap::filled(w, h, format, Color::TRANSPARENT);
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    for y in 0..h {
        for x in 0..w {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let b = state.to_le_bytes();
            bm.set_pixel(x, y, [b[0], b[1], b[2], b[3] | 0x80]);
        }
    }
    bm
}

#[test]
fn flip_twice_is_identity_for_every_format() {
    for format in [
        PixelFormat::Rgba8,
        PixelFormat::Bgra8,
        PixelFormat::Rgb8,
        PixelFormat::Gray8,
    ] {
        let src = noise(13, 7, format);
        for flip in [ImageEffect::FlipHorizontal, ImageEffect::FlipVertical] {
            let once = flip.apply(&src).unwrap();
            assert_ne!(once.data(), src.data(), "{format:?} {flip:?}");
            let twice = flip.apply(&once).unwrap();
            assert_eq!(twice.data(), src.data(), "{format:?} {flip:?}");
            assert_eq!(twice.format(), format);
        }
    }
}

#[test]
fn four_quarter_turns_are_identity() {
    let src = noise(9, 5, PixelFormat::Rgba8);
    let turn = ImageEffect::Rotate {
        degrees: 90.0,
        background: Color::TRANSPARENT,
    };
    let mut cur = src.clone();
    for _ in 0..4 {
        cur = turn.apply(&cur).unwrap();
    }
    assert_eq!(cur, src);
}

#[test]
fn effects_never_mutate_their_input() {
    let src = noise(24, 16, PixelFormat::Rgba8);
    let before = src.clone();
    let effects = [
        ImageEffect::Brightness { amount: 0.2 },
        ImageEffect::Contrast { factor: 1.4 },
        ImageEffect::Gamma { gamma: 2.2 },
        ImageEffect::Sepia,
        ImageEffect::Blur { radius: 2.0 },
        ImageEffect::Sharpen {
            amount: 1.0,
            radius: 1.0,
        },
        ImageEffect::Pixelate { block_size: 4 },
        ImageEffect::DropShadow {
            dx: 3,
            dy: 3,
            radius: 2.0,
            color: Color::BLACK,
        },
        ImageEffect::TornEdge {
            amplitude: 4,
            seed: 9,
        },
        ImageEffect::Skew {
            x_degrees: 10.0,
            y_degrees: 0.0,
            background: Color::WHITE,
        },
        ImageEffect::Perspective {
            x_degrees: 20.0,
            y_degrees: 0.0,
            background: Color::TRANSPARENT,
        },
        ImageEffect::Scale { factor: 0.5 },
    ];
    for e in &effects {
        let out = e.apply(&src).unwrap();
        assert!(!out.is_empty(), "{}", e.name());
        assert_eq!(out.format(), e.output_format(src.format()), "{}", e.name());
    }
    assert_eq!(src, before);
}

#[test]
fn non_positive_parameters_are_invalid() {
    let src = noise(8, 8, PixelFormat::Rgba8);
    for e in [
        ImageEffect::Blur { radius: 0.0 },
        ImageEffect::Blur { radius: -1.0 },
        ImageEffect::Pixelate { block_size: 0 },
        ImageEffect::Gamma { gamma: 0.0 },
        ImageEffect::Resize {
            width: 0,
            height: 4,
        },
    ] {
        let err = e.apply(&src).unwrap_err();
        assert!(err.is_invalid_argument(), "{}: {err}", e.name());
    }
}

struct Recorder {
    calls: Cell<u32>,
    fail: bool,
}

impl AcceleratedSurface for Recorder {
    fn label(&self) -> &str {
        "recorder"
    }

    fn apply(&self, _effect: &ImageEffect, src: &Bitmap) -> Result<Bitmap, AccelError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(AccelError::SurfaceCreation("device lost".to_string()));
        }
        Ok(Bitmap::filled(
            src.width(),
            src.height(),
            PixelFormat::Rgba8,
            Color::rgb(1, 2, 3),
        ))
    }
}

#[test]
fn accelerated_surface_is_used_above_the_threshold() {
    let src = noise(20, 20, PixelFormat::Rgba8);
    let accel = Recorder {
        calls: Cell::new(0),
        fail: false,
    };
    let opts = EngineOpts::default().with_accel_min_pixels(100);
    let ctx = EffectContext::new(Some(&accel), &opts);
    let out = ImageEffect::Invert.apply_with(&src, &ctx).unwrap();
    assert_eq!(accel.calls.get(), 1);
    assert_eq!(out.get_pixel(0, 0), [1, 2, 3, 255]);

    let small = noise(5, 5, PixelFormat::Rgba8);
    ImageEffect::Invert.apply_with(&small, &ctx).unwrap();
    assert_eq!(accel.calls.get(), 1);
}

#[test]
fn accelerated_failure_falls_back_to_cpu() {
    let src = noise(20, 20, PixelFormat::Rgba8);
    let accel = Recorder {
        calls: Cell::new(0),
        fail: true,
    };
    let opts = EngineOpts::default().with_accel_min_pixels(0);
    let ctx = EffectContext::new(Some(&accel), &opts);
    let out = ImageEffect::Invert.apply_with(&src, &ctx).unwrap();
    assert_eq!(accel.calls.get(), 1);
    assert_eq!(out, ImageEffect::Invert.apply(&src).unwrap());
}

#[test]
fn accelerated_path_still_rejects_invalid_parameters() {
    let src = noise(500, 400, PixelFormat::Rgba8);
    let accel = Recorder {
        calls: Cell::new(0),
        fail: false,
    };
    let ctx = EffectContext::new(Some(&accel), &EngineOpts::default());
    for e in [
        ImageEffect::Blur { radius: -3.0 },
        ImageEffect::Blur { radius: 1e7 },
        ImageEffect::Contrast { factor: -1.0 },
        ImageEffect::Slice {
            position: 1.5,
            gap: 2,
            offset: 0,
        },
    ] {
        let err = e.apply_with(&src, &ctx).unwrap_err();
        assert!(err.is_invalid_argument(), "{}: {err}", e.name());
    }
    assert_eq!(accel.calls.get(), 0);
}
