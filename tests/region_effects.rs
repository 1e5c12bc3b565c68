use pixmark::{
    Annotation, AnnotationKind, Bitmap, Color, IRect, PixelFormat, Point, Style, Tool,
    render_patch,
};

fn gradient(w: u32, h: u32) -> Bitmap {
    let mut bm = Bitmap::transparent(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = (((x / 4) + (y / 4)) % 2 * 255) as u8;
            bm.set_pixel(x, y, [v, 255 - v, (x % 256) as u8, 255]);
        }
    }
    bm
}

fn region(tool: Tool, kind: AnnotationKind, a: (f64, f64), b: (f64, f64)) -> Annotation {
    Annotation::new(tool, kind, Style::none(), Point::new(a.0, a.1), Point::new(b.0, b.1))
}

#[test]
fn blur_straddling_the_corner_is_half_transparent() {
    let src = gradient(800, 600);
    let mut blur = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 10.0 },
        (780.0, 580.0),
        (820.0, 620.0),
    );
    assert!(blur.refresh_patch(&src).unwrap());
    let patch = blur.patch().unwrap();
    assert_eq!((patch.width(), patch.height()), (40, 40));
    assert_eq!(blur.patch_rect(), Some(IRect::new(780, 580, 820, 620)));

    for y in 0..40 {
        for x in 0..40 {
            let px = patch.get_pixel(x, y);
            if x >= 20 || y >= 20 {
                assert_eq!(px, [0, 0, 0, 0], "({x},{y}) should be transparent");
            } else {
                assert_eq!(px[3], 255, "({x},{y}) should be opaque");
            }
        }
    }

    // Blurred: the 4 px checkerboard is flattened toward its mean.
    let inside = patch.get_pixel(10, 10);
    assert!(inside[0] > 40 && inside[0] < 215, "{inside:?}");
}

#[test]
fn blur_is_idempotent_and_cached() {
    let src = gradient(64, 64);
    let mut blur = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 3.0 },
        (8.0, 8.0),
        (40.0, 40.0),
    );
    blur.refresh_patch(&src).unwrap();
    let first = blur.patch().unwrap().clone();
    assert!(!blur.refresh_patch(&src).unwrap());
    assert_eq!(render_patch(&blur, &src).unwrap(), first);
}

#[test]
fn moving_the_annotation_or_changing_the_source_invalidates() {
    let mut src = gradient(64, 64);
    let mut px = region(
        Tool::Pixelate,
        AnnotationKind::Pixelate { block_size: 4 },
        (0.0, 0.0),
        (16.0, 16.0),
    );
    assert!(px.refresh_patch(&src).unwrap());
    px.translate(pixmark::Vec2::new(2.0, 0.0));
    assert!(px.refresh_patch(&src).unwrap());
    src.set_pixel(0, 0, [0, 0, 0, 255]);
    assert!(px.refresh_patch(&src).unwrap());
    if let AnnotationKind::Pixelate { block_size } = &mut px.kind {
        *block_size = 8;
    }
    assert!(px.refresh_patch(&src).unwrap());
}

#[test]
fn magnify_fills_the_valid_region() {
    let src = gradient(200, 200);
    let mut mag = region(
        Tool::Magnify,
        AnnotationKind::Magnify { zoom: 2.0 },
        (100.0, 100.0),
        (150.0, 150.0),
    );
    mag.refresh_patch(&src).unwrap();
    let patch = mag.patch().unwrap();
    assert_eq!((patch.width(), patch.height()), (50, 50));
    assert!(patch.data().chunks_exact(4).all(|p| p[3] == 255));

    let capture = pixmark::effects::region::magnify_capture_rect(
        IRect::new(100, 100, 150, 150),
        2.0,
        src.extent(),
    );
    assert_eq!(capture, IRect::new(112, 112, 137, 137));
}

#[test]
fn highlight_darkens_toward_its_color() {
    let src = Bitmap::filled(30, 30, PixelFormat::Rgba8, Color::rgb(200, 100, 50));
    let mut hl = region(
        Tool::Highlight,
        AnnotationKind::Highlight {
            color: Color::rgb(255, 255, 0),
        },
        (5.0, 5.0),
        (25.0, 25.0),
    );
    hl.refresh_patch(&src).unwrap();
    assert_eq!(hl.patch().unwrap().get_pixel(3, 3), [200, 100, 0, 255]);
}

#[test]
fn invalid_parameters_are_rejected_without_caching() {
    let src = gradient(32, 32);
    let mut mag = region(
        Tool::Magnify,
        AnnotationKind::Magnify { zoom: 0.5 },
        (0.0, 0.0),
        (20.0, 20.0),
    );
    assert!(mag.refresh_patch(&src).unwrap_err().is_invalid_argument());
    assert!(mag.patch().is_none());

    let blur = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 0.0 },
        (0.0, 0.0),
        (20.0, 20.0),
    );
    assert!(render_patch(&blur, &src).unwrap_err().is_invalid_argument());
}

#[test]
fn huge_blur_radius_is_an_error_not_an_allocation() {
    let src = gradient(64, 64);
    let blur = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 1e7 },
        (0.0, 0.0),
        (40.0, 40.0),
    );
    assert!(render_patch(&blur, &src).unwrap_err().is_invalid_argument());

    let wide = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 40.0 },
        (10.0, 10.0),
        (30.0, 30.0),
    );
    let patch = render_patch(&wide, &src).unwrap();
    assert_eq!((patch.width(), patch.height()), (20, 20));
}

#[test]
fn entirely_off_image_gives_a_transparent_patch() {
    let src = gradient(32, 32);
    let blur = region(
        Tool::Blur,
        AnnotationKind::Blur { radius: 4.0 },
        (100.0, 100.0),
        (130.0, 120.0),
    );
    let patch = render_patch(&blur, &src).unwrap();
    assert_eq!((patch.width(), patch.height()), (30, 20));
    assert!(patch.data().iter().all(|&b| b == 0));
}

#[test]
fn source_is_never_modified() {
    let src = gradient(48, 48);
    let before = src.clone();
    for (tool, kind) in [
        (Tool::Blur, AnnotationKind::Blur { radius: 5.0 }),
        (Tool::Pixelate, AnnotationKind::Pixelate { block_size: 6 }),
        (Tool::Magnify, AnnotationKind::Magnify { zoom: 3.0 }),
        (Tool::Spotlight, AnnotationKind::Spotlight { dim: 100 }),
        (Tool::SmartEraser, AnnotationKind::SmartEraser),
    ] {
        let mut a = region(tool, kind, (-10.0, -10.0), (30.0, 30.0));
        a.refresh_patch(&src).unwrap();
        assert_eq!((a.patch().unwrap().width(), a.patch().unwrap().height()), (40, 40));
    }
    assert_eq!(src, before);
    assert_eq!(src.revision(), before.revision());
}
