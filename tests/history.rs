use pixmark::{Bitmap, Color, Editor, EngineOpts, IRect, ImageEffect, PixelFormat, Point, Tool};

fn editor_with(limit: usize) -> Editor {
    let src = Bitmap::filled(120, 90, PixelFormat::Rgba8, Color::rgb(30, 60, 90));
    Editor::new(src, EngineOpts::default().with_history_limit(limit)).unwrap()
}

fn draw(ed: &mut Editor, tool: Tool, x: f64, y: f64) {
    ed.set_tool(Some(tool));
    ed.press(Point::new(x, y));
    ed.drag(Point::new(x + 10.0, y + 5.0));
    ed.release(Point::new(x + 20.0, y + 15.0)).unwrap();
}

#[test]
fn undo_then_redo_n_times_restores_the_exact_state() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Rectangle, 5.0, 5.0);
    draw(&mut ed, Tool::Blur, 40.0, 20.0);
    draw(&mut ed, Tool::Arrow, 10.0, 60.0);
    ed.crop(IRect::new(2, 2, 110, 80)).unwrap();
    ed.apply_effect(&ImageEffect::Grayscale).unwrap();

    let annotations = ed.annotations().to_vec();
    let source = ed.source().clone();
    let steps = ed.history().undo_len();
    assert_eq!(steps, 5);

    for _ in 0..steps {
        assert!(ed.undo().unwrap());
    }
    assert!(ed.annotations().is_empty());
    assert_eq!(ed.source().width(), 120);
    assert!(!ed.can_undo());
    assert!(!ed.undo().unwrap());

    for _ in 0..steps {
        assert!(ed.redo().unwrap());
    }
    assert_eq!(ed.annotations(), annotations.as_slice());
    assert_eq!(ed.source(), &source);
    assert!(!ed.can_redo());
}

#[test]
fn new_mutation_after_undo_discards_redo_tail() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Ellipse, 5.0, 5.0);
    draw(&mut ed, Tool::Line, 50.0, 50.0);
    ed.undo().unwrap();
    assert!(ed.can_redo());
    draw(&mut ed, Tool::Text, 70.0, 10.0);
    assert!(!ed.can_redo());
    assert_eq!(ed.annotations().len(), 2);
}

#[test]
fn oldest_entries_are_evicted_past_the_limit() {
    let mut ed = editor_with(3);
    for i in 0..6 {
        draw(&mut ed, Tool::Line, f64::from(i) * 10.0, 5.0);
    }
    assert_eq!(ed.history().undo_len(), 3);
    while ed.undo().unwrap() {}
    assert_eq!(ed.annotations().len(), 3);
}

#[test]
fn undo_refreshes_region_effect_patches() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Pixelate, 10.0, 10.0);
    ed.expand_canvas(10, 10, 0, 0, Color::WHITE).unwrap();
    assert_eq!(ed.annotations()[0].start, Point::new(20.0, 20.0));
    assert!(ed.annotations()[0].patch().is_some());

    ed.undo().unwrap();
    assert_eq!(ed.annotations()[0].start, Point::new(10.0, 10.0));
    let patch = ed.annotations()[0].patch().expect("patch recomputed after undo");
    assert_eq!(patch.get_pixel(0, 0), [30, 60, 90, 255]);
}

#[test]
fn selection_alone_is_not_recorded() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Rectangle, 5.0, 5.0);
    let depth = ed.history().undo_len();
    ed.select_at(Point::new(200.0, 200.0));
    ed.set_tool(None);
    ed.press(Point::new(10.0, 10.0));
    ed.release(Point::new(10.0, 10.0)).unwrap();
    assert_eq!(ed.history().undo_len(), depth);
}

#[test]
fn rejected_update_leaves_list_and_history_alone() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Blur, 10.0, 10.0);
    let id = ed.annotations()[0].id;
    let before = ed.annotations().to_vec();
    let depth = ed.history().undo_len();

    let err = ed
        .update(id, |a| a.kind = pixmark::AnnotationKind::Blur { radius: 0.0 })
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(ed.annotations(), before.as_slice());
    assert_eq!(ed.history().undo_len(), depth);
    assert!(ed.annotations()[0].patch().is_some());
}

#[test]
fn rejected_load_keeps_the_previous_annotations() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Rectangle, 5.0, 5.0);
    let before = ed.annotations().to_vec();
    let depth = ed.history().undo_len();

    let bad = pixmark::Annotation::new(
        Tool::Blur,
        pixmark::AnnotationKind::Blur { radius: 0.0 },
        pixmark::Style::none(),
        Point::new(0.0, 0.0),
        Point::new(20.0, 20.0),
    );
    let text = pixmark::serialize(&[bad]).unwrap();
    let err = ed.load_json(&text).unwrap_err();
    assert!(err.is_invalid_argument(), "{err}");
    assert_eq!(ed.annotations(), before.as_slice());
    assert_eq!(ed.history().undo_len(), depth);

    assert!(ed.undo().unwrap());
    assert!(ed.annotations().is_empty());
    assert!(ed.redo().unwrap());
    assert_eq!(ed.annotations(), before.as_slice());
}

#[test]
fn load_replaces_the_list_as_one_step() {
    let mut ed = editor_with(100);
    draw(&mut ed, Tool::Rectangle, 5.0, 5.0);
    let saved = ed.to_json().unwrap();
    draw(&mut ed, Tool::Pixelate, 40.0, 40.0);
    ed.load_json(&saved).unwrap();
    assert_eq!(ed.annotations().len(), 1);
    assert!(ed.undo().unwrap());
    assert_eq!(ed.annotations().len(), 2);
    assert!(ed.annotations()[1].patch().is_some());
}
