//! The editable document and the editor that drives it.

use crate::annotation::model::{Annotation, AnnotationId, AnnotationKind};
use crate::annotation::tool::Tool;
use crate::effects::accel::{AcceleratedSurface, EffectContext};
use crate::effects::library::ImageEffect;
use crate::effects::manipulate;
use crate::foundation::core::{Bitmap, Color, IRect, Point, Vec2};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::history::{CanvasChange, History, HistoryEntry};
use crate::settings::EngineOpts;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub source: Bitmap,
    pub annotations: Vec<Annotation>,
}

impl Document {
    pub fn new(source: Bitmap) -> PixmarkResult<Self> {
        source.ensure_not_empty("source bitmap")?;
        Ok(Self {
            source,
            annotations: Vec::new(),
        })
    }

    pub fn index_of(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Top-most annotation under `point`: highest z first, later list entries win ties.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<AnnotationId> {
        self.annotations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.hit_test(point, tolerance))
            .max_by_key(|(i, a)| (a.z, *i))
            .map(|(_, a)| a.id)
    }

    /// Bring every region-effect patch up to date with the current source.
    /// Returns how many patches were recomputed.
    pub fn refresh_effects(&mut self) -> PixmarkResult<usize> {
        refresh_all(&mut self.annotations, &self.source)
    }

    fn max_z(&self) -> i32 {
        self.annotations.iter().map(|a| a.z).max().unwrap_or(0)
    }

    fn min_z(&self) -> i32 {
        self.annotations.iter().map(|a| a.z).min().unwrap_or(0)
    }

    fn next_number(&self) -> u32 {
        self.annotations
            .iter()
            .filter_map(|a| match a.kind {
                AnnotationKind::Number { value, .. } => Some(value),
                _ => None,
            })
            .max()
            .map_or(1, |v| v.saturating_add(1))
    }
}

#[derive(Clone, Debug)]
enum GestureKind {
    Create { id: AnnotationId },
    Move { id: AnnotationId, last: Point },
}

#[derive(Clone, Debug)]
struct Gesture {
    before: Vec<Annotation>,
    kind: GestureKind,
}

/// Tool state, gestures and history-tracked mutations over one [`Document`].
///
/// Pointer coordinates are source-bitmap pixels; any display scaling is the host's job.
pub struct Editor {
    doc: Document,
    opts: EngineOpts,
    history: History,
    tool: Option<Tool>,
    gesture: Option<Gesture>,
    accel: Option<Box<dyn AcceleratedSurface>>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("doc", &self.doc)
            .field("tool", &self.tool)
            .field("history", &self.history)
            .field("accel", &self.accel.as_ref().map(|a| a.label().to_string()))
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(source: Bitmap, opts: EngineOpts) -> PixmarkResult<Self> {
        Ok(Self {
            doc: Document::new(source)?,
            history: History::new(opts.history_limit),
            opts,
            tool: None,
            gesture: None,
            accel: None,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn source(&self) -> &Bitmap {
        &self.doc.source
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.doc.annotations
    }

    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tool(&self) -> Option<Tool> {
        self.tool
    }

    /// `None` selects the pointer (select and move) mode.
    pub fn set_tool(&mut self, tool: Option<Tool>) {
        self.tool = tool;
    }

    /// Lend (or withdraw) the host's accelerated surface.
    pub fn set_accelerated_surface(&mut self, accel: Option<Box<dyn AcceleratedSurface>>) {
        self.accel = accel;
    }

    pub fn selected(&self) -> impl Iterator<Item = &Annotation> {
        self.doc.annotations.iter().filter(|a| a.selected)
    }

    fn snapshot(&self) -> Vec<Annotation> {
        self.doc.annotations.clone()
    }

    fn record_if_changed(&mut self, before: Vec<Annotation>) -> bool {
        if before == self.doc.annotations {
            return false;
        }
        self.history.record_annotations(before);
        true
    }

    fn select_only(&mut self, id: Option<AnnotationId>) {
        for a in &mut self.doc.annotations {
            a.selected = Some(a.id) == id;
        }
    }

    fn find_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.doc.annotations.iter_mut().find(|a| a.id == id)
    }

    // Gestures.

    /// Start a gesture: create an annotation with the active tool, or pick one to move.
    pub fn press(&mut self, point: Point) {
        let before = self.snapshot();
        let kind = match self.tool {
            Some(tool) => {
                let mut ann = Annotation::create_at(tool, point, &self.opts.tool_defaults);
                if let AnnotationKind::Number { value, .. } = &mut ann.kind {
                    *value = self.doc.next_number();
                }
                ann.z = self.doc.max_z() + 1;
                ann.selected = true;
                let id = ann.id;
                self.select_only(None);
                self.doc.annotations.push(ann);
                GestureKind::Create { id }
            }
            None => {
                let hit = self.doc.hit_test(point, self.opts.hit_tolerance);
                self.select_only(hit);
                match hit {
                    Some(id) => GestureKind::Move { id, last: point },
                    None => {
                        self.gesture = None;
                        return;
                    }
                }
            }
        };
        // Plain selection changes are not undoable; only what happens after the press is.
        let before = match kind {
            GestureKind::Create { .. } => before,
            GestureKind::Move { .. } => self.snapshot(),
        };
        self.gesture = Some(Gesture { before, kind });
    }

    /// Continue the gesture. Region-effect patches are not refreshed here.
    pub fn drag(&mut self, point: Point) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        match &mut gesture.kind {
            GestureKind::Create { id } => {
                let id = *id;
                if let Some(a) = self.doc.annotations.iter_mut().find(|a| a.id == id) {
                    a.update_drag(point);
                }
            }
            GestureKind::Move { id, last } => {
                let (id, delta) = (*id, point - *last);
                *last = point;
                if let Some(a) = self.doc.annotations.iter_mut().find(|a| a.id == id) {
                    a.translate(delta);
                }
            }
        }
    }

    /// Finish the gesture, refresh the touched patch, and record history if anything
    /// changed. Returns the id of the created or moved annotation.
    pub fn release(&mut self, point: Point) -> PixmarkResult<Option<AnnotationId>> {
        self.drag(point);
        let Some(gesture) = self.gesture.take() else {
            return Ok(None);
        };
        let id = match gesture.kind {
            GestureKind::Create { id } | GestureKind::Move { id, .. } => id,
        };
        let source = &self.doc.source;
        let refreshed = match self.doc.annotations.iter_mut().find(|a| a.id == id) {
            Some(a) => a.refresh_patch(source).map(|_| ()),
            None => Ok(()),
        };
        if let Err(err) = refreshed {
            self.doc.annotations = gesture.before;
            return Err(err);
        }
        self.record_if_changed(gesture.before);
        Ok(Some(id))
    }

    /// Drop an unfinished gesture, restoring the list as it was at the press.
    pub fn cancel_gesture(&mut self) {
        if let Some(g) = self.gesture.take() {
            self.doc.annotations = g.before;
        }
    }

    // Annotation list mutations.

    pub fn add(&mut self, mut annotation: Annotation) -> PixmarkResult<AnnotationId> {
        let before = self.snapshot();
        annotation.refresh_patch(&self.doc.source)?;
        let id = annotation.id;
        self.doc.annotations.push(annotation);
        self.history.record_annotations(before);
        Ok(id)
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        let Some(index) = self.doc.index_of(id) else {
            return false;
        };
        let before = self.snapshot();
        self.doc.annotations.remove(index);
        self.history.record_annotations(before);
        true
    }

    /// Remove every selected annotation; returns how many went.
    pub fn delete_selected(&mut self) -> usize {
        let before = self.snapshot();
        self.doc.annotations.retain(|a| !a.selected);
        let removed = before.len() - self.doc.annotations.len();
        if removed > 0 {
            self.history.record_annotations(before);
        }
        removed
    }

    /// Edit one annotation as a single undoable step; its patch is refreshed. An edit whose
    /// patch cannot be rendered is rejected and the list stays as it was.
    pub fn update(
        &mut self,
        id: AnnotationId,
        edit: impl FnOnce(&mut Annotation),
    ) -> PixmarkResult<bool> {
        let Some(index) = self.doc.index_of(id) else {
            return Ok(false);
        };
        let mut edited = self.doc.annotations[index].clone();
        edit(&mut edited);
        edited.refresh_patch(&self.doc.source)?;
        if edited == self.doc.annotations[index] {
            // Equal apart from the cache; keep the refreshed patch.
            self.doc.annotations[index] = edited;
            return Ok(false);
        }
        let before = self.snapshot();
        self.doc.annotations[index] = edited;
        self.history.record_annotations(before);
        Ok(true)
    }

    /// Copy an annotation (fresh id) shifted by `offset`, on top of everything else.
    pub fn duplicate(&mut self, id: AnnotationId, offset: Vec2) -> PixmarkResult<Option<AnnotationId>> {
        let Some(original) = self.doc.get(id) else {
            return Ok(None);
        };
        let mut copy = original.duplicate();
        copy.translate(offset);
        copy.z = self.doc.max_z() + 1;
        copy.selected = false;
        self.add(copy).map(Some)
    }

    pub fn bring_to_front(&mut self, id: AnnotationId) -> bool {
        let z = self.doc.max_z() + 1;
        self.set_z(id, z)
    }

    pub fn send_to_back(&mut self, id: AnnotationId) -> bool {
        let z = self.doc.min_z() - 1;
        self.set_z(id, z)
    }

    fn set_z(&mut self, id: AnnotationId, z: i32) -> bool {
        let before = self.snapshot();
        match self.find_mut(id) {
            Some(a) => a.z = z,
            None => return false,
        }
        self.record_if_changed(before)
    }

    /// Select the top-most annotation under `point` (deselecting the rest). Not undoable.
    pub fn select_at(&mut self, point: Point) -> Option<AnnotationId> {
        let hit = self.hit_test_at(point);
        self.select_only(hit);
        hit
    }

    pub fn hit_test_at(&self, point: Point) -> Option<AnnotationId> {
        self.doc.hit_test(point, self.opts.hit_tolerance)
    }

    /// Replace the whole annotation list (e.g. after loading), as one undoable step.
    /// If any patch fails to render, nothing changes.
    pub fn set_annotations(&mut self, mut annotations: Vec<Annotation>) -> PixmarkResult<()> {
        refresh_all(&mut annotations, &self.doc.source)?;
        self.gesture = None;
        let before = std::mem::replace(&mut self.doc.annotations, annotations);
        self.history.record_annotations(before);
        Ok(())
    }

    // Canvas mutations.

    /// Crop the source to `rect` (clipped to the image); annotations move with the pixels.
    pub fn crop(&mut self, rect: IRect) -> PixmarkResult<()> {
        let rect = rect.intersect(self.doc.source.extent());
        if rect.is_empty() {
            return Err(PixmarkError::invalid_argument(
                "crop rectangle does not overlap the image",
            ));
        }
        let cropped = self.doc.source.crop(rect)?;
        let delta = Vec2::new(-f64::from(rect.x0), -f64::from(rect.y0));
        self.replace_canvas(cropped, |a| a.translate(delta), |old| CanvasChange::Replace(old))
    }

    /// Grow the canvas by the given margins filled with `fill`. Undo is a plain crop.
    pub fn expand_canvas(
        &mut self,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        fill: Color,
    ) -> PixmarkResult<()> {
        let (w, h) = (self.doc.source.width(), self.doc.source.height());
        let (left_i, top_i) = (to_i32(left)?, to_i32(top)?);
        let width = w
            .checked_add(left)
            .and_then(|v| v.checked_add(right))
            .ok_or_else(|| PixmarkError::invalid_argument("expanded canvas is too wide"))?;
        let height = h
            .checked_add(top)
            .and_then(|v| v.checked_add(bottom))
            .ok_or_else(|| PixmarkError::invalid_argument("expanded canvas is too tall"))?;
        let expanded =
            manipulate::expand_canvas(&self.doc.source, width, height, left_i, top_i, fill)?;
        let delta = Vec2::new(f64::from(left), f64::from(top));
        self.replace_canvas(
            expanded,
            |a| a.translate(delta),
            |_| CanvasChange::Crop {
                rect: IRect::from_xywh(left_i, top_i, w, h),
                fill: Some(fill),
            },
        )
    }

    /// Resample the source to `width` x `height`; annotations scale with it.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> PixmarkResult<()> {
        let resized = manipulate::resize(&self.doc.source, width, height)?;
        let sx = f64::from(width) / f64::from(self.doc.source.width());
        let sy = f64::from(height) / f64::from(self.doc.source.height());
        self.replace_canvas(resized, |a| a.scale(sx, sy), CanvasChange::Replace)
    }

    /// Burn a whole-image effect into the source. Annotations are left where they are.
    pub fn apply_effect(&mut self, effect: &ImageEffect) -> PixmarkResult<()> {
        let out = {
            let ctx = EffectContext::new(self.accel.as_deref(), &self.opts);
            effect.apply_with(&self.doc.source, &ctx)?
        };
        self.replace_canvas(out, |_| {}, CanvasChange::Replace)
    }

    /// Swap in a different source bitmap (undoable); patches are recomputed.
    pub fn replace_source(&mut self, source: Bitmap) -> PixmarkResult<()> {
        source.ensure_not_empty("source bitmap")?;
        self.replace_canvas(source, |_| {}, CanvasChange::Replace)
    }

    fn replace_canvas(
        &mut self,
        source: Bitmap,
        adjust: impl Fn(&mut Annotation),
        inverse: impl FnOnce(Bitmap) -> CanvasChange,
    ) -> PixmarkResult<()> {
        let mut adjusted = self.snapshot();
        for a in &mut adjusted {
            adjust(a);
        }
        refresh_all(&mut adjusted, &source)?;

        self.gesture = None;
        let before = std::mem::replace(&mut self.doc.annotations, adjusted);
        let old = std::mem::replace(&mut self.doc.source, source);
        self.history.record(HistoryEntry::Canvas {
            change: inverse(old),
            annotations: before,
        });
        Ok(())
    }

    pub fn refresh_effects(&mut self) -> PixmarkResult<usize> {
        self.doc.refresh_effects()
    }

    // History.

    #[tracing::instrument(level = "debug", skip(self), fields(depth = self.history.undo_len()))]
    pub fn undo(&mut self) -> PixmarkResult<bool> {
        self.gesture = None;
        let done = self.history.undo(&mut self.doc)?;
        if done {
            self.doc.refresh_effects()?;
        }
        Ok(done)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(depth = self.history.redo_len()))]
    pub fn redo(&mut self) -> PixmarkResult<bool> {
        self.gesture = None;
        let done = self.history.redo(&mut self.doc)?;
        if done {
            self.doc.refresh_effects()?;
        }
        Ok(done)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // Save/load and export.

    pub fn to_json(&self) -> PixmarkResult<String> {
        crate::serialize::serialize(&self.doc.annotations)
    }

    /// Replace the annotation list from persisted text; nothing changes on a decode error.
    pub fn load_json(&mut self, text: &str) -> PixmarkResult<()> {
        let annotations = crate::serialize::deserialize(text)?;
        self.set_annotations(annotations)
    }

    /// The source with every annotation drawn on top.
    pub fn flatten(&self) -> PixmarkResult<Bitmap> {
        crate::render::flatten(&self.doc.source, &self.doc.annotations)
    }
}

fn refresh_all(annotations: &mut [Annotation], source: &Bitmap) -> PixmarkResult<usize> {
    let mut refreshed = 0;
    for a in annotations {
        if a.refresh_patch(source)? {
            refreshed += 1;
        }
    }
    Ok(refreshed)
}

fn to_i32(v: u32) -> PixmarkResult<i32> {
    i32::try_from(v).map_err(|_| PixmarkError::invalid_argument(format!("{v} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::PixelFormat;

    fn editor() -> Editor {
        let src = Bitmap::filled(100, 80, PixelFormat::Rgba8, Color::WHITE);
        Editor::new(src, EngineOpts::default()).unwrap()
    }

    fn draw(ed: &mut Editor, tool: Tool, from: (f64, f64), to: (f64, f64)) -> AnnotationId {
        ed.set_tool(Some(tool));
        ed.press(Point::new(from.0, from.1));
        ed.drag(Point::new((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0));
        ed.release(Point::new(to.0, to.1)).unwrap().unwrap()
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(Editor::new(Bitmap::transparent(0, 0), EngineOpts::default()).is_err());
    }

    #[test]
    fn gesture_creates_one_undoable_annotation() {
        let mut ed = editor();
        let id = draw(&mut ed, Tool::Rectangle, (10.0, 10.0), (40.0, 30.0));
        assert_eq!(ed.annotations().len(), 1);
        let a = &ed.annotations()[0];
        assert_eq!(a.id, id);
        assert_eq!(a.end, Point::new(40.0, 30.0));
        assert!(a.selected);
        assert_eq!(ed.history().undo_len(), 1);
        assert!(ed.undo().unwrap());
        assert!(ed.annotations().is_empty());
    }

    #[test]
    fn region_effect_gets_patch_on_release() {
        let mut ed = editor();
        draw(&mut ed, Tool::Pixelate, (10.0, 10.0), (30.0, 30.0));
        let patch = ed.annotations()[0].patch().unwrap();
        assert_eq!((patch.width(), patch.height()), (20, 20));
    }

    #[test]
    fn moving_records_history_but_plain_clicks_do_not() {
        let mut ed = editor();
        draw(&mut ed, Tool::Ellipse, (10.0, 10.0), (50.0, 50.0));
        ed.set_tool(None);
        ed.press(Point::new(30.0, 30.0));
        ed.release(Point::new(30.0, 30.0)).unwrap();
        assert_eq!(ed.history().undo_len(), 1);

        ed.press(Point::new(30.0, 30.0));
        ed.release(Point::new(35.0, 32.0)).unwrap();
        assert_eq!(ed.history().undo_len(), 2);
        assert_eq!(ed.annotations()[0].start, Point::new(15.0, 12.0));
    }

    #[test]
    fn numbers_auto_increment() {
        let mut ed = editor();
        draw(&mut ed, Tool::Number, (10.0, 10.0), (10.0, 10.0));
        draw(&mut ed, Tool::Number, (50.0, 10.0), (50.0, 10.0));
        let values: Vec<u32> = ed
            .annotations()
            .iter()
            .filter_map(|a| match a.kind {
                AnnotationKind::Number { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn hit_test_prefers_highest_z() {
        let mut ed = editor();
        let low = draw(&mut ed, Tool::Rectangle, (10.0, 10.0), (60.0, 60.0));
        let high = draw(&mut ed, Tool::Rectangle, (20.0, 20.0), (70.0, 70.0));
        assert_eq!(ed.hit_test_at(Point::new(30.0, 30.0)), Some(high));
        assert!(ed.send_to_back(high));
        assert_eq!(ed.hit_test_at(Point::new(30.0, 30.0)), Some(low));
    }

    #[test]
    fn delete_selected_removes_only_selection() {
        let mut ed = editor();
        draw(&mut ed, Tool::Line, (10.0, 10.0), (20.0, 20.0));
        let keep = draw(&mut ed, Tool::Line, (50.0, 50.0), (60.0, 60.0));
        ed.select_at(Point::new(15.0, 15.0));
        assert_eq!(ed.delete_selected(), 1);
        assert_eq!(ed.annotations()[0].id, keep);
        assert_eq!(ed.delete_selected(), 0);
    }

    #[test]
    fn crop_moves_annotations_and_undoes() {
        let mut ed = editor();
        draw(&mut ed, Tool::Rectangle, (30.0, 30.0), (50.0, 50.0));
        ed.crop(IRect::new(20, 10, 80, 70)).unwrap();
        assert_eq!((ed.source().width(), ed.source().height()), (60, 60));
        assert_eq!(ed.annotations()[0].start, Point::new(10.0, 20.0));
        assert!(ed.undo().unwrap());
        assert_eq!(ed.source().width(), 100);
        assert_eq!(ed.annotations()[0].start, Point::new(30.0, 30.0));
        assert!(ed.redo().unwrap());
        assert_eq!(ed.source().width(), 60);
    }

    #[test]
    fn expand_undo_is_geometric() {
        let mut ed = editor();
        ed.expand_canvas(5, 6, 7, 8, Color::BLACK).unwrap();
        assert_eq!((ed.source().width(), ed.source().height()), (112, 94));
        assert_eq!(ed.source().get_pixel(0, 0), [0, 0, 0, 255]);
        assert!(ed.undo().unwrap());
        assert_eq!((ed.source().width(), ed.source().height()), (100, 80));
        assert!(ed.redo().unwrap());
        assert_eq!(ed.source().get_pixel(5, 6), [255, 255, 255, 255]);
    }

    #[test]
    fn resize_scales_annotations() {
        let mut ed = editor();
        draw(&mut ed, Tool::Line, (10.0, 10.0), (50.0, 40.0));
        ed.resize_canvas(50, 40).unwrap();
        assert_eq!(ed.annotations()[0].end, Point::new(25.0, 20.0));
    }

    #[test]
    fn apply_effect_is_undoable_and_refreshes_patches() {
        let mut ed = editor();
        draw(&mut ed, Tool::Highlight, (0.0, 0.0), (20.0, 20.0));
        let before = ed.annotations()[0].patch().unwrap().clone();
        ed.apply_effect(&ImageEffect::Invert).unwrap();
        let after = ed.annotations()[0].patch().unwrap().clone();
        assert_ne!(before, after);
        assert!(ed.undo().unwrap());
        assert_eq!(ed.source().get_pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(ed.annotations()[0].patch(), Some(&before));
    }

    #[test]
    fn update_and_reorder_are_single_steps() {
        let mut ed = editor();
        let a = draw(&mut ed, Tool::Rectangle, (10.0, 10.0), (40.0, 40.0));
        let b = draw(&mut ed, Tool::Blur, (20.0, 20.0), (50.0, 50.0));
        assert!(ed.bring_to_front(a));
        assert_eq!(ed.hit_test_at(Point::new(30.0, 30.0)), Some(a));

        let depth = ed.history().undo_len();
        assert!(
            ed.update(b, |ann| ann.kind = AnnotationKind::Blur { radius: 2.0 })
                .unwrap()
        );
        assert_eq!(ed.history().undo_len(), depth + 1);
        assert!(!ed.update(b, |_| {}).unwrap());
        assert!(!ed.update(AnnotationId(u64::MAX), |_| {}).unwrap());
    }

    #[test]
    fn json_round_trip_through_editor() {
        let mut ed = editor();
        draw(&mut ed, Tool::Callout, (10.0, 10.0), (60.0, 40.0));
        draw(&mut ed, Tool::Magnify, (20.0, 20.0), (40.0, 40.0));
        let text = ed.to_json().unwrap();

        let mut other = editor();
        other.load_json(&text).unwrap();
        assert_eq!(other.annotations(), ed.annotations());
        assert!(other.annotations()[1].patch().is_some());
    }

    #[test]
    fn replace_source_recomputes_patches() {
        let mut ed = editor();
        draw(&mut ed, Tool::Pixelate, (0.0, 0.0), (20.0, 20.0));
        let black = Bitmap::filled(100, 80, PixelFormat::Rgba8, Color::BLACK);
        ed.replace_source(black).unwrap();
        let patch = ed.annotations()[0].patch().unwrap();
        assert_eq!(patch.get_pixel(0, 0), [0, 0, 0, 255]);
        assert!(ed.replace_source(Bitmap::transparent(0, 0)).is_err());
        ed.undo().unwrap();
        assert_eq!(ed.source().get_pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn apply_effect_uses_the_lent_surface() {
        struct Solid;
        impl AcceleratedSurface for Solid {
            fn label(&self) -> &str {
                "solid"
            }
            fn apply(
                &self,
                _effect: &ImageEffect,
                src: &Bitmap,
            ) -> Result<Bitmap, crate::effects::accel::AccelError> {
                Ok(Bitmap::filled(src.width(), src.height(), PixelFormat::Rgba8, Color::RED))
            }
        }

        let src = Bitmap::filled(100, 80, PixelFormat::Rgba8, Color::WHITE);
        let opts = EngineOpts::default().with_accel_min_pixels(0);
        let mut ed = Editor::new(src, opts).unwrap();
        ed.set_accelerated_surface(Some(Box::new(Solid)));
        ed.apply_effect(&ImageEffect::Invert).unwrap();
        assert_eq!(ed.source().get_pixel(3, 3), [255, 0, 0, 255]);

        ed.set_accelerated_surface(None);
        ed.apply_effect(&ImageEffect::Invert).unwrap();
        assert_eq!(ed.source().get_pixel(3, 3), [0, 255, 255, 255]);
    }

    #[test]
    fn cancel_gesture_restores_list() {
        let mut ed = editor();
        ed.set_tool(Some(Tool::Arrow));
        ed.press(Point::new(1.0, 1.0));
        ed.drag(Point::new(30.0, 30.0));
        ed.cancel_gesture();
        assert!(ed.annotations().is_empty());
        assert!(!ed.can_undo());
    }

    #[test]
    fn release_with_unrenderable_patch_restores_the_list() {
        let mut opts = EngineOpts::default();
        opts.tool_defaults.magnify_zoom = 0.25;
        let src = Bitmap::filled(100, 80, PixelFormat::Rgba8, Color::WHITE);
        let mut ed = Editor::new(src, opts).unwrap();
        draw(&mut ed, Tool::Rectangle, (5.0, 5.0), (20.0, 20.0));

        ed.set_tool(Some(Tool::Magnify));
        ed.press(Point::new(30.0, 30.0));
        let err = ed.release(Point::new(60.0, 60.0)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(ed.annotations().len(), 1);
        assert!(ed.annotations()[0].selected);
        assert_eq!(ed.history().undo_len(), 1);
    }

    #[test]
    fn canvas_change_is_all_or_nothing() {
        let mut ed = editor();
        draw(&mut ed, Tool::Rectangle, (5.0, 5.0), (20.0, 20.0));
        let mut bad = Annotation::new(
            Tool::Pixelate,
            AnnotationKind::Pixelate { block_size: 4 },
            crate::annotation::model::Style::none(),
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
        );
        bad.refresh_patch(ed.source()).unwrap();
        bad.kind = AnnotationKind::Pixelate { block_size: 0 };
        ed.doc.annotations.push(bad);
        let before = ed.annotations().to_vec();
        let depth = ed.history().undo_len();

        assert!(ed.crop(IRect::new(0, 0, 50, 50)).is_err());
        assert_eq!((ed.source().width(), ed.source().height()), (100, 80));
        assert_eq!(ed.annotations(), before.as_slice());
        assert_eq!(ed.history().undo_len(), depth);
    }
}
