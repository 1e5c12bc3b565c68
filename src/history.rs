//! Undo/redo over annotation-list and canvas mutations.
//!
//! Every entry describes how to get the document back to an earlier state. Applying an
//! entry performs that restore and hands back the entry that reverses it, so undo and redo
//! share one code path: undo applies the top of the undo stack and pushes the returned
//! inverse onto the redo stack, and redo does the mirror image.

use std::collections::VecDeque;

use crate::annotation::model::Annotation;
use crate::document::Document;
use crate::effects::manipulate::expand_canvas;
use crate::foundation::core::{Bitmap, Color, IRect};
use crate::foundation::error::{PixmarkError, PixmarkResult};
use crate::settings::DEFAULT_HISTORY_LIMIT;

/// A recorded, invertible mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum HistoryEntry {
    /// The annotation list as it was before the mutation.
    Annotations(Vec<Annotation>),
    /// A canvas mutation plus the annotation list to restore alongside it.
    Canvas {
        change: CanvasChange,
        annotations: Vec<Annotation>,
    },
}

/// How to restore the source bitmap.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasChange {
    /// Put this exact bitmap back (destructive edits keep a full pixel copy).
    Replace(Bitmap),
    /// Crop the current source to `rect`. With `fill` set the discarded margin is known to
    /// be a solid fill, so the inverse is a geometric [`CanvasChange::Expand`]; otherwise
    /// the inverse keeps a pixel copy.
    Crop { rect: IRect, fill: Option<Color> },
    /// Place the current source at the offset on a larger canvas filled with `fill`.
    Expand {
        width: u32,
        height: u32,
        offset_x: i32,
        offset_y: i32,
        fill: Color,
    },
}

impl CanvasChange {
    fn check(&self, source: &Bitmap) -> PixmarkResult<()> {
        match *self {
            CanvasChange::Replace(_) => Ok(()),
            CanvasChange::Crop { rect, .. } => {
                if rect.is_empty() || !source.extent().contains_rect(rect) {
                    return Err(PixmarkError::invalid_argument(format!(
                        "history crop {rect:?} does not fit the {}x{} source",
                        source.width(),
                        source.height()
                    )));
                }
                Ok(())
            }
            CanvasChange::Expand { width, height, .. } => {
                if width == 0 || height == 0 {
                    return Err(PixmarkError::invalid_argument(
                        "history expand to an empty canvas",
                    ));
                }
                Ok(())
            }
        }
    }

    fn apply(self, source: &mut Bitmap) -> PixmarkResult<CanvasChange> {
        match self {
            CanvasChange::Replace(bitmap) => {
                Ok(CanvasChange::Replace(std::mem::replace(source, bitmap)))
            }
            CanvasChange::Crop { rect, fill } => {
                let cropped = source.crop(rect)?;
                let previous = std::mem::replace(source, cropped);
                Ok(match fill {
                    Some(fill) => CanvasChange::Expand {
                        width: previous.width(),
                        height: previous.height(),
                        offset_x: rect.x0,
                        offset_y: rect.y0,
                        fill,
                    },
                    None => CanvasChange::Replace(previous),
                })
            }
            CanvasChange::Expand {
                width,
                height,
                offset_x,
                offset_y,
                fill,
            } => {
                let expanded = expand_canvas(source, width, height, offset_x, offset_y, fill)?;
                let previous = std::mem::replace(source, expanded);
                Ok(CanvasChange::Crop {
                    rect: IRect::from_xywh(offset_x, offset_y, previous.width(), previous.height()),
                    fill: Some(fill),
                })
            }
        }
    }
}

impl HistoryEntry {
    /// Fails when the entry cannot be applied to `doc` as it is now.
    pub fn check(&self, doc: &Document) -> PixmarkResult<()> {
        match self {
            HistoryEntry::Annotations(_) => Ok(()),
            HistoryEntry::Canvas { change, .. } => change.check(&doc.source),
        }
    }

    /// Restore the state this entry describes and return the entry that undoes the restore.
    /// On error the document is left untouched.
    pub fn apply(self, doc: &mut Document) -> PixmarkResult<HistoryEntry> {
        match self {
            HistoryEntry::Annotations(annotations) => {
                let previous = std::mem::replace(&mut doc.annotations, annotations);
                Ok(HistoryEntry::Annotations(detach(previous)))
            }
            HistoryEntry::Canvas {
                change,
                annotations,
            } => {
                change.check(&doc.source)?;
                let inverse = change.apply(&mut doc.source)?;
                let previous = std::mem::replace(&mut doc.annotations, annotations);
                Ok(HistoryEntry::Canvas {
                    change: inverse,
                    annotations: detach(previous),
                })
            }
        }
    }

    /// Whether undoing this entry needs a full pixel copy.
    pub fn holds_pixels(&self) -> bool {
        matches!(
            self,
            HistoryEntry::Canvas {
                change: CanvasChange::Replace(_),
                ..
            }
        )
    }
}

/// Stored lists never carry raster patches; they are recomputed after a restore.
fn detach(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
    for a in &mut annotations {
        a.invalidate_patch();
    }
    annotations
}

/// Two-stack command history with a bounded undo depth.
#[derive(Clone, Debug)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Push `entry` and drop the redo tail. The oldest entry is evicted past the limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                tracing::trace!(
                    holds_pixels = evicted.holds_pixels(),
                    limit = self.limit,
                    "evicted oldest history entry"
                );
            }
        }
    }

    /// Record the annotation list as it was before a mutation.
    pub fn record_annotations(&mut self, before: Vec<Annotation>) {
        self.record(HistoryEntry::Annotations(detach(before)));
    }

    /// Undo the most recent mutation. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, doc: &mut Document) -> PixmarkResult<bool> {
        let Some(entry) = self.undo.back() else {
            return Ok(false);
        };
        entry.check(doc)?;
        if let Some(entry) = self.undo.pop_back() {
            self.redo.push(entry.apply(doc)?);
        }
        Ok(true)
    }

    /// Redo the most recently undone mutation. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, doc: &mut Document) -> PixmarkResult<bool> {
        let Some(entry) = self.redo.last() else {
            return Ok(false);
        };
        entry.check(doc)?;
        if let Some(entry) = self.redo.pop() {
            self.undo.push_back(entry.apply(doc)?);
        }
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
