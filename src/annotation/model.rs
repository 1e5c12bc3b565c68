use std::sync::atomic::{AtomicU64, Ordering};

use crate::annotation::tool::Tool;
use crate::foundation::core::{Bitmap, Color, IRect, Point, serde_point, serde_points};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque annotation identity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl AnnotationId {
    /// Allocate an id that has not been handed out in this process.
    pub fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure later [`AnnotationId::fresh`] calls never collide with `id` (used after load).
    pub(crate) fn observe(id: AnnotationId) {
        NEXT_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

/// Stroke and fill shared by every variant.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub stroke: Color,
    pub stroke_width: f64,
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub shadow: bool,
}

impl Style {
    /// No stroke, no fill, no shadow. Region effects use this.
    pub fn none() -> Self {
        Self {
            stroke: Color::TRANSPARENT,
            stroke_width: 0.0,
            fill: None,
            shadow: false,
        }
    }
}

/// Which ends of an arrow carry a head.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowHeads {
    Start,
    #[default]
    End,
    Both,
    None,
}

/// Variant payload. The serde tag doubles as the persisted discriminator.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Rectangle {
        #[serde(default)]
        corner_radius: f64,
    },
    Ellipse,
    Line,
    Arrow {
        #[serde(default)]
        heads: ArrowHeads,
    },
    Freehand {
        #[serde(with = "serde_points")]
        points: Vec<Point>,
    },
    Text {
        text: String,
        font_size: f64,
        font_family: String,
    },
    /// Numbered marker: a disc centred on `start`, radius `max(radius, |end - start|)`.
    Number {
        value: u32,
        radius: f64,
    },
    Callout {
        text: String,
        font_size: f64,
        #[serde(with = "serde_point")]
        tail: Point,
    },
    Blur {
        radius: f64,
    },
    Pixelate {
        block_size: u32,
    },
    Magnify {
        zoom: f64,
    },
    Highlight {
        color: Color,
    },
    Spotlight {
        dim: u8,
    },
    SmartEraser,
}

impl AnnotationKind {
    /// Every discriminator the deserializer accepts.
    pub const DISCRIMINATORS: [&'static str; 14] = [
        "rectangle",
        "ellipse",
        "line",
        "arrow",
        "freehand",
        "text",
        "number",
        "callout",
        "blur",
        "pixelate",
        "magnify",
        "highlight",
        "spotlight",
        "smart_eraser",
    ];

    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Rectangle { .. } => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Line => "line",
            Self::Arrow { .. } => "arrow",
            Self::Freehand { .. } => "freehand",
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Callout { .. } => "callout",
            Self::Blur { .. } => "blur",
            Self::Pixelate { .. } => "pixelate",
            Self::Magnify { .. } => "magnify",
            Self::Highlight { .. } => "highlight",
            Self::Spotlight { .. } => "spotlight",
            Self::SmartEraser => "smart_eraser",
        }
    }

    /// Variants whose visible content is a raster patch computed from the source.
    pub fn is_region_effect(&self) -> bool {
        matches!(
            self,
            Self::Blur { .. }
                | Self::Pixelate { .. }
                | Self::Magnify { .. }
                | Self::Highlight { .. }
                | Self::Spotlight { .. }
                | Self::SmartEraser
        )
    }
}

/// One overlay item.
///
/// `Clone` is a value copy that keeps the id (history snapshots compare structurally);
/// [`Annotation::duplicate`] is the copy/paste flavour with a fresh id. Neither copies the
/// cached raster patch, and the patch never takes part in equality or serialization.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub tool: Tool,
    pub style: Style,
    #[serde(with = "serde_point")]
    pub start: Point,
    #[serde(with = "serde_point")]
    pub end: Point,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub z: i32,
    /// Degrees, clockwise in image space, about the centre of the unrotated geometry.
    #[serde(default)]
    pub rotation: f64,
    #[serde(flatten)]
    pub kind: AnnotationKind,
    #[serde(skip)]
    pub(crate) patch: PatchCache,
}

impl Annotation {
    pub fn new(tool: Tool, kind: AnnotationKind, style: Style, start: Point, end: Point) -> Self {
        Self {
            id: AnnotationId::fresh(),
            tool,
            style,
            start,
            end,
            selected: false,
            z: 0,
            rotation: 0.0,
            kind,
            patch: PatchCache::default(),
        }
    }

    /// Copy with a fresh identity, deep-copying owned collections but not the patch.
    pub fn duplicate(&self) -> Self {
        Self {
            id: AnnotationId::fresh(),
            ..self.clone()
        }
    }

    pub fn is_region_effect(&self) -> bool {
        self.kind.is_region_effect()
    }

    /// The cached raster patch, if the compositor has produced one.
    pub fn patch(&self) -> Option<&Bitmap> {
        self.patch.entry.as_ref().map(|c| &c.patch)
    }

    /// Where the cached patch sits in source pixel space.
    pub fn patch_rect(&self) -> Option<IRect> {
        self.patch.entry.as_ref().map(|c| c.key.bounds)
    }

    /// Drop the cached patch; the next refresh recomputes it.
    pub fn invalidate_patch(&mut self) {
        self.patch.entry = None;
    }
}

/// Exclusively owned by its annotation.
#[derive(Debug, Default)]
pub(crate) struct PatchCache {
    pub(crate) entry: Option<CachedPatch>,
}

#[derive(Debug)]
pub(crate) struct CachedPatch {
    pub(crate) key: PatchKey,
    pub(crate) patch: Bitmap,
}

/// Everything a patch depends on.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PatchKey {
    pub(crate) bounds: IRect,
    pub(crate) kind: AnnotationKind,
    pub(crate) source_revision: u64,
}

impl Clone for PatchCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for PatchCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}
