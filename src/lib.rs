#![forbid(unsafe_code)]

pub mod annotation;
pub mod document;
pub mod effects;
pub mod foundation;
pub mod history;
pub mod render;
pub mod serialize;
pub mod settings;

pub use annotation::model::{Annotation, AnnotationId, AnnotationKind, ArrowHeads, Style};
pub use annotation::tool::Tool;
pub use document::{Document, Editor};
pub use effects::accel::{AccelError, AcceleratedSurface, EffectContext};
pub use effects::library::ImageEffect;
pub use effects::region::render_patch;
pub use foundation::core::{Affine, Bitmap, Color, IRect, PixelFormat, Point, Rect, Vec2};
pub use foundation::error::{PixmarkError, PixmarkResult};
pub use history::{CanvasChange, History, HistoryEntry};
pub use render::flatten;
pub use serialize::{FORMAT_VERSION, deserialize, serialize};
pub use settings::{EngineOpts, ToolDefaults};
