use crate::annotation::model::{Annotation, AnnotationKind, ArrowHeads, Style};
use crate::foundation::core::{Color, Point, Vec2};
use crate::settings::ToolDefaults;

/// The drawing tool an annotation was created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Freehand,
    Text,
    Number,
    Callout,
    Blur,
    Pixelate,
    Magnify,
    Highlight,
    Spotlight,
    SmartEraser,
}

/// Where a new callout's tail starts, relative to the press point.
const CALLOUT_TAIL_OFFSET: Vec2 = Vec2::new(-20.0, 40.0);

impl Tool {
    pub const ALL: [Tool; 14] = [
        Tool::Rectangle,
        Tool::Ellipse,
        Tool::Line,
        Tool::Arrow,
        Tool::Freehand,
        Tool::Text,
        Tool::Number,
        Tool::Callout,
        Tool::Blur,
        Tool::Pixelate,
        Tool::Magnify,
        Tool::Highlight,
        Tool::Spotlight,
        Tool::SmartEraser,
    ];

    pub fn is_region_effect(self) -> bool {
        matches!(
            self,
            Tool::Blur
                | Tool::Pixelate
                | Tool::Magnify
                | Tool::Highlight
                | Tool::Spotlight
                | Tool::SmartEraser
        )
    }

    fn default_kind(self, point: Point, d: &ToolDefaults) -> AnnotationKind {
        match self {
            Tool::Rectangle => AnnotationKind::Rectangle { corner_radius: 0.0 },
            Tool::Ellipse => AnnotationKind::Ellipse,
            Tool::Line => AnnotationKind::Line,
            Tool::Arrow => AnnotationKind::Arrow {
                heads: ArrowHeads::End,
            },
            Tool::Freehand => AnnotationKind::Freehand {
                points: vec![point],
            },
            Tool::Text => AnnotationKind::Text {
                text: String::new(),
                font_size: d.font_size,
                font_family: d.font_family.clone(),
            },
            Tool::Number => AnnotationKind::Number {
                value: 1,
                radius: d.number_radius,
            },
            Tool::Callout => AnnotationKind::Callout {
                text: String::new(),
                font_size: d.font_size,
                tail: point + CALLOUT_TAIL_OFFSET,
            },
            Tool::Blur => AnnotationKind::Blur {
                radius: d.blur_radius,
            },
            Tool::Pixelate => AnnotationKind::Pixelate {
                block_size: d.pixel_size,
            },
            Tool::Magnify => AnnotationKind::Magnify {
                zoom: d.magnify_zoom,
            },
            Tool::Highlight => AnnotationKind::Highlight {
                color: d.highlight_color,
            },
            Tool::Spotlight => AnnotationKind::Spotlight {
                dim: d.spotlight_dim,
            },
            Tool::SmartEraser => AnnotationKind::SmartEraser,
        }
    }

    fn default_style(self, d: &ToolDefaults) -> Style {
        match self {
            t if t.is_region_effect() => Style::none(),
            Tool::Number => Style {
                stroke: Color::WHITE,
                stroke_width: d.stroke_width,
                fill: Some(d.stroke),
                shadow: d.shadow,
            },
            Tool::Callout => Style {
                stroke: d.stroke,
                stroke_width: d.stroke_width,
                fill: Some(d.fill.unwrap_or(Color::WHITE)),
                shadow: d.shadow,
            },
            _ => Style {
                stroke: d.stroke,
                stroke_width: d.stroke_width,
                fill: d.fill,
                shadow: d.shadow,
            },
        }
    }
}

impl Annotation {
    /// New annotation for `tool` with both anchors at `point`.
    pub fn create_at(tool: Tool, point: Point, defaults: &ToolDefaults) -> Self {
        Annotation::new(
            tool,
            tool.default_kind(point, defaults),
            tool.default_style(defaults),
            point,
            point,
        )
    }
}
