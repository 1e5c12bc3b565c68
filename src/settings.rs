use crate::foundation::core::Color;

/// Pixel count above which whole-image effects try the accelerated surface first.
pub const DEFAULT_ACCEL_MIN_PIXELS: u64 = 160_000;

/// Default number of undo entries kept before the oldest is evicted.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Engine-wide options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    pub accel_min_pixels: u64,
    pub history_limit: usize,
    /// Pointer slack for hit testing, in source pixels.
    pub hit_tolerance: f64,
    pub tool_defaults: ToolDefaults,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            accel_min_pixels: DEFAULT_ACCEL_MIN_PIXELS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            hit_tolerance: 4.0,
            tool_defaults: ToolDefaults::default(),
        }
    }
}

impl EngineOpts {
    /// Defaults overridden by `PIXMARK_ACCEL_MIN_PIXELS` and `PIXMARK_HISTORY_LIMIT`.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Some(n) = env_parse::<u64>("PIXMARK_ACCEL_MIN_PIXELS") {
            opts.accel_min_pixels = n;
        }
        if let Some(n) = env_parse::<usize>("PIXMARK_HISTORY_LIMIT").filter(|&n| n > 0) {
            opts.history_limit = n;
        }
        opts
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_accel_min_pixels(mut self, pixels: u64) -> Self {
        self.accel_min_pixels = pixels;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Style and effect parameters given to freshly created annotations.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub stroke: Color,
    pub stroke_width: f64,
    pub fill: Option<Color>,
    pub shadow: bool,
    pub blur_radius: f64,
    pub pixel_size: u32,
    pub magnify_zoom: f64,
    pub highlight_color: Color,
    pub spotlight_dim: u8,
    pub number_radius: f64,
    pub font_size: f64,
    pub font_family: String,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            stroke: Color::RED,
            stroke_width: 2.0,
            fill: None,
            shadow: true,
            blur_radius: 10.0,
            pixel_size: 8,
            magnify_zoom: 2.0,
            highlight_color: Color::YELLOW,
            spotlight_dim: 160,
            number_radius: 12.0,
            font_size: 16.0,
            font_family: "sans-serif".to_string(),
        }
    }
}
