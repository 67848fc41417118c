//! Translation of loosely-typed request options into render configurations
//!
//! Requests carry an untyped `options` object. Each recognized key is copied
//! into the typed configuration only when its JSON value has the expected
//! kind (boolean, number or string). Unknown keys and mistyped values are
//! ignored rather than rejected, so a sloppy client never aborts a render.

use serde_json::{Map, Value};

/// Untyped option bag as decoded from a request body
pub type OptionBag = Map<String, Value>;

/// Default screenshot viewport width in CSS pixels
pub const DEFAULT_SCREENSHOT_WIDTH: i64 = 1280;
/// Default screenshot viewport height in CSS pixels
pub const DEFAULT_SCREENSHOT_HEIGHT: i64 = 720;

/// Print-to-PDF parameters
///
/// A `None` field was not supplied by the caller and is left to the engine's
/// built-in default. Measurements are in inches, `scale` is a unitless
/// multiplier and `page_ranges` uses the engine's range syntax (`"1-3,5"`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintConfiguration {
    pub landscape: Option<bool>,
    pub display_header_footer: Option<bool>,
    pub print_background: Option<bool>,
    pub scale: Option<f64>,
    pub paper_width: Option<f64>,
    pub paper_height: Option<f64>,
    pub margin_top: Option<f64>,
    pub margin_bottom: Option<f64>,
    pub margin_left: Option<f64>,
    pub margin_right: Option<f64>,
    pub page_ranges: Option<String>,
}

impl PrintConfiguration {
    /// Number of fields that will be forwarded to the engine explicitly.
    pub fn explicit_fields(&self) -> usize {
        [
            self.landscape.is_some(),
            self.display_header_footer.is_some(),
            self.print_background.is_some(),
            self.scale.is_some(),
            self.paper_width.is_some(),
            self.paper_height.is_some(),
            self.margin_top.is_some(),
            self.margin_bottom.is_some(),
            self.margin_left.is_some(),
            self.margin_right.is_some(),
            self.page_ranges.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Screenshot parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotConfiguration {
    /// Viewport width in CSS pixels
    pub width: i64,
    /// Viewport height in CSS pixels
    pub height: i64,
    /// Capture the whole scrollable document instead of the viewport
    pub full_page: bool,
}

impl Default for ScreenshotConfiguration {
    fn default() -> Self {
        Self {
            width: DEFAULT_SCREENSHOT_WIDTH,
            height: DEFAULT_SCREENSHOT_HEIGHT,
            full_page: false,
        }
    }
}

/// Construction of a typed configuration from an option bag.
///
/// Implementations must be pure: identical input yields identical output.
pub trait FromOptions: Sized {
    fn from_options(options: Option<&OptionBag>) -> Self;
}

fn flag(options: &OptionBag, key: &str) -> Option<bool> {
    options.get(key).and_then(Value::as_bool)
}

fn number(options: &OptionBag, key: &str) -> Option<f64> {
    options.get(key).and_then(Value::as_f64)
}

fn text(options: &OptionBag, key: &str) -> Option<String> {
    options.get(key).and_then(Value::as_str).map(str::to_owned)
}

impl FromOptions for PrintConfiguration {
    fn from_options(options: Option<&OptionBag>) -> Self {
        let Some(options) = options else {
            return Self::default();
        };

        Self {
            landscape: flag(options, "landscape"),
            display_header_footer: flag(options, "display_header_footer"),
            print_background: flag(options, "print_background"),
            scale: number(options, "scale"),
            paper_width: number(options, "paper_width"),
            paper_height: number(options, "paper_height"),
            margin_top: number(options, "margin_top"),
            margin_bottom: number(options, "margin_bottom"),
            margin_left: number(options, "margin_left"),
            margin_right: number(options, "margin_right"),
            page_ranges: text(options, "page_ranges"),
        }
    }
}

impl FromOptions for ScreenshotConfiguration {
    fn from_options(options: Option<&OptionBag>) -> Self {
        let mut config = Self::default();
        let Some(options) = options else {
            return config;
        };

        // Fractional sizes truncate toward zero.
        if let Some(width) = number(options, "width") {
            config.width = width as i64;
        }
        if let Some(height) = number(options, "height") {
            config.height = height as i64;
        }
        if let Some(full_page) = flag(options, "full_page") {
            config.full_page = full_page;
        }
        config
    }
}

/// Build a print configuration from request options
pub fn translate_print(options: Option<&OptionBag>) -> PrintConfiguration {
    PrintConfiguration::from_options(options)
}

/// Build a screenshot configuration from request options
pub fn translate_screenshot(options: Option<&OptionBag>) -> ScreenshotConfiguration {
    ScreenshotConfiguration::from_options(options)
}
