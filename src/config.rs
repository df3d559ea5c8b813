//! Configuration types for scanned-PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The stage-specific knobs live in
//! their own small structs ([`OcrParams`], [`PreprocessOptions`],
//! [`CleanupConfig`]) so a stage only ever sees the settings it uses.

use crate::error::Ocr2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Header/footer patterns suppressed by default.
///
/// Matched case-insensitively against each lower-cased, trimmed OCR line
/// with a substring search.
pub const DEFAULT_HEADER_FOOTER_PATTERNS: &[&str] = &[
    r"learner guide version \d+\.\d+",
    r"produced \d+ \w+ \d{4}",
    r"© compliant learning resources",
    r"page \d+",
    r"compliant learning resources",
    r"bsbfin\d+",
    r"manage organisational finances",
    r"release \d+",
    r"unit of competency",
    r"competency standards",
    r"© \d{4}",
    r"version \d+\.\d+",
    r"page \d+ of \d+",
    r"confidential",
    r"sample",
    r"watermark",
    r"preview",
];

/// Punctuation kept by the artifact filter, in addition to word characters
/// and whitespace.
pub const DEFAULT_ALLOWED_PUNCTUATION: &str = ".,;:!?()[]{}'\"-–—…•·";

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2md::{ConversionConfig, PageSelection};
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .pages(PageSelection::List(vec![0, 1, 2]))
///     .output_dir("out")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation resolution. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for roughly 300 DPI input; below ~200 DPI small
    /// print starts to lose strokes.
    pub dpi: u32,

    /// Directory receiving `<name>_clean.md`. Default: `improved_output`.
    pub output_dir: PathBuf,

    /// Directory receiving `<stem>-page-<NNN>.png`. Default: `improved_images`.
    pub image_dir: PathBuf,

    /// Output file stem. If None, the PDF file stem is used.
    pub output_name: Option<String>,

    /// Page selection (0-based). Default: all pages.
    pub pages: PageSelection,

    /// OCR engine parameters.
    pub ocr: OcrParams,

    /// Bitmap preprocessing applied before OCR.
    pub preprocess: PreprocessOptions,

    /// Text cleanup rules.
    pub cleanup: CleanupConfig,

    /// Extra OCR attempts per page after a failure. Default: 0.
    pub ocr_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Optional per-page progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            output_dir: PathBuf::from("improved_output"),
            image_dir: PathBuf::from("improved_images"),
            output_name: None,
            pages: PageSelection::default(),
            ocr: OcrParams::default(),
            preprocess: PreprocessOptions::default(),
            cleanup: CleanupConfig::default(),
            ocr_retries: 0,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("output_dir", &self.output_dir)
            .field("image_dir", &self.image_dir)
            .field("output_name", &self.output_name)
            .field("pages", &self.pages)
            .field("ocr", &self.ocr)
            .field("preprocess", &self.preprocess)
            .field("cleanup", &self.cleanup)
            .field("ocr_retries", &self.ocr_retries)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Scale factor handed to the rasteriser (PDF user space is 72 DPI).
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.image_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = Some(name.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.ocr.page_segmentation_mode = psm;
        self
    }

    pub fn engine_mode(mut self, oem: u8) -> Self {
        self.config.ocr.engine_mode = oem;
        self
    }

    pub fn preprocess(mut self, opts: PreprocessOptions) -> Self {
        self.config.preprocess = opts;
        self
    }

    pub fn cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    /// Append patterns to the header/footer list.
    pub fn extra_header_footer_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .cleanup
            .header_footer_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn preserve_line_breaks(mut self, v: bool) -> Self {
        self.config.cleanup.preserve_line_breaks = v;
        self
    }

    pub fn fix_common_confusions(mut self, v: bool) -> Self {
        self.config.cleanup.fix_common_confusions = v;
        self
    }

    pub fn ocr_retries(mut self, n: u32) -> Self {
        self.config.ocr_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Ocr2MdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(Ocr2MdError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.ocr.page_segmentation_mode > 13 {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.ocr.page_segmentation_mode
            )));
        }
        if c.ocr.engine_mode > 3 {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "OCR engine mode must be 0–3, got {}",
                c.ocr.engine_mode
            )));
        }
        if let Some(name) = &c.output_name {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(Ocr2MdError::InvalidConfig(format!(
                    "Output name must be a plain file stem, got {name:?}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Stage settings ───────────────────────────────────────────────────────

/// Parameters handed to the OCR engine for every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrParams {
    /// Tesseract language code(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub language: String,
    /// Page segmentation mode. Default: 6 (a single uniform block of text).
    pub page_segmentation_mode: u8,
    /// OCR engine mode. Default: 3 (whatever the engine has available).
    pub engine_mode: u8,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 6,
            engine_mode: 3,
        }
    }
}

/// Enhancement factors applied to each rendered page before OCR.
///
/// A factor of `1.0` leaves the image unchanged; the defaults lift faint
/// text off light watermarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Contrast factor. Default: 1.5.
    pub contrast: f32,
    /// Sharpness factor. Default: 1.3.
    pub sharpness: f32,
    /// Median filter radius in pixels; 0 disables the filter. Default: 1 (3×3).
    pub median_radius: u32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            contrast: 1.5,
            sharpness: 1.3,
            median_radius: 1,
        }
    }
}

/// Rules for the text cleanup pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Regexes for lines to suppress, matched case-insensitively.
    pub header_footer_patterns: Vec<String>,
    /// Punctuation surviving the artifact filter.
    pub allowed_punctuation: String,
    /// Apply the `|`→`I`, `0`→`O`, `1`→`l` substitutions. Default: true.
    ///
    /// These are unconditional and will also rewrite legitimate digits.
    pub fix_common_confusions: bool,
    /// Keep OCR line breaks instead of flattening every page to one line.
    /// Default: false.
    pub preserve_line_breaks: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            header_footer_patterns: DEFAULT_HEADER_FOOTER_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allowed_punctuation: DEFAULT_ALLOWED_PUNCTUATION.to_string(),
            fix_common_confusions: true,
            preserve_line_breaks: false,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert these 0-based pages, in this order. Duplicates are kept.
    List(Vec<usize>),
}

impl PageSelection {
    /// Split the selection into the pages to convert (request order) and the
    /// requested pages that do not exist in a `total_pages` document.
    pub fn resolve(&self, total_pages: usize) -> (Vec<usize>, Vec<usize>) {
        match self {
            PageSelection::All => ((0..total_pages).collect(), Vec::new()),
            PageSelection::List(pages) => pages.iter().copied().partition(|&p| p < total_pages),
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            PageSelection::All => "all pages".to_string(),
            PageSelection::List(pages) => format!("{pages:?}"),
        }
    }
}
