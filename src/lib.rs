//! # ocr2md
//!
//! Convert scanned PDF documents to clean Markdown with Tesseract OCR.
//!
//! ## Why this crate?
//!
//! Scanned course material has no text layer worth reading: what pdfium
//! extracts is empty or garbage, and every page carries the same running
//! header, copyright footer and diagonal watermark. This crate renders each
//! page to a bitmap, enhances it, runs Tesseract over it and then strips the
//! boilerplate the OCR picked up, leaving paragraphs and headings.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render      rasterise pages via pdfium (spawn_blocking) → PNG files
//!  ├─ 2. Preprocess  contrast, sharpen, median filter
//!  ├─ 3. OCR         tesseract CLI per page, optional retries
//!  ├─ 4. Cleanup     headers/footers, artifacts, paragraphs, headings
//!  └─ 5. Output      `<name>_clean.md` + per-page records
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2md::{ConversionConfig, Converter, PageSelection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .pages(PageSelection::List(vec![0, 1, 2]))
//!         .output_dir("out")
//!         .build()?;
//!     let converter = Converter::with_defaults(config, None)?;
//!     let summary = converter.try_convert("finance_report.pdf").await?;
//!     println!("{} ({} pages with text)",
//!         summary.output_file.display(),
//!         summary.pages_with_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! * libpdfium, found via `PDFIUM_LIB_PATH`, the working directory or the
//!   system library path.
//! * The `tesseract` binary with the requested language data, found via
//!   `TESSERACT_CMD` or `PATH`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CleanupConfig, ConversionConfig, ConversionConfigBuilder, OcrParams, PageSelection,
    PreprocessOptions,
};
pub use convert::Converter;
pub use error::{Ocr2MdError, OcrError, PageError};
pub use output::{ConversionReport, ConversionSummary, PageRecord};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
