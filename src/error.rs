//! Error types for the ocr2md library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Ocr2MdError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing input file, unreadable PDF, pdfium not available, output
//!   directory not writable). Returned from [`crate::Converter::try_convert`]
//!   and folded into a failed [`crate::ConversionReport`] by
//!   [`crate::Converter::convert`].
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be recognised.
//!   Stored inside [`crate::output::PageRecord`]; the page contributes an
//!   empty text and the remaining pages are still processed.
//!
//! * [`OcrError`] — what an [`crate::pipeline::ocr::OcrEngine`] returns.
//!   The orchestrator turns it into a [`PageError::OcrFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2md library.
#[derive(Debug, Error)]
pub enum Ocr2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Point PDFIUM_LIB_PATH (or --pdfium-lib) at the directory holding libpdfium,\n\
or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output or image directory.
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rendered page could not be saved as PNG.
    #[error("Failed to save page image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or a header/footer pattern did not compile.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The page still appears in the output, with the "no text" placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The rendered PNG could not be read back for preprocessing.
    #[error("Page {page}: could not load rendered image: {detail}")]
    ImageLoadFailed { page: usize, detail: String },

    /// The OCR engine failed, after retries if any were configured.
    #[error("Page {page}: OCR failed after {attempts} attempt(s): {detail}")]
    OcrFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },
}

/// Errors raised by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary could not be started (not installed, bad path).
    #[error("OCR engine '{command}' could not be started: {source}")]
    Unavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully.
    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    /// The bitmap could not be handed to the engine.
    #[error("Could not encode image for OCR: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// Temp-file handling around the engine call failed.
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}
