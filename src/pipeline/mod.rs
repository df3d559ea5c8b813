//! Pipeline stages for scanned-PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the PDF or OCR backend swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ preprocess ──▶ ocr ──▶ cleanup ──▶ assemble
//! (pdfium)   (contrast,     (tesseract) (4 text    (title + page
//!             sharpen,                   stages)    blocks)
//!             median)
//! ```
//!
//! 1. [`render`]     — rasterise selected pages to PNG; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`preprocess`] — bitmap enhancement that makes faint watermarks and
//!    scan noise less likely to be read as text
//! 3. [`ocr`]        — bitmap to raw text; the only stage that spawns a
//!    child process
//! 4. [`cleanup`]    — header/footer removal, artifact filtering, paragraph
//!    regrouping and heading detection
//! 5. [`assemble`]   — the final Markdown document

pub mod assemble;
pub mod cleanup;
pub mod ocr;
pub mod preprocess;
pub mod render;
