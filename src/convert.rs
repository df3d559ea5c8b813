//! Conversion orchestration: one scanned PDF in, one Markdown file out.
//!
//! [`Converter`] owns the two external seams (a [`Rasterizer`] and an
//! [`OcrEngine`]), the compiled [`TextCleaner`] and the configuration, and
//! runs the pipeline stages in order:
//!
//! ```text
//! validate ─▶ render (pdfium) ─▶ per page: load ─▶ preprocess ─▶ OCR ─▶ clean
//!                                                                  │
//!                                    atomic write ◀─ assemble ◀────┘
//! ```
//!
//! Pages are processed one at a time in request order. A page whose OCR
//! fails is kept with empty text and the conversion carries on; everything
//! else (missing input, unreadable PDF, unwritable directories) is fatal.

use crate::config::ConversionConfig;
use crate::error::{Ocr2MdError, PageError};
use crate::output::{ConversionReport, ConversionSummary, PageRecord};
use crate::pipeline::assemble::assemble_markdown;
use crate::pipeline::cleanup::TextCleaner;
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::preprocess::preprocess;
use crate::pipeline::render::{render_pages, PdfiumRasterizer, RenderRequest, RenderedPage, Rasterizer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Suffix appended to the output stem.
const OUTPUT_SUFFIX: &str = "_clean.md";

/// Characters of cleaned text shown in the per-page debug preview.
const PREVIEW_CHARS: usize = 100;

/// Drives a conversion from PDF to Markdown.
pub struct Converter {
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    cleaner: TextCleaner,
    config: ConversionConfig,
}

impl Converter {
    /// Assemble a converter from explicit components.
    ///
    /// Fails when a header/footer pattern does not compile.
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
        config: ConversionConfig,
    ) -> Result<Self, Ocr2MdError> {
        let cleaner = TextCleaner::new(&config.cleanup)?;
        Ok(Self {
            rasterizer,
            ocr,
            cleaner,
            config,
        })
    }

    /// Converter using pdfium and the `tesseract` CLI.
    ///
    /// `pdfium_lib` overrides the pdfium lookup (see [`PdfiumRasterizer::bind`]);
    /// the tesseract binary comes from `$TESSERACT_CMD` or `PATH`.
    pub fn with_defaults(config: ConversionConfig, pdfium_lib: Option<&Path>) -> Result<Self, Ocr2MdError> {
        let rasterizer = PdfiumRasterizer::bind(pdfium_lib)?;
        Self::new(Arc::new(rasterizer), Arc::new(TesseractEngine::from_env()), config)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert `pdf_path`, folding every failure into the returned report.
    pub async fn convert(&self, pdf_path: impl AsRef<Path>) -> ConversionReport {
        let pdf_path = pdf_path.as_ref();
        match self.try_convert(pdf_path).await {
            Ok(summary) => ConversionReport::succeeded(&summary),
            Err(e) => {
                error!("Conversion of {} failed: {}", pdf_path.display(), e);
                ConversionReport::failed(e.to_string())
            }
        }
    }

    /// Convert `pdf_path` and write `<output_dir>/<name>_clean.md`.
    ///
    /// # Errors
    /// Returns `Err` only for fatal errors: an invalid input file, a PDF
    /// pdfium cannot open, a page that cannot be rendered or saved, or an
    /// output location that cannot be written. OCR failures are recorded
    /// per page instead.
    pub async fn try_convert(&self, pdf_path: impl AsRef<Path>) -> Result<ConversionSummary, Ocr2MdError> {
        let pdf_path = pdf_path.as_ref().to_path_buf();
        let span = info_span!("convert", pdf = %pdf_path.display());
        self.run(pdf_path).instrument(span).await
    }

    async fn run(&self, pdf_path: PathBuf) -> Result<ConversionSummary, Ocr2MdError> {
        let start = Instant::now();
        let config = &self.config;

        // ── Step 1: Validate input ───────────────────────────────────────
        validate_pdf(&pdf_path)?;
        info!(
            "Converting {} (pages: {}, {} DPI)",
            pdf_path.display(),
            config.pages.describe(),
            config.dpi
        );

        // ── Step 2: Prepare directories ──────────────────────────────────
        create_dir(&config.output_dir).await?;
        create_dir(&config.image_dir).await?;

        // ── Step 3: Rasterise pages ──────────────────────────────────────
        let request = RenderRequest {
            pdf_path: pdf_path.clone(),
            image_dir: config.image_dir.clone(),
            pages: config.pages.clone(),
            scale: config.render_scale(),
            progress: config.progress_callback.clone(),
        };
        let rendered = render_pages(Arc::clone(&self.rasterizer), request).await?;
        info!(
            "Rendered {} of {} pages to {}",
            rendered.pages.len(),
            rendered.total_pages,
            config.image_dir.display()
        );

        // ── Step 4: OCR + cleanup, page by page ──────────────────────────
        let selected = rendered.pages.len();
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_start(selected);
        }

        let mut pages = Vec::with_capacity(selected);
        for page in rendered.pages {
            let record = self.process_page(page, selected).await?;
            pages.push(record);
        }

        // ── Step 5: Assemble and write ───────────────────────────────────
        let document_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let markdown = assemble_markdown(&pages, &document_name);

        let stem = match config.output_name {
            Some(ref name) => name.clone(),
            None => pdf_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string()),
        };
        let output_file = config.output_dir.join(format!("{stem}{OUTPUT_SUFFIX}"));
        write_atomic(&output_file, &markdown).await?;

        let pages_with_text = pages.iter().filter(|p| p.has_text).count();
        let failed_pages = pages.iter().filter(|p| p.error.is_some()).count();

        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(selected, pages_with_text);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Wrote {}: {}/{} pages with text, {} failed, {}ms",
            output_file.display(),
            pages_with_text,
            pages.len(),
            failed_pages,
            duration_ms
        );

        Ok(ConversionSummary {
            output_file,
            extracted_pages: pages.len(),
            pages_with_text,
            total_pages: rendered.total_pages,
            skipped_pages: rendered.skipped,
            failed_pages,
            duration_ms,
            pages,
        })
    }

    /// Load, preprocess, recognise and clean one rendered page.
    async fn process_page(&self, page: RenderedPage, selected: usize) -> Result<PageRecord, Ocr2MdError> {
        let page_num = page.page_index + 1;
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_page_start(page_num, selected);
        }
        info!("Processing page {}", page_num);

        let recognised = match self.load_and_preprocess(&page).await? {
            Ok(image) => self.recognize_with_retry(&image, page_num).await,
            Err(e) => Err(e),
        };

        let (raw_ocr_text, text, page_error) = match recognised {
            Ok(raw) => {
                let text = self.cleaner.clean(&raw);
                (raw, text, None)
            }
            Err(e) => {
                error!("{}", e);
                (String::new(), String::new(), Some(e))
            }
        };

        let has_text = !text.trim().is_empty() || !page.native_text.trim().is_empty();
        let text_chars = text.chars().count();
        debug!(
            "Page {}: {} chars after cleanup: {:?}",
            page_num,
            text_chars,
            text.chars().take(PREVIEW_CHARS).collect::<String>()
        );

        if let Some(cb) = cb {
            match page_error {
                None => cb.on_page_complete(page_num, selected, text_chars),
                Some(ref e) => cb.on_page_error(page_num, selected, &e.to_string()),
            }
        }

        Ok(PageRecord {
            page_index: page.page_index,
            image_path: page.image_path,
            raw_ocr_text,
            text,
            native_text: page.native_text,
            has_text,
            error: page_error,
        })
    }

    /// Read the rendered PNG back and enhance it, off the async runtime.
    ///
    /// The outer `Result` is fatal (the blocking task panicked); the inner
    /// one is a per-page failure.
    async fn load_and_preprocess(
        &self,
        page: &RenderedPage,
    ) -> Result<Result<image::DynamicImage, PageError>, Ocr2MdError> {
        let path = page.image_path.clone();
        let opts = self.config.preprocess.clone();
        let page_num = page.page_index + 1;
        tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| preprocess(&img, &opts))
                .map_err(|e| PageError::ImageLoadFailed {
                    page: page_num,
                    detail: e.to_string(),
                })
        })
        .await
        .map_err(|e| Ocr2MdError::Internal(format!("Preprocess task panicked: {e}")))
    }

    /// Run the OCR engine, retrying with exponential backoff.
    async fn recognize_with_retry(&self, image: &image::DynamicImage, page_num: usize) -> Result<String, PageError> {
        let attempts = self.config.ocr_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.ocr.recognize(image, &self.config.ocr).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts => {
                    let delay = retry_delay(self.config.retry_backoff_ms, attempt);
                    warn!(
                        "Page {}: {} failed (attempt {}/{}), retrying in {}ms: {}",
                        page_num,
                        self.ocr.name(),
                        attempt,
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PageError::OcrFailed {
                        page: page_num,
                        attempts: attempt,
                        detail: e.to_string(),
                    })
                }
            }
        }
    }
}

/// `base_ms · 2^(attempt − 1)`, saturating.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Check that `path` exists, is readable and starts with `%PDF`.
///
/// [`Converter::try_convert`] runs this first; callers may run it earlier,
/// before any expensive setup.
pub fn validate_pdf(path: &Path) -> Result<(), Ocr2MdError> {
    if !path.is_file() {
        return Err(Ocr2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Ocr2MdError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Ocr2MdError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Ocr2MdError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

async fn create_dir(path: &Path) -> Result<(), Ocr2MdError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Ocr2MdError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Ocr2MdError> {
    let failed = |source| Ocr2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}
