//! PDF rasterisation: render requested pages to PNG files.
//!
//! The [`Rasterizer`] / [`RasterDocument`] pair is the seam to the PDF
//! library. [`PdfiumRasterizer`] is the production implementation; tests
//! substitute an in-memory document.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and is not safe to call
//! from async contexts. [`render_pages`] opens the document, renders every
//! requested page and extracts its native text inside a single
//! `spawn_blocking` task. The document handle lives only inside that task,
//! so it is closed on every exit path, including early error returns.
//!
//! Rendered pages are written straight to disk rather than kept in memory:
//! a 300 DPI A4 page is ~26 MB as RGBA and documents can run to hundreds
//! of pages.

use crate::config::PageSelection;
use crate::error::Ocr2MdError;
use crate::progress::ProgressCallback;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable naming a directory (or file) holding libpdfium.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Opens PDF documents for rendering.
pub trait Rasterizer: Send + Sync {
    /// Open the document at `path`. Dropping the handle closes it.
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn RasterDocument + 'a>, Ocr2MdError>;
}

/// An open PDF document.
pub trait RasterDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render a 0-based page, scaling PDF points by `scale` (DPI / 72).
    fn render(&self, page_index: usize, scale: f32) -> Result<DynamicImage, Ocr2MdError>;

    /// Text embedded in the page, if any.
    fn native_text(&self, page_index: usize) -> Result<String, Ocr2MdError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`Rasterizer`] backed by pdfium via `pdfium-render`.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to libpdfium.
    ///
    /// Lookup order: `library_path` (a directory holding the platform
    /// library, or the library file itself), then `$PDFIUM_LIB_PATH`, then
    /// the current directory, then the system library search path.
    pub fn bind(library_path: Option<&Path>) -> Result<Self, Ocr2MdError> {
        let configured = library_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

        let bindings = match configured {
            Some(path) => {
                let lib = if path.is_dir() {
                    PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
                } else {
                    path
                };
                debug!("Binding pdfium from {}", lib.display());
                Pdfium::bind_to_library(&lib)
                    .map_err(|e| Ocr2MdError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())))?
            }
            None => {
                let local = PathBuf::from(Pdfium::pdfium_platform_library_name_at_path("./"));
                Pdfium::bind_to_library(&local)
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| Ocr2MdError::PdfiumBindingFailed(format!("{e:?}")))?
            }
        };

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn RasterDocument + 'a>, Ocr2MdError> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Ocr2MdError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, page_index: usize) -> Result<PdfPage<'a>, Ocr2MdError> {
        let failed = |detail: String| Ocr2MdError::RasterisationFailed {
            page: page_index + 1,
            detail,
        };
        let index: PdfPageIndex = page_index
            .try_into()
            .map_err(|_| failed(format!("page index {page_index} exceeds pdfium range")))?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| failed(format!("{e:?}")))
    }
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render(&self, page_index: usize, scale: f32) -> Result<DynamicImage, Ocr2MdError> {
        let page = self.page(page_index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Ocr2MdError::RasterisationFailed {
                page: page_index + 1,
                detail: format!("{e:?}"),
            })?;
        Ok(bitmap.as_image())
    }

    fn native_text(&self, page_index: usize) -> Result<String, Ocr2MdError> {
        let page = self.page(page_index)?;
        let text = page.text().map_err(|e| Ocr2MdError::RasterisationFailed {
            page: page_index + 1,
            detail: format!("text extraction: {e:?}"),
        })?;
        Ok(text.all())
    }
}

// ── Page rendering ───────────────────────────────────────────────────────

/// A page written to disk, ready for OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 0-based page index.
    pub page_index: usize,
    pub image_path: PathBuf,
    /// Trimmed native text of the page.
    pub native_text: String,
}

/// Result of [`render_pages`].
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Page count of the PDF.
    pub total_pages: usize,
    /// Rendered pages, in request order.
    pub pages: Vec<RenderedPage>,
    /// Requested 0-based pages beyond the end of the document.
    pub skipped: Vec<usize>,
}

/// Parameters for one [`render_pages`] call.
#[derive(Clone)]
pub struct RenderRequest {
    pub pdf_path: PathBuf,
    pub image_dir: PathBuf,
    pub pages: PageSelection,
    pub scale: f32,
    pub progress: Option<ProgressCallback>,
}

/// File name of a rendered page image: `<stem>-page-<NNN>.png`.
pub fn page_image_name(pdf_stem: &str, page_index: usize) -> String {
    format!("{pdf_stem}-page-{page_index:03}.png")
}

/// Rasterise the requested pages into `request.image_dir`.
pub async fn render_pages(
    rasterizer: Arc<dyn Rasterizer>,
    request: RenderRequest,
) -> Result<RenderedDocument, Ocr2MdError> {
    tokio::task::spawn_blocking(move || render_pages_blocking(rasterizer.as_ref(), &request))
        .await
        .map_err(|e| Ocr2MdError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    rasterizer: &dyn Rasterizer,
    request: &RenderRequest,
) -> Result<RenderedDocument, Ocr2MdError> {
    let document = rasterizer.open(&request.pdf_path)?;
    let total_pages = document.page_count();
    info!("PDF loaded: {} pages", total_pages);

    let (requested, skipped) = request.pages.resolve(total_pages);
    for &idx in &skipped {
        warn!("Skipping page {} (PDF only has {} pages)", idx, total_pages);
        if let Some(ref cb) = request.progress {
            cb.on_page_skipped(idx + 1, total_pages);
        }
    }
    let stem = request
        .pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let mut pages = Vec::with_capacity(requested.len());
    for idx in requested {
        let image = document.render(idx, request.scale)?;
        let image_path = request.image_dir.join(page_image_name(&stem, idx));
        image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .map_err(|e| Ocr2MdError::ImageWriteFailed {
                path: image_path.clone(),
                detail: e.to_string(),
            })?;
        debug!(
            "Rendered page {} → {}x{} px → {}",
            idx + 1,
            image.width(),
            image.height(),
            image_path.display()
        );

        let native_text = document.native_text(idx)?.trim().to_string();

        pages.push(RenderedPage {
            page_index: idx,
            image_path,
            native_text,
        });
    }

    Ok(RenderedDocument {
        total_pages,
        pages,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct BlankPdf {
        pages: usize,
    }

    struct BlankDocument {
        pages: usize,
    }

    impl Rasterizer for BlankPdf {
        fn open<'a>(&'a self, _path: &Path) -> Result<Box<dyn RasterDocument + 'a>, Ocr2MdError> {
            Ok(Box::new(BlankDocument { pages: self.pages }))
        }
    }

    impl RasterDocument for BlankDocument {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render(&self, _page_index: usize, scale: f32) -> Result<DynamicImage, Ocr2MdError> {
            let side = (10.0 * scale) as u32;
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(side, side, Rgb([255, 255, 255]))))
        }

        fn native_text(&self, page_index: usize) -> Result<String, Ocr2MdError> {
            Ok(format!("  native {page_index}\n"))
        }
    }

    fn request(dir: &Path, pages: PageSelection) -> RenderRequest {
        RenderRequest {
            pdf_path: PathBuf::from("/scans/finance_report.pdf"),
            image_dir: dir.to_path_buf(),
            pages,
            scale: 2.0,
            progress: None,
        }
    }

    #[test]
    fn pdfium_rasterizer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfiumRasterizer>();
    }

    #[test]
    fn image_name_is_zero_padded() {
        assert_eq!(page_image_name("report", 7), "report-page-007.png");
        assert_eq!(page_image_name("report", 1234), "report-page-1234.png");
    }

    #[test]
    fn renders_all_pages_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let doc = render_pages_blocking(&BlankPdf { pages: 2 }, &request(dir.path(), PageSelection::All)).unwrap();
        assert_eq!(doc.total_pages, 2);
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.skipped.is_empty());
        let first = &doc.pages[0];
        assert_eq!(first.native_text, "native 0");
        assert_eq!(
            first.image_path,
            dir.path().join("finance_report-page-000.png")
        );
        let img = image::open(&first.image_path).unwrap();
        assert_eq!(img.width(), 20);
    }

    #[test]
    fn skips_out_of_range_pages_in_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let doc = render_pages_blocking(
            &BlankPdf { pages: 2 },
            &request(dir.path(), PageSelection::List(vec![1, 5, 0])),
        )
        .unwrap();
        let order: Vec<usize> = doc.pages.iter().map(|p| p.page_index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(doc.skipped, vec![5]);
    }

    #[tokio::test]
    async fn async_wrapper_runs_blocking_render() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer: Arc<dyn Rasterizer> = Arc::new(BlankPdf { pages: 1 });
        let doc = render_pages(rasterizer, request(dir.path(), PageSelection::List(vec![0, 1])))
            .await
            .unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.skipped, vec![1]);
    }
}
