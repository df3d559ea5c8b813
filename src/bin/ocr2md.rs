//! CLI binary for ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs one conversion and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2md::convert::validate_pdf;
use ocr2md::pipeline::ocr::TesseractEngine;
use ocr2md::pipeline::render::PdfiumRasterizer;
use ocr2md::{
    ConversionConfig, ConversionProgressCallback, ConversionReport, Converter, PageSelection,
    ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the page currently being recognised.
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner-only until `on_conversion_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Rasterising pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Recognising {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed = self.page_elapsed_secs();
        let mark = if text_len > 0 { green("✓") } else { yellow("○") };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            mark,
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed_secs();

        // Keep long tesseract stderr dumps on one line.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, document_pages: usize) {
        self.bar.println(format!(
            "  {} Page {:>3} skipped  {}",
            yellow("⚠"),
            page_num,
            dim(&format!("(PDF only has {document_pages} pages)")),
        ));
    }

    fn on_conversion_complete(&self, total_pages: usize, pages_with_text: usize) {
        let empty = total_pages.saturating_sub(pages_with_text);
        self.bar.finish_and_clear();

        if empty == 0 {
            eprintln!(
                "{} {} pages recognised",
                green("✔"),
                bold(&pages_with_text.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages with text  ({} empty)",
                if empty == total_pages { red("✘") } else { cyan("⚠") },
                bold(&pages_with_text.to_string()),
                total_pages,
                yellow(&empty.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a whole scan into improved_output/<name>_clean.md
  ocr2md finance_report.pdf

  # First three pages only (0-based), custom output location
  ocr2md finance_report.pdf --pages 0 1 2 --output-dir out --output-name finance

  # Keep OCR line breaks and suppress an extra running header
  ocr2md scan.pdf --preserve-lines --header-pattern 'acme corp internal'

  # Machine-readable result
  ocr2md scan.pdf --json > report.json

ENVIRONMENT VARIABLES:
  TESSERACT_CMD     tesseract binary to run (default: tesseract on PATH)
  PDFIUM_LIB_PATH   Directory or file holding libpdfium
  RUST_LOG          Overrides the log filter chosen by -v / -q
  OCR2MD_*          Every flag, e.g. OCR2MD_DPI=200

SETUP:
  1. Install tesseract and the language data you need (e.g. tesseract-ocr-eng).
  2. Put libpdfium next to the binary, install it system-wide, or set
     PDFIUM_LIB_PATH.
"#;

/// Convert scanned PDF files to clean Markdown with Tesseract OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert scanned PDF files to clean Markdown with Tesseract OCR",
    long_about = "Render each page of a scanned PDF, enhance it, run Tesseract over it and \
strip running headers, footers and OCR noise, writing one Markdown file with a section \
per page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the scanned PDF.
    input: PathBuf,

    /// Output file stem; `_clean.md` is appended. Default: the PDF file stem.
    #[arg(long, env = "OCR2MD_OUTPUT_NAME")]
    output_name: Option<String>,

    /// Directory for the Markdown output.
    #[arg(long, env = "OCR2MD_OUTPUT_DIR", default_value = "improved_output")]
    output_dir: PathBuf,

    /// Directory for the rendered page images.
    #[arg(long, env = "OCR2MD_IMAGE_DIR", default_value = "improved_images")]
    image_dir: PathBuf,

    /// 0-based pages to convert, e.g. `--pages 0 1 2`. Default: all pages.
    #[arg(long, env = "OCR2MD_PAGES", num_args = 1.., value_delimiter = ',')]
    pages: Vec<usize>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "OCR2MD_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language(s), e.g. `eng` or `eng+deu`.
    #[arg(long, env = "OCR2MD_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "OCR2MD_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Tesseract OCR engine mode (0–3).
    #[arg(long, env = "OCR2MD_OEM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    oem: u8,

    /// tesseract binary to run.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Directory (or file) holding libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Extra header/footer regex, matched against lower-cased lines. Repeatable.
    #[arg(long = "header-pattern", env = "OCR2MD_HEADER_PATTERN")]
    header_patterns: Vec<String>,

    /// Keep OCR line breaks instead of flattening each page to one line.
    #[arg(long, env = "OCR2MD_PRESERVE_LINES")]
    preserve_lines: bool,

    /// Do not replace `|`, `0` and `1` with `I`, `O` and `l`.
    #[arg(long, env = "OCR2MD_NO_CHAR_FIXES")]
    no_char_fixes: bool,

    /// Extra OCR attempts per page after a failure.
    #[arg(long, env = "OCR2MD_OCR_RETRIES", default_value_t = 0)]
    ocr_retries: u32,

    /// Print the conversion report as JSON on stdout.
    #[arg(long, env = "OCR2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2MD_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Validate input ───────────────────────────────────────────────────
    // Before pdfium is bound, so a bad path is reported as such even when
    // the library is missing.
    if let Err(e) = validate_pdf(&cli.input) {
        let report = ConversionReport::failed(e.to_string());
        emit_report(&cli, &report)?;
        return Ok(ExitCode::FAILURE);
    }

    // ── Build converter ──────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let rasterizer =
        PdfiumRasterizer::bind(cli.pdfium_lib.as_deref()).context("Failed to load pdfium")?;
    let converter = Converter::new(
        Arc::new(rasterizer),
        Arc::new(TesseractEngine::new(cli.tesseract_cmd.as_os_str())),
        config,
    )
    .context("Invalid configuration")?;

    // ── Run conversion ───────────────────────────────────────────────────
    let report = converter.convert(&cli.input).await;
    emit_report(&cli, &report)?;

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// JSON on stdout with `--json`, otherwise a summary on stderr.
fn emit_report(cli: &Cli, report: &ConversionReport) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(report);
    } else if let Some(ref error) = report.error {
        eprintln!("{} {}", red("✘"), error);
    }
    Ok(())
}

/// Human-readable result on stderr.
fn print_summary(report: &ConversionReport) {
    match (&report.output_file, &report.error) {
        (Some(path), _) if report.success => {
            eprintln!(
                "{}  {}/{} pages with text ({} in PDF)  →  {}",
                green("✔"),
                report.pages_with_text,
                report.extracted_pages,
                report.total_pages,
                bold(&path.display().to_string()),
            );
        }
        (_, Some(error)) => eprintln!("{} Conversion failed: {}", red("✘"), error),
        _ => eprintln!("{} Conversion failed", red("✘")),
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = if cli.pages.is_empty() {
        PageSelection::All
    } else {
        PageSelection::List(cli.pages.clone())
    };

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .output_dir(&cli.output_dir)
        .image_dir(&cli.image_dir)
        .pages(pages)
        .language(&cli.lang)
        .page_segmentation_mode(cli.psm)
        .engine_mode(cli.oem)
        .extra_header_footer_patterns(cli.header_patterns.iter().cloned())
        .preserve_line_breaks(cli.preserve_lines)
        .fix_common_confusions(!cli.no_char_fixes)
        .ocr_retries(cli.ocr_retries);

    if let Some(ref name) = cli.output_name {
        builder = builder.output_name(name);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
