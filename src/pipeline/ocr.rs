//! OCR engines: bitmap in, raw text out.
//!
//! [`OcrEngine`] is the seam between the converter and whatever does the
//! recognition. The shipped engine, [`TesseractEngine`], drives the
//! `tesseract` command-line tool: the bitmap is written to a temporary PNG
//! and the recognised text is read from the child's stdout. Running the CLI
//! instead of linking libtesseract keeps the build free of C toolchains and
//! lets the binary be swapped with `--tesseract-cmd`.

use crate::config::OcrParams;
use crate::error::OcrError;
use async_trait::async_trait;
use image::DynamicImage;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Environment variable naming the tesseract binary.
pub const TESSERACT_CMD_ENV: &str = "TESSERACT_CMD";

/// Something that turns a page bitmap into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise the text on `image`.
    async fn recognize(&self, image: &DynamicImage, params: &OcrParams) -> Result<String, OcrError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// OCR engine wrapping the `tesseract` CLI tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: OsString,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    /// Use the given binary name or path.
    pub fn new(command: impl Into<OsString>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Use `$TESSERACT_CMD` when set, otherwise `tesseract` from `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(TESSERACT_CMD_ENV) {
            Some(cmd) if !cmd.is_empty() => Self::new(cmd),
            _ => Self::default(),
        }
    }

    /// Arguments after the binary: `<input> stdout -l <lang> --psm <n> --oem <n>`.
    pub fn arguments(input: &Path, params: &OcrParams) -> Vec<OsString> {
        vec![
            input.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            params.language.clone().into(),
            "--psm".into(),
            params.page_segmentation_mode.to_string().into(),
            "--oem".into(),
            params.engine_mode.to_string().into(),
        ]
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(lang = %params.language))]
    async fn recognize(&self, image: &DynamicImage, params: &OcrParams) -> Result<String, OcrError> {
        let tmpdir = tempfile::TempDir::with_prefix("ocr2md")?;
        let input_path = tmpdir.path().join("page.png");
        image.save_with_format(&input_path, image::ImageFormat::Png)?;

        let output = Command::new(&self.command)
            .args(Self::arguments(&input_path, params))
            .output()
            .await
            .map_err(|source| OcrError::Unavailable {
                command: self.command.to_string_lossy().into_owned(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract returned {} bytes", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    #[test]
    fn builds_tesseract_arguments() {
        let params = OcrParams::default();
        let args = TesseractEngine::arguments(&PathBuf::from("/tmp/page.png"), &params);
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["/tmp/page.png", "stdout", "-l", "eng", "--psm", "6", "--oem", "3"]
        );
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractEngine::new("/definitely/not/a/tesseract");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let err = tokio_test::block_on(engine.recognize(&img, &OcrParams::default()))
            .expect_err("binary does not exist");
        assert!(matches!(err, OcrError::Unavailable { .. }), "got {err:?}");
    }
}
