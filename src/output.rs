//! Result types produced by a conversion.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything recorded about one processed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 0-based page index in the PDF.
    pub page_index: usize,
    /// Where the rendered page PNG was written.
    pub image_path: PathBuf,
    /// Text as returned by the OCR engine.
    pub raw_ocr_text: String,
    /// Text after the cleanup pipeline; empty when OCR failed.
    pub text: String,
    /// Text embedded in the PDF page itself (usually empty for scans).
    pub native_text: String,
    /// True when either the cleaned OCR text or the native text is non-blank.
    pub has_text: bool,
    /// Set when OCR failed for this page.
    pub error: Option<PageError>,
}

impl PageRecord {
    /// 1-based page number as shown in the Markdown.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }
}

/// Outcome of a successful [`crate::Converter::try_convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSummary {
    /// Path of the written Markdown file.
    pub output_file: PathBuf,
    /// Pages processed (requested pages that exist in the document).
    pub extracted_pages: usize,
    /// Processed pages that yielded OCR or native text.
    pub pages_with_text: usize,
    /// Page count of the PDF.
    pub total_pages: usize,
    /// Requested 0-based pages that were out of range.
    pub skipped_pages: Vec<usize>,
    /// Pages whose OCR failed.
    pub failed_pages: usize,
    /// Wall-clock duration of the conversion.
    pub duration_ms: u64,
    /// Per-page records, in request order.
    pub pages: Vec<PageRecord>,
}

/// Structured result of [`crate::Converter::convert`]; never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub success: bool,
    /// `"ocr"` on success, `"failed"` otherwise.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    pub extracted_pages: usize,
    pub pages_with_text: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionReport {
    pub(crate) fn succeeded(summary: &ConversionSummary) -> Self {
        Self {
            success: true,
            method: "ocr".to_string(),
            output_file: Some(summary.output_file.clone()),
            extracted_pages: summary.extracted_pages,
            pages_with_text: summary.pages_with_text,
            total_pages: summary.total_pages,
            error: None,
        }
    }

    /// Report for a conversion that did not produce output.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            method: "failed".to_string(),
            output_file: None,
            extracted_pages: 0,
            pages_with_text: 0,
            total_pages: 0,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_report_serialises_without_output_file() {
        let report = ConversionReport::failed("PDF file not found: 'x.pdf'");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["method"], "failed");
        assert!(json.get("output_file").is_none());
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn page_num_is_one_based() {
        let record = PageRecord {
            page_index: 0,
            image_path: PathBuf::from("img/doc-page-000.png"),
            raw_ocr_text: String::new(),
            text: String::new(),
            native_text: String::new(),
            has_text: false,
            error: None,
        };
        assert_eq!(record.page_num(), 1);
    }
}
