//! Markdown assembly: one document from the per-page records.

use crate::output::PageRecord;
use std::path::Path;

/// Written in place of the text of a page that produced none.
pub const NO_TEXT_PLACEHOLDER: &str = "*No text could be extracted from this page*";

/// Build the final Markdown.
///
/// Layout: `# <title>`, then for each page a bold `**Page N**` marker, the
/// cleaned text (or [`NO_TEXT_PLACEHOLDER`]) and a `---` rule.
pub fn assemble_markdown(pages: &[PageRecord], document_name: &str) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(2 + pages.len() * 6);
    lines.push(format!("# {}", document_title(document_name)));
    lines.push(String::new());

    for page in pages {
        lines.push(format!("**Page {}**", page.page_num()));
        lines.push(String::new());
        if page.text.is_empty() {
            lines.push(NO_TEXT_PLACEHOLDER.to_string());
        } else {
            lines.push(page.text.clone());
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Document title from a file name: extension dropped, underscores turned
/// into spaces, then title-cased.
pub fn document_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    title_case(&stem.replace('_', " "))
}

/// Upper-case the first cased letter of every run of cased letters,
/// lower-case the rest. Uncased letters (CJK, digits) break a run.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;
    for c in text.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_uppercase() || c.is_lowercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn page(index: usize, text: &str) -> PageRecord {
        PageRecord {
            page_index: index,
            image_path: PathBuf::from(format!("img/doc-page-{index:03}.png")),
            raw_ocr_text: text.to_string(),
            text: text.to_string(),
            native_text: String::new(),
            has_text: !text.is_empty(),
            error: None,
        }
    }

    #[test]
    fn title_from_file_name() {
        assert_eq!(document_title("finance_report.pdf"), "Finance Report");
        assert_eq!(document_title("BSBFIN501_learner_GUIDE.pdf"), "Bsbfin501 Learner Guide");
        assert_eq!(document_title("notes"), "Notes");
        assert_eq!(document_title("q3-budget's_v2.pdf"), "Q3-Budget'S V2");
    }

    #[test]
    fn uncased_letters_start_a_new_word() {
        assert_eq!(document_title("報告abc_def.pdf"), "報告Abc Def");
        assert_eq!(document_title("naïve_ÉTÉ.pdf"), "Naïve Été");
    }

    #[test]
    fn first_line_is_title() {
        let md = assemble_markdown(&[page(0, "Hello")], "finance_report.pdf");
        assert_eq!(md.lines().next(), Some("# Finance Report"));
    }

    #[test]
    fn exact_layout() {
        let md = assemble_markdown(&[page(0, "### Hello"), page(2, "")], "doc.pdf");
        let expected = "# Doc\n\n\
**Page 1**\n\n### Hello\n\n---\n\n\
**Page 3**\n\n*No text could be extracted from this page*\n\n---\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn keeps_record_order() {
        let md = assemble_markdown(&[page(4, "later"), page(1, "earlier")], "doc.pdf");
        let p5 = md.find("**Page 5**").unwrap();
        let p2 = md.find("**Page 2**").unwrap();
        assert!(p5 < p2);
    }

    #[test]
    fn no_pages_gives_title_only() {
        assert_eq!(assemble_markdown(&[], "empty.pdf"), "# Empty\n");
    }

    #[test]
    fn deterministic() {
        let pages = [page(0, "a"), page(1, "b")];
        assert_eq!(
            assemble_markdown(&pages, "x.pdf"),
            assemble_markdown(&pages, "x.pdf")
        );
    }
}
