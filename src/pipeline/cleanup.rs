//! Text cleanup: turn raw OCR output into heading-annotated Markdown text.
//!
//! Tesseract output for a scanned page is noisy: running headers and footers,
//! page numbers, stray rule lines rendered as `|||` or `___`, and hard line
//! breaks wherever the scan had them. [`TextCleaner::clean`] runs four stages
//! in a fixed order, each a total `&str → String` function:
//!
//! 1. [`TextCleaner::remove_headers_footers`]
//! 2. [`TextCleaner::clean_artifacts`]
//! 3. [`normalize_formatting`]
//! 4. [`detect_structure`]
//!
//! Header/footer removal must run first because it is the only line-based
//! stage that sees the OCR line breaks; artifact cleanup flattens whitespace
//! (unless [`CleanupConfig::preserve_line_breaks`] is set).

use crate::config::CleanupConfig;
use crate::error::Ocr2MdError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet, RegexSetBuilder};

/// Compiled form of a [`CleanupConfig`].
#[derive(Debug, Clone)]
pub struct TextCleaner {
    header_footer: RegexSet,
    disallowed: Regex,
    fix_common_confusions: bool,
    preserve_line_breaks: bool,
}

impl TextCleaner {
    /// Compile the configured patterns. Fails on an invalid regex.
    pub fn new(config: &CleanupConfig) -> Result<Self, Ocr2MdError> {
        let header_footer = RegexSetBuilder::new(&config.header_footer_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| Ocr2MdError::InvalidConfig(format!("header/footer pattern: {e}")))?;

        // `|` is kept here so the confusion fix can still turn it into `I`.
        let escaped: String = config
            .allowed_punctuation
            .chars()
            .chain(std::iter::once('|'))
            .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
            .collect();
        let disallowed = Regex::new(&format!(r"[^\w\s{escaped}]"))
            .map_err(|e| Ocr2MdError::InvalidConfig(format!("allowed punctuation: {e}")))?;

        Ok(Self {
            header_footer,
            disallowed,
            fix_common_confusions: config.fix_common_confusions,
            preserve_line_breaks: config.preserve_line_breaks,
        })
    }

    /// Run all four stages.
    pub fn clean(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let s = self.remove_headers_footers(raw);
        let s = self.clean_artifacts(&s);
        let s = normalize_formatting(&s);
        detect_structure(&s)
    }

    // ── Stage 1: Header/footer removal ───────────────────────────────────

    /// Drop header/footer lines, lines under 3 characters and lines without
    /// a letter. Surviving lines keep their original text and order.
    pub fn remove_headers_footers(&self, text: &str) -> String {
        text.split('\n')
            .filter(|line| self.keep_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn keep_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.chars().count() < 3 {
            return false;
        }
        if !trimmed.chars().any(char::is_alphabetic) {
            return false;
        }
        !self.header_footer.is_match(&trimmed.to_lowercase())
    }

    // ── Stage 2: Artifact cleanup ────────────────────────────────────────

    /// Strip characters and rule lines OCR invents, then normalise spacing.
    pub fn clean_artifacts(&self, text: &str) -> String {
        let s = self.disallowed.replace_all(text, "");
        let s = RE_RULE_RUNS.replace_all(&s, "");
        let s = if self.fix_common_confusions {
            fix_common_confusions(&s)
        } else {
            s.into_owned()
        };
        if self.preserve_line_breaks {
            collapse_horizontal_whitespace(&s)
        } else {
            RE_WHITESPACE.replace_all(&s, " ").into_owned()
        }
    }
}

static RE_RULE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[|_]{2,}").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static RE_LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

/// Unconditional substitutions for the usual Tesseract confusions.
fn fix_common_confusions(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '|' => 'I',
            '0' => 'O',
            '1' => 'l',
            other => other,
        })
        .collect()
}

fn collapse_horizontal_whitespace(text: &str) -> String {
    let s = RE_HORIZONTAL_WS.replace_all(text, " ");
    RE_LINE_BREAKS.replace_all(&s, "\n").into_owned()
}

// ── Stage 3: Formatting normalisation ────────────────────────────────────

const SENTENCE_TERMINALS: [char; 4] = ['.', '!', '?', ':'];

/// Reflow lines into paragraphs.
///
/// A line starting with an uppercase letter opens a new paragraph when the
/// previous line does not end a sentence; every other line continues the
/// current paragraph.
pub fn normalize_formatting(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
        let prev_unterminated = current
            .last()
            .is_some_and(|prev| !prev.ends_with(SENTENCE_TERMINALS));
        if starts_upper && prev_unterminated {
            paragraphs.push(current.join(" "));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

// ── Stage 4: Structure detection ─────────────────────────────────────────

static RE_ROMAN_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[IVX]+\.").unwrap());
static RE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());
static RE_CAPITALISED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z]+").unwrap());

/// Lines at or above this length are never headings.
pub const MAX_HEADING_LEN: usize = 100;
/// Uppercase lines below this length become `##`, otherwise `###`.
pub const MAX_SECTION_HEADING_LEN: usize = 50;

/// Mark short lines that look like headings.
pub fn detect_structure(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let len = line.chars().count();
            let upper = is_upper(line);
            let heading = len < MAX_HEADING_LEN
                && (upper
                    || RE_ROMAN_PREFIX.is_match(line)
                    || RE_NUMBER_PREFIX.is_match(line)
                    || RE_CAPITALISED_WORD.is_match(line));
            if !heading {
                line.to_string()
            } else if upper && len < MAX_SECTION_HEADING_LEN {
                format!("## {line}")
            } else {
                format!("### {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// True when the text has at least one cased letter and none is lowercase.
fn is_upper(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(&CleanupConfig::default()).unwrap()
    }

    // ── Stage 1 ──

    #[test]
    fn removes_configured_footer_case_insensitively() {
        let out = cleaner().remove_headers_footers("PAGE 3\nReal content here\nCONFIDENTIAL draft");
        assert_eq!(out, "Real content here");
    }

    #[test]
    fn removes_short_and_letterless_lines() {
        let out = cleaner().remove_headers_footers("ab\n12345\n--- ***\n  Keep me  \n\n");
        assert_eq!(out, "  Keep me  ");
    }

    #[test]
    fn header_removal_closure_property() {
        let inputs = [
            "a\nbb\nccc\n123\n!!!\nx1\n  y  \nok line\n",
            "Page 12 of 40\n\n\t\nTitle\n99 bottles\n%%%%\n",
            "   \n1\n12\nab1\nabc\n",
        ];
        let c = cleaner();
        for input in inputs {
            for line in c.remove_headers_footers(input).split('\n').filter(|l| !l.is_empty()) {
                assert!(line.trim().chars().count() >= 3, "short line {line:?}");
                assert!(line.chars().any(char::is_alphabetic), "no letter {line:?}");
            }
        }
    }

    #[test]
    fn extra_patterns_apply() {
        let mut config = CleanupConfig::default();
        config.header_footer_patterns.push(r"acme \w+ ltd".into());
        let c = TextCleaner::new(&config).unwrap();
        assert_eq!(c.remove_headers_footers("ACME Widgets Ltd\nBody"), "Body");
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let config = CleanupConfig {
            header_footer_patterns: vec!["(unclosed".into()],
            ..CleanupConfig::default()
        };
        let err = TextCleaner::new(&config).unwrap_err();
        assert!(matches!(err, Ocr2MdError::InvalidConfig(_)));
    }

    // ── Stage 2 ──

    #[test]
    fn collapses_whitespace_including_newlines() {
        assert_eq!(cleaner().clean_artifacts("a  b\n\n c\td"), "a b c d");
    }

    #[test]
    fn strips_rule_runs() {
        assert_eq!(cleaner().clean_artifacts("left ||| right ____ end"), "left right end");
    }

    #[test]
    fn removes_disallowed_characters() {
        assert_eq!(cleaner().clean_artifacts("cost: $5 @ shop #2 — “ok”"), "cost: 5 shop 2 — ok");
    }

    #[test]
    fn keeps_allowed_punctuation() {
        let text = "Wait... (really)? [yes] {no} 'a' \"b\" x-y • z · w … end!";
        assert_eq!(cleaner().clean_artifacts(text), text);
    }

    #[test]
    fn applies_confusion_substitutions() {
        assert_eq!(cleaner().clean_artifacts("|tem 10 0f 1ines"), "Item lO Of lines");
    }

    #[test]
    fn confusion_substitutions_can_be_disabled() {
        let config = CleanupConfig {
            fix_common_confusions: false,
            ..CleanupConfig::default()
        };
        let c = TextCleaner::new(&config).unwrap();
        assert_eq!(c.clean_artifacts("Item 10"), "Item 10");
    }

    #[test]
    fn artifact_cleanup_is_idempotent() {
        let c = cleaner();
        let inputs = [
            "a @ b",
            "_@_ x |@| y",
            "  lead\n\ttrail  ",
            "|| 10 | 01 __ ok ©™ end",
            "Already clean text.",
        ];
        for input in inputs {
            let once = c.clean_artifacts(input);
            assert_eq!(c.clean_artifacts(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn preserve_line_breaks_keeps_lines() {
        let config = CleanupConfig {
            preserve_line_breaks: true,
            ..CleanupConfig::default()
        };
        let c = TextCleaner::new(&config).unwrap();
        let once = c.clean_artifacts("First   line \n\n  Second\tline");
        assert_eq!(once, "First line\nSecond line");
        assert_eq!(c.clean_artifacts(&once), once);
    }

    // ── Stage 3 ──

    #[test]
    fn uppercase_after_unterminated_line_opens_paragraph() {
        let out = normalize_formatting("Introduction\nThe scope of this guide");
        assert_eq!(out, "Introduction\n\nThe scope of this guide");
    }

    #[test]
    fn uppercase_after_terminated_line_continues_paragraph() {
        let out = normalize_formatting("Hello world.\nThis is a Test.");
        assert_eq!(out, "Hello world. This is a Test.");
    }

    #[test]
    fn lowercase_continuation_joins() {
        let out = normalize_formatting("the budget was\napproved in May\n\n  ");
        assert_eq!(out, "the budget was approved in May");
    }

    #[test]
    fn empty_text_normalises_to_empty() {
        assert_eq!(normalize_formatting(""), "");
        assert_eq!(normalize_formatting("\n \n"), "");
    }

    // ── Stage 4 ──

    #[test]
    fn short_uppercase_line_is_section_heading() {
        assert_eq!(detect_structure("FINANCIAL POLICY"), "## FINANCIAL POLICY");
    }

    #[test]
    fn long_uppercase_line_is_subheading() {
        let line = "A".repeat(60);
        assert_eq!(detect_structure(&line), format!("### {line}"));
    }

    #[test]
    fn numbered_and_roman_prefixes_are_subheadings() {
        assert_eq!(detect_structure("2. budgets"), "### 2. budgets");
        assert_eq!(detect_structure("IV. reporting"), "### IV. reporting");
        assert_eq!(detect_structure("Budgets overview"), "### Budgets overview");
    }

    #[test]
    fn plain_lines_pass_through() {
        assert_eq!(
            detect_structure("a lowercase line\n\nanother one"),
            "a lowercase line\n\nanother one"
        );
    }

    #[test]
    fn no_heading_at_or_above_max_len() {
        let line = format!("Heading{}", "x".repeat(93));
        assert_eq!(line.chars().count(), 100);
        assert_eq!(detect_structure(&line), line);
        let upper = "B".repeat(150);
        assert_eq!(detect_structure(&upper), upper);
    }

    #[test]
    fn is_upper_follows_cased_letters() {
        assert!(is_upper("ABC 123"));
        assert!(!is_upper("123 !!"));
        assert!(!is_upper("ABc"));
    }

    // ── Full pipeline ──

    #[test]
    fn cleans_page_number_and_digit_lines() {
        let out = cleaner().clean("PAGE 3\nHello world. This is a Test.\n12345");
        assert!(!out.lines().any(|l| l.trim() == "12345"));
        assert!(!out.lines().any(|l| l.trim().eq_ignore_ascii_case("page 3")));
        assert!(out.contains("Hello world. This is a Test."));
        assert_eq!(out.split("\n\n").count(), 1, "one paragraph: {out:?}");
    }

    #[test]
    fn empty_input_cleans_to_empty() {
        assert_eq!(cleaner().clean(""), "");
        assert_eq!(cleaner().clean("12\n--\n"), "");
    }

    #[test]
    fn preserved_lines_reach_structure_detection() {
        let config = CleanupConfig {
            preserve_line_breaks: true,
            ..CleanupConfig::default()
        };
        let c = TextCleaner::new(&config).unwrap();
        let out = c.clean("BUDGET PLANNING\nThe plan covers\nthree quarters.");
        assert_eq!(
            out,
            "## BUDGET PLANNING\n\n### The plan covers three quarters."
        );
    }
}
