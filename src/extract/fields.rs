//! Field-level text analysis for recorded land documents.
//!
//! Pure functions, no async — easily testable. Classifies a document from
//! its OCR text, pulls structured fields out with regex patterns, and
//! normalizes dates, amounts and legal descriptions into the output schema.

use regex::Regex;

/// How far past a lone "Book N" match to look for its "Page M" companion.
const BOOK_PAGE_LOOKAHEAD: usize = 80;

/// Classify a document from its full text. Compound notices win over their
/// parts, and the more specific types are checked before the generic ones.
pub fn detect_document_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("notice") && lower.contains("settlement") {
        return "NOTICE AND SETTLEMENT";
    }
    if lower.contains("notice") {
        return "NOTICE";
    }
    if lower.contains("settlement") {
        return "SETTLEMENT";
    }
    if lower.contains("judgment") {
        return "JUDGMENT";
    }
    if lower.contains("mortgage") {
        return "MORTGAGE";
    }
    if lower.contains("deed") {
        return "DEED";
    }
    "OTHER"
}

/// Return the first balanced `{...}` object in `text`, if any.
///
/// LLM replies often wrap the JSON in prose or code fences; this scans for
/// the first brace and tracks nesting until it closes.
pub fn extract_json(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return start.map(|s| &text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Fields recovered by direct pattern matching over the OCR text. These
/// fill in the output fields the model left empty.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegexFields {
    pub instrument_number: Option<String>,
    pub consideration_amount: Option<String>,
    pub recording_date: Option<String>,
    pub book: Option<String>,
    pub pageno: Option<String>,
}

/// Pre-compiled field patterns. Compile once and reuse across a batch.
pub struct FieldPatterns {
    instrument: Regex,
    consideration: Vec<Regex>,
    date: Regex,
    book_page: Regex,
    book_alone: Regex,
    page_after_book: Regex,
    digit_run: Regex,
}

impl FieldPatterns {
    pub fn new() -> Self {
        let compile = |p: &str| Regex::new(p).expect("hardcoded field pattern");
        Self {
            instrument: compile(r"(?i)(Instrument|Doc|Document)\s*(No\.?|#)?\s*([A-Z0-9]+)"),
            consideration: vec![
                compile(r"(?i)Consideration[:\s]+\$?\s*([\d,]+\.?\d{0,2})"),
                compile(r"(?i)for\s+(?:the\s+)?(?:sum|consideration)\s+of[:\s]+\$?\s*([\d,]+\.?\d{0,2})"),
                compile(r"(?i)sum\s+of[:\s]+\$?\s*([\d,]+\.?\d{0,2})"),
            ],
            date: compile(r"\b\d{1,2}/\d{1,2}/\d{4}\b"),
            book_page: compile(r"(?i)\bBook\s*[:#]?\s*(\d+)\s*[,\s]*Page\s*[:#]?\s*(\d+)"),
            book_alone: compile(r"(?i)\bBook\s*[:#]?\s*(\d+)"),
            page_after_book: compile(r"(?i)\bPage\s*[:#]?\s*(\d+)"),
            digit_run: compile(r"\d+"),
        }
    }

    /// Run every field pattern over `text`. First match wins within each
    /// field; the consideration phrasings are tried in order.
    pub fn extract(&self, text: &str) -> RegexFields {
        let mut fields = RegexFields::default();

        if let Some(cap) = self.instrument.captures(text) {
            fields.instrument_number = cap.get(3).map(|m| m.as_str().to_string());
        }

        for pattern in &self.consideration {
            if let Some(cap) = pattern.captures(text) {
                if let Some(amount) = cap.get(1) {
                    fields.consideration_amount = Some(format!("${}", amount.as_str()));
                    break;
                }
            }
        }

        if let Some(m) = self.date.find(text) {
            fields.recording_date = Some(m.as_str().to_string());
        }

        if let Some(cap) = self.book_page.captures(text) {
            fields.book = cap.get(1).map(|m| m.as_str().to_string());
            fields.pageno = cap.get(2).map(|m| m.as_str().to_string());
        } else if let Some(cap) = self.book_alone.captures(text) {
            // Stamps often split the pair across lines; accept a lone book
            // number and only pair it with a page found close behind it.
            fields.book = cap.get(1).map(|m| m.as_str().to_string());
            let tail_start = cap.get(0).map(|m| m.end()).unwrap_or(0);
            let tail_end = text
                .len()
                .min(ceil_char_boundary(text, tail_start + BOOK_PAGE_LOOKAHEAD));
            if let Some(page_cap) = self.page_after_book.captures(&text[tail_start..tail_end]) {
                fields.pageno = page_cap.get(1).map(|m| m.as_str().to_string());
            }
        }

        fields
    }

    /// First run of 4 to 12 digits in a filename, used as an instrument
    /// number of last resort.
    pub fn instrument_from_filename(&self, filename: &str) -> Option<String> {
        self.digit_run
            .find_iter(filename)
            .find(|m| (4..=12).contains(&m.as_str().len()))
            .map(|m| m.as_str().to_string())
    }
}

impl Default for FieldPatterns {
    fn default() -> Self {
        Self::new()
    }
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Reformat a date string as `DD/MM/YYYY`. Accepts the formats the portal
/// and OCR typically produce; anything unrecognized becomes `None` rather
/// than passing through garbage.
pub fn normalize_date_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%m/%d/%Y",
        "%m-%d-%Y",
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
    ];
    for format in FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format("%d/%m/%Y").to_string());
        }
    }
    None
}

/// Reduce an amount string to a plain number: `"$ 12,345.00"` -> `12345.0`.
pub fn normalize_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let numeric: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit() && *c != '.' && *c != ',')
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    numeric.parse::<f64>().ok()
}

/// Collapse whitespace (OCR line breaks included) and uppercase.
pub fn normalize_legal_description(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_precedence() {
        assert_eq!(
            detect_document_type("NOTICE OF SETTLEMENT between..."),
            "NOTICE AND SETTLEMENT"
        );
        assert_eq!(detect_document_type("Notice to quit"), "NOTICE");
        assert_eq!(detect_document_type("final settlement stmt"), "SETTLEMENT");
        assert_eq!(detect_document_type("judgment entered"), "JUDGMENT");
        // "mortgage deed" is a mortgage, not a deed
        assert_eq!(detect_document_type("MORTGAGE DEED"), "MORTGAGE");
        assert_eq!(detect_document_type("warranty deed"), "DEED");
        assert_eq!(detect_document_type("easement agreement"), "OTHER");
    }

    #[test]
    fn extract_json_finds_balanced_object() {
        let reply = "Sure! Here you go:\n```json\n{\"a\": {\"b\": 1}}\n``` done";
        assert_eq!(extract_json(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extract_json_none_when_unclosed() {
        assert_eq!(extract_json("{\"a\": 1"), None);
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn regex_extracts_instrument_and_date() {
        let patterns = FieldPatterns::new();
        let fields =
            patterns.extract("Instrument No. 2023045678 recorded on 03/15/2023 in Bergen");
        assert_eq!(fields.instrument_number.as_deref(), Some("2023045678"));
        assert_eq!(fields.recording_date.as_deref(), Some("03/15/2023"));
    }

    #[test]
    fn consideration_phrasings_first_match_wins() {
        let patterns = FieldPatterns::new();
        let fields = patterns.extract("for the sum of $ 450,000.00 paid in hand");
        assert_eq!(fields.consideration_amount.as_deref(), Some("$450,000.00"));

        let fields = patterns.extract("Consideration: 1,250.50 and sum of: 999");
        assert_eq!(fields.consideration_amount.as_deref(), Some("$1,250.50"));
    }

    #[test]
    fn book_and_page_pair() {
        let patterns = FieldPatterns::new();
        let fields = patterns.extract("recorded in Book 123, Page 456 of deeds");
        assert_eq!(fields.book.as_deref(), Some("123"));
        assert_eq!(fields.pageno.as_deref(), Some("456"));
    }

    #[test]
    fn book_alone_with_nearby_page() {
        let patterns = FieldPatterns::new();
        let fields = patterns.extract("in Book: 789 of mortgages\nPage: 12\n");
        assert_eq!(fields.book.as_deref(), Some("789"));
        assert_eq!(fields.pageno.as_deref(), Some("12"));
    }

    #[test]
    fn book_alone_ignores_distant_page() {
        let patterns = FieldPatterns::new();
        let filler = "x".repeat(200);
        let text = format!("Book 55 {filler} Page 99");
        let fields = patterns.extract(&text);
        assert_eq!(fields.book.as_deref(), Some("55"));
        assert_eq!(fields.pageno, None);
    }

    #[test]
    fn instrument_from_filename_digit_run() {
        let patterns = FieldPatterns::new();
        assert_eq!(
            patterns.instrument_from_filename("DEED_2023045678.pdf").as_deref(),
            Some("2023045678")
        );
        // a 2-digit run is noise, not an instrument number
        assert_eq!(
            patterns.instrument_from_filename("Doc_12_a_567890.pdf").as_deref(),
            Some("567890")
        );
        assert_eq!(patterns.instrument_from_filename("scan.pdf"), None);
    }

    #[test]
    fn date_normalization() {
        assert_eq!(
            normalize_date_field("03/15/2023").as_deref(),
            Some("15/03/2023")
        );
        assert_eq!(
            normalize_date_field("2023-03-15").as_deref(),
            Some("15/03/2023")
        );
        assert_eq!(
            normalize_date_field("March 15, 2023").as_deref(),
            Some("15/03/2023")
        );
        assert_eq!(normalize_date_field("sometime in spring"), None);
        assert_eq!(normalize_date_field(""), None);
    }

    #[test]
    fn amount_normalization() {
        assert_eq!(normalize_amount("$ 12,345.00"), Some(12345.0));
        assert_eq!(normalize_amount("450000"), Some(450000.0));
        assert_eq!(normalize_amount(""), None);
        assert_eq!(normalize_amount("ten dollars"), None);
    }

    #[test]
    fn legal_description_collapsed_and_uppercased() {
        assert_eq!(
            normalize_legal_description("Lot 4,\nBlock 12  in the\tBorough"),
            "LOT 4, BLOCK 12 IN THE BOROUGH"
        );
    }
}
