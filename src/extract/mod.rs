//! Document field extraction: turn a folder of captured PDFs into a table
//! of recorded-document fields.
//!
//! Per PDF the pipeline is render -> OCR -> classify -> LLM extraction ->
//! regex overlay -> normalize. A PDF that fails anywhere yields no record
//! and the batch moves on; one bad scan never sinks the folder.

pub mod fields;
pub mod llm;
pub mod ocr;
pub mod pdf;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Settings;
use fields::FieldPatterns;
use llm::{LlmClient, Message, TokenUsage};
use ocr::{HandwritingOcr, OcrProvider, PrintedOcr, MIN_PRINTED_CHARS};

/// OCR text beyond this many characters is cut before prompting; recorded
/// documents front-load the fields we need.
const MAX_PROMPT_CHARS: usize = 24_000;

/// One extracted document. Field names match the output CSV columns.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRecord {
    #[serde(rename = "DOCUMENT_TYPE")]
    pub document_type: String,
    #[serde(rename = "GRANTOR")]
    pub grantor: String,
    #[serde(rename = "GRANTEE")]
    pub grantee: String,
    #[serde(rename = "INSTRUMENT_NUMBER")]
    pub instrument_number: String,
    #[serde(rename = "RECORDING_DATE")]
    pub recording_date: Option<String>,
    #[serde(rename = "DATED_DATE")]
    pub dated_date: Option<String>,
    #[serde(rename = "CONSIDERATION_AMOUNT")]
    pub consideration_amount: Option<f64>,
    #[serde(rename = "BOOK")]
    pub book: String,
    #[serde(rename = "PAGENO")]
    pub pageno: String,
    #[serde(rename = "LEGAL_DESCRIPTION")]
    pub legal_description: String,
    #[serde(rename = "SOURCE_FILE")]
    pub source_file: String,
    #[serde(rename = "FOLDER_NAME")]
    pub folder_name: String,
}

/// Outcome of an extraction batch.
#[derive(Debug, Serialize)]
pub struct ExtractionReport {
    pub records: Vec<ExtractedRecord>,
    pub total: usize,
    pub token_usage: TokenUsage,
}

/// Page text ready for classification, by source.
enum PageSource {
    Embedded(Vec<String>),
    Images(Vec<Vec<u8>>),
}

pub struct FieldExtractor {
    printed: PrintedOcr,
    handwriting: HandwritingOcr,
    llm: LlmClient,
    patterns: FieldPatterns,
}

impl FieldExtractor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY environment variable is not set")?;
        let client = reqwest::Client::new();
        Ok(Self {
            printed: PrintedOcr::new(client.clone(), settings.printed_ocr_url.clone()),
            handwriting: HandwritingOcr::new(client.clone(), settings.handwriting_ocr_url.clone()),
            llm: LlmClient::new(client, api_key, settings.llm_model.clone()),
            patterns: FieldPatterns::new(),
        })
    }

    /// Extract every document PDF under `folder`, write the CSV next to it,
    /// and return the batch report.
    pub async fn process_folder(
        &self,
        folder: &Path,
        file_number: &str,
    ) -> Result<ExtractionReport> {
        let pdfs = collect_document_pdfs(folder);
        info!(
            "Extracting {} PDFs for file number {file_number}",
            pdfs.len()
        );

        let mut records = Vec::new();
        let mut token_usage = TokenUsage::default();
        for path in pdfs {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            match self.process_pdf(&path, &filename, file_number).await {
                Ok((record, usage)) => {
                    token_usage.add(usage);
                    records.push(record);
                }
                Err(e) => warn!("Error processing {filename}: {e:#}"),
            }
        }

        if !records.is_empty() {
            let csv_path = folder
                .parent()
                .unwrap_or(folder)
                .join(format!("{file_number}_output.csv"));
            write_csv(&csv_path, &records)?;
            info!("Wrote {}", csv_path.display());
        }

        Ok(ExtractionReport {
            total: records.len(),
            records,
            token_usage,
        })
    }

    async fn process_pdf(
        &self,
        path: &Path,
        filename: &str,
        file_number: &str,
    ) -> Result<(ExtractedRecord, TokenUsage)> {
        let owned = path.to_path_buf();
        let source = tokio::task::spawn_blocking(move || prepare_document(&owned))
            .await
            .context("page preparation task panicked")??;

        let all_text = match source {
            PageSource::Embedded(pages) => pages.join("\n"),
            PageSource::Images(pages) => self.ocr_pages(&pages).await?,
        };

        let doc_type = fields::detect_document_type(&all_text);
        let prompt = build_prompt(doc_type, &all_text);
        let (raw, usage) = self.llm.chat(vec![Message::user(prompt)]).await?;

        let json_text = fields::extract_json(&raw).context("no JSON object in LLM reply")?;
        let mut data: serde_json::Map<String, Value> =
            serde_json::from_str(json_text).context("LLM reply is not valid JSON")?;

        // Pattern hits in the OCR text fill whatever the model left blank;
        // a value the model did supply stands.
        let overlay = self.patterns.extract(&all_text);
        overlay_field(&mut data, "INSTRUMENT_NUMBER", overlay.instrument_number);
        overlay_field(&mut data, "CONSIDERATION_AMOUNT", overlay.consideration_amount);
        overlay_field(&mut data, "RECORDING_DATE", overlay.recording_date);
        overlay_field(&mut data, "BOOK", overlay.book);
        overlay_field(&mut data, "PAGENO", overlay.pageno);

        let mut instrument_number = take_string(&data, "INSTRUMENT_NUMBER");
        if instrument_number.is_empty() {
            if let Some(from_name) = self.patterns.instrument_from_filename(filename) {
                instrument_number = from_name;
            }
        }

        let record = ExtractedRecord {
            document_type: non_empty_or(take_string(&data, "DOCUMENT_TYPE"), doc_type),
            grantor: take_string(&data, "GRANTOR"),
            grantee: take_string(&data, "GRANTEE"),
            instrument_number,
            recording_date: normalize_opt_date(&data, "RECORDING_DATE"),
            dated_date: normalize_opt_date(&data, "DATED_DATE"),
            consideration_amount: fields::normalize_amount(&take_string(
                &data,
                "CONSIDERATION_AMOUNT",
            )),
            book: take_string(&data, "BOOK"),
            pageno: take_string(&data, "PAGENO"),
            legal_description: fields::normalize_legal_description(&take_string(
                &data,
                "LEGAL_DESCRIPTION",
            )),
            source_file: filename.to_string(),
            folder_name: file_number.to_string(),
        };
        Ok((record, usage))
    }

    /// Printed OCR on every page, with the handwriting pass stacked on top
    /// of pages the printed engine could barely read.
    async fn ocr_pages(&self, pages: &[Vec<u8>]) -> Result<String> {
        let mut all_text = String::new();
        for (i, png) in pages.iter().enumerate() {
            let mut page_text = self.printed.recognize(png).await?;
            if page_text.trim().len() < MIN_PRINTED_CHARS {
                match self.handwriting.recognize(png).await {
                    Ok(handwritten) => {
                        page_text.push('\n');
                        page_text.push_str(&handwritten);
                    }
                    Err(e) => warn!("Handwriting OCR failed on page {}: {e:#}", i + 1),
                }
            }
            all_text.push_str(&page_text);
            all_text.push('\n');
        }
        Ok(all_text)
    }
}

/// Open the PDF and produce page text or OCR-ready page images. Blocking
/// (Pdfium and image work), run it on the blocking pool.
fn prepare_document(path: &Path) -> Result<PageSource> {
    if let Some(pages) = pdf::embedded_page_text(path) {
        return Ok(PageSource::Embedded(pages));
    }
    let pdfium = pdf::create_pdfium()?;
    let rendered = pdf::render_pages(&pdfium, path)?;
    let mut pages = Vec::with_capacity(rendered.len());
    for page in &rendered {
        pages.push(pdf::encode_png(&pdf::preprocess_for_ocr(page))?);
    }
    Ok(PageSource::Images(pages))
}

fn build_prompt(doc_type: &str, all_text: &str) -> String {
    let text = truncate_chars(all_text, MAX_PROMPT_CHARS);
    format!(
        r#"Return ONLY valid JSON.

{{
 "DOCUMENT_TYPE": "{doc_type}",
 "GRANTOR": "",
 "GRANTEE": "",
 "INSTRUMENT_NUMBER": "",
 "RECORDING_DATE": "",
 "DATED_DATE": "",
 "CONSIDERATION_AMOUNT": "",
 "BOOK": "",
 "PAGENO": "",
 "LEGAL_DESCRIPTION": ""
}}

TEXT:
{text}
"#
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn overlay_field(data: &mut serde_json::Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        if take_string(data, key).is_empty() {
            data.insert(key.to_string(), Value::String(value));
        }
    }
}

fn take_string(data: &serde_json::Map<String, Value>, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn normalize_opt_date(data: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    let raw = take_string(data, key);
    if raw.is_empty() {
        return None;
    }
    fields::normalize_date_field(&raw)
}

/// Locate the capture folder for a file number: a direct child of the
/// output root, or one level down inside a site folder.
pub fn find_document_folder(output_root: &Path, file_number: &str) -> Option<PathBuf> {
    let direct = output_root.join(file_number);
    if direct.is_dir() {
        return Some(direct);
    }
    let entries = std::fs::read_dir(output_root).ok()?;
    for entry in entries.filter_map(|e| e.ok()) {
        let candidate = entry.path().join(file_number);
        if entry.path().is_dir() && candidate.is_dir() {
            return Some(candidate);
        }
    }
    None
}

/// True for PDFs that hold an actual recorded document. Index snapshots and
/// lot/block captures share the folder and are skipped.
fn is_document_pdf(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    if !lower.ends_with(".pdf") {
        return false;
    }
    !["index", "lot", "block"].iter().any(|w| lower.contains(w))
}

/// Recursively collect document PDFs under `folder`, first occurrence wins
/// for duplicate filenames.
fn collect_document_pdfs(folder: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk_pdfs(folder, &mut seen, &mut out);
    out
}

fn walk_pdfs(dir: &Path, seen: &mut HashSet<String>, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            walk_pdfs(&path, seen, out);
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_document_pdf(name) && seen.insert(name.to_lowercase()) {
            out.push(path);
        }
    }
}

fn write_csv(path: &Path, records: &[ExtractedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "extract_test_{tag}_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn document_pdf_filter() {
        assert!(is_document_pdf("DEED_12345.pdf"));
        assert!(is_document_pdf("MORTGAGE_9.PDF"));
        assert!(!is_document_pdf("index_Smith_John.pdf"));
        assert!(!is_document_pdf("Town_Lot_Block_capture.pdf"));
        assert!(!is_document_pdf("notes.txt"));
    }

    #[test]
    fn folder_lookup_direct_and_nested() {
        let root = temp_root("lookup");
        std::fs::create_dir_all(root.join("FN100")).unwrap();
        std::fs::create_dir_all(root.join("bergen").join("FN200")).unwrap();

        assert_eq!(
            find_document_folder(&root, "FN100"),
            Some(root.join("FN100"))
        );
        assert_eq!(
            find_document_folder(&root, "FN200"),
            Some(root.join("bergen").join("FN200"))
        );
        assert_eq!(find_document_folder(&root, "FN300"), None);
    }

    #[test]
    fn pdf_collection_dedups_and_filters() {
        let root = temp_root("collect");
        let sub = root.join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(root.join("DEED_1.pdf"), b"x").unwrap();
        std::fs::write(sub.join("DEED_1.pdf"), b"x").unwrap();
        std::fs::write(root.join("index_results.pdf"), b"x").unwrap();
        std::fs::write(root.join("MORTGAGE_2.pdf"), b"x").unwrap();

        let pdfs = collect_document_pdfs(&root);
        let names: Vec<_> = pdfs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(pdfs.len(), 2);
        assert!(names.contains(&"DEED_1.pdf"));
        assert!(names.contains(&"MORTGAGE_2.pdf"));
    }

    #[test]
    fn prompt_embeds_doc_type_and_truncates() {
        let long_text = "a".repeat(MAX_PROMPT_CHARS + 100);
        let prompt = build_prompt("DEED", &long_text);
        assert!(prompt.starts_with("Return ONLY valid JSON."));
        assert!(prompt.contains("\"DOCUMENT_TYPE\": \"DEED\""));
        // Only the OCR text is bounded; the schema wrapper rides on top.
        let embedded = prompt.split("TEXT:\n").nth(1).unwrap();
        assert_eq!(embedded.trim_end().len(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn overlay_fills_only_empty_fields() {
        let mut data = serde_json::Map::new();
        data.insert(
            "INSTRUMENT_NUMBER".into(),
            Value::String("2023045678".into()),
        );
        data.insert("BOOK".into(), Value::String("  ".into()));

        // A value the model supplied survives a competing pattern hit.
        overlay_field(&mut data, "INSTRUMENT_NUMBER", Some("999888".into()));
        assert_eq!(take_string(&data, "INSTRUMENT_NUMBER"), "2023045678");

        // Whitespace-only counts as empty and gets filled.
        overlay_field(&mut data, "BOOK", Some("123".into()));
        assert_eq!(take_string(&data, "BOOK"), "123");

        // Missing key gets filled; no pattern hit leaves it alone.
        overlay_field(&mut data, "RECORDING_DATE", Some("01/02/2023".into()));
        assert_eq!(take_string(&data, "RECORDING_DATE"), "01/02/2023");
        overlay_field(&mut data, "PAGENO", None);
        assert_eq!(take_string(&data, "PAGENO"), "");
    }

    #[test]
    fn csv_columns_match_schema() {
        let root = temp_root("csv");
        let record = ExtractedRecord {
            document_type: "DEED".into(),
            grantor: "SMITH JOHN".into(),
            grantee: "DOE JANE".into(),
            instrument_number: "2023045678".into(),
            recording_date: Some("15/03/2023".into()),
            dated_date: None,
            consideration_amount: Some(450000.0),
            book: "123".into(),
            pageno: "456".into(),
            legal_description: "LOT 4 BLOCK 12".into(),
            source_file: "DEED_2023045678.pdf".into(),
            folder_name: "FN100".into(),
        };
        let csv_path = root.join("out.csv");
        write_csv(&csv_path, &[record]).unwrap();
        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "DOCUMENT_TYPE,GRANTOR,GRANTEE,INSTRUMENT_NUMBER,RECORDING_DATE,DATED_DATE,\
             CONSIDERATION_AMOUNT,BOOK,PAGENO,LEGAL_DESCRIPTION,SOURCE_FILE,FOLDER_NAME"
        );
    }
}
