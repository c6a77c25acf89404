//! Result-set harvesting: walk the result grid row by row, trigger each
//! document's PDF generation, and capture the download under a stable name.
//!
//! Row handles go stale whenever the grid re-renders, so the action controls
//! are re-queried on every iteration and rows are addressed purely by index.
//! A failed row is logged and skipped; it never fails the batch.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::browser::Session;
use crate::error::Result;
use crate::paths::{pdf_snapshot, sanitize_filename, unique_pdf_path, wait_for_new_pdf};
use crate::wait::{self, WaitPolicy, DOWNLOAD_WAIT, METADATA_WAIT, MODAL_WAIT};

/// One captured document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CaptureRecord {
    pub index: usize,
    #[serde(rename = "Type")]
    pub doc_type: String,
    #[serde(rename = "Instrument No")]
    pub instrument: String,
    pub pdf_file: String,
}

const ROW_BUTTONS_JS: &str = r#"(() => {
    let btns = Array.from(document.querySelectorAll("button[ng-click*='fetchDocument']"));
    if (btns.length === 0) {
        btns = Array.from(document.querySelectorAll('button'))
            .filter(b => b.innerText.trim() === 'View');
    }
    return btns.length;
})()"#;

/// Cheap, side-effect-free check for actionable results: no "no records"
/// marker and at least one row action control.
pub async fn records_exist(session: &Session) -> Result<bool> {
    session
        .eval_value(
            r#"(() => {
                const text = document.body ? document.body.innerText : '';
                if (text.includes('No records found')) return false;
                let btns = document.querySelectorAll("button[ng-click*='fetchDocument']");
                if (btns.length === 0) {
                    btns = Array.from(document.querySelectorAll('button'))
                        .filter(b => b.innerText.trim() === 'View');
                }
                return btns.length > 0;
            })()"#,
        )
        .await
}

async fn no_records_marker(session: &Session) -> Result<bool> {
    session
        .eval_value(
            r#"(() => {
                const text = document.body ? document.body.innerText : '';
                return text.includes('No records found');
            })()"#,
        )
        .await
}

async fn row_count(session: &Session) -> Result<usize> {
    let count: u32 = session.eval_value(ROW_BUTTONS_JS).await?;
    Ok(count as usize)
}

/// Re-query the current row controls and click the one at `index`.
async fn activate_row(session: &Session, index: usize) -> Result<bool> {
    let script = format!(
        r#"(() => {{
            let btns = Array.from(document.querySelectorAll("button[ng-click*='fetchDocument']"));
            if (btns.length === 0) {{
                btns = Array.from(document.querySelectorAll('button'))
                    .filter(b => b.innerText.trim() === 'View');
            }}
            if ({index} >= btns.length) return false;
            btns[{index}].click();
            return true;
        }})()"#
    );
    session.eval_value(&script).await
}

#[derive(Debug, Deserialize)]
struct RowMetadata {
    #[serde(default)]
    doc_type: String,
    #[serde(default)]
    instrument: String,
}

/// Read Type and Instrument Number from the open details view, polling
/// briefly — the view renders asynchronously after the row activation.
async fn row_metadata(session: &Session) -> RowMetadata {
    let probe = || async move {
        let raw: String = session
            .eval_value(
                r#"(() => {
                    const grab = (xpath) => {
                        const node = document.evaluate(xpath, document, null,
                            XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
                        return node ? node.innerText.trim() : '';
                    };
                    return JSON.stringify({
                        doc_type: grab("//td[text()='Type:']/following-sibling::td"),
                        instrument: grab("//td[contains(text(),'Instrument')]/following-sibling::td")
                    });
                })()"#,
            )
            .await?;
        let meta: RowMetadata = serde_json::from_str(&raw).unwrap_or(RowMetadata {
            doc_type: String::new(),
            instrument: String::new(),
        });
        let complete = !meta.doc_type.is_empty() && !meta.instrument.is_empty();
        Ok(complete.then_some(meta))
    };

    match wait::wait_until(METADATA_WAIT, "row metadata", probe).await {
        Ok(meta) => meta,
        // Partial metadata is still usable; take whatever the last probe saw.
        Err(_) => {
            let raw: std::result::Result<String, _> = session
                .eval_value(
                    r#"(() => {
                        const grab = (xpath) => {
                            const node = document.evaluate(xpath, document, null,
                                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
                            return node ? node.innerText.trim() : '';
                        };
                        return JSON.stringify({
                            doc_type: grab("//td[text()='Type:']/following-sibling::td"),
                            instrument: grab("//td[contains(text(),'Instrument')]/following-sibling::td")
                        });
                    })()"#,
                )
                .await;
            raw.ok()
                .and_then(|r| serde_json::from_str(&r).ok())
                .unwrap_or(RowMetadata {
                    doc_type: String::new(),
                    instrument: String::new(),
                })
        }
    }
}

/// Filename base for a row: `{Type}_{Instrument}` when both are present,
/// whichever exists otherwise, and a synthetic `Document_{index}_{timestamp}`
/// when the metadata is entirely unavailable — a row is never silently
/// dropped for want of a name.
pub fn derive_base_name(doc_type: &str, instrument: &str, index: usize) -> String {
    let doc_type = doc_type.trim();
    let instrument = instrument.trim();
    if !doc_type.is_empty() && !instrument.is_empty() {
        return sanitize_filename(&format!("{doc_type}_{instrument}"));
    }
    let combined = format!("{doc_type}{instrument}");
    let combined = combined.trim();
    if !combined.is_empty() {
        return sanitize_filename(combined);
    }
    let ts = chrono::Utc::now().timestamp();
    format!("Document_{index}_{ts}")
}

/// Click "PDF / Print All Pages" for the open document.
async fn trigger_pdf_generation(session: &Session) -> Result<()> {
    let policy = WaitPolicy::new(
        std::time::Duration::from_secs(10),
        std::time::Duration::from_millis(250),
    );
    wait::wait_until(policy, "PDF / Print All Pages button", || async move {
        let clicked: bool = session
            .eval_value(
                r#"(() => {
                    const btn = Array.from(document.querySelectorAll('button'))
                        .find(b => b.innerText.includes('PDF / Print All Pages')
                                && b.offsetWidth > 0 && !b.disabled);
                    if (!btn) return false;
                    btn.click();
                    return true;
                })()"#,
            )
            .await?;
        Ok(clicked.then_some(()))
    })
    .await
}

/// Dismiss the "Large Document" notice (shown for e.g. >40-page documents).
async fn dismiss_large_document_modal(session: &Session) {
    let found = wait::wait_until(MODAL_WAIT, "large document modal", || async move {
        let clicked: bool = session
            .eval_value(
                r#"(() => {
                    const ok = document.querySelector("button[ng-click='modal_ok()']");
                    if (!ok || ok.offsetWidth === 0) return false;
                    ok.click();
                    return true;
                })()"#,
            )
            .await?;
        Ok(clicked.then_some(()))
    })
    .await;
    if found.is_ok() {
        info!("Large Document modal detected and dismissed");
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}

/// Wait for the generated document's blob link to become interactable and
/// click it. Generation of large documents can take over half a minute.
async fn click_blob_link(session: &Session) -> Result<()> {
    wait::wait_until(DOWNLOAD_WAIT, "blob download link", || async move {
        let clicked: bool = session
            .eval_value(
                r#"(() => {
                    const link = Array.from(document.querySelectorAll("a[href^='blob:']"))
                        .find(a => a.offsetWidth > 0);
                    if (!link) return false;
                    link.click();
                    return true;
                })()"#,
            )
            .await?;
        Ok(clicked.then_some(()))
    })
    .await
}

/// Capture every result row's PDF into `download_dir`.
pub async fn harvest(session: &Session, download_dir: &Path) -> Result<Vec<CaptureRecord>> {
    let mut results = Vec::new();

    if no_records_marker(session).await? {
        info!("No records found; skipping downloads");
        return Ok(results);
    }

    let total = row_count(session).await?;
    if total == 0 {
        info!("No result rows found");
        return Ok(results);
    }
    info!("Found {total} documents to download");

    for index in 0..total {
        match capture_row(session, download_dir, index).await {
            Ok(Some(record)) => results.push(record),
            Ok(None) => break, // grid shrank under us
            Err(e) => {
                warn!("Error processing record {index}: {e}");
                continue;
            }
        }
    }

    Ok(results)
}

async fn capture_row(
    session: &Session,
    download_dir: &Path,
    index: usize,
) -> Result<Option<CaptureRecord>> {
    info!("Processing document {}...", index + 1);
    if !activate_row(session, index).await? {
        return Ok(None);
    }
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let meta = row_metadata(session).await;
    let base_name = derive_base_name(&meta.doc_type, &meta.instrument, index);

    trigger_pdf_generation(session).await?;
    debug!("Clicked 'PDF / Print All Pages', waiting for generation...");
    dismiss_large_document_modal(session).await;

    // Snapshot as late as possible so the post-download diff is narrow.
    let snapshot = pdf_snapshot(download_dir)?;
    click_blob_link(session).await?;

    let downloaded: PathBuf = wait_for_new_pdf(download_dir, &snapshot, DOWNLOAD_WAIT).await?;
    let final_path = unique_pdf_path(download_dir, &base_name);
    std::fs::rename(&downloaded, &final_path)?;

    let pdf_file = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| base_name.clone());
    info!("Downloaded and renamed: {pdf_file}");

    Ok(Some(CaptureRecord {
        index: index + 1,
        doc_type: meta.doc_type,
        instrument: meta.instrument,
        pdf_file,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_combines_type_and_instrument() {
        assert_eq!(derive_base_name("DEED", "12345", 0), "DEED_12345");
        assert_eq!(derive_base_name("DEED W/S", "1 2", 0), "DEED_W_S_1_2");
    }

    #[test]
    fn base_name_uses_whichever_part_exists() {
        assert_eq!(derive_base_name("DEED", "", 0), "DEED");
        assert_eq!(derive_base_name("", "12345", 0), "12345");
    }

    #[test]
    fn base_name_falls_back_to_synthetic() {
        let name = derive_base_name("", "  ", 7);
        assert!(name.starts_with("Document_7_"), "got {name}");
    }
}
