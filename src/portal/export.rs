//! Index snapshot export: print the results grid itself to a PDF as an
//! audit artifact.
//!
//! The portal's "Print Results" action tries to open the native print
//! dialog, sometimes in a fresh window, and that dialog would block the
//! automation for good. Print is therefore stubbed out in the current page,
//! in any window it opens, and via a new-document script, before the action
//! is triggered; the actual PDF comes from the programmatic print-to-PDF
//! capability. Whatever window gets opened is closed again on every exit
//! path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, PrintToPdfParams,
};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::Page;
use tracing::{info, warn};

use crate::browser::Session;
use crate::error::{Result, ScrapeError};
use crate::paths::sanitize_filename;
use crate::wait::{self, WaitPolicy};

const PRINT_SUPPRESSION_JS: &str = r#"(() => {
    window.print = function() {};
    if (!window.oldOpen) { window.oldOpen = window.open; }
    window.open = function(url, name, features) {
        const newWin = window.oldOpen(url, name, features);
        try {
            if (newWin) {
                newWin.print = function() {};
                Object.defineProperty(newWin, 'print', {
                    value: function() {}, writable: false, configurable: false
                });
            }
        } catch (e) {}
        return newWin;
    };
})()"#;

/// Render the current results grid to `index_{label}.pdf` in `download_dir`.
///
/// Returns `None` when the export fails; the surrounding workflow treats the
/// index as best-effort.
pub async fn export_index(session: &Session, download_dir: &Path, label: &str) -> Option<PathBuf> {
    let safe = sanitize_filename(if label.trim().is_empty() { "results" } else { label });
    let file_path = download_dir.join(format!("index_{safe}.pdf"));

    let before = match open_target_ids(session).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Error in export_index: {e}");
            return None;
        }
    };

    let result = run_export(session, &before, &file_path).await;

    // Release any window the print action opened, success or not.
    if let Err(e) = close_spawned_windows(session, &before).await {
        warn!("Failed to close print window: {e}");
    }

    match result {
        Ok(()) => {
            info!("Saved results PDF: {}", file_path.display());
            Some(file_path)
        }
        Err(e) => {
            warn!("Error in export_index: {e}");
            None
        }
    }
}

async fn run_export(
    session: &Session,
    before: &HashSet<TargetId>,
    file_path: &Path,
) -> Result<()> {
    let page = session.page();

    if let Err(e) = session.eval(PRINT_SUPPRESSION_JS).await {
        warn!("Failed to inject print suppression: {e}");
    }
    // Backup for documents loaded into a fresh window.
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        "window.print = function(){};".to_string(),
    ))
    .await?;

    click_print_results(session).await?;

    // Give the portal time to open a window or rewrite the DOM.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let target = match spawned_window(session, before).await? {
        Some(new_page) => {
            info!("New window detected, printing from it");
            wait_for_ready(&new_page).await;
            let _ = new_page.evaluate("window.print = function(){};").await;
            new_page
        }
        None => {
            info!("No new window detected, printing current window");
            page.clone()
        }
    };

    let params = PrintToPdfParams::builder()
        .print_background(true)
        .landscape(false)
        .paper_width(8.27)
        .paper_height(11.69)
        .margin_top(0.4)
        .margin_bottom(0.4)
        .margin_left(0.4)
        .margin_right(0.4)
        .display_header_footer(false)
        .build();
    let pdf = target.pdf(params).await?;
    std::fs::write(file_path, pdf)?;
    Ok(())
}

async fn click_print_results(session: &Session) -> Result<()> {
    let clicked: bool = session
        .eval_value(
            r#"(() => {
                const btn = document.querySelector("button[ng-click*='exportGridResults']");
                if (btn) {
                    btn.scrollIntoView({block: 'center'});
                    btn.click();
                    return true;
                }
                return false;
            })()"#,
        )
        .await?;
    if clicked {
        return Ok(());
    }

    warn!("Primary Print Results button not found, trying generic text match");
    let fallback: bool = session
        .eval_value(
            r#"(() => {
                const el = Array.from(document.querySelectorAll('*'))
                    .find(e => e.childElementCount === 0
                            && e.innerText && e.innerText.includes('Print Results'));
                if (el) {
                    el.scrollIntoView({block: 'center'});
                    el.click();
                    return true;
                }
                return false;
            })()"#,
        )
        .await?;
    if !fallback {
        return Err(ScrapeError::ElementNotFound("Print Results control".into()));
    }
    Ok(())
}

async fn open_target_ids(session: &Session) -> Result<HashSet<TargetId>> {
    Ok(session
        .all_pages()
        .await?
        .iter()
        .map(|p| p.target_id().clone())
        .collect())
}

async fn spawned_window(session: &Session, before: &HashSet<TargetId>) -> Result<Option<Page>> {
    let pages = session.all_pages().await?;
    Ok(pages
        .into_iter()
        .find(|p| !before.contains(p.target_id())))
}

async fn close_spawned_windows(session: &Session, before: &HashSet<TargetId>) -> Result<()> {
    for page in session.all_pages().await? {
        if !before.contains(page.target_id()) {
            let _ = page.close().await;
        }
    }
    Ok(())
}

async fn wait_for_ready(page: &Page) {
    let policy = WaitPolicy::new(
        std::time::Duration::from_secs(10),
        std::time::Duration::from_millis(250),
    );
    let ready = wait::wait_until(policy, "new window load", || async move {
        let state = page
            .evaluate("document.readyState")
            .await
            .map_err(|e| ScrapeError::Js(e.to_string()))?
            .into_value::<String>()
            .unwrap_or_default();
        Ok((state == "complete").then_some(()))
    })
    .await;
    if ready.is_err() {
        warn!("New window never reported readyState complete");
    }
}
