//! Browser session manager.
//!
//! Owns one Chrome instance bound to a download directory. PDFs download
//! straight into that directory with no prompt and no external viewer, and
//! every native JavaScript dialog is auto-accepted (with its text logged) so
//! the portal can never block the workflow on a modal alert.
//!
//! A session must be closed exactly once, on every path; callers run the
//! whole workflow, capture its result, close, and only then propagate.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Result, ScrapeError};

/// Chrome flags the portal workflow depends on. `disable-print-preview`
/// keeps the native print dialog from ever rendering.
const CHROME_ARGS: &[&str] = &[
    "disable-print-preview",
    "no-default-browser-check",
    "disable-prompt-on-repost",
    "mute-audio",
];

pub struct Session {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    dialog_task: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Launch Chrome with downloads routed to `download_dir`.
    pub async fn launch(settings: &Settings, download_dir: &Path) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if settings.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }
        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(ref path) = settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        builder = builder.viewport(Viewport {
            width: 1920,
            height: 1080,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let config = builder.build().map_err(ScrapeError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;

        // Route downloads into the per-request directory, no prompt.
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().to_string())
            .build()
            .map_err(ScrapeError::Launch)?;
        page.execute(behavior).await?;

        // Auto-accept every native dialog; the portal raises plain alerts
        // after some searches and they must not stall the workflow.
        let mut dialogs = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let dialog_page = page.clone();
        let dialog_task = tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                info!("Alert dismissed: {}", event.message);
                let _ = dialog_page
                    .execute(HandleJavaScriptDialogParams::new(true))
                    .await;
            }
        });

        info!(
            "Browser session started (downloads -> {})",
            download_dir.display()
        );

        Ok(Self {
            browser,
            page,
            handler_task,
            dialog_task,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate the session's page and wait for the load to finish.
    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {url}");
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
        Ok(())
    }

    /// Run a script for its side effects.
    pub async fn eval(&self, js: &str) -> Result<()> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| ScrapeError::Js(e.to_string()))?;
        Ok(())
    }

    /// Run a script and deserialize its return value.
    pub async fn eval_value<T: DeserializeOwned>(&self, js: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| ScrapeError::Js(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| ScrapeError::Js(e.to_string()))
    }

    /// All pages (tabs/windows) currently open in this browser.
    pub async fn all_pages(&self) -> Result<Vec<Page>> {
        Ok(self.browser.pages().await?)
    }

    /// Tear down the browser process. Must be called exactly once; a leaked
    /// session leaks a live Chrome process.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser wait failed: {e}");
        }
        self.dialog_task.abort();
        self.handler_task.abort();
        info!("Browser session closed");
    }
}

/// Embed a Rust string as a JS string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
