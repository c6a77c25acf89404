//! Error types for the browser automation layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("JavaScript error: {0}")]
    Js(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out waiting for: {0}")]
    Timeout(String),

    #[error("Search form never became available (tab switch failed after retries)")]
    FormUnavailable,

    #[error("Township not found in dropdown: {town}. Available (first 10): {available:?}")]
    TownNotFound { town: String, available: Vec<String> },

    #[error("PDF download timed out in {0}")]
    DownloadTimeout(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
