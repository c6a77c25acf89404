//! Runtime settings loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Fallback portal URL when a request does not carry one.
pub const DEFAULT_SITE_URL: &str = "https://bclrs.co.bergen.nj.us/browserview/";

/// Everything the server reads from the environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub default_site_url: String,
    /// Root under which per-site/per-file-number download folders live.
    pub output_root: PathBuf,
    pub chrome_path: Option<String>,
    pub headless: bool,
    /// Printed-text OCR sidecar (tesseract-style, multipart PNG in, text out).
    pub printed_ocr_url: String,
    /// Handwriting OCR sidecar (TrOCR-style, base64 PNG in, text out).
    pub handwriting_ocr_url: String,
    /// Checked lazily: search routes must work without an LLM key.
    pub openai_api_key: Option<String>,
    pub llm_model: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5001".to_string())
            .parse()
            .context("BIND_ADDR is not a valid socket address")?;

        let output_root = std::env::var("OUTPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Ok(Self {
            bind_addr,
            default_site_url: std::env::var("SITE_URL")
                .unwrap_or_else(|_| DEFAULT_SITE_URL.to_string()),
            output_root,
            chrome_path: std::env::var("CHROME_PATH").ok(),
            headless: std::env::var("HEADLESS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            printed_ocr_url: std::env::var("PRINTED_OCR_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            handwriting_ocr_url: std::env::var("HANDWRITING_OCR_URL")
                .unwrap_or_else(|_| "http://localhost:3003".to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
        })
    }
}
