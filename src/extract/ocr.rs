//! OCR sidecar providers.
//!
//! Defines the [`OcrProvider`] trait plus the two backends the extraction
//! pipeline uses: a printed-text engine that takes a preprocessed page over
//! multipart, and a handwriting engine that takes a base64 JSON payload.
//! The handwriting pass is a supplement, run only when the printed pass
//! comes back nearly empty.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// A printed-OCR result under this many characters means the page is most
/// likely handwritten (or blank) and gets the handwriting pass as well.
pub const MIN_PRINTED_CHARS: usize = 50;

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize text in a single prepared page image (PNG bytes).
    async fn recognize(&self, png: &[u8]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SidecarResponse {
    text: String,
}

/// Tesseract sidecar for printed text. Expects the binarized page the
/// preprocessing pass produces.
pub struct PrintedOcr {
    url: String,
    client: reqwest::Client,
}

impl PrintedOcr {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl OcrProvider for PrintedOcr {
    fn name(&self) -> &str {
        "printed"
    }

    async fn recognize(&self, png: &[u8]) -> Result<String> {
        use reqwest::multipart::{Form, Part};

        let part = Part::bytes(png.to_vec())
            .file_name("page.png")
            .mime_str("image/png")?;
        // Engine mode 3 (default LSTM) and page segmentation 6 (uniform
        // block of text) match how recorded documents lay out.
        let form = Form::new()
            .part("file", part)
            .text("oem", "3")
            .text("psm", "6");

        let response = self
            .client
            .post(format!("{}/ocr", self.url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("printed OCR sidecar error ({}): {}", status, error_text);
        }

        let body: SidecarResponse = response.json().await?;
        debug!("Printed OCR returned {} chars", body.text.len());
        Ok(body.text)
    }
}

/// TrOCR-style sidecar for handwritten text.
pub struct HandwritingOcr {
    url: String,
    client: reqwest::Client,
}

impl HandwritingOcr {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl OcrProvider for HandwritingOcr {
    fn name(&self) -> &str {
        "handwriting"
    }

    async fn recognize(&self, png: &[u8]) -> Result<String> {
        let payload = json!({ "image": BASE64.encode(png) });

        let response = self
            .client
            .post(format!("{}/recognize", self.url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("handwriting OCR sidecar error ({}): {}", status, error_text);
        }

        let body: SidecarResponse = response.json().await?;
        debug!("Handwriting OCR returned {} chars", body.text.len());
        Ok(body.text)
    }
}
