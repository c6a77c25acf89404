//! PDF rasterization and OCR image preparation.
//!
//! Pages are rendered through a dynamically linked Pdfium at 200 DPI.
//! Documents carrying a real embedded text layer skip OCR entirely; scanned
//! documents get a preprocessing pass (upscale, denoise, binarize) that the
//! printed-text OCR backend expects.

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use pdfium_render::prelude::*;
use tracing::{debug, info};

const RENDER_DPI: f32 = 200.0;

/// Embedded text shorter than this per page is treated as absent (stamps and
/// metadata artifacts, not a usable text layer).
const MIN_EMBEDDED_CHARS: usize = 200;

/// Bind to a Pdfium library, preferring a bundled copy next to the binary.
pub fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .context("failed to load the Pdfium library")?;
    Ok(Pdfium::new(bindings))
}

/// Render every page of `path` to an image at 200 DPI.
pub fn render_pages(pdfium: &Pdfium, path: &Path) -> Result<Vec<DynamicImage>> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut images = Vec::new();
    for page in document.pages().iter() {
        let width_px = (page.width().value / 72.0 * RENDER_DPI) as i32;
        let height_px = (page.height().value / 72.0 * RENDER_DPI) as i32;
        let config = PdfRenderConfig::new()
            .set_target_width(width_px)
            .set_maximum_height(height_px);
        let rendered = page
            .render_with_config(&config)
            .context("page render failed")?;
        images.push(rendered.as_image());
    }
    debug!("Rendered {} pages from {}", images.len(), path.display());
    Ok(images)
}

/// Pull the embedded text layer, if the document has a substantial one.
///
/// Returns per-page text when every page carries enough characters to be a
/// real text layer, `None` otherwise (scanned documents go to OCR).
pub fn embedded_page_text(path: &Path) -> Option<Vec<String>> {
    let document = lopdf::Document::load(path).ok()?;
    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return None;
    }

    let mut pages = Vec::with_capacity(page_count as usize);
    for page_num in 1..=page_count {
        let text = document.extract_text(&[page_num]).ok()?;
        if text.trim().len() < MIN_EMBEDDED_CHARS {
            return None;
        }
        pages.push(text);
    }
    info!(
        "Using embedded text layer from {} ({page_count} pages)",
        path.display()
    );
    Some(pages)
}

/// Prepare a rendered page for printed-text OCR: grayscale, 1.5x cubic
/// upscale, light Gaussian blur, then Otsu binarization.
pub fn preprocess_for_ocr(page: &DynamicImage) -> GrayImage {
    let gray = page.to_luma8();
    let (width, height) = gray.dimensions();
    let upscaled = image::imageops::resize(
        &gray,
        width * 3 / 2,
        height * 3 / 2,
        FilterType::CatmullRom,
    );
    let blurred = image::imageops::blur(&upscaled, 1.1);
    binarize(&blurred, otsu_threshold(&blurred))
}

/// Otsu's method: pick the threshold that maximizes the between-class
/// variance of the intensity histogram.
fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }

    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;

    for level in 0..256usize {
        background_count += histogram[level];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }
        background_sum += level as f64 * histogram[level] as f64;

        let mean_background = background_sum / background_count as f64;
        let mean_foreground = (weighted_sum - background_sum) / foreground_count as f64;
        let variance = background_count as f64
            * foreground_count as f64
            * (mean_background - mean_foreground).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = level as u8;
        }
    }
    best_threshold
}

fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    out
}

/// Encode a prepared page as PNG bytes for the OCR sidecars.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .context("failed to encode page as PNG")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn bimodal_image() -> GrayImage {
        // left half dark ink, right half bright paper
        GrayImage::from_fn(100, 10, |x, _| {
            if x < 50 {
                Luma([40u8])
            } else {
                Luma([210u8])
            }
        })
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let threshold = otsu_threshold(&bimodal_image());
        assert!(threshold >= 40 && threshold < 210, "got {threshold}");
    }

    #[test]
    fn binarize_is_two_valued() {
        let out = binarize(&bimodal_image(), 128);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(99, 0).0[0], 255);
    }

    #[test]
    fn preprocess_upscales_by_half() {
        let page = DynamicImage::ImageLuma8(bimodal_image());
        let out = preprocess_for_ocr(&page);
        assert_eq!(out.dimensions(), (150, 15));
    }

    #[test]
    fn encode_png_produces_png_magic() {
        let bytes = encode_png(&bimodal_image()).unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
