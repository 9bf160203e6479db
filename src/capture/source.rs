//! Source image acquisition from a local file or an HTTP camera endpoint.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::time::Duration;

use crate::ocr::preprocess::RgbaImage;

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Returns true if the source should be fetched over HTTP.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads the meter photograph and applies the configured rotation.
pub fn load_source_image(source: &str, rotate: u32) -> Result<RgbaImage> {
    crate::log(&format!("Loading source image: {}", source));

    let img = if is_remote(source) {
        let bytes = fetch_remote(source)?;
        image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image from {}", source))?
    } else {
        image::open(source).with_context(|| format!("Failed to open image: {}", source))?
    };

    let img = rotate_image(img.to_rgba8(), rotate)?;
    crate::log(&format!("Source image: {}x{}", img.width(), img.height()));
    Ok(img)
}

fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()?;

    let response = client
        .get(url)
        .header("User-Agent", "watermeter-reader")
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to fetch {}: HTTP {}", url, response.status()));
    }

    Ok(response.bytes()?.to_vec())
}

/// Rotates clockwise by a multiple of 90 degrees.
pub fn rotate_image(img: RgbaImage, degrees: u32) -> Result<RgbaImage> {
    match degrees {
        0 => Ok(img),
        90 => Ok(image::imageops::rotate90(&img)),
        180 => Ok(image::imageops::rotate180(&img)),
        270 => Ok(image::imageops::rotate270(&img)),
        other => Err(anyhow!("Unsupported rotation: {} degrees", other)),
    }
}

/// Saves a copy of the acquired image. JPEG has no alpha, so it is dropped.
pub fn save_source_image(img: &RgbaImage, path: &Path) -> Result<()> {
    DynamicImage::ImageRgba8(img.clone())
        .to_rgb8()
        .save(path)
        .with_context(|| format!("Failed to save source image: {}", path.display()))
}
