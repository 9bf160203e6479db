//! Debug artifacts: region overlays and intermediate composites.
//!
//! Draws every configured region onto the source image so misplaced crops
//! are easy to spot, and writes the images the recognizers actually saw.

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::meter::config::{MeterConfig, Region};
use crate::ocr::RgbaImage;

/// Color constants for region overlays.
pub const COLOR_DIGIT_REGION: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green
pub const COLOR_POST_DECIMAL_REGION: Rgba<u8> = Rgba([0, 0, 255, 255]); // Blue
pub const COLOR_GAUGE_REGION: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red

const OUTLINE_THICKNESS: u32 = 2;

/// Renders all configured regions onto a copy of the source image.
pub fn render_regions(source: &RgbaImage, config: &MeterConfig) -> RgbaImage {
    let mut img = source.clone();

    for region in &config.digital_digits {
        draw_region(&mut img, region, COLOR_DIGIT_REGION);
    }
    for region in config.post_decimal_regions() {
        draw_region(&mut img, region, COLOR_POST_DECIMAL_REGION);
    }
    for gauge in config.gauge_regions() {
        draw_region(&mut img, &gauge.region, COLOR_GAUGE_REGION);
    }

    img
}

fn draw_region(img: &mut RgbaImage, region: &Region, color: Rgba<u8>) {
    if !region.is_usable() || region.x < 0 || region.y < 0 {
        return;
    }
    draw_rect(
        img,
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
        color,
        OUTLINE_THICKNESS,
    );
}

/// Draws a rectangle border on an image.
pub fn draw_rect(
    img: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    thickness: u32,
) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for d in 0..thickness.min(w).min(h) {
        // Top and bottom edges
        for dx in 0..w {
            put(x + dx, y + d);
            put(x + dx, y + h - 1 - d);
        }
        // Left and right edges
        for dy in 0..h {
            put(x + d, y + dy);
            put(x + w - 1 - d, y + dy);
        }
    }
}

/// Makes an image name safe to use as a file name.
///
/// Gauge keys come straight from the configuration, so anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches('.').is_empty() {
        format!("_{}", stem)
    } else {
        stem
    }
}

/// Writes the overlay and every intermediate image into `dir`.
///
/// Returns the written paths. The overlay is `input_debug.jpg`, each
/// intermediate image is `<name>.png` with the name passed through
/// [`file_stem`].
pub fn write_debug_images(
    dir: &Path,
    source: &RgbaImage,
    config: &MeterConfig,
    images: &BTreeMap<String, RgbaImage>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(images.len() + 1);

    let overlay_path = dir.join("input_debug.jpg");
    DynamicImage::ImageRgba8(render_regions(source, config))
        .to_rgb8()
        .save(&overlay_path)
        .with_context(|| format!("Failed to write {}", overlay_path.display()))?;
    written.push(overlay_path);

    for (name, img) in images {
        let path = dir.join(format!("{}.png", file_stem(name)));
        img.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    crate::log(&format!("Wrote {} debug images to {}", written.len(), dir.display()));
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::config::GaugeRegion;
    use image::ImageBuffer;
    use tempfile::tempdir;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn config() -> MeterConfig {
        MeterConfig::from_json(
            r#"{
                "sourceImage": "meter.jpg",
                "digitalDigits": [{"x": 10, "y": 10, "width": 20, "height": 30}],
                "postDecimalDigits": [{"x": 40, "y": 10, "width": 20, "height": 30}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_draw_rect() {
        let mut img = ImageBuffer::from_pixel(100, 100, BLACK);
        draw_rect(&mut img, 10, 10, 50, 30, COLOR_DIGIT_REGION, 2);

        // Check corners are green
        assert_eq!(*img.get_pixel(10, 10), COLOR_DIGIT_REGION);
        assert_eq!(*img.get_pixel(59, 39), COLOR_DIGIT_REGION);
        // Check center is still black
        assert_eq!(*img.get_pixel(35, 25), BLACK);
    }

    #[test]
    fn test_draw_rect_clips_at_edge() {
        let mut img = ImageBuffer::from_pixel(20, 20, BLACK);
        draw_rect(&mut img, 15, 15, 30, 30, COLOR_GAUGE_REGION, 2);
        assert_eq!(*img.get_pixel(15, 19), COLOR_GAUGE_REGION);
    }

    #[test]
    fn test_render_regions_colors() {
        let mut config = config();
        config.analog_gauges = Some(vec![GaugeRegion {
            key: "0.1".to_string(),
            region: Region::new(70, 50, 20, 20),
        }]);
        let source = ImageBuffer::from_pixel(100, 100, BLACK);

        let img = render_regions(&source, &config);

        assert_eq!(*img.get_pixel(10, 10), COLOR_DIGIT_REGION);
        assert_eq!(*img.get_pixel(40, 10), COLOR_POST_DECIMAL_REGION);
        assert_eq!(*img.get_pixel(70, 50), COLOR_GAUGE_REGION);
        // Source is untouched
        assert_eq!(*source.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn test_write_debug_images() {
        let dir = tempdir().unwrap();
        let source = ImageBuffer::from_pixel(100, 100, BLACK);
        let mut images = BTreeMap::new();
        images.insert("digital".to_string(), ImageBuffer::from_pixel(5, 5, BLACK));

        let written = write_debug_images(dir.path(), &source, &config(), &images).unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("input_debug.jpg").exists());
        assert!(dir.path().join("digital.png").exists());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("analog_0.1"), "analog_0.1");
        assert_eq!(file_stem("analog_0/1"), "analog_0_1");
        assert_eq!(file_stem("analog_..\\x y"), "analog_.._x_y");
        assert_eq!(file_stem(".."), "_..");
    }

    #[test]
    fn test_gauge_key_with_separator_is_written() {
        let dir = tempdir().unwrap();
        let source = ImageBuffer::from_pixel(20, 20, BLACK);
        let mut images = BTreeMap::new();
        images.insert("analog_0/1".to_string(), ImageBuffer::from_pixel(5, 5, BLACK));

        let written = write_debug_images(dir.path(), &source, &config(), &images).unwrap();

        assert_eq!(written[1], dir.path().join("analog_0_1.png"));
        assert!(written[1].exists());
    }
}
