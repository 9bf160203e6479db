use image::{GrayImage, ImageBuffer, Luma, Rgba};
use imageproc::contrast;

use crate::meter::config::{Conditioning, Region};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Border added around the digit composite before recognition.
pub const OCR_BORDER_PX: u32 = 10;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Crops a sub-region from an image using absolute pixel coordinates.
///
/// Returns `None` for regions without a positive width and height. The
/// region is clamped to image bounds and the result is an independent copy
/// with its origin at (0, 0).
pub fn crop_region(img: &RgbaImage, region: &Region) -> Option<RgbaImage> {
    if !region.is_usable() {
        return None;
    }

    let (w, h) = img.dimensions();

    let x0 = (region.x.max(0) as u32).min(w);
    let y0 = (region.y.max(0) as u32).min(h);
    let rw = (region.width as u32).min(w - x0);
    let rh = (region.height as u32).min(h - y0);

    Some(image::imageops::crop_imm(img, x0, y0, rw, rh).to_image())
}

/// Crops every usable region, preserving order. Unusable regions are skipped.
pub fn extract_regions(img: &RgbaImage, regions: &[Region]) -> Vec<RgbaImage> {
    regions
        .iter()
        .filter_map(|region| crop_region(img, region))
        .collect()
}

/// Places images side by side, left to right, top-aligned on a white background.
pub fn append_horizontal(parts: &[RgbaImage]) -> RgbaImage {
    let width: u32 = parts.iter().map(|p| p.width()).sum();
    let height = parts.iter().map(|p| p.height()).max().unwrap_or(0);
    let mut output = ImageBuffer::from_pixel(width, height, WHITE);

    let mut x = 0i64;
    for part in parts {
        image::imageops::replace(&mut output, part, x, 0);
        x += part.width() as i64;
    }

    output
}

/// Removes all color, keeping HSL lightness.
pub fn desaturate(img: &mut RgbaImage) {
    for pixel in img.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let max = r.max(g).max(b) as u16;
        let min = r.min(g).min(b) as u16;
        let lightness = ((max + min) / 2) as u8;
        *pixel = Rgba([lightness, lightness, lightness, a]);
    }
}

/// Runs a grayscale operation on each color channel separately. Alpha is kept.
fn map_channels(img: &mut RgbaImage, op: impl Fn(&GrayImage) -> GrayImage) {
    let (w, h) = img.dimensions();
    for channel in 0..3 {
        let plane = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[channel]]));
        let mapped = op(&plane);
        for (pixel, value) in img.pixels_mut().zip(mapped.pixels()) {
            pixel[channel] = value[0];
        }
    }
}

/// Lowest and highest value in a plane, `None` if it is single-valued.
fn value_range(plane: &GrayImage) -> Option<(u8, u8)> {
    let (min, max) = plane
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    (min < max).then_some((min, max))
}

/// Stretches each color channel linearly so it spans the full 0-255 range.
pub fn enhance_contrast(img: &mut RgbaImage) {
    map_channels(img, |plane| match value_range(plane) {
        Some((min, max)) => contrast::stretch_contrast(plane, min, max, 0, 255),
        None => plane.clone(),
    });
}

/// Equalizes the histogram of each color channel independently.
///
/// Single-valued channels have nothing to spread and stay as they are.
pub fn equalize_histogram(img: &mut RgbaImage) {
    map_channels(img, |plane| match value_range(plane) {
        Some(_) => contrast::equalize_histogram(plane),
        None => plane.clone(),
    });
}

/// Surrounds the image with a solid white border.
pub fn add_border(img: &RgbaImage, size: u32) -> RgbaImage {
    let mut output = ImageBuffer::from_pixel(img.width() + 2 * size, img.height() + 2 * size, WHITE);
    image::imageops::replace(&mut output, img, size as i64, size as i64);
    output
}

/// Applies the configured conditioning in fixed order, then adds the OCR border.
///
/// Order: desaturate, contrast + equalize, invert, border.
pub fn condition_for_ocr(mut img: RgbaImage, conditioning: &Conditioning) -> RgbaImage {
    if conditioning.decolorize {
        desaturate(&mut img);
    }
    if conditioning.postprocess {
        enhance_contrast(&mut img);
        equalize_histogram(&mut img);
    }
    if conditioning.invert {
        image::imageops::invert(&mut img);
    }
    add_border(&img, OCR_BORDER_PX)
}
