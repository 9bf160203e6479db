//! Analog gauge reading.
//!
//! Each configured dial contributes one fractional digit. The decoder is
//! trusted as-is; a decoder fault aborts the whole reading.

pub mod needle;

pub use needle::NeedleDecoder;

use anyhow::{Context, Result};

use crate::meter::config::GaugeRegion;
use crate::ocr::preprocess::{crop_region, RgbaImage};

/// Reads a single dial from an image cropped to that dial.
pub trait GaugeDecoder {
    /// Returns exactly one decimal digit for the needle position.
    fn decode(&self, gauge: &RgbaImage) -> Result<String>;
}

/// Digits read from all gauges plus the crops they were read from.
pub struct GaugeReading {
    pub digits: String,
    pub images: Vec<(String, RgbaImage)>,
}

/// Decodes every configured gauge in order and concatenates the digits.
pub fn read_gauges(
    img: &RgbaImage,
    gauges: &[GaugeRegion],
    decoder: &dyn GaugeDecoder,
) -> Result<GaugeReading> {
    let mut digits = String::new();
    let mut images = Vec::with_capacity(gauges.len());

    for gauge in gauges {
        // Cropped copies already start at (0, 0), so the decoder sees no page offset
        let Some(cropped) = crop_region(img, &gauge.region) else {
            crate::log(&format!("Gauge {}: empty region, skipped", gauge.key));
            continue;
        };

        let digit = decoder
            .decode(&cropped)
            .with_context(|| format!("Failed to decode gauge {}", gauge.key))?;

        crate::log(&format!("Gauge {}: {}", gauge.key, digit));

        digits.push_str(&digit);
        images.push((gauge.key.clone(), cropped));
    }

    Ok(GaugeReading { digits, images })
}
