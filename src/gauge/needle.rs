use anyhow::{anyhow, Result};
use image::Rgba;
use std::f64::consts::TAU;

use super::GaugeDecoder;
use crate::ocr::preprocess::RgbaImage;

const SECTORS: usize = 10;

/// Decodes red-needle dials.
///
/// Needle pixels are binned by their clockwise angle from 12 o'clock around
/// the image centre into ten sectors, weighted by distance from the centre
/// so the needle tip outweighs the hub. The heaviest sector is the digit.
pub struct NeedleDecoder {
    /// Minimum red channel for a needle pixel
    pub min_red: u8,
    /// Red must exceed green and blue by this factor
    pub dominance: f32,
}

impl Default for NeedleDecoder {
    fn default() -> Self {
        Self {
            min_red: 100,
            dominance: 1.5,
        }
    }
}

impl NeedleDecoder {
    fn is_needle_pixel(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        let r_f = r as f32;
        r >= self.min_red && r_f > g as f32 * self.dominance && r_f > b as f32 * self.dominance
    }

    /// Accumulated needle weight per sector, sector 0 starting at 12 o'clock.
    pub fn sector_weights(&self, gauge: &RgbaImage) -> [f64; SECTORS] {
        let cx = (gauge.width() as f64 - 1.0) / 2.0;
        let cy = (gauge.height() as f64 - 1.0) / 2.0;
        let mut weights = [0.0; SECTORS];

        for (x, y, pixel) in gauge.enumerate_pixels() {
            if !self.is_needle_pixel(pixel) {
                continue;
            }
            let dx = x as f64 - cx;
            let dy = cy - y as f64;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance == 0.0 {
                continue;
            }

            let angle = dx.atan2(dy).rem_euclid(TAU);
            let sector = ((angle / TAU * SECTORS as f64) as usize).min(SECTORS - 1);
            weights[sector] += distance;
        }

        weights
    }
}

impl GaugeDecoder for NeedleDecoder {
    fn decode(&self, gauge: &RgbaImage) -> Result<String> {
        let weights = self.sector_weights(gauge);

        let (digit, weight) = weights
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, w)| if w > best.1 { (i, w) } else { best });

        if weight == 0.0 {
            return Err(anyhow!(
                "No needle pixels found in {}x{} gauge image",
                gauge.width(),
                gauge.height()
            ));
        }

        Ok(digit.to_string())
    }
}
