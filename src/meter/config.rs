//! Meter configuration loaded from config.json.
//!
//! Describes where the source image comes from, which pixel rectangles hold
//! the digit wheels and analog gauges, and how strictly a new reading is
//! checked against the last accepted one.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A rectangle in absolute pixel coordinates of the source image.
///
/// Width or height of zero (or less) marks the region as unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// X position of top-left corner
    pub x: i32,
    /// Y position of top-left corner
    pub y: i32,
    /// Width in pixels
    #[serde(default)]
    pub width: i32,
    /// Height in pixels
    #[serde(default)]
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// True if the region has a positive area and can be cropped.
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// An analog needle dial, decoded to a single fractional digit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaugeRegion {
    /// Stable name used for debug artifacts (e.g. "0.1")
    pub key: String,
    #[serde(flatten)]
    pub region: Region,
}

/// Image conditioning flags applied to a digit composite before OCR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conditioning {
    pub decolorize: bool,
    pub postprocess: bool,
    pub invert: bool,
}

/// Complete meter configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterConfig {
    /// Local file path or http(s) URL of the meter photograph
    pub source_image: String,
    /// Clockwise rotation applied after loading (0, 90, 180 or 270)
    #[serde(default)]
    pub source_image_rotate: u32,
    /// Integer digit wheels, left to right
    #[serde(default)]
    pub digital_digits: Vec<Region>,
    /// Digit wheels after the decimal point, left to right
    #[serde(default)]
    pub post_decimal_digits: Option<Vec<Region>>,
    /// Analog dials after the decimal point, most significant first
    #[serde(default)]
    pub analog_gauges: Option<Vec<GaugeRegion>>,
    /// Added to every readout
    #[serde(default)]
    pub offset_value: f64,
    /// Maximum accepted increase since the last value
    #[serde(default)]
    pub max_threshold: f64,
    /// Maximum accepted decrease since the last value
    #[serde(default)]
    pub max_threshold_backtracking: f64,
    /// Fully desaturate the digit composite
    #[serde(default)]
    pub digit_decolorization: bool,
    /// Negate the digit composite (light digits on dark wheels)
    #[serde(default)]
    pub digital_digits_inversion: bool,
    /// Contrast enhancement and histogram equalization
    #[serde(default = "default_postprocessing")]
    pub postprocessing: bool,
    /// Explicit tesseract executable, otherwise searched on PATH
    #[serde(default)]
    pub tesseract_path: Option<String>,
    /// Explicit tessdata directory
    #[serde(default)]
    pub tessdata_dir: Option<String>,
}

fn default_postprocessing() -> bool {
    true
}

impl MeterConfig {
    /// Loads and validates the configuration file.
    pub fn load(config_path: &Path) -> Result<Self> {
        crate::log(&format!("Loading config from: {}", config_path.display()));

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let config = Self::from_json(&contents)?;

        crate::log(&format!(
            "Config loaded: {} digits, {} post-decimal digits, {} gauges",
            config.digital_digits.len(),
            config.post_decimal_regions().len(),
            config.gauge_regions().len()
        ));

        Ok(config)
    }

    /// Parses and validates a configuration document.
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that can never produce a reading.
    pub fn validate(&self) -> Result<()> {
        if self.digital_digits.is_empty() && self.gauge_regions().is_empty() {
            return Err(anyhow!(
                "Invalid config: neither digitalDigits nor analogGauges are configured"
            ));
        }
        if !matches!(self.source_image_rotate, 0 | 90 | 180 | 270) {
            return Err(anyhow!(
                "Invalid config: sourceImageRotate must be 0, 90, 180 or 270 (got {})",
                self.source_image_rotate
            ));
        }
        Ok(())
    }

    /// Post-decimal digit regions, empty if not configured.
    pub fn post_decimal_regions(&self) -> &[Region] {
        self.post_decimal_digits.as_deref().unwrap_or(&[])
    }

    /// Analog gauge regions, empty if not configured.
    pub fn gauge_regions(&self) -> &[GaugeRegion] {
        self.analog_gauges.as_deref().unwrap_or(&[])
    }

    pub fn has_post_decimal_digits(&self) -> bool {
        !self.post_decimal_regions().is_empty()
    }

    pub fn has_analog_gauges(&self) -> bool {
        !self.gauge_regions().is_empty()
    }

    pub fn conditioning(&self) -> Conditioning {
        Conditioning {
            decolorize: self.digit_decolorization,
            postprocess: self.postprocessing,
            invert: self.digital_digits_inversion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "sourceImage": "meter.jpg",
        "digitalDigits": [
            {"x": 10, "y": 20, "width": 30, "height": 40},
            {"x": 45, "y": 20, "width": 30, "height": 40}
        ],
        "maxThreshold": 5
    }"#;

    #[test]
    fn test_defaults() {
        let config = MeterConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.digital_digits.len(), 2);
        assert_eq!(config.digital_digits[1], Region::new(45, 20, 30, 40));
        assert!(config.postprocessing);
        assert!(!config.digit_decolorization);
        assert!(!config.digital_digits_inversion);
        assert_eq!(config.offset_value, 0.0);
        assert_eq!(config.max_threshold, 5.0);
        assert_eq!(config.max_threshold_backtracking, 0.0);
        assert!(!config.has_post_decimal_digits());
        assert!(!config.has_analog_gauges());
    }

    #[test]
    fn test_tesseract_locations() {
        let config = MeterConfig::from_json(
            r#"{
                "sourceImage": "meter.jpg",
                "digitalDigits": [{"x": 0, "y": 0, "width": 10, "height": 10}],
                "tesseractPath": "/opt/tesseract/bin/tesseract",
                "tessdataDir": "/opt/tesseract/share/tessdata"
            }"#,
        )
        .unwrap();

        assert_eq!(config.tesseract_path.as_deref(), Some("/opt/tesseract/bin/tesseract"));
        assert_eq!(config.tessdata_dir.as_deref(), Some("/opt/tesseract/share/tessdata"));
        assert!(MeterConfig::from_json(MINIMAL).unwrap().tessdata_dir.is_none());
    }

    #[test]
    fn test_gauges_and_post_decimal() {
        let json = r#"{
            "sourceImage": "http://camera.local/snapshot.jpg",
            "sourceImageRotate": 90,
            "digitalDigits": [{"x": 0, "y": 0, "width": 10, "height": 10}],
            "postDecimalDigits": [{"x": 20, "y": 0, "width": 10, "height": 10}],
            "analogGauges": [
                {"key": "0.01", "x": 100, "y": 100, "width": 50, "height": 50},
                {"key": "0.001", "x": 200, "y": 100, "width": 50, "height": 50}
            ],
            "offsetValue": 12.5,
            "postprocessing": false,
            "digitalDigitsInversion": true
        }"#;
        let config = MeterConfig::from_json(json).unwrap();

        assert!(config.has_post_decimal_digits());
        assert_eq!(config.gauge_regions()[1].key, "0.001");
        assert_eq!(config.gauge_regions()[1].region, Region::new(200, 100, 50, 50));
        assert_eq!(config.offset_value, 12.5);
        assert_eq!(
            config.conditioning(),
            Conditioning { decolorize: false, postprocess: false, invert: true }
        );
    }

    #[test]
    fn test_rejects_config_without_regions() {
        let json = r#"{"sourceImage": "meter.jpg", "analogGauges": []}"#;
        let err = MeterConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("neither digitalDigits nor analogGauges"));
    }

    #[test]
    fn test_gauges_only_is_valid() {
        let json = r#"{
            "sourceImage": "meter.jpg",
            "analogGauges": [{"key": "a", "x": 0, "y": 0, "width": 5, "height": 5}]
        }"#;
        assert!(MeterConfig::from_json(json).is_ok());
    }

    #[test]
    fn test_rejects_odd_rotation() {
        let json = r#"{
            "sourceImage": "meter.jpg",
            "sourceImageRotate": 45,
            "digitalDigits": [{"x": 0, "y": 0, "width": 10, "height": 10}]
        }"#;
        assert!(MeterConfig::from_json(json).is_err());
    }

    #[test]
    fn test_region_usability() {
        assert!(Region::new(0, 0, 1, 1).is_usable());
        assert!(!Region::new(0, 0, 0, 10).is_usable());
        assert!(!Region::new(0, 0, 10, -1).is_usable());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = MeterConfig::load(&path).unwrap();
        assert_eq!(config.source_image, "meter.jpg");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(MeterConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
