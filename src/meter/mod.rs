//! The reading pipeline.
//!
//! This module provides:
//! - Meter configuration (regions, thresholds, conditioning flags)
//! - Fusion of digit wheels and analog gauges into one decimal candidate
//! - Plausibility validation against the last accepted value
//! - Per-reading diagnostics

pub mod assemble;
pub mod config;
pub mod diagnostics;
pub mod validator;

pub use config::MeterConfig;
pub use diagnostics::Diagnostics;
pub use validator::{DriftLimits, Verdict};

use anyhow::Result;
use std::collections::BTreeMap;

use crate::gauge::{read_gauges, GaugeDecoder};
use crate::ocr::{read_digit_group, RgbaImage, TextRecognizer};
use assemble::assemble_candidate;
use validator::validate;

/// Debug artifact names for the two digit groups.
pub const DIGITAL_GROUP: &str = "digital";
pub const POST_DECIMAL_GROUP: &str = "post_decimal";

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct Reading {
    /// Accepted reading, or the last value if the candidate was rejected
    pub readout: f64,
    pub offset: f64,
    /// `readout + offset`
    pub value: f64,
    pub verdict: Verdict,
    pub diagnostics: Diagnostics,
    /// Some digit group fell back to the last value or left a diagnostic
    pub degraded: bool,
    /// Intermediate images keyed by stable name, only filled in debug mode
    pub debug_images: BTreeMap<String, RgbaImage>,
}

impl Reading {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Only a trusted reading may replace the cached value.
    pub fn is_trusted(&self) -> bool {
        self.verdict.is_accepted() && !self.degraded && !self.has_errors()
    }
}

/// Reads one meter image with the given OCR engine and gauge decoder.
pub struct MeterReader<'a> {
    config: &'a MeterConfig,
    recognizer: &'a dyn TextRecognizer,
    decoder: &'a dyn GaugeDecoder,
    debug: bool,
}

impl<'a> MeterReader<'a> {
    pub fn new(
        config: &'a MeterConfig,
        recognizer: &'a dyn TextRecognizer,
        decoder: &'a dyn GaugeDecoder,
    ) -> Self {
        Self {
            config,
            recognizer,
            decoder,
            debug: false,
        }
    }

    /// Keep intermediate composites in the returned reading.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Runs the full pipeline: digit groups, gauges, assembly, validation.
    ///
    /// OCR problems are absorbed into the diagnostics and mark the reading
    /// degraded. Only a gauge decoder fault is returned as an error.
    pub fn compute_reading(&self, source: &RgbaImage, last_value: f64) -> Result<Reading> {
        let config = self.config;
        let conditioning = config.conditioning();
        let mut diagnostics = Diagnostics::new();
        let mut debug_images = BTreeMap::new();
        let mut fell_back = false;

        let integer = if config.digital_digits.is_empty() {
            "0".to_string()
        } else {
            let group = read_digit_group(
                source,
                &config.digital_digits,
                DIGITAL_GROUP,
                &conditioning,
                self.recognizer,
                last_value,
                &mut diagnostics,
            );
            if self.debug {
                debug_images.insert(DIGITAL_GROUP.to_string(), group.composite);
            }
            fell_back |= group.text.is_fallback();
            group.text.as_str().to_string()
        };

        let post_decimal = if config.has_post_decimal_digits() {
            let group = read_digit_group(
                source,
                config.post_decimal_regions(),
                POST_DECIMAL_GROUP,
                &conditioning,
                self.recognizer,
                last_value,
                &mut diagnostics,
            );
            if self.debug {
                debug_images.insert(format!("{}_digital", POST_DECIMAL_GROUP), group.composite);
            }
            fell_back |= group.text.is_fallback();
            Some(group.text.as_str().to_string())
        } else {
            None
        };

        let gauges = if config.has_analog_gauges() {
            let reading = read_gauges(source, config.gauge_regions(), self.decoder)?;
            if self.debug {
                for (key, image) in reading.images {
                    debug_images.insert(format!("analog_{}", key), image);
                }
            }
            Some(reading.digits)
        } else {
            None
        };

        // Digit problems never raise the error flag, but they still cost trust
        let degraded = fell_back || !diagnostics.is_empty();

        let candidate = assemble_candidate(&integer, post_decimal.as_deref(), gauges.as_deref());
        crate::log(&format!("Candidate reading: {}", candidate));

        let verdict = validate(
            &candidate,
            last_value,
            &DriftLimits::from_config(config),
            &mut diagnostics,
        );

        let readout = if degraded { last_value } else { verdict.value() };
        let offset = config.offset_value;
        if degraded {
            crate::log(&format!("Reading degraded, reporting last value {}", last_value));
        }

        Ok(Reading {
            readout,
            offset,
            value: readout + offset,
            verdict,
            diagnostics,
            degraded,
            debug_images,
        })
    }
}
