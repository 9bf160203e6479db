pub mod setup;
pub mod preprocess;
pub mod engine;
pub mod normalize;

pub use engine::{TesseractEngine, TextRecognizer};
pub use normalize::DigitText;
pub use preprocess::RgbaImage;

use crate::meter::config::{Conditioning, Region};
use crate::meter::diagnostics::Diagnostics;
use normalize::{normalize_digits, parse_or_fallback, OCR_ALLOWLIST};
use preprocess::{append_horizontal, condition_for_ocr, extract_regions};

/// Result of reading one group of digit wheels.
pub struct DigitGroupReading {
    pub text: DigitText,
    /// The conditioned composite that was handed to the recognizer
    pub composite: RgbaImage,
}

/// High-level function: source image → digit string for one group of wheels.
///
/// Crops every region, joins them left to right, conditions the composite
/// and runs OCR restricted to digits and look-alike letters. Recognition
/// failures and uninterpretable text are recorded under `group` and replaced
/// by the last known value; neither raises the error flag.
pub fn read_digit_group(
    img: &RgbaImage,
    regions: &[Region],
    group: &str,
    conditioning: &Conditioning,
    recognizer: &dyn TextRecognizer,
    last_value: f64,
    diagnostics: &mut Diagnostics,
) -> DigitGroupReading {
    let parts = extract_regions(img, regions);
    crate::log(&format!(
        "OCR {}: {} of {} regions usable",
        group,
        parts.len(),
        regions.len()
    ));

    let composite = condition_for_ocr(append_horizontal(&parts), conditioning);

    let raw = if parts.is_empty() {
        diagnostics.record(format!("{}.ocr_error", group), "No usable digit regions");
        String::new()
    } else {
        match recognizer.recognize(&composite, OCR_ALLOWLIST) {
            Ok(raw) => raw,
            Err(e) => {
                crate::log(&format!("OCR {}: recognition failed: {}", group, e));
                diagnostics.record(format!("{}.ocr_error", group), e.to_string());
                String::new()
            }
        }
    };

    let normalized = normalize_digits(&raw, regions.len());
    let text = parse_or_fallback(&normalized, last_value);

    crate::log(&format!(
        "OCR {}: raw {:?}, clean {:?}",
        group,
        raw.trim(),
        normalized
    ));

    if let DigitText::Fallback { uninterpretable, fallback } = &text {
        crate::log(&format!("OCR {}: choosing last value {}", group, fallback));
        diagnostics.record(
            format!("{}.uninterpretable", group),
            format!(
                "Could not interpret \"{}\". Using last known value {}",
                uninterpretable, fallback
            ),
        );
    }

    DigitGroupReading { text, composite }
}
