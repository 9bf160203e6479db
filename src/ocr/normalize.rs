use regex::Regex;
use std::sync::OnceLock;

/// Glyphs tesseract may return for a digit wheel: the digits themselves plus
/// letters it commonly confuses them with.
pub const OCR_ALLOWLIST: &str = "0123456789oOiI|lzZsSbBg";

/// Look-alike letter → digit substitutions applied after recognition.
const LOOKALIKES: [(char, char); 13] = [
    ('o', '0'),
    ('O', '0'),
    ('i', '1'),
    ('I', '1'),
    ('|', '1'),
    ('l', '1'),
    ('z', '2'),
    ('Z', '2'),
    ('s', '5'),
    ('S', '5'),
    ('b', '6'),
    ('B', '8'),
    ('g', '9'),
];

/// Optional sign, digits, optional fraction. At least one digit overall.
const DECIMAL_PATTERN: &str = r"^[+-]?(\d+(\.\d*)?|\.\d+)$";

static DECIMAL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Outcome of interpreting one normalized digit group.
#[derive(Debug, Clone, PartialEq)]
pub enum DigitText {
    /// The text is a valid decimal numeral.
    Read(String),
    /// The text could not be interpreted; the last value stands in for it.
    Fallback { uninterpretable: String, fallback: String },
}

impl DigitText {
    pub fn as_str(&self) -> &str {
        match self {
            DigitText::Read(text) => text,
            DigitText::Fallback { fallback, .. } => fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DigitText::Fallback { .. })
    }
}

/// Returns true if `text` is a plain decimal numeral such as `00815` or `12.5`.
pub fn is_decimal_numeral(text: &str) -> bool {
    DECIMAL_REGEX
        .get_or_init(|| Regex::new(DECIMAL_PATTERN).expect("decimal pattern is valid"))
        .is_match(text)
}

/// Removes every whitespace character, including line breaks between words.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Left-pads with '0' up to `width` characters. Longer text is left as is.
pub fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let mut padded = "0".repeat(width - len);
    padded.push_str(text);
    padded
}

/// Replaces every look-alike letter with the digit it resembles.
pub fn substitute_lookalikes(text: &str) -> String {
    text.chars()
        .map(|c| {
            LOOKALIKES
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Cleans raw recognizer output into a digit string `width` characters wide.
///
/// Whitespace is stripped first, then missing leading digits are padded
/// with zeros, then look-alike letters are mapped to digits. Empty input
/// stays empty so the caller can tell that nothing was recognized.
pub fn normalize_digits(raw: &str, width: usize) -> String {
    let stripped = strip_whitespace(raw);
    if stripped.is_empty() {
        return stripped;
    }
    substitute_lookalikes(&pad_left(&stripped, width))
}

/// Accepts a normalized digit string or substitutes the last known value.
pub fn parse_or_fallback(normalized: &str, last_value: f64) -> DigitText {
    if !normalized.is_empty() && is_decimal_numeral(normalized) {
        DigitText::Read(normalized.to_string())
    } else {
        DigitText::Fallback {
            uninterpretable: normalized.to_string(),
            fallback: format_decimal(last_value),
        }
    }
}

/// String form of a decimal value: `100` for 100.0, `100.25` for 100.25.
pub fn format_decimal(value: f64) -> String {
    value.to_string()
}
