//! Plausibility check of a new candidate against the last accepted value.
//!
//! Meter readings only grow under normal use. A small forward jump or a
//! small backward correction is accepted; anything else is rejected and the
//! last value is repeated.

use serde_json::Value;

use super::config::MeterConfig;
use super::diagnostics::Diagnostics;
use crate::ocr::normalize::{format_decimal, is_decimal_numeral};

/// Maximum accepted change since the last value, in each direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftLimits {
    pub forward: f64,
    pub backward: f64,
}

impl DriftLimits {
    pub fn new(forward: f64, backward: f64) -> Self {
        Self {
            forward: forward.abs(),
            backward: backward.abs(),
        }
    }

    pub fn from_config(config: &MeterConfig) -> Self {
        Self::new(config.max_threshold, config.max_threshold_backtracking)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accepted(f64),
    Rejected { last_value: f64 },
}

impl Verdict {
    /// The value to report for this cycle.
    pub fn value(&self) -> f64 {
        match *self {
            Verdict::Accepted(value) => value,
            Verdict::Rejected { last_value } => last_value,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Accepts or rejects `candidate`.
///
/// `delta = candidate - last_value`. Forward drift is acceptable when
/// `0 <= delta <= forward`, backward drift when `0 <= -delta <= backward`.
/// On rejection the full context is recorded and the error flag is set.
pub fn validate(
    candidate: &str,
    last_value: f64,
    limits: &DriftLimits,
    diagnostics: &mut Diagnostics,
) -> Verdict {
    let parsed = if is_decimal_numeral(candidate) {
        candidate.parse::<f64>().ok()
    } else {
        None
    };

    let Some(value) = parsed else {
        crate::log(&format!("Rejected {:?}: not a decimal number", candidate));
        diagnostics.record("is_numeric", false);
        diagnostics.record("value", candidate);
        diagnostics.record("lastValue", last_value);
        diagnostics.record("delta", Value::Null);
        record_limits(diagnostics, limits);
        diagnostics.mark_error();
        return Verdict::Rejected { last_value };
    };

    let Drift { delta, forward_ok, backward_ok } = measure_drift(candidate, value, last_value, limits);

    if forward_ok || backward_ok {
        crate::log(&format!(
            "Accepted {} (last {}, delta {})",
            value, last_value, delta
        ));
        return Verdict::Accepted(value);
    }

    crate::log(&format!(
        "Rejected {} (last {}, delta {}, limits +{} / -{})",
        value, last_value, delta, limits.forward, limits.backward
    ));

    diagnostics.record("is_numeric", true);
    diagnostics.record("increasing", delta >= 0.0);
    diagnostics.record("value", value);
    diagnostics.record("lastValue", last_value);
    diagnostics.record("delta", delta);
    diagnostics.record("acceptable_delta", forward_ok);
    diagnostics.record("acceptable_backtracking_delta", backward_ok);
    record_limits(diagnostics, limits);
    diagnostics.mark_error();

    Verdict::Rejected { last_value }
}

struct Drift {
    delta: f64,
    forward_ok: bool,
    backward_ok: bool,
}

/// Compares on the decimal digits themselves so that `100.3 - 100.1`
/// equals a `0.2` limit exactly. Falls back to float arithmetic only when
/// a value does not fit the exact form.
fn measure_drift(candidate: &str, value: f64, last_value: f64, limits: &DriftLimits) -> Drift {
    if let Some(drift) = exact_drift(candidate, last_value, limits) {
        return drift;
    }

    let delta = value - last_value;
    Drift {
        delta,
        forward_ok: delta >= 0.0 && delta <= limits.forward,
        backward_ok: delta <= 0.0 && -delta <= limits.backward,
    }
}

fn exact_drift(candidate: &str, last_value: f64, limits: &DriftLimits) -> Option<Drift> {
    let literals = [
        candidate.to_string(),
        format_decimal(last_value),
        format_decimal(limits.forward),
        format_decimal(limits.backward),
    ];
    if !literals.iter().all(|l| is_decimal_numeral(l)) {
        return None;
    }

    let scale = literals.iter().map(|l| fraction_digits(l)).max().unwrap_or(0);
    let candidate = to_units(&literals[0], scale)?;
    let last = to_units(&literals[1], scale)?;
    let forward = to_units(&literals[2], scale)?;
    let backward = to_units(&literals[3], scale)?;

    let delta = candidate.checked_sub(last)?;
    Some(Drift {
        delta: units_to_f64(delta, scale)?,
        forward_ok: delta >= 0 && delta <= forward,
        backward_ok: delta <= 0 && delta.checked_neg()? <= backward,
    })
}

fn fraction_digits(literal: &str) -> usize {
    literal.split_once('.').map_or(0, |(_, fraction)| fraction.len())
}

/// Integer count of `10^-scale` steps in a decimal numeral.
fn to_units(literal: &str, scale: usize) -> Option<i128> {
    let (negative, body) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    let (integer, fraction) = body.split_once('.').unwrap_or((body, ""));

    let mut digits = String::with_capacity(integer.len() + scale);
    digits.push_str(integer);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat_n('0', scale - fraction.len()));

    let units = if digits.is_empty() { 0 } else { digits.parse::<i128>().ok()? };
    Some(if negative { -units } else { units })
}

fn units_to_f64(units: i128, scale: usize) -> Option<f64> {
    if scale == 0 {
        return Some(units as f64);
    }
    let magnitude = units.unsigned_abs().to_string();
    let padded = format!("{:0>width$}", magnitude, width = scale + 1);
    let (integer, fraction) = padded.split_at(padded.len() - scale);
    let sign = if units < 0 { "-" } else { "" };
    format!("{}{}.{}", sign, integer, fraction).parse().ok()
}

fn record_limits(diagnostics: &mut Diagnostics, limits: &DriftLimits) {
    diagnostics.record("maxThreshold", limits.forward);
    diagnostics.record("maxThresholdBacktracking", limits.backward);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(candidate: &str, last: f64, forward: f64, backward: f64) -> (Verdict, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let verdict = validate(candidate, last, &DriftLimits::new(forward, backward), &mut diagnostics);
        (verdict, diagnostics)
    }

    #[test]
    fn test_forward_within_limit_accepted() {
        let (verdict, diagnostics) = check("102", 100.0, 5.0, 0.0);
        assert_eq!(verdict, Verdict::Accepted(102.0));
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_forward_at_limit_accepted() {
        let (verdict, _) = check("105", 100.0, 5.0, 0.0);
        assert!(verdict.is_accepted());
    }

    #[test]
    fn test_unchanged_value_accepted_without_backtracking() {
        let (verdict, _) = check("100.0", 100.0, 0.0, 0.0);
        assert_eq!(verdict, Verdict::Accepted(100.0));
    }

    #[test]
    fn test_forward_jump_rejected() {
        let (verdict, diagnostics) = check("150", 100.0, 5.0, 2.0);

        assert_eq!(verdict, Verdict::Rejected { last_value: 100.0 });
        assert_eq!(verdict.value(), 100.0);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.get("delta"), Some(&json!(50.0)));
        assert_eq!(diagnostics.get("value"), Some(&json!(150.0)));
        assert_eq!(diagnostics.get("lastValue"), Some(&json!(100.0)));
        assert_eq!(diagnostics.get("maxThreshold"), Some(&json!(5.0)));
        assert_eq!(diagnostics.get("maxThresholdBacktracking"), Some(&json!(2.0)));
        assert_eq!(diagnostics.get("acceptable_delta"), Some(&json!(false)));
        assert_eq!(diagnostics.get("acceptable_backtracking_delta"), Some(&json!(false)));
        assert_eq!(diagnostics.get("increasing"), Some(&json!(true)));
    }

    #[test]
    fn test_backtracking_within_limit_accepted() {
        let (verdict, _) = check("99.0", 100.0, 5.0, 2.0);
        assert_eq!(verdict, Verdict::Accepted(99.0));
    }

    #[test]
    fn test_backtracking_beyond_limit_rejected() {
        let (verdict, diagnostics) = check("90", 100.0, 5.0, 2.0);

        assert!(!verdict.is_accepted());
        assert_eq!(diagnostics.get("delta"), Some(&json!(-10.0)));
        assert_eq!(diagnostics.get("increasing"), Some(&json!(false)));
    }

    #[test]
    fn test_negative_limits_use_magnitude() {
        let (verdict, _) = check("103", 100.0, -5.0, 0.0);
        assert!(verdict.is_accepted());
        let (verdict, _) = check("98", 100.0, 0.0, -2.0);
        assert!(verdict.is_accepted());
    }

    #[test]
    fn test_non_numeric_rejected() {
        let (verdict, diagnostics) = check("100.5.3", 100.5, 5.0, 2.0);

        assert_eq!(verdict.value(), 100.5);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.get("is_numeric"), Some(&json!(false)));
        assert_eq!(diagnostics.get("value"), Some(&json!("100.5.3")));
        assert_eq!(diagnostics.get("delta"), Some(&Value::Null));
    }

    #[test]
    fn test_fractional_forward_limit_is_inclusive() {
        let (verdict, diagnostics) = check("100.3", 100.1, 0.2, 0.0);
        assert_eq!(verdict, Verdict::Accepted(100.3));
        assert!(!diagnostics.has_errors());

        let (verdict, _) = check("100.31", 100.1, 0.2, 0.0);
        assert!(!verdict.is_accepted());
    }

    #[test]
    fn test_fractional_backtracking_limit_is_inclusive() {
        let (verdict, _) = check("100.1", 100.3, 0.0, 0.2);
        assert_eq!(verdict, Verdict::Accepted(100.1));

        let (verdict, diagnostics) = check("100.09", 100.3, 0.0, 0.2);
        assert!(!verdict.is_accepted());
        assert_eq!(diagnostics.get("delta"), Some(&json!(-0.21)));
    }

    #[test]
    fn test_rejection_reports_exact_delta() {
        let (_, diagnostics) = check("100.4", 100.1, 0.2, 0.0);
        assert_eq!(diagnostics.get("delta"), Some(&json!(0.3)));
    }

    #[test]
    fn test_decimal_fraction_grid() {
        // Steps of 0.1 are not exact in binary
        let last = 815.3;
        let (forward, backward) = (0.7, 0.3);
        for step in -10i32..=10 {
            let tenths = 8153 + step;
            let candidate = format!("{}.{}", tenths / 10, tenths % 10);
            let (verdict, _) = check(&candidate, last, forward, backward);
            let expected = (0..=7).contains(&step) || (-3..=0).contains(&step);
            assert_eq!(verdict.is_accepted(), expected, "candidate {}", candidate);
        }
    }

    #[test]
    fn test_to_units() {
        assert_eq!(to_units("100.1", 3), Some(100_100));
        assert_eq!(to_units("-.5", 1), Some(-5));
        assert_eq!(to_units("12.", 0), Some(12));
        assert_eq!(units_to_f64(-5, 2), Some(-0.05));
        assert_eq!(units_to_f64(1234, 0), Some(1234.0));
    }

    #[test]
    fn test_limit_grid() {
        let last = 1000.0;
        let limits = (3.0, 1.0);
        for step in -40..=40 {
            let candidate = last + step as f64 * 0.125;
            let (verdict, diagnostics) = check(&candidate.to_string(), last, limits.0, limits.1);
            let delta = candidate - last;
            let expected = (delta >= 0.0 && delta <= limits.0) || (delta <= 0.0 && -delta <= limits.1);
            assert_eq!(verdict.is_accepted(), expected, "candidate {}", candidate);
            assert_eq!(diagnostics.has_errors(), !expected);
            if !expected {
                assert_eq!(verdict.value(), last);
            }
        }
    }
}
