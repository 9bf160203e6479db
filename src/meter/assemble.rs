//! Fuses the integer, post-decimal and gauge digit strings into one decimal literal.

/// Builds the candidate literal.
///
/// The composition is picked by which fractional parts are configured
/// (`Some`), not by their content. No arithmetic happens here.
pub fn assemble_candidate(integer: &str, post_decimal: Option<&str>, gauges: Option<&str>) -> String {
    match (post_decimal, gauges) {
        (Some(post), Some(gauges)) => format!("{}.{}{}", integer, post, gauges),
        (None, Some(gauges)) => format!("{}.{}", integer, gauges),
        (Some(post), None) => format!("{}.{}", integer, post),
        (None, None) => integer.to_string(),
    }
}
