//! Conversion of raw search distances into display relevance.

/// Base that distances are subtracted from; kept for client compatibility.
pub const RELEVANCE_BASE: f64 = 1100.0;

/// Relevance shown in citation text: `1100 - score` as a float.
///
/// Uses the float text existing clients parse: integral values keep a
/// trailing `.0` ("1100.0"), and magnitudes below 1e-4 or from 1e16 up
/// switch to a signed two-digit exponent ("9.5e-06", "1e+20").
pub fn relevance_text(score: f64) -> String {
    let value = RELEVANCE_BASE - score;
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    if let Some((mantissa, exponent)) = scientific
        .split_once('e')
        .and_then(|(m, e)| e.parse::<i32>().ok().map(|e| (m, e)))
    {
        if value != 0.0 && !(-4..16).contains(&exponent) {
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
        }
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Relevance stored in the reference map: `1100 - score` truncated toward zero.
pub fn relevance_display(score: f64) -> String {
    ((RELEVANCE_BASE - score).trunc() as i64).to_string()
}
