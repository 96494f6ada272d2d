//! Price parsing policies
//!
//! Explicit `price_update` messages must carry a complete numeric literal.
//! Free-text chat is scanned for the first run of digits and, if one is
//! found, that integer counts as an implicit bid.

use crate::error::{HubError, Result};

/// Strictly parse the content of a `price_update` message.
///
/// The whole string must be a float literal with no surrounding whitespace
/// and must evaluate to a finite, non-negative number.
pub fn parse_strict(content: &str) -> Result<f64> {
    let value: f64 = content
        .parse()
        .map_err(|_| HubError::InvalidPrice(content.to_string()))?;

    if !value.is_finite() || value < 0.0 {
        return Err(HubError::InvalidPrice(content.to_string()));
    }

    Ok(value)
}

/// Pull the first contiguous run of ASCII digits out of free text.
///
/// Only non-negative integers are recognised: `"-5"` yields 5 and `"12.50"`
/// yields 12.
pub fn extract_lenient(content: &str) -> Option<f64> {
    let start = content.find(|c: char| c.is_ascii_digit())?;
    let rest = &content[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    rest[..end].parse().ok().filter(|v: &f64| v.is_finite())
}
