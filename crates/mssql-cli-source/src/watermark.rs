//! Ordering of watermark values.
//!
//! Watermarks are stored as text. Two values that both parse as numbers are
//! compared numerically, anything else lexicographically (normalized
//! datetimes sort correctly as text). Stored values written by older
//! versions may still be in the clients' verbose datetime rendering; they
//! are normalized before comparison.

use std::borrow::Cow;
use std::cmp::Ordering;

use mssql_types::{clean, is_canonical_datetime};

pub fn compare(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        _ => a.cmp(b),
    }
}

/// Whether `candidate` should replace `stored`.
///
/// A stored value that is neither a number nor a canonical datetime is
/// replaced by any candidate that is, and never replaces one.
pub fn is_newer(candidate: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return true;
    };
    let candidate = normalize(candidate);
    let stored = normalize(stored);

    match (is_ordered(&candidate), is_ordered(&stored)) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }
    compare(&candidate, &stored) == Ordering::Greater
}

fn normalize(value: &str) -> Cow<'_, str> {
    match clean(Some(value.to_string())) {
        Some(cleaned) if cleaned != value => Cow::Owned(cleaned),
        _ => Cow::Borrowed(value),
    }
}

/// Numbers and canonical datetimes, the values `compare` orders correctly.
fn is_ordered(value: &str) -> bool {
    let value = value.trim();
    value.parse::<f64>().map(f64::is_finite).unwrap_or(false) || is_canonical_datetime(value)
}

/// Keep the greater of `current` and `candidate` in `current`.
pub fn track_max(current: &mut Option<String>, candidate: Option<&str>) {
    let Some(candidate) = candidate else {
        return;
    };
    if is_newer(candidate, current.as_deref()) {
        *current = Some(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_compare_numerically() {
        assert_eq!(compare("9", "10"), Ordering::Less);
        assert_eq!(compare("10.5", "10.50"), Ordering::Equal);
        assert!(is_newer("100", Some("99")));
    }

    #[test]
    fn test_text_values_compare_lexicographically() {
        assert_eq!(
            compare("2025-04-01 10:00:00", "2025-03-31 23:59:59"),
            Ordering::Greater
        );
        assert_eq!(compare("abc", "10"), Ordering::Greater);
        assert!(!is_newer("2025-01-01 00:00:00", Some("2025-01-01 00:00:00")));
        assert!(!is_newer("nan", Some("nan")));
    }

    #[test]
    fn test_verbose_stored_value_is_normalized() {
        assert!(is_newer("2025-04-03 09:00:00", Some("Apr  1 2025 12:00AM")));
        assert!(!is_newer("2025-03-31 09:00:00", Some("Apr  1 2025 12:00AM")));
        assert!(!is_newer("2025-04-01 00:00:00", Some("Apr  1 2025 12:00AM")));
    }

    #[test]
    fn test_unordered_stored_value_is_replaced() {
        assert!(is_newer("2025-04-03 09:00:00", Some("Apr")));
        assert!(is_newer("7", Some("not a number")));
        assert!(!is_newer("Apr", Some("2025-04-03 09:00:00")));
    }

    #[test]
    fn test_track_max() {
        let mut max = None;
        track_max(&mut max, Some("3"));
        track_max(&mut max, None);
        track_max(&mut max, Some("12"));
        track_max(&mut max, Some("7"));
        assert_eq!(max.as_deref(), Some("12"));
    }
}
