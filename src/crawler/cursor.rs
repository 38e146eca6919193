//! Pagination cursors and continuation parsing
//!
//! Cursors are decimal status ids carried as strings. They are compared
//! numerically without converting to a fixed-width integer, so ids of any
//! length order correctly.

use crate::CursorError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Token that precedes the next upper bound inside a continuation marker
const MAX_ID_TOKEN: &str = "max_id=";

/// A totally ordered, string-encoded pagination position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Creates a cursor from a string of ASCII digits
    ///
    /// # Arguments
    ///
    /// * `value` - The decimal cursor value
    ///
    /// # Returns
    ///
    /// * `Ok(Cursor)` - The value is a non-empty digit string
    /// * `Err(CursorError::NotNumeric)` - The value is empty or contains non-digits
    pub fn new(value: impl Into<String>) -> Result<Self, CursorError> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CursorError::NotNumeric(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits with leading zeros removed ("0" stays "0")
    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.significant();
        let b = other.significant();
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Extracts the next upper-bound cursor from a continuation marker
///
/// The marker is an opaque query string such as
/// `?max_id=889004724669661183&q=to%3Asehurlburt&count=100`. The first
/// `max_id=` occurrence followed by at least one digit wins.
///
/// # Arguments
///
/// * `marker` - The continuation marker from the page's search metadata
///
/// # Returns
///
/// * `Ok(Cursor)` - The embedded upper bound
/// * `Err(CursorError::MissingMaxId)` - No usable `max_id=` token was found
pub fn extract_max_id(marker: &str) -> Result<Cursor, CursorError> {
    for (index, _) in marker.match_indices(MAX_ID_TOKEN) {
        let rest = &marker[index + MAX_ID_TOKEN.len()..];
        let digits: &str = match rest.find(|c: char| !c.is_ascii_digit()) {
            Some(end) => &rest[..end],
            None => rest,
        };
        if !digits.is_empty() {
            return Cursor::new(digits);
        }
    }

    Err(CursorError::MissingMaxId(marker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(value: &str) -> Cursor {
        Cursor::new(value).unwrap()
    }

    #[test]
    fn test_cursor_rejects_non_digits() {
        assert!(Cursor::new("").is_err());
        assert!(Cursor::new("12a4").is_err());
        assert!(Cursor::new("-5").is_err());
    }

    #[test]
    fn test_cursor_numeric_ordering() {
        assert!(cursor("9") < cursor("10"));
        assert!(cursor("500") < cursor("1000"));
        assert!(cursor("889004724669661184") > cursor("889004724669661183"));
        assert_eq!(cursor("0042").cmp(&cursor("42")), Ordering::Equal);
        assert!(cursor("000") < cursor("1"));
    }

    #[test]
    fn test_extract_from_twitter_marker() {
        let marker = "?max_id=889004724669661183&q=to%3Asehurlburt&count=100&include_entities=1";
        assert_eq!(
            extract_max_id(marker).unwrap(),
            cursor("889004724669661183")
        );
    }

    #[test]
    fn test_extract_marker_at_end() {
        assert_eq!(extract_max_id("q=x&max_id=500").unwrap(), cursor("500"));
    }

    #[test]
    fn test_extract_skips_empty_occurrence() {
        assert_eq!(
            extract_max_id("?max_id=&since=1&max_id=77").unwrap(),
            cursor("77")
        );
    }

    #[test]
    fn test_extract_missing_token_is_error() {
        let err = extract_max_id("?q=to%3Aalice&count=100").unwrap_err();
        assert_eq!(
            err,
            CursorError::MissingMaxId("?q=to%3Aalice&count=100".to_string())
        );
    }

    #[test]
    fn test_extract_token_without_digits_is_error() {
        assert!(extract_max_id("?max_id=abc").is_err());
    }
}
