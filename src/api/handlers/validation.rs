//! Input checks shared by the author and book handlers.

use chrono::{DateTime, Utc};
use regex::Regex;

use super::error::ApiError;

/// Email shape accepted for authors: local part, `@`, domain with a 2+ letter TLD.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .is_ok_and(|re| re.is_match(email))
}

/// Column width of author names/emails and book titles/ISBNs, in characters.
pub const MAX_FIELD_CHARS: usize = 100;

// 0001-01-01T00:00:00Z as seconds since the Unix epoch.
const ZERO_DATE_SECONDS: i64 = -62_135_596_800;

/// Parses a path identifier into a positive row id.
///
/// `missing` is returned for blank input, `invalid` for anything that is not a
/// positive integer.
pub fn parse_id(raw: &str, missing: &'static str, invalid: &'static str) -> Result<i64, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(missing));
    }

    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(invalid)),
    }
}

/// Escapes `LIKE` wildcards so the input matches literally with `ESCAPE '\'`.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `0001-01-01T00:00:00Z` is what some clients send for an unset date.
pub fn is_zero_date(date: &DateTime<Utc>) -> bool {
    date.timestamp() == ZERO_DATE_SECONDS
}

/// `true` when the value has more characters than its `VARCHAR(100)` column holds.
pub fn too_long(value: &str) -> bool {
    value.chars().count() > MAX_FIELD_CHARS
}

/// `true` when the value is missing or only whitespace.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn email_pattern() {
        assert!(valid_email("john@example.com"));
        assert!(valid_email("first.last+tag@sub.example.org"));
        assert!(!valid_email("john@example"));
        assert!(!valid_email("john.example.com"));
        assert!(!valid_email("john@example.c"));
        assert!(!valid_email("john doe@example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn parse_id_accepts_positive_integers() {
        assert_eq!(parse_id("42", "missing", "invalid").ok(), Some(42));
        assert_eq!(parse_id(" 7 ", "missing", "invalid").ok(), Some(7));
    }

    #[test]
    fn parse_id_rejects_bad_input() {
        for raw in ["abc", "0", "-3", "1.5", "99999999999999999999"] {
            let err = parse_id(raw, "Enter Author ID", "Invalid Author ID").err();
            assert!(
                matches!(err, Some(ApiError::BadRequest("Invalid Author ID"))),
                "{raw} should be rejected"
            );
        }
        assert!(matches!(
            parse_id("  ", "Enter Book ID", "Invalid Book ID"),
            Err(ApiError::BadRequest("Enter Book ID"))
        ));
    }

    #[test]
    fn escape_like_wildcards() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn zero_date_detection() {
        let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single();
        assert!(zero.as_ref().is_some_and(is_zero_date));

        let real = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        assert!(real.as_ref().is_some_and(|date| !is_zero_date(date)));
    }

    #[test]
    fn length_limit_counts_characters() {
        assert!(!too_long(&"a".repeat(MAX_FIELD_CHARS)));
        assert!(too_long(&"a".repeat(MAX_FIELD_CHARS + 1)));
        // 100 two-byte characters still fit.
        assert!(!too_long(&"é".repeat(MAX_FIELD_CHARS)));
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("x")));
    }
}
