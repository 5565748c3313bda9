use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::ApiError;

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    if trimmed.len() > 254 {
        return Err(ApiError::validation("Email must be 254 characters or less"));
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ApiError::validation("Email address is not valid"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ApiError::validation("Email address is not valid"));
    }

    Ok(trimmed)
}

pub fn validate_role(role: &str) -> Result<&str, ApiError> {
    match role {
        "user" | "admin" => Ok(role),
        _ => Err(ApiError::validation(format!(
            "Invalid role: {}. Role must be 'user' or 'admin'",
            role
        ))),
    }
}

/// Clamp a caller-supplied page size into `1..=max`.
pub fn clamp_limit(limit: Option<u64>, default: u64, max: u64) -> u64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Parse a date-range filter value. Accepts `YYYY-MM-DD` (expanded to the
/// start or end of that day) or a full RFC 3339 timestamp, and returns the
/// RFC 3339 string the audit rows are compared against.
pub fn parse_date_param(value: &str, end_of_day: bool) -> Result<String, ApiError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time: NaiveDateTime = if end_of_day {
            date.and_hms_milli_opt(23, 59, 59, 999)
        } else {
            date.and_hms_opt(0, 0, 0)
        }
        .ok_or_else(|| ApiError::validation(format!("Invalid date: {}", value)))?;

        return Ok(Utc.from_utc_datetime(&time).to_rfc3339());
    }

    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc).to_rfc3339());
    }

    Err(ApiError::validation(format!(
        "Invalid date: {}. Use YYYY-MM-DD or RFC 3339",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert_eq!(validate_email("  alice@example.com  ").unwrap(), "alice@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
    }

    #[test]
    fn test_validate_role() {
        assert!(validate_role("user").is_ok());
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("root").is_err());
        assert!(validate_role("").is_err());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 50, 100), 50);
        assert_eq!(clamp_limit(Some(25), 50, 100), 25);
        assert_eq!(clamp_limit(Some(0), 50, 100), 1);
        assert_eq!(clamp_limit(Some(500), 50, 100), 100);
    }

    #[test]
    fn test_parse_date_param() {
        let start = parse_date_param("2026-03-01", false).unwrap();
        assert!(start.starts_with("2026-03-01T00:00:00"));

        let end = parse_date_param("2026-03-01", true).unwrap();
        assert!(end.starts_with("2026-03-01T23:59:59"));

        let full = parse_date_param("2026-03-01T12:30:00+00:00", false).unwrap();
        assert!(full.starts_with("2026-03-01T12:30:00"));

        assert!(parse_date_param("01/03/2026", false).is_err());
        assert!(parse_date_param("not a date", true).is_err());
    }
}
