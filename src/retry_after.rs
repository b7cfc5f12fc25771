//! `Retry-After` header parsing.

use std::time::{Duration, SystemTime};

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Reads the `Retry-After` header from `headers`.
///
/// Returns zero when the header is missing, malformed or in the past.
pub fn retry_after(headers: &HeaderMap) -> Duration {
    let value = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok());
    parse_retry_after(value, SystemTime::now())
}

/// Parses a raw `Retry-After` value as delta-seconds or an HTTP date relative to `now`.
///
/// A malformed advisory header never fails a request, so every parse failure is zero.
pub fn parse_retry_after(value: Option<&str>, now: SystemTime) -> Duration {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Duration::ZERO;
    };

    if let Ok(seconds) = value.parse::<i64>() {
        return Duration::from_secs(seconds.max(0).unsigned_abs());
    }

    match httpdate::parse_http_date(value) {
        Ok(at) => at.duration_since(now).unwrap_or(Duration::ZERO),
        Err(_) => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{parse_retry_after, retry_after};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn missing_or_blank_is_zero() {
        assert_eq!(parse_retry_after(None, at(0)), Duration::ZERO);
        assert_eq!(parse_retry_after(Some("   "), at(0)), Duration::ZERO);
    }

    #[test]
    fn delta_seconds() {
        assert_eq!(parse_retry_after(Some("1"), at(0)), Duration::from_secs(1));
        assert_eq!(parse_retry_after(Some(" 120 "), at(0)), Duration::from_secs(120));
        assert_eq!(parse_retry_after(Some("0"), at(0)), Duration::ZERO);
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        assert_eq!(parse_retry_after(Some("-5"), at(0)), Duration::ZERO);
    }

    #[test]
    fn http_date_in_future() {
        // Sun, 06 Nov 1994 08:49:37 GMT
        let date = 784_111_777;
        let wait = parse_retry_after(Some("Sun, 06 Nov 1994 08:49:37 GMT"), at(date - 30));
        assert_eq!(wait, Duration::from_secs(30));
    }

    #[test]
    fn http_date_in_past_is_zero() {
        let date = 784_111_777;
        let wait = parse_retry_after(Some("Sun, 06 Nov 1994 08:49:37 GMT"), at(date + 30));
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn garbage_is_zero() {
        assert_eq!(parse_retry_after(Some("soon"), at(0)), Duration::ZERO);
        assert_eq!(parse_retry_after(Some("1.5"), at(0)), Duration::ZERO);
    }

    #[test]
    fn reads_header_map() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), Duration::ZERO);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Duration::from_secs(3));
    }
}
