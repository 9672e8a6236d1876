use std::sync::LazyLock;

use regex::Regex;

// The sensor pushes UTF-8 payloads of the form "T=23.5 H=41.2". The match is
// anchored at the start of the payload; trailing bytes are ignored.
static READING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T=([\d.-]+) H=([\d.-]+)").expect("valid pattern"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Extract a temperature/humidity pair from a notification payload.
///
/// Returns `None` when the payload carries no usable reading, so the caller
/// can keep waiting for the next notification.
pub fn parse_reading(payload: &str) -> Option<Reading> {
    let captures = READING_PATTERN.captures(payload)?;

    let temperature = captures[1].parse().ok()?;
    let humidity = captures[2].parse().ok()?;

    Some(Reading {
        temperature,
        humidity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_reading() {
        let reading = parse_reading("T=23.5 H=41.2").unwrap();
        assert_eq!(reading.temperature, 23.5);
        assert_eq!(reading.humidity, 41.2);
    }

    #[test]
    fn parses_signed_decimals() {
        let reading = parse_reading("T=-0.5 H=40").unwrap();
        assert_eq!(reading.temperature, -0.5);
        assert_eq!(reading.humidity, 40.0);
    }

    #[test]
    fn parses_integer_values() {
        let reading = parse_reading("T=18 H=55").unwrap();
        assert_eq!(reading.temperature, 18.0);
        assert_eq!(reading.humidity, 55.0);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let reading = parse_reading("T=21.0 H=60.1\0\0").unwrap();
        assert_eq!(reading.temperature, 21.0);
        assert_eq!(reading.humidity, 60.1);
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(parse_reading(""), None);
    }

    #[test]
    fn rejects_garbage_payload() {
        assert_eq!(parse_reading("xyz"), None);
    }

    #[test]
    fn rejects_partial_match() {
        assert_eq!(parse_reading("T=23.5"), None);
    }

    #[test]
    fn rejects_reordered_fields() {
        assert_eq!(parse_reading("H=41.2 T=23.5"), None);
    }

    #[test]
    fn rejects_leading_noise() {
        assert_eq!(parse_reading("xT=23.5 H=41.2"), None);
    }

    #[test]
    fn rejects_unparseable_number_capture() {
        assert_eq!(parse_reading("T=1.2.3 H=40"), None);
    }
}
