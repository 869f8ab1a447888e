//! `application/dtmf-relay` bodies
//!
//! INFO requests carry out-of-band DTMF as `key=value` lines:
//!
//! ```text
//! Signal=8
//! Duration=120
//! ```

use crate::errors::{B2buaError, B2buaResult};

/// Duration used when the body omits one, in milliseconds
pub const DEFAULT_DTMF_DURATION_MS: u32 = 100;

/// One DTMF digit received out of band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    pub digit: char,
    pub duration_ms: u32,
}

impl DtmfEvent {
    /// Parse a `application/dtmf-relay` body
    pub fn parse(body: &str) -> B2buaResult<Self> {
        let mut digit = None;
        let mut duration_ms = DEFAULT_DTMF_DURATION_MS;

        for line in body.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "signal" => digit = Some(parse_digit(value)?),
                "duration" => {
                    duration_ms = value.parse().map_err(|_| {
                        B2buaError::malformed_request(format!("invalid DTMF duration: {value}"))
                    })?;
                }
                _ => {}
            }
        }

        let digit = digit.ok_or_else(|| B2buaError::malformed_request("missing DTMF Signal"))?;
        Ok(Self { digit, duration_ms })
    }
}

fn parse_digit(value: &str) -> B2buaResult<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() || matches!(c, '*' | '#') => Ok(c),
        (Some(c), None) if matches!(c.to_ascii_uppercase(), 'A'..='D') => Ok(c.to_ascii_uppercase()),
        _ => Err(B2buaError::malformed_request(format!("invalid DTMF signal: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal_and_duration() {
        let event = DtmfEvent::parse("Signal=8\r\nDuration=120\r\n").unwrap();
        assert_eq!(event, DtmfEvent { digit: '8', duration_ms: 120 });
    }

    #[test]
    fn test_parse_tolerates_spacing_and_case() {
        let event = DtmfEvent::parse("signal = #\nduration= 250").unwrap();
        assert_eq!(event.digit, '#');
        assert_eq!(event.duration_ms, 250);

        let event = DtmfEvent::parse("Signal=b").unwrap();
        assert_eq!(event.digit, 'B');
        assert_eq!(event.duration_ms, DEFAULT_DTMF_DURATION_MS);
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        assert!(DtmfEvent::parse("Duration=120").is_err());
        assert!(DtmfEvent::parse("Signal=12").is_err());
        assert!(DtmfEvent::parse("Signal=X").is_err());
        assert!(DtmfEvent::parse("Signal=5\nDuration=long").is_err());
    }
}
