//! IMU Feed (C11) core half: parses framed `PITCH:<f>,ROLL:<f>` text lines
//! and turns them into a mounting-corrected roll sample. The serial reader
//! itself lives in the server crate.

use regex::Regex;

use crate::error::ImuError;

/// One parsed, corrected roll reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollSample {
    /// Platform roll, radians, positive convention matching [`crate::aim`].
    pub roll_rad: f64,
    /// Seconds since the shared monotonic epoch, set by the reader at parse
    /// time.
    pub timestamp: f64,
}

impl RollSample {
    /// Open-question gate (§9): whether this sample is still usable `max_age`
    /// seconds after `now`. Callers that don't care about freshness simply
    /// never call this.
    pub fn is_fresh(&self, now: f64, max_age: f64) -> bool {
        now - self.timestamp <= max_age
    }
}

/// Parses IMU lines of the form `PITCH:<float>,ROLL:<float>` (degrees) into
/// [`RollSample`]s, subtracting a fixed mounting offset and converting to
/// radians. Malformed lines are silently skipped, per §4.11.
#[derive(Debug, Clone)]
pub struct ImuLineParser {
    pattern: Regex,
    mounting_offset_deg: f64,
}

impl ImuLineParser {
    /// `mounting_offset_deg` is subtracted from the parsed roll before
    /// conversion to radians, correcting for the IMU not being mounted
    /// perfectly level.
    pub fn new(mounting_offset_deg: f64) -> Result<Self, ImuError> {
        let pattern = Regex::new(r"PITCH:\s*(-?[0-9]+(?:\.[0-9]+)?)\s*,\s*ROLL:\s*(-?[0-9]+(?:\.[0-9]+)?)")
            .map_err(|e| ImuError::TransportLost(e.to_string()))?;
        Ok(ImuLineParser {
            pattern,
            mounting_offset_deg,
        })
    }

    /// Parse one line. Returns `None` on any malformed input rather than an
    /// error, matching the "silently skipped" rule.
    pub fn parse(&self, line: &str, now: f64) -> Option<RollSample> {
        let caps = self.pattern.captures(line)?;
        let roll_deg: f64 = caps.get(2)?.as_str().parse().ok()?;
        let corrected_deg = roll_deg - self.mounting_offset_deg;
        Some(RollSample {
            roll_rad: corrected_deg.to_radians(),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_line() {
        let parser = ImuLineParser::new(0.0).unwrap();
        let sample = parser.parse("PITCH:1.5,ROLL:5.0", 10.0).unwrap();
        assert!((sample.roll_rad - 5f64.to_radians()).abs() < 1e-9);
        assert_eq!(sample.timestamp, 10.0);
    }

    #[test]
    fn subtracts_the_mounting_offset() {
        let parser = ImuLineParser::new(2.0).unwrap();
        let sample = parser.parse("PITCH:0.0,ROLL:5.0", 10.0).unwrap();
        assert!((sample.roll_rad - 3f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn handles_negative_values_and_whitespace() {
        let parser = ImuLineParser::new(0.0).unwrap();
        let sample = parser.parse("PITCH: -3.2, ROLL: -7.25", 0.0).unwrap();
        assert!((sample.roll_rad - (-7.25f64).to_radians()).abs() < 1e-9);
    }

    #[test]
    fn malformed_lines_are_skipped_not_errors() {
        let parser = ImuLineParser::new(0.0).unwrap();
        assert!(parser.parse("garbage", 0.0).is_none());
        assert!(parser.parse("PITCH:1.0", 0.0).is_none());
        assert!(parser.parse("", 0.0).is_none());
    }

    #[test]
    fn freshness_check_respects_max_age() {
        let sample = RollSample {
            roll_rad: 0.0,
            timestamp: 10.0,
        };
        assert!(sample.is_fresh(10.4, 0.5));
        assert!(!sample.is_fresh(10.6, 0.5));
    }
}
