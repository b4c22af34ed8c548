//! Measurement records and their on-disk CSV encoding.

use core::fmt::Write;

use alloc::string::String;

use crate::time::Timestamp;

/// Sentinel written to the log for a channel that could not be read.
/// Readers of the log handle it downstream; the firmware itself keeps
/// validity in the type instead.
pub const INVALID_READING_VALUE: f32 = -999_999.0;

/// One temperature channel: a value in the stored unit, or unreadable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Valid(f32),
    Invalid,
}

impl Reading {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The stored value, or the on-disk sentinel for an unreadable channel.
    pub fn value_or_sentinel(self) -> f32 {
        match self {
            Self::Valid(v) => v,
            Self::Invalid => INVALID_READING_VALUE,
        }
    }

    /// Inverse of [`value_or_sentinel`](Self::value_or_sentinel), used when
    /// parsing a serialized field back. The sentinel compares exactly.
    pub fn from_raw(value: f32) -> Self {
        if value == INVALID_READING_VALUE {
            Self::Invalid
        } else {
            Self::Valid(value)
        }
    }
}

/// One reading of air and two water temperatures with a timestamp.
///
/// Created by the sensor reader exactly once per cycle and never mutated
/// afterwards; owned by the sample buffer until it is flushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub air: Reading,
    pub water_a: Reading,
    pub water_b: Reading,
}

impl Sample {
    /// A sample is valid iff every channel was readable. Gates the boot
    /// diagnostic only; steady-state samples are buffered and persisted
    /// whether valid or not.
    pub fn is_valid(&self) -> bool {
        self.air.is_valid() && self.water_a.is_valid() && self.water_b.is_valid()
    }

    /// Serialize to one newline-terminated CSV line, fixed field order.
    ///
    /// Numeric fields use `{:?}` so whole numbers keep a trailing `.0` and
    /// the column stays float-typed, and the sentinel serializes as its
    /// exact literal `-999999.0`.
    pub fn to_csv_line(&self) -> String {
        let mut line = String::new();
        let _ = write!(
            line,
            "{},{:?},{:?},{:?}\n",
            self.timestamp,
            self.air.value_or_sentinel(),
            self.water_a.value_or_sentinel(),
            self.water_b.value_or_sentinel(),
        );
        line
    }

    /// Parse a line previously produced by [`to_csv_line`](Self::to_csv_line).
    pub fn parse_csv_line(line: &str) -> Option<Self> {
        let mut fields = line.trim_end_matches('\n').split(',');
        let timestamp = Timestamp::parse(fields.next()?)?;
        let air = Reading::from_raw(fields.next()?.parse().ok()?);
        let water_a = Reading::from_raw(fields.next()?.parse().ok()?);
        let water_b = Reading::from_raw(fields.next()?.parse().ok()?);
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            timestamp,
            air,
            water_a,
            water_b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::timestamp;

    #[test]
    fn test_valid_line_round_trip() {
        let sample = Sample {
            timestamp: timestamp(),
            air: Reading::Valid(71.6),
            water_a: Reading::Valid(78.0),
            water_b: Reading::Valid(77.9),
        };
        let line = sample.to_csv_line();
        assert!(line.ends_with('\n'));
        // whole numbers keep the trailing .0
        assert_eq!(line, "2/8/2025 9:05:03,71.6,78.0,77.9\n");
        assert_eq!(Sample::parse_csv_line(&line), Some(sample));
    }

    #[test]
    fn test_sentinel_serializes_exactly() {
        let sample = Sample {
            timestamp: timestamp(),
            air: Reading::Invalid,
            water_a: Reading::Valid(78.0),
            water_b: Reading::Invalid,
        };
        let line = sample.to_csv_line();
        assert_eq!(line, "2/8/2025 9:05:03,-999999.0,78.0,-999999.0\n");

        // the sentinel parses back to Invalid by exact comparison
        let parsed = Sample::parse_csv_line(&line).unwrap();
        assert_eq!(parsed.air, Reading::Invalid);
        assert_eq!(parsed.water_b, Reading::Invalid);
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_validity_requires_all_channels() {
        let mut sample = Sample {
            timestamp: timestamp(),
            air: Reading::Valid(70.0),
            water_a: Reading::Valid(78.0),
            water_b: Reading::Valid(78.1),
        };
        assert!(sample.is_valid());

        sample.water_b = Reading::Invalid;
        assert!(!sample.is_valid());
    }

    #[test]
    fn test_parse_rejects_extra_fields() {
        assert_eq!(
            Sample::parse_csv_line("2/8/2025 9:05:03,1.0,2.0,3.0,4.0\n"),
            None
        );
    }
}
