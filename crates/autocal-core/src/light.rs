//! Ambient light classification.
//!
//! Calibration defaults are keyed on a coarse [`LightBucket`]. The bucket is
//! derived from a [`LightReading`], which is either the hour of day or a lux
//! value measured by the colorimeter. Consumers only ever see the bucket, so a
//! sensor reading can replace the clock without touching anything downstream.

use crate::{CalError, CalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lux below which the room counts as dark.
pub const LOW_LUX_LIMIT: f64 = 10.0;

/// Lux below which the room counts as normal indoor lighting.
pub const MEDIUM_LUX_LIMIT: f64 = 100.0;

/// Coarse ambient light classification driving calibration defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightBucket {
    /// Night or a dim room.
    Low,
    /// Evening or normal indoor lighting.
    Medium,
    /// Daylight.
    High,
}

impl LightBucket {
    /// All buckets, darkest first.
    pub const ALL: [LightBucket; 3] = [LightBucket::Low, LightBucket::Medium, LightBucket::High];

    /// Lowercase name used in logs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a bucket name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for LightBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps an hour of day (0-23) to a bucket.
///
/// Morning (6-9) and daytime (9-17) both land in [`LightBucket::High`].
/// Hours outside 0..=23 fall through to [`LightBucket::Low`]; use
/// [`LightReading::from_hour`] to reject them instead.
pub fn estimate_bucket(hour: u32) -> LightBucket {
    match hour {
        6..9 => LightBucket::High,
        9..17 => LightBucket::High,
        17..20 => LightBucket::Medium,
        _ => LightBucket::Low,
    }
}

/// Maps a measured ambient illuminance to a bucket.
pub fn bucket_from_lux(lux: f64) -> LightBucket {
    if lux < LOW_LUX_LIMIT {
        LightBucket::Low
    } else if lux < MEDIUM_LUX_LIMIT {
        LightBucket::Medium
    } else {
        LightBucket::High
    }
}

/// The observation a bucket is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightReading {
    /// Local hour of day, 0-23.
    Hour(u32),
    /// Measured ambient illuminance in lux.
    Lux(f64),
}

impl LightReading {
    /// Validated hour reading.
    pub fn from_hour(hour: u32) -> CalResult<Self> {
        if hour > 23 {
            return Err(CalError::InvalidHour(hour));
        }
        Ok(Self::Hour(hour))
    }

    /// Bucket for this reading.
    pub fn bucket(self) -> LightBucket {
        match self {
            Self::Hour(h) => estimate_bucket(h),
            Self::Lux(lux) => bucket_from_lux(lux),
        }
    }
}

impl fmt::Display for LightReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hour(h) => write!(f, "hour {h}"),
            Self::Lux(lux) => write!(f, "{lux} lux"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_buckets() {
        for h in 6..17 {
            assert_eq!(estimate_bucket(h), LightBucket::High, "hour {h}");
        }
        for h in 17..20 {
            assert_eq!(estimate_bucket(h), LightBucket::Medium, "hour {h}");
        }
        for h in (0..6).chain(20..24) {
            assert_eq!(estimate_bucket(h), LightBucket::Low, "hour {h}");
        }
    }

    #[test]
    fn test_lux_thresholds() {
        assert_eq!(bucket_from_lux(0.0), LightBucket::Low);
        assert_eq!(bucket_from_lux(9.99), LightBucket::Low);
        assert_eq!(bucket_from_lux(10.0), LightBucket::Medium);
        assert_eq!(bucket_from_lux(99.9), LightBucket::Medium);
        assert_eq!(bucket_from_lux(100.0), LightBucket::High);
        assert_eq!(bucket_from_lux(2500.0), LightBucket::High);
    }

    #[test]
    fn test_reading_rejects_bad_hour() {
        assert!(LightReading::from_hour(24).is_err());
        assert_eq!(LightReading::from_hour(22).unwrap().bucket(), LightBucket::Low);
        assert_eq!(LightReading::Lux(45.3).bucket(), LightBucket::Medium);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(LightBucket::parse("HIGH"), Some(LightBucket::High));
        assert_eq!(LightBucket::parse(" medium "), Some(LightBucket::Medium));
        assert_eq!(LightBucket::parse("dusk"), None);
        for b in LightBucket::ALL {
            assert_eq!(LightBucket::parse(b.name()), Some(b));
        }
    }
}
