//! Calibration targets and their resolution from a light bucket.
//!
//! [`resolve`] merges fixed per-bucket defaults with [`PartialSettings`]
//! overrides. An override that is present (and, for the profile name,
//! non-empty) always wins. The merge is pure: resolving the same inputs twice
//! yields identical settings.

use crate::{CalError, CalResult, LightBucket};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gamma used by every bucket.
pub const DEFAULT_GAMMA: f64 = 2.2;

/// Inclusive bound on RGB trim percentages.
pub const TRIM_LIMIT: f64 = 100.0;

/// Fully resolved calibration targets for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Target tone-response exponent.
    pub gamma: f64,
    /// Target white point in Kelvin.
    pub white_point_kelvin: u32,
    /// Target white luminance in cd/m².
    pub brightness_cd_m2: u32,
    /// Profile name without timestamp or extension.
    pub profile_base_name: String,
    /// Red channel trim in percent.
    pub red_trim_percent: f64,
    /// Green channel trim in percent.
    pub green_trim_percent: f64,
    /// Blue channel trim in percent.
    pub blue_trim_percent: f64,
}

impl CalibrationSettings {
    /// Bucket defaults with no overrides applied.
    pub fn defaults(bucket: LightBucket) -> Self {
        let (white_point_kelvin, brightness_cd_m2) = match bucket {
            LightBucket::Low => (5500, 80),
            LightBucket::Medium => (6500, 100),
            LightBucket::High => (6500, 120),
        };
        Self {
            gamma: DEFAULT_GAMMA,
            white_point_kelvin,
            brightness_cd_m2,
            profile_base_name: default_profile_name(bucket).to_string(),
            red_trim_percent: 0.0,
            green_trim_percent: 0.0,
            blue_trim_percent: 0.0,
        }
    }

    /// Trims as `[red, green, blue]`.
    pub fn trims(&self) -> [f64; 3] {
        [self.red_trim_percent, self.green_trim_percent, self.blue_trim_percent]
    }

    /// True when any channel trim is non-zero.
    pub fn has_trims(&self) -> bool {
        self.trims().iter().any(|&t| t != 0.0)
    }
}

impl fmt::Display for CalibrationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profile={} gamma={} white_point={}K brightness={}cd/m2 trims=R{:+}% G{:+}% B{:+}%",
            self.profile_base_name,
            self.gamma,
            self.white_point_kelvin,
            self.brightness_cd_m2,
            self.red_trim_percent,
            self.green_trim_percent,
            self.blue_trim_percent,
        )
    }
}

/// Stable profile base name for a bucket.
pub fn default_profile_name(bucket: LightBucket) -> &'static str {
    match bucket {
        LightBucket::Low => "LowLight_Profile",
        LightBucket::Medium => "MediumLight_Profile",
        LightBucket::High => "HighLight_Profile",
    }
}

/// Optional overrides for each [`CalibrationSettings`] field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSettings {
    /// Gamma override.
    pub gamma: Option<f64>,
    /// White point override in Kelvin.
    pub white_point_kelvin: Option<u32>,
    /// Brightness override in cd/m².
    pub brightness_cd_m2: Option<u32>,
    /// Profile name override; blank names are ignored.
    pub profile_base_name: Option<String>,
    /// Red trim in percent.
    pub red_trim_percent: Option<f64>,
    /// Green trim in percent.
    pub green_trim_percent: Option<f64>,
    /// Blue trim in percent.
    pub blue_trim_percent: Option<f64>,
}

impl PartialSettings {
    /// Layers `over` on top of `self`; fields set in `over` win.
    pub fn merged_with(&self, over: &PartialSettings) -> PartialSettings {
        PartialSettings {
            gamma: over.gamma.or(self.gamma),
            white_point_kelvin: over.white_point_kelvin.or(self.white_point_kelvin),
            brightness_cd_m2: over.brightness_cd_m2.or(self.brightness_cd_m2),
            profile_base_name: non_empty(&over.profile_base_name)
                .or_else(|| non_empty(&self.profile_base_name)),
            red_trim_percent: over.red_trim_percent.or(self.red_trim_percent),
            green_trim_percent: over.green_trim_percent.or(self.green_trim_percent),
            blue_trim_percent: over.blue_trim_percent.or(self.blue_trim_percent),
        }
    }
}

fn non_empty(name: &Option<String>) -> Option<String> {
    name.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn check_trim(channel: &'static str, value: f64) -> CalResult<f64> {
    if !value.is_finite() || !(-TRIM_LIMIT..=TRIM_LIMIT).contains(&value) {
        return Err(CalError::TrimOutOfRange { channel, value });
    }
    Ok(value)
}

/// Checks the numeric overrides without resolving a bucket.
///
/// Only fields that are present are checked, so an empty override set is
/// always valid.
///
/// # Errors
///
/// [`CalError::InvalidSetting`] for a gamma that is not a positive number and
/// [`CalError::TrimOutOfRange`] when a trim lies outside [-100, 100].
pub fn validate_overrides(overrides: &PartialSettings) -> CalResult<()> {
    if let Some(gamma) = overrides.gamma {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(CalError::InvalidSetting {
                field: "gamma",
                reason: format!("{gamma} must be a positive number"),
            });
        }
    }
    let trims = [
        ("red", overrides.red_trim_percent),
        ("green", overrides.green_trim_percent),
        ("blue", overrides.blue_trim_percent),
    ];
    for (channel, value) in trims {
        if let Some(value) = value {
            check_trim(channel, value)?;
        }
    }
    Ok(())
}

/// Resolves the settings for `bucket` with `overrides` applied.
///
/// # Errors
///
/// Whatever [`validate_overrides`] rejects.
pub fn resolve(
    bucket: LightBucket,
    overrides: &PartialSettings,
) -> CalResult<CalibrationSettings> {
    validate_overrides(overrides)?;
    let base = CalibrationSettings::defaults(bucket);
    let profile_base_name =
        non_empty(&overrides.profile_base_name).unwrap_or(base.profile_base_name);

    Ok(CalibrationSettings {
        gamma: overrides.gamma.unwrap_or(base.gamma),
        white_point_kelvin: overrides.white_point_kelvin.unwrap_or(base.white_point_kelvin),
        brightness_cd_m2: overrides.brightness_cd_m2.unwrap_or(base.brightness_cd_m2),
        profile_base_name,
        red_trim_percent: overrides.red_trim_percent.unwrap_or(0.0),
        green_trim_percent: overrides.green_trim_percent.unwrap_or(0.0),
        blue_trim_percent: overrides.blue_trim_percent.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_bucket() {
        let low = resolve(LightBucket::Low, &PartialSettings::default()).unwrap();
        assert_eq!(low.gamma, 2.2);
        assert_eq!(low.white_point_kelvin, 5500);
        assert_eq!(low.brightness_cd_m2, 80);
        assert_eq!(low.profile_base_name, "LowLight_Profile");
        assert!(!low.has_trims());

        let medium = resolve(LightBucket::Medium, &PartialSettings::default()).unwrap();
        assert_eq!((medium.white_point_kelvin, medium.brightness_cd_m2), (6500, 100));
        assert_eq!(medium.profile_base_name, "MediumLight_Profile");

        let high = resolve(LightBucket::High, &PartialSettings::default()).unwrap();
        assert_eq!((high.white_point_kelvin, high.brightness_cd_m2), (6500, 120));
        assert_eq!(high.profile_base_name, "HighLight_Profile");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let overrides = PartialSettings {
            gamma: Some(2.4),
            red_trim_percent: Some(-5.0),
            ..Default::default()
        };
        for bucket in LightBucket::ALL {
            let a = resolve(bucket, &overrides).unwrap();
            let b = resolve(bucket, &overrides).unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(
            resolve(LightBucket::High, &PartialSettings::default()).unwrap(),
            CalibrationSettings::defaults(LightBucket::High)
        );
    }

    #[test]
    fn test_overrides_win() {
        let overrides = PartialSettings {
            gamma: Some(2.4),
            white_point_kelvin: Some(6000),
            brightness_cd_m2: Some(110),
            profile_base_name: Some("Studio".into()),
            red_trim_percent: Some(-5.0),
            green_trim_percent: Some(3.0),
            blue_trim_percent: Some(10.0),
        };
        let s = resolve(LightBucket::Low, &overrides).unwrap();
        assert_eq!(s.gamma, 2.4);
        assert_eq!(s.white_point_kelvin, 6000);
        assert_eq!(s.brightness_cd_m2, 110);
        assert_eq!(s.profile_base_name, "Studio");
        assert_eq!(s.trims(), [-5.0, 3.0, 10.0]);
    }

    #[test]
    fn test_empty_profile_name_keeps_default() {
        let overrides = PartialSettings {
            profile_base_name: Some("   ".into()),
            ..Default::default()
        };
        let s = resolve(LightBucket::Medium, &overrides).unwrap();
        assert_eq!(s.profile_base_name, "MediumLight_Profile");
    }

    #[test]
    fn test_trim_bounds() {
        for bad in [-100.5, 100.01, 250.0, -1000.0, f64::NAN, f64::INFINITY] {
            let overrides = PartialSettings {
                blue_trim_percent: Some(bad),
                ..Default::default()
            };
            let err = resolve(LightBucket::High, &overrides).unwrap_err();
            assert!(err.is_validation(), "{bad} accepted");
        }
        for ok in [-100.0, 0.0, 100.0] {
            let overrides = PartialSettings {
                red_trim_percent: Some(ok),
                ..Default::default()
            };
            assert!(resolve(LightBucket::High, &overrides).is_ok());
        }
    }

    #[test]
    fn test_rejects_bad_gamma() {
        let overrides = PartialSettings {
            gamma: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            resolve(LightBucket::Low, &overrides),
            Err(CalError::InvalidSetting { field: "gamma", .. })
        ));
    }

    #[test]
    fn test_validate_overrides_alone() {
        assert!(validate_overrides(&PartialSettings::default()).is_ok());
        let ok = PartialSettings {
            gamma: Some(2.4),
            green_trim_percent: Some(-100.0),
            ..Default::default()
        };
        assert!(validate_overrides(&ok).is_ok());

        let trim = PartialSettings {
            green_trim_percent: Some(-101.0),
            ..Default::default()
        };
        assert!(matches!(
            validate_overrides(&trim),
            Err(CalError::TrimOutOfRange { channel: "green", .. })
        ));

        let gamma = PartialSettings {
            gamma: Some(f64::NAN),
            ..Default::default()
        };
        assert!(matches!(
            validate_overrides(&gamma),
            Err(CalError::InvalidSetting { field: "gamma", .. })
        ));
    }

    #[test]
    fn test_merge_layers() {
        let config = PartialSettings {
            gamma: Some(2.4),
            red_trim_percent: Some(2.0),
            profile_base_name: Some("FromConfig".into()),
            ..Default::default()
        };
        let cli = PartialSettings {
            red_trim_percent: Some(-1.0),
            profile_base_name: Some(String::new()),
            ..Default::default()
        };
        let merged = config.merged_with(&cli);
        assert_eq!(merged.gamma, Some(2.4));
        assert_eq!(merged.red_trim_percent, Some(-1.0));
        assert_eq!(merged.profile_base_name.as_deref(), Some("FromConfig"));
    }
}
