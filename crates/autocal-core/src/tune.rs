//! Manual video-LUT tuning.
//!
//! [`TuneGains`] scale each channel linearly; [`generate_cal`] renders them as
//! an ArgyllCMS CAL file that `dispwin` loads straight into the video LUT.

use chrono::Local;
use std::fmt::Write as _;

/// Entries per channel in a generated CAL table.
pub const CAL_ENTRIES: usize = 256;

/// Per-channel multipliers; 1.0 is neutral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneGains {
    /// Red multiplier.
    pub red: f64,
    /// Green multiplier.
    pub green: f64,
    /// Blue multiplier.
    pub blue: f64,
    /// Overall multiplier applied to every channel.
    pub gain: f64,
}

impl Default for TuneGains {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
            gain: 1.0,
        }
    }
}

impl TuneGains {
    /// Output of each channel for input `x` in [0, 1], clamped.
    pub fn apply(&self, x: f64) -> [f64; 3] {
        [self.red, self.green, self.blue].map(|c| (x * self.gain * c).clamp(0.0, 1.0))
    }

    /// True when every multiplier is 1.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

/// Renders `gains` as an ArgyllCMS CAL file.
pub fn generate_cal(gains: &TuneGains, description: &str) -> String {
    let mut out = String::with_capacity(CAL_ENTRIES * 40 + 256);
    out.push_str("CAL\n\n");
    let _ = writeln!(out, "DESCRIPTOR \"{description}\"");
    out.push_str("ORIGINATOR \"AutoCal Tuner\"\n");
    let _ = writeln!(out, "CREATED \"{}\"", Local::now().format("%a %b %e %H:%M:%S %Y"));
    out.push_str("DEVICE_CLASS \"DISPLAY\"\n");
    out.push_str("COLOR_REP \"RGB\"\n\n");
    out.push_str("NUMBER_OF_FIELDS 4\n");
    out.push_str("BEGIN_DATA_FORMAT\nRGB_I RGB_R RGB_G RGB_B\nEND_DATA_FORMAT\n\n");
    let _ = writeln!(out, "NUMBER_OF_SETS {CAL_ENTRIES}");
    out.push_str("BEGIN_DATA\n");
    for i in 0..CAL_ENTRIES {
        let x = i as f64 / (CAL_ENTRIES - 1) as f64;
        let [r, g, b] = gains.apply(x);
        let _ = writeln!(out, "{x:.6} {r:.6} {g:.6} {b:.6}");
    }
    out.push_str("END_DATA\n");
    out
}
