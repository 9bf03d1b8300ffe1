//! Plain-text calibration and tuning reports.

use crate::{CalibrationRun, TuneGains};
use std::fmt::Write as _;
use std::path::Path;

const RULE: &str = "----------------------------------------";

/// Report for a finished calibration run.
pub fn calibration_report(run: &CalibrationRun) -> String {
    let mut out = String::new();
    out.push_str("Display Calibration Report\n");
    let _ = writeln!(out, "Date: {}", run.timestamp.human());
    if let Some(bucket) = run.bucket {
        let _ = writeln!(out, "Ambient: {bucket}");
    }
    if let Some(s) = &run.settings {
        let _ = writeln!(out, "Profile Name: {}", s.profile_base_name);
        let _ = writeln!(out, "{RULE}\nTarget Settings:");
        let _ = writeln!(out, "  White Point: {}K", s.white_point_kelvin);
        let _ = writeln!(out, "  Gamma: {}", s.gamma);
        let _ = writeln!(out, "  Brightness: {} cd/m^2", s.brightness_cd_m2);
        if s.has_trims() {
            let _ = writeln!(
                out,
                "  Trims: R {:+}%  G {:+}%  B {:+}%",
                s.red_trim_percent, s.green_trim_percent, s.blue_trim_percent
            );
        }
    }
    let _ = writeln!(out, "{RULE}\nResult: {}", run.outcome);
    let _ = writeln!(out, "  Colorimeter detected: {}", run.device_detected);
    if let Some(path) = &run.profile_path {
        let _ = writeln!(out, "  Profile: {}", path.display());
    }
    out
}

/// Report for an exported tuning session.
pub fn tuning_report(gains: &TuneGains, date: &str, cal_file: &Path, display: u32) -> String {
    let mut out = String::new();
    out.push_str("Display Visual Tuning Report\n");
    let _ = writeln!(out, "Date: {date}\n{RULE}");
    let _ = writeln!(out, "Red:   {:.2}", gains.red);
    let _ = writeln!(out, "Green: {:.2}", gains.green);
    let _ = writeln!(out, "Blue:  {:.2}", gains.blue);
    let _ = writeln!(out, "Gain:  {:.2}\n{RULE}", gains.gain);
    let _ = writeln!(out, "To reload: dispwin -d{display} {}", cal_file.display());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_report() {
        let gains = TuneGains { red: 1.02, ..Default::default() };
        let text = tuning_report(&gains, "2024-01-01 10:00:00", Path::new("warm.cal"), 1);
        assert!(text.contains("Red:   1.02"));
        assert!(text.contains("dispwin -d1 warm.cal"));
    }
}
