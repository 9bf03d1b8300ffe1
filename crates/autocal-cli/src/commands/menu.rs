//! Numbered menu shown when no subcommand is given.

use anyhow::Result;
use tracing::trace;

use super::apply::ApplyArgs;
use super::calibrate::CalibrateArgs;
use super::tune::TuneArgs;
use super::variants::VariantsArgs;
use super::{Session, prompt};

const MENU: &str = "
AutoCal - display calibration
  1) Calibrate for the current ambient light
  2) Calibrate all light variants (low, medium, high)
  3) Apply the stored profile for the current light
  4) Visual tuning
  q) Quit
";

#[derive(Debug, PartialEq)]
enum Choice {
    Calibrate,
    Variants,
    Apply,
    Tune,
    Quit,
}

fn parse(answer: &str) -> Option<Choice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "1" => Some(Choice::Calibrate),
        "2" => Some(Choice::Variants),
        "3" => Some(Choice::Apply),
        "4" => Some(Choice::Tune),
        "q" | "quit" | "exit" => Some(Choice::Quit),
        _ => None,
    }
}

/// Reads a multiplier; blank keeps 1.0.
fn ask_multiplier(label: &str) -> Result<f64> {
    loop {
        let answer = prompt(&format!("{label} [1.0]: "))?;
        if answer.is_empty() {
            return Ok(1.0);
        }
        match answer.parse::<f64>() {
            Ok(v) => return Ok(v),
            Err(_) => eprintln!("Not a number: {answer}"),
        }
    }
}

fn tune_args() -> Result<TuneArgs> {
    let mut args = TuneArgs {
        red: ask_multiplier("Red")?,
        green: ask_multiplier("Green")?,
        blue: ask_multiplier("Blue")?,
        gain: ask_multiplier("Gain")?,
        ..Default::default()
    };
    let export = prompt("Export name (blank to skip): ")?;
    if !export.is_empty() {
        args.export = Some(export);
    }
    Ok(args)
}

/// Run the interactive menu. `flags` carries any top-level calibration flags.
pub fn run(flags: CalibrateArgs, session: &Session) -> Result<()> {
    trace!("menu::run");
    println!("{MENU}");
    let choice = loop {
        match parse(&prompt("Choice: ")?) {
            Some(choice) => break choice,
            None => eprintln!("Pick 1-4 or q."),
        }
    };

    match choice {
        Choice::Calibrate => super::calibrate::run(flags, session),
        Choice::Variants => {
            let args = VariantsArgs {
                target: flags.target,
                output: flags.output,
            };
            super::variants::run(args, session)
        }
        Choice::Apply => {
            let args = ApplyArgs {
                light: flags.light,
                ..Default::default()
            };
            super::apply::run(args, session)
        }
        Choice::Tune => super::tune::run(tune_args()?, session),
        Choice::Quit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse("1\n"), Some(Choice::Calibrate));
        assert_eq!(parse(" 2 "), Some(Choice::Variants));
        assert_eq!(parse("3"), Some(Choice::Apply));
        assert_eq!(parse("4"), Some(Choice::Tune));
        assert_eq!(parse("Q"), Some(Choice::Quit));
        assert_eq!(parse("5"), None);
        assert_eq!(parse(""), None);
    }
}
