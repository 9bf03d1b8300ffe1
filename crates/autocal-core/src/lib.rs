//! # autocal-core
//!
//! Display calibration orchestration over the ArgyllCMS toolchain.
//!
//! The color science lives entirely in ArgyllCMS (`dispcal`, `colprof`,
//! `dispwin`, `spotread`). This crate decides which invocation to run and in
//! what order:
//!
//! - [`DeviceProbe`] - is a colorimeter plugged in?
//! - [`estimate_bucket`], [`bucket_from_lux`] - ambient light to [`LightBucket`]
//! - [`resolve`] - bucket defaults merged with [`PartialSettings`] overrides
//! - [`CommandBuilder`] - resolved settings to exact tool argv
//! - [`Orchestrator`] - the run state machine producing a [`CalibrationRun`]
//! - [`LogManager`] - size-rotated log file
//!
//! External tools are reached only through [`ProcessRunner`], so every
//! component can be exercised without ArgyllCMS installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use autocal_core::{
//!     DeviceChoice, FixedOperator, Orchestrator, RunPlan, SystemRunner, TracingLog,
//! };
//!
//! let mut runner = SystemRunner;
//! let mut operator = FixedOperator(DeviceChoice::Abort);
//! let log = TracingLog;
//! let run = Orchestrator::new(&mut runner, &log, &mut operator).run(&RunPlan::default());
//! println!("{}", run.audit_line());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod command;
mod config;
mod device;
mod error;
mod light;
mod log;
mod orchestrator;
mod profile;
mod report;
mod runner;
mod sensor;
mod settings;
mod tools;
mod tune;

pub use command::{AMBIENT_TIMEOUT, CommandBuilder, format_factor, trim_factor};
pub use config::{Config, DEFAULT_LOG_NAME};
pub use device::{DEFAULT_MARKERS, DeviceProbe, default_probe_command};
pub use error::{CalError, CalResult};
pub use light::{LightBucket, LightReading, bucket_from_lux, estimate_bucket};
pub use log::{
    DEFAULT_MAX_BYTES, LogLevel, LogManager, MemoryLog, RotationPolicy, RunLog, TracingLog,
};
pub use orchestrator::{
    CalibrationRun, DEFAULT_PROBE_RETRIES, DeviceChoice, FailureReason, FixedOperator,
    LightSource, MAX_DEVICE_ROUNDS, Operator, Orchestrator, RunOutcome, RunPlan, RunState,
};
pub use profile::{ProfileArtifact, ProfileLocator, Timestamp, published_file_name};
pub use report::{calibration_report, tuning_report};
pub use runner::{CommandLine, DryRunRunner, ProcessOutput, ProcessRunner, SystemRunner};
pub use sensor::{parse_lux, read_ambient_lux};
pub use settings::{
    CalibrationSettings, PartialSettings, default_profile_name, resolve, validate_overrides,
};
pub use tools::{ArgyllTools, ToolOptions, find_binary};
pub use tune::{CAL_ENTRIES, TuneGains, generate_cal};
