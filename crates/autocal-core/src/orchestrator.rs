//! Calibration run sequencing.
//!
//! A run walks a linear state machine and stops at the first failure:
//!
//! ```text
//! Start -> DeviceCheck -> LightEstimation -> SettingsResolution
//!       -> RunMeasurement -> RunProfiling -> Success
//!                    \______________________________\-> Failed
//! ```
//!
//! Numeric overrides are checked in `Start`, so a bad trim or gamma fails the
//! run before the colorimeter is probed.
//!
//! Each external step blocks until its process exits and only the exit code
//! decides success. Nothing is retried automatically; a failed run has to be
//! started again by the operator. After `Success` the optional publish,
//! report and apply steps run; their failures are logged as warnings and do
//! not change the outcome.

use crate::{
    CalError, CalResult, CalibrationSettings, CommandBuilder, CommandLine, DeviceProbe,
    LightBucket, LightReading, PartialSettings, ProcessRunner, ProfileArtifact, ProfileLocator,
    RunLog, Timestamp, calibration_report, read_ambient_lux, resolve, validate_overrides,
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Device prompts answered with Retry before the run gives up.
pub const MAX_DEVICE_ROUNDS: u32 = 5;

/// Default probe attempts per round.
pub const DEFAULT_PROBE_RETRIES: u32 = 3;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Run created and overrides checked.
    Start,
    /// Looking for the colorimeter.
    DeviceCheck,
    /// Classifying ambient light.
    LightEstimation,
    /// Merging defaults with overrides.
    SettingsResolution,
    /// dispcal running.
    RunMeasurement,
    /// colprof running.
    RunProfiling,
    /// Profile produced.
    Success,
    /// Terminal failure.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::DeviceCheck => "device-check",
            Self::LightEstimation => "light-estimation",
            Self::SettingsResolution => "settings-resolution",
            Self::RunMeasurement => "measurement",
            Self::RunProfiling => "profiling",
            Self::Success => "success",
            Self::Failed => "failed",
        })
    }
}

/// Why a run ended in [`RunState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No colorimeter and the operator declined to continue.
    DeviceAbsent,
    /// Rejected input, caught before any calibration tool ran.
    Validation(String),
    /// A tool exited non-zero.
    ToolFailed {
        /// Program name.
        tool: String,
        /// Exit code.
        code: i32,
    },
    /// A tool could not be started, or its output dir could not be created.
    Io(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceAbsent => f.write_str("colorimeter not connected"),
            Self::Validation(msg) => write!(f, "invalid settings: {msg}"),
            Self::ToolFailed { tool, code } => write!(f, "{tool} exited with status {code}"),
            Self::Io(msg) => f.write_str(msg),
        }
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Profile produced.
    Success,
    /// Stopped at `stage`.
    Failed {
        /// State in which the failure happened.
        stage: RunState,
        /// What went wrong.
        reason: FailureReason,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed { stage, reason } => write!(f, "failed during {stage}: {reason}"),
        }
    }
}

/// Operator answer when no colorimeter is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    /// Probe again.
    Retry,
    /// Continue without a detected colorimeter.
    Proceed,
    /// Stop the run.
    Abort,
}

/// Decides what to do when the colorimeter is missing.
pub trait Operator {
    /// Called after each unsuccessful probe round, `round` starting at 1.
    fn device_missing(&mut self, round: u32) -> DeviceChoice;
}

/// Always gives the same answer; suits unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedOperator(pub DeviceChoice);

impl Operator for FixedOperator {
    fn device_missing(&mut self, _round: u32) -> DeviceChoice {
        self.0
    }
}

/// Where the light bucket comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightSource {
    /// Hour of the run timestamp.
    Clock,
    /// Explicit hour of day.
    Hour(u32),
    /// spotread ambient reading, falling back to the clock.
    Sensor,
    /// Bucket chosen by the caller.
    Fixed(LightBucket),
}

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// User overrides, already layered config < CLI.
    pub overrides: PartialSettings,
    /// Light bucket source.
    pub light: LightSource,
    /// Directory receiving `.cal` and `.icc` files.
    pub output_dir: PathBuf,
    /// Probe attempts per round.
    pub probe_retries: u32,
    /// Skip probing and record this presence instead.
    pub known_device: Option<bool>,
    /// Copy the new profile to its stable `<base>.icc` name.
    pub publish: bool,
    /// Install the new profile with dispwin.
    pub apply: bool,
    /// Write a report and an ICC backup here.
    pub report_dir: Option<PathBuf>,
    /// Run time; now when unset.
    pub timestamp: Option<Timestamp>,
    /// Commands are only printed, so no profile exists to publish, report or apply.
    pub dry_run: bool,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            overrides: PartialSettings::default(),
            light: LightSource::Clock,
            output_dir: PathBuf::from("."),
            probe_retries: DEFAULT_PROBE_RETRIES,
            known_device: None,
            publish: false,
            apply: false,
            report_dir: None,
            timestamp: None,
            dry_run: false,
        }
    }
}

/// Audit record of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRun {
    /// Run start; also the artifact suffix.
    pub timestamp: Timestamp,
    /// Observation behind the bucket, if one was taken.
    pub reading: Option<LightReading>,
    /// Bucket, once estimated.
    pub bucket: Option<LightBucket>,
    /// Resolved settings, once resolved.
    pub settings: Option<CalibrationSettings>,
    /// Whether the colorimeter was seen.
    pub device_detected: bool,
    /// dispcal exit code, if it ran.
    pub measurement_exit_code: Option<i32>,
    /// colprof exit code, if it ran.
    pub profiling_exit_code: Option<i32>,
    /// Produced ICC profile.
    pub profile_path: Option<PathBuf>,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl CalibrationRun {
    /// True when the run reached [`RunState::Success`].
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// Final state.
    pub fn final_state(&self) -> RunState {
        match self.outcome {
            RunOutcome::Success => RunState::Success,
            RunOutcome::Failed { .. } => RunState::Failed,
        }
    }

    /// Single-line summary for the log.
    pub fn audit_line(&self) -> String {
        let opt = |code: Option<i32>| code.map_or_else(|| "-".to_string(), |c| c.to_string());
        format!(
            "run {} outcome={} bucket={} device={} measure_exit={} profile_exit={} profile={}",
            self.timestamp,
            self.outcome,
            self.bucket.map_or("-", LightBucket::name),
            self.device_detected,
            opt(self.measurement_exit_code),
            opt(self.profiling_exit_code),
            self.profile_path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
        )
    }
}

/// In-flight run state; frozen into a [`CalibrationRun`] at the end.
struct RunRecord {
    timestamp: Timestamp,
    reading: Option<LightReading>,
    bucket: Option<LightBucket>,
    settings: Option<CalibrationSettings>,
    device_detected: bool,
    measurement_exit_code: Option<i32>,
    profiling_exit_code: Option<i32>,
    profile_path: Option<PathBuf>,
}

impl RunRecord {
    fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            reading: None,
            bucket: None,
            settings: None,
            device_detected: false,
            measurement_exit_code: None,
            profiling_exit_code: None,
            profile_path: None,
        }
    }

    fn finish(self, outcome: RunOutcome) -> CalibrationRun {
        CalibrationRun {
            timestamp: self.timestamp,
            reading: self.reading,
            bucket: self.bucket,
            settings: self.settings,
            device_detected: self.device_detected,
            measurement_exit_code: self.measurement_exit_code,
            profiling_exit_code: self.profiling_exit_code,
            profile_path: self.profile_path,
            outcome,
        }
    }
}

/// Sequences probe, estimation, resolution and the external tools.
pub struct Orchestrator<'a> {
    runner: &'a mut dyn ProcessRunner,
    log: &'a dyn RunLog,
    operator: &'a mut dyn Operator,
    builder: CommandBuilder,
    probe: DeviceProbe,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator with default tools and the platform probe.
    pub fn new(
        runner: &'a mut dyn ProcessRunner,
        log: &'a dyn RunLog,
        operator: &'a mut dyn Operator,
    ) -> Self {
        Self {
            runner,
            log,
            operator,
            builder: CommandBuilder::default(),
            probe: DeviceProbe::default(),
        }
    }

    /// Uses `builder` for every command.
    pub fn with_builder(mut self, builder: CommandBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Uses `probe` for device detection.
    pub fn with_probe(mut self, probe: DeviceProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Runs one calibration according to `plan`.
    pub fn run(&mut self, plan: &RunPlan) -> CalibrationRun {
        let mut rec = RunRecord::new(plan.timestamp.unwrap_or_else(Timestamp::now));
        self.enter(&rec, RunState::Start);
        if let Err(e) = validate_overrides(&plan.overrides) {
            return self.fail(rec, RunState::Start, FailureReason::Validation(e.to_string()));
        }

        self.enter(&rec, RunState::DeviceCheck);
        match plan.known_device {
            Some(present) => {
                rec.device_detected = present;
                self.log.info(&format!("device check skipped, colorimeter present: {present}"));
            }
            None => match self.check_device(plan.probe_retries) {
                Some(present) => rec.device_detected = present,
                None => return self.fail(rec, RunState::DeviceCheck, FailureReason::DeviceAbsent),
            },
        }

        self.enter(&rec, RunState::LightEstimation);
        let (reading, bucket) = match self.estimate(plan.light, rec.timestamp) {
            Ok(pair) => pair,
            Err(e) => {
                let reason = FailureReason::Validation(e.to_string());
                return self.fail(rec, RunState::LightEstimation, reason);
            }
        };
        rec.reading = reading;
        rec.bucket = Some(bucket);
        self.log_light(reading, bucket);

        self.enter(&rec, RunState::SettingsResolution);
        let settings = match resolve(bucket, &plan.overrides) {
            Ok(s) => s,
            Err(e) => {
                let reason = FailureReason::Validation(e.to_string());
                return self.fail(rec, RunState::SettingsResolution, reason);
            }
        };
        self.log.info(&format!("settings: {settings}"));
        rec.settings = Some(settings.clone());

        let artifact =
            ProfileArtifact::new(&plan.output_dir, &settings.profile_base_name, rec.timestamp);
        if let Err(e) = fs::create_dir_all(&plan.output_dir) {
            let reason = FailureReason::Io(format!(
                "cannot create output directory {}: {e}",
                plan.output_dir.display()
            ));
            return self.fail(rec, RunState::SettingsResolution, reason);
        }

        self.enter(&rec, RunState::RunMeasurement);
        let measure = self.builder.measurement_command(&settings, &artifact);
        match self.execute(&measure, "measurement") {
            Ok(code) => rec.measurement_exit_code = Some(code),
            Err(reason) => return self.fail(rec, RunState::RunMeasurement, reason),
        }
        if let Some(reason) = tool_failure(&measure, rec.measurement_exit_code) {
            return self.fail(rec, RunState::RunMeasurement, reason);
        }

        self.enter(&rec, RunState::RunProfiling);
        let cal_file = artifact.cal_path();
        let profile = self.builder.profiling_command(&cal_file, &settings, &artifact);
        match self.execute(&profile, "profiling") {
            Ok(code) => rec.profiling_exit_code = Some(code),
            Err(reason) => return self.fail(rec, RunState::RunProfiling, reason),
        }
        if let Some(reason) = tool_failure(&profile, rec.profiling_exit_code) {
            return self.fail(rec, RunState::RunProfiling, reason);
        }
        rec.profile_path = Some(artifact.icc_path());

        self.enter(&rec, RunState::Success);
        let run = rec.finish(RunOutcome::Success);
        self.log.info(&run.audit_line());
        self.post_success(plan, &run, &artifact);
        run
    }

    /// Calibrates every bucket in turn, darkest first, publishing each profile
    /// under its stable name. Stops after the first failed run.
    pub fn run_variants(&mut self, plan: &RunPlan) -> Vec<CalibrationRun> {
        let mut runs = Vec::with_capacity(LightBucket::ALL.len());
        let mut known_device = plan.known_device;
        for bucket in LightBucket::ALL {
            let mut variant = plan.clone();
            variant.light = LightSource::Fixed(bucket);
            variant.publish = true;
            variant.overrides.profile_base_name = None;
            variant.known_device = known_device;
            self.log.info(&format!("variant {bucket}: starting"));

            let run = self.run(&variant);
            let failed = !run.succeeded();
            let past_probe = !matches!(
                run.outcome,
                RunOutcome::Failed { stage: RunState::DeviceCheck, .. }
            );
            if past_probe {
                known_device = Some(run.device_detected);
            }
            runs.push(run);
            if failed {
                self.log.error(&format!("variant {bucket} failed, remaining variants skipped"));
                break;
            }
        }
        runs
    }

    /// Installs the stored profile for `bucket`.
    ///
    /// # Errors
    ///
    /// [`CalError::ProfileNotFound`] when no stored profile exists,
    /// [`CalError::Spawn`] or [`CalError::ToolFailed`] when dispwin fails.
    pub fn apply_existing(
        &mut self,
        bucket: LightBucket,
        locator: &ProfileLocator,
    ) -> CalResult<PathBuf> {
        let name = crate::published_file_name(bucket);
        let Some(path) = locator.find(&name) else {
            self.log.warn(&format!(
                "no stored profile {name} for {bucket} light; run a full calibration first"
            ));
            return Err(CalError::ProfileNotFound { name });
        };
        self.log.info(&format!("found {bucket} profile {}", path.display()));
        self.install(&path)?;
        Ok(path)
    }

    /// Classifies the current ambient light without starting a run.
    ///
    /// # Errors
    ///
    /// [`CalError::InvalidHour`] for an explicit hour above 23.
    pub fn light_bucket(&mut self, source: LightSource) -> CalResult<LightBucket> {
        let (reading, bucket) = self.estimate(source, Timestamp::now())?;
        self.log_light(reading, bucket);
        Ok(bucket)
    }

    fn log_light(&self, reading: Option<LightReading>, bucket: LightBucket) {
        match reading {
            Some(r) => self.log.info(&format!("ambient light: {bucket} ({r})")),
            None => self.log.info(&format!("ambient light: {bucket} (fixed)")),
        }
    }

    /// Loads calibration curves into the video LUT.
    ///
    /// # Errors
    ///
    /// [`CalError::Spawn`] or [`CalError::ToolFailed`] when dispwin fails.
    pub fn load_calibration(&mut self, cal_file: &Path) -> CalResult<()> {
        let cmd = self.builder.load_command(cal_file);
        self.run_checked(&cmd)
    }

    /// Restores a linear video LUT.
    ///
    /// # Errors
    ///
    /// [`CalError::Spawn`] or [`CalError::ToolFailed`] when dispwin fails.
    pub fn reset_calibration(&mut self) -> CalResult<()> {
        let cmd = self.builder.reset_command();
        self.run_checked(&cmd)
    }

    fn install(&mut self, profile: &Path) -> CalResult<()> {
        let cmd = self.builder.install_command(profile);
        self.run_checked(&cmd)?;
        self.log.info(&format!("profile {} applied", profile.display()));
        Ok(())
    }

    fn run_checked(&mut self, cmd: &CommandLine) -> CalResult<()> {
        self.log.info(&format!("command: {cmd}"));
        let out = self.runner.run(cmd).map_err(|source| CalError::Spawn {
            tool: cmd.program.clone(),
            source,
        })?;
        if !out.success() {
            self.log.warn(&format!(
                "{} exited with status {}: {}",
                cmd.program,
                out.code,
                out.stderr.trim()
            ));
            return Err(CalError::ToolFailed {
                tool: cmd.program.clone(),
                code: out.code,
            });
        }
        Ok(())
    }

    /// `Some(present)` to continue, `None` when the operator aborts.
    fn check_device(&mut self, retries: u32) -> Option<bool> {
        for round in 1..=MAX_DEVICE_ROUNDS {
            if self.probe.is_device_connected(&mut *self.runner, retries) {
                self.log.info("colorimeter detected");
                return Some(true);
            }
            self.log.warn(&format!(
                "colorimeter not detected after {} attempt(s); connect the device",
                retries.max(1)
            ));
            match self.operator.device_missing(round) {
                DeviceChoice::Retry => self.log.info("retrying device check"),
                DeviceChoice::Proceed => {
                    self.log.warn("proceeding without a detected colorimeter");
                    return Some(false);
                }
                DeviceChoice::Abort => return None,
            }
        }
        self.log.warn(&format!("giving up after {MAX_DEVICE_ROUNDS} device check rounds"));
        None
    }

    fn estimate(
        &mut self,
        source: LightSource,
        now: Timestamp,
    ) -> CalResult<(Option<LightReading>, LightBucket)> {
        let reading = match source {
            LightSource::Fixed(bucket) => return Ok((None, bucket)),
            LightSource::Hour(h) => LightReading::from_hour(h)?,
            LightSource::Clock => LightReading::Hour(now.hour()),
            LightSource::Sensor => {
                let cmd = self.builder.ambient_command();
                match read_ambient_lux(&mut *self.runner, &cmd) {
                    Some(lux) => LightReading::Lux(lux),
                    None => {
                        self.log.info("falling back to time-based ambient estimation");
                        LightReading::Hour(now.hour())
                    }
                }
            }
        };
        Ok((Some(reading), reading.bucket()))
    }

    /// Runs an external step and returns its exit code.
    fn execute(&mut self, cmd: &CommandLine, step: &str) -> Result<i32, FailureReason> {
        self.log.info(&format!("{step} command: {cmd}"));
        match self.runner.run(cmd) {
            Ok(out) => {
                self.log.info(&format!("{step} exited with status {}", out.code));
                Ok(out.code)
            }
            Err(e) => {
                self.log.error(&format!("failed to start {}: {e}", cmd.program));
                Err(FailureReason::Io(format!("failed to start {}: {e}", cmd.program)))
            }
        }
    }

    fn post_success(&mut self, plan: &RunPlan, run: &CalibrationRun, artifact: &ProfileArtifact) {
        if plan.dry_run {
            self.log.info("dry run: publish, report and apply skipped");
            return;
        }
        let icc = artifact.icc_path();
        if !icc.is_file() {
            if plan.publish || plan.apply || plan.report_dir.is_some() {
                self.log.warn(&format!("expected profile {} not found", icc.display()));
            }
            return;
        }

        let mut installed = icc.clone();
        if plan.publish {
            let stable = artifact.published_path();
            match fs::copy(&icc, &stable) {
                Ok(_) => {
                    self.log.info(&format!("published {} as {}", icc.display(), stable.display()));
                    installed = stable;
                }
                Err(e) => self.log.warn(&format!("could not publish {}: {e}", stable.display())),
            }
        }

        if let Some(dir) = &plan.report_dir {
            if let Err(e) = write_report(dir, run, artifact) {
                self.log.warn(&format!("could not write report to {}: {e}", dir.display()));
            } else {
                let report = dir.join(artifact.report_file_name());
                self.log.info(&format!("report saved to {}", report.display()));
            }
        }

        if plan.apply {
            if let Err(e) = self.install(&installed) {
                self.log.warn(&format!("profile application failed: {e}"));
            }
        }
    }

    fn enter(&self, rec: &RunRecord, state: RunState) {
        let settings = rec
            .settings
            .as_ref()
            .map_or_else(|| "unresolved".to_string(), ToString::to_string);
        self.log.info(&format!("[{}] -> {state} ({settings})", rec.timestamp));
    }

    fn fail(&self, rec: RunRecord, stage: RunState, reason: FailureReason) -> CalibrationRun {
        self.log.error(&format!(
            "[{}] -> {} in {stage}: {reason}",
            rec.timestamp,
            RunState::Failed
        ));
        let run = rec.finish(RunOutcome::Failed { stage, reason });
        self.log.info(&run.audit_line());
        run
    }
}

fn tool_failure(cmd: &CommandLine, code: Option<i32>) -> Option<FailureReason> {
    match code {
        Some(0) | None => None,
        Some(code) => Some(FailureReason::ToolFailed {
            tool: cmd.program.clone(),
            code,
        }),
    }
}

fn write_report(
    dir: &Path,
    run: &CalibrationRun,
    artifact: &ProfileArtifact,
) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let icc = artifact.icc_path();
    if let Some(name) = icc.file_name() {
        fs::copy(&icc, dir.join(name))?;
    }
    fs::write(dir.join(artifact.report_file_name()), calibration_report(run))
}
