//! Staged execution of mesh algorithms.
//!
//! Every algorithm runs as an ordered list of stages:
//!
//! ```text
//! setup -> config_check -> is_processable -> process -> post_process
//! ```
//!
//! Each stage can be switched off (`run = false`, recorded as skipped) or
//! forced past a failure (`force = true`). Stages never return errors; they
//! report an [`ExitStatus`], and the whole run produces a [`PipelineReport`]
//! that a driver can tally without aborting.
//!
//! # Example
//!
//! ```
//! use dcel_kernel::algo::{ExitStatus, Pipeline, PipelineSettings, Stage, StageOutcome};
//!
//! let mut count = 0;
//! let report = Pipeline::new("count", PipelineSettings::default())
//!     .stage(Stage::Setup, |n: &mut i32, _| {
//!         *n += 1;
//!         StageOutcome::Ok
//!     })
//!     .stage(Stage::Process, |n: &mut i32, _| {
//!         *n += 1;
//!         StageOutcome::Ok
//!     })
//!     .run(&mut count);
//!
//! assert_eq!(count, 2);
//! assert_eq!(report.status, ExitStatus::Success);
//! ```

use std::fmt;

use log::{debug, trace};

/// Numeric result of a stage or of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExitStatus {
    /// The stage completed.
    Success = 0,
    /// The stage was not run.
    Skipped = 1,
    /// The configuration is invalid.
    ConfigError = 2,
    /// The input was rejected by a precondition; nothing was modified.
    NotProcessable = 3,
    /// An index was the invalid sentinel.
    InvalidIndex = 4,
    /// An index referred to an absent entity.
    NotFound = 5,
    /// Topology is corrupted. Fatal: forcing does not continue past it.
    InvalidTopology = 6,
    /// The configuration is recognised but unsupported.
    NotImplemented = 7,
}

impl ExitStatus {
    /// Every status, in code order.
    pub const ALL: [ExitStatus; 8] = [
        ExitStatus::Success,
        ExitStatus::Skipped,
        ExitStatus::ConfigError,
        ExitStatus::NotProcessable,
        ExitStatus::InvalidIndex,
        ExitStatus::NotFound,
        ExitStatus::InvalidTopology,
        ExitStatus::NotImplemented,
    ];

    /// Stable numeric code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this status aborts a pipeline even when the stage is forced.
    #[inline]
    pub fn is_fatal(self) -> bool {
        self == ExitStatus::InvalidTopology
    }

    /// Whether this status is a failure (neither success nor skipped).
    #[inline]
    pub fn is_failure(self) -> bool {
        !matches!(self, ExitStatus::Success | ExitStatus::Skipped)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitStatus::Success => "success",
            ExitStatus::Skipped => "skipped",
            ExitStatus::ConfigError => "config error",
            ExitStatus::NotProcessable => "not processable",
            ExitStatus::InvalidIndex => "invalid index",
            ExitStatus::NotFound => "not found",
            ExitStatus::InvalidTopology => "invalid topology",
            ExitStatus::NotImplemented => "not implemented",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// The stages of a pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Acquire inputs and reset state.
    Setup,
    /// Validate parameters.
    ConfigCheck,
    /// Read-only precondition check on the input.
    IsProcessable,
    /// Do the work.
    Process,
    /// Verify and finalise.
    PostProcess,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Setup,
        Stage::ConfigCheck,
        Stage::IsProcessable,
        Stage::Process,
        Stage::PostProcess,
    ];

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Per-stage switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSettings {
    /// Run the stage at all.
    pub run: bool,
    /// Continue after a non-fatal failure of this stage.
    pub force: bool,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            run: true,
            force: false,
        }
    }
}

/// Settings shared by all stages of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    stages: [StageSettings; 5],

    /// Allow stages to use rayon. Edit operators run their debug
    /// whole-container checks in parallel when this is set.
    pub multi_thread: bool,

    /// Run expensive whole-container checks after processing.
    pub debug: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stages: [StageSettings::default(); 5],
            multi_thread: false,
            debug: cfg!(feature = "strict-checks"),
        }
    }
}

impl PipelineSettings {
    /// The switches of one stage.
    #[inline]
    pub fn stage(&self, stage: Stage) -> StageSettings {
        self.stages[stage.slot()]
    }

    /// Enable or disable a stage.
    pub fn with_run(mut self, stage: Stage, run: bool) -> Self {
        self.stages[stage.slot()].run = run;
        self
    }

    /// Set whether a stage's failure is forced past.
    pub fn with_force(mut self, stage: Stage, force: bool) -> Self {
        self.stages[stage.slot()].force = force;
        self
    }

    /// Set whether stages may run in parallel.
    pub fn with_multi_thread(mut self, multi_thread: bool) -> Self {
        self.multi_thread = multi_thread;
        self
    }

    /// Set whether post-processing runs whole-container checks.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// What a stage closure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage completed.
    Ok,
    /// The stage decided it had nothing to do.
    Skip,
    /// The stage failed.
    Fail(ExitStatus),
}

impl StageOutcome {
    /// The status recorded for this outcome.
    pub fn status(self) -> ExitStatus {
        match self {
            StageOutcome::Ok => ExitStatus::Success,
            StageOutcome::Skip => ExitStatus::Skipped,
            StageOutcome::Fail(status) => status,
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Status of every stage that was reached, in order.
    pub stages: Vec<(Stage, ExitStatus)>,

    /// Overall status: the failure that stopped the run, or `Success`, or
    /// `Skipped` when no stage ran.
    pub status: ExitStatus,
}

impl PipelineReport {
    /// Whether the run completed without a stopping failure.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == ExitStatus::Success
    }

    /// Status of one stage, if it was reached.
    pub fn stage_status(&self, stage: Stage) -> Option<ExitStatus> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|&(_, status)| status)
    }
}

type StageFn<'a, D> = Box<dyn FnMut(&mut D, &PipelineSettings) -> StageOutcome + 'a>;

/// An ordered list of stages over some data `D`.
pub struct Pipeline<'a, D> {
    name: &'static str,
    settings: PipelineSettings,
    stages: Vec<(Stage, StageFn<'a, D>)>,
}

impl<'a, D> Pipeline<'a, D> {
    /// Create an empty pipeline.
    pub fn new(name: &'static str, settings: PipelineSettings) -> Self {
        Self {
            name,
            settings,
            stages: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    /// Append a stage.
    pub fn stage<F>(mut self, stage: Stage, f: F) -> Self
    where
        F: FnMut(&mut D, &PipelineSettings) -> StageOutcome + 'a,
    {
        self.stages.push((stage, Box::new(f)));
        self
    }

    /// The settings this pipeline runs with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run all stages in order.
    pub fn run(mut self, data: &mut D) -> PipelineReport {
        let mut stages = Vec::with_capacity(self.stages.len());
        let mut stopped = None;
        let mut any_ran = false;

        for (stage, f) in self.stages.iter_mut() {
            let switches = self.settings.stage(*stage);
            if !switches.run {
                trace!("{}: {:?} disabled", self.name, stage);
                stages.push((*stage, ExitStatus::Skipped));
                continue;
            }

            let status = f(data, &self.settings).status();
            trace!("{}: {:?} -> {}", self.name, stage, status);
            stages.push((*stage, status));
            any_ran |= status == ExitStatus::Success;

            if status.is_failure() {
                if switches.force && !status.is_fatal() {
                    debug!("{}: forcing past {:?} failure ({})", self.name, stage, status);
                    continue;
                }
                stopped = Some(status);
                break;
            }
        }

        let status = match stopped {
            Some(status) => status,
            None if any_ran => ExitStatus::Success,
            None => ExitStatus::Skipped,
        };
        debug!("{}: finished with {}", self.name, status);
        PipelineReport { stages, status }
    }
}

impl<'a, D> fmt::Debug for Pipeline<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("stages", &self.stages.iter().map(|(s, _)| *s).collect::<Vec<_>>())
            .finish()
    }
}
