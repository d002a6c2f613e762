//! Outcome of a server stop.
//!
//! Stopping never fails as a whole. Each step records what happened to it so
//! callers and tests can see which parts of teardown went wrong.

use std::fmt;

/// Teardown steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    Hooks,
    Monitor,
    Sockets,
    Listener,
}

impl ShutdownStep {
    pub const ALL: [ShutdownStep; 4] = [
        ShutdownStep::Hooks,
        ShutdownStep::Monitor,
        ShutdownStep::Sockets,
        ShutdownStep::Listener,
    ];
}

impl fmt::Display for ShutdownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownStep::Hooks => "hooks",
            ShutdownStep::Monitor => "monitor",
            ShutdownStep::Sockets => "sockets",
            ShutdownStep::Listener => "listener",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Nothing to do, e.g. the server was not running.
    Skipped,
    Failed(String),
}

/// Per-step results of one `stop()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    steps: Vec<(ShutdownStep, StepOutcome)>,
}

impl ShutdownReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report for a stop that found nothing running.
    pub fn all_skipped() -> Self {
        Self {
            steps: ShutdownStep::ALL
                .iter()
                .map(|step| (*step, StepOutcome::Skipped))
                .collect(),
        }
    }

    /// Record a step, logging failures.
    pub fn record(&mut self, step: ShutdownStep, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Failed(reason) => {
                tracing::warn!(step = %step, reason = %reason, "Shutdown step failed, continuing")
            }
            StepOutcome::Completed => tracing::debug!(step = %step, "Shutdown step completed"),
            StepOutcome::Skipped => tracing::debug!(step = %step, "Shutdown step skipped"),
        }
        self.steps.push((step, outcome));
    }

    pub fn outcome(&self, step: ShutdownStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn steps(&self) -> &[(ShutdownStep, StepOutcome)] {
        &self.steps
    }

    /// True when no step failed.
    pub fn is_clean(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|(_, outcome)| matches!(outcome, StepOutcome::Failed(_)))
    }

    pub fn was_running(&self) -> bool {
        self.steps
            .iter()
            .any(|(_, outcome)| *outcome != StepOutcome::Skipped)
    }
}
