//! Provisioning step pipeline.
//!
//! A pipeline is an ordered list of named, fallible operations executed
//! strictly in sequence against live system state. The first failure halts
//! the run; there is no rollback and no retry. Side effects already
//! committed (created users, written configs, started services) stay in
//! place, and recovery is a whole-pipeline re-run relying on every step
//! being safe to re-execute.
//!
//! Status reporting is decoupled from execution: after every transition the
//! executor pushes a snapshot through an unbounded channel, so a consumer
//! can redraw between steps without ever stalling the next step's start.

use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

pub type StepAction = Box<dyn FnMut() -> Result<()> + Send>;

/// One named provisioning operation. Identity is its position in the
/// pipeline's sequence; the status moves Pending -> Running -> terminal
/// exactly once.
pub struct Step {
    pub name: String,
    action: StepAction,
    pub status: StepStatus,
    pub error: Option<Error>,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        action: impl FnMut() -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
            status: StepStatus::Pending,
            error: None,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish()
    }
}

/// Snapshot of one step transition, pushed to the progress consumer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Execute all steps in order, stopping at the first failure.
    ///
    /// The failing step's error is wrapped with its name and position and
    /// returned; no subsequent step executes, regardless of whether later
    /// steps are logically independent.
    pub fn run(&mut self, progress: Option<&Sender<StepProgress>>) -> Result<()> {
        let total = self.steps.len();

        for index in 0..total {
            let name = self.steps[index].name.clone();

            self.steps[index].status = StepStatus::Running;
            emit(progress, index, total, &name, StepStatus::Running, None);

            match (self.steps[index].action)() {
                Ok(()) => {
                    self.steps[index].status = StepStatus::Succeeded;
                    emit(progress, index, total, &name, StepStatus::Succeeded, None);
                }
                Err(err) => {
                    self.steps[index].status = StepStatus::Failed;
                    emit(
                        progress,
                        index,
                        total,
                        &name,
                        StepStatus::Failed,
                        Some(err.message.clone()),
                    );
                    self.steps[index].error = Some(err.clone());
                    return Err(Error::step_failed(&name, index, err));
                }
            }
        }

        Ok(())
    }
}

/// Send on an unbounded channel never blocks, and a consumer that has gone
/// away must not abort the run, so the send result is ignored.
fn emit(
    progress: Option<&Sender<StepProgress>>,
    index: usize,
    total: usize,
    name: &str,
    status: StepStatus,
    error: Option<String>,
) {
    if let Some(tx) = progress {
        let _ = tx.send(StepProgress {
            index,
            total,
            name: name.to_string(),
            status,
            error,
        });
    }
}
