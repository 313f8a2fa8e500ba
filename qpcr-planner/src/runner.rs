//! Driver contract and run executor
//!
//! [`ProtocolRunner`] plans a run against the deck the driver reports,
//! verifies the plan, then hands events to a [`LiquidHandler`] strictly in
//! order. Cancellation is polled once per stage boundary, before the pauses
//! and temperature changes that follow a stage. Any failure is shown to the
//! operator and returned; nothing is retried.

use crate::plan::{TipUsage, TransferPlan};
use chrono::Utc;
use qpcr_core::{
    new_run_id, DeckLayout, DriverError, OperatorPrompt, PlanEvent, QpcrError, QpcrResult, RunId,
    RunParameters, Stage, StageConfiguration, Timestamp, TransferStep,
};
use serde::{Deserialize, Serialize};

/// The robot-control collaborator. Every call blocks until the physical
/// action (or the operator) is done.
pub trait LiquidHandler {
    /// Plate geometries and tip-rack slots as loaded on the robot.
    fn deck_layout(&self) -> DeckLayout;

    fn execute(&mut self, step: &TransferStep) -> Result<(), DriverError>;

    /// Returns only when the operator resumes. No timeout.
    fn pause(&mut self, prompt: &OperatorPrompt) -> Result<(), DriverError>;

    fn set_temperature(&mut self, celsius: f64) -> Result<(), DriverError>;

    fn deactivate_temperature(&mut self) -> Result<(), DriverError>;

    /// Blocking error surface shown when a run halts.
    fn notify_operator(&mut self, message: &str);

    fn cancel_requested(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled { before_stage: Stage },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub outcome: RunOutcome,
    pub fingerprint: String,
    pub transfers_executed: usize,
    pub pauses_acknowledged: usize,
    pub tip_usage: Vec<TipUsage>,
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    outcome: RunOutcome,
    transfers: usize,
    pauses: usize,
}

/// Runs one validated configuration to completion or cancellation.
#[derive(Debug, Clone)]
pub struct ProtocolRunner {
    config: StageConfiguration,
}

impl ProtocolRunner {
    pub fn new(config: StageConfiguration) -> Self {
        Self { config }
    }

    pub fn from_parameters(params: &RunParameters) -> QpcrResult<Self> {
        Ok(Self::new(params.validate()?))
    }

    /// Validate `params` and run them. Invalid parameters are reported to
    /// the operator like any other halt.
    pub fn run_parameters<H: LiquidHandler>(
        params: &RunParameters,
        handler: &mut H,
    ) -> QpcrResult<RunReport> {
        match Self::from_parameters(params) {
            Ok(runner) => runner.run(handler),
            Err(err) => Err(Self::halt(handler, err)),
        }
    }

    pub fn config(&self) -> &StageConfiguration {
        &self.config
    }

    /// Plan and verify against the driver's deck without moving anything.
    pub fn plan<H: LiquidHandler>(&self, handler: &H) -> QpcrResult<TransferPlan> {
        let layout = handler.deck_layout();
        let plan = TransferPlan::generate(&self.config, &layout)?;
        plan.verify(&layout)?;
        Ok(plan)
    }

    pub fn run<H: LiquidHandler>(&self, handler: &mut H) -> QpcrResult<RunReport> {
        let run_id = new_run_id();
        let started_at = Utc::now();
        let span = tracing::info_span!("protocol_run", run_id = %run_id);
        let _enter = span.enter();

        let result = self
            .plan(handler)
            .and_then(|plan| Self::execute(&plan, handler).map(|progress| (plan, progress)));

        match result {
            Ok((plan, progress)) => {
                let report = RunReport {
                    run_id,
                    started_at,
                    finished_at: Utc::now(),
                    outcome: progress.outcome,
                    fingerprint: plan.fingerprint.clone(),
                    transfers_executed: progress.transfers,
                    pauses_acknowledged: progress.pauses,
                    tip_usage: plan.tip_usage(),
                };
                tracing::info!(
                    outcome = ?report.outcome,
                    transfers = report.transfers_executed,
                    "Run finished"
                );
                Ok(report)
            }
            Err(err) => Err(Self::halt(handler, err)),
        }
    }

    fn halt<H: LiquidHandler>(handler: &mut H, err: QpcrError) -> QpcrError {
        tracing::error!(error = %err, "Run halted");
        handler.notify_operator(&err.operator_message());
        err
    }

    fn execute<H: LiquidHandler>(plan: &TransferPlan, handler: &mut H) -> QpcrResult<Progress> {
        let mut current: Option<Stage> = None;
        let mut polled = false;
        let mut transfers = 0;
        let mut pauses = 0;

        for event in &plan.events {
            let at_boundary = match event {
                PlanEvent::Transfer(step) => current != Some(step.stage),
                _ => true,
            };
            if at_boundary && !polled {
                polled = true;
                if let Some(next) = next_stage(current) {
                    if handler.cancel_requested() {
                        tracing::warn!(before_stage = %next, "Run cancelled by operator");
                        return Ok(Progress {
                            outcome: RunOutcome::Cancelled { before_stage: next },
                            transfers,
                            pauses,
                        });
                    }
                }
            }

            match event {
                PlanEvent::Transfer(step) => {
                    if current != Some(step.stage) {
                        tracing::info!(stage = %step.stage, phase = %step.stage.phase(), "Stage started");
                        current = Some(step.stage);
                        polled = false;
                    }
                    handler.execute(step).map_err(|e| {
                        tracing::error!(step = %step, error = %e, "Driver failed to execute step");
                        e
                    })?;
                    transfers += 1;
                }
                PlanEvent::Pause(prompt) => {
                    tracing::info!(after_stage = %prompt.after_stage, "Waiting for operator");
                    handler.pause(prompt)?;
                    pauses += 1;
                }
                PlanEvent::SetTemperature { celsius } => handler.set_temperature(*celsius)?,
                PlanEvent::DeactivateTemperature => handler.deactivate_temperature()?,
            }
        }

        Ok(Progress {
            outcome: RunOutcome::Completed,
            transfers,
            pauses,
        })
    }
}

/// Stage that follows `current` in run order; the first stage before any.
fn next_stage(current: Option<Stage>) -> Option<Stage> {
    match current {
        None => Stage::ALL.first().copied(),
        Some(stage) => Stage::ALL
            .iter()
            .position(|s| *s == stage)
            .and_then(|i| Stage::ALL.get(i + 1).copied()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
