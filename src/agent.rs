//! The observe, plan, guard, execute loop.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::action::{Action, ActionBatch, Signature};
use crate::error::PlanError;
use crate::exploration::ExplorationState;
use crate::history::{HISTORY_WINDOW, HistoryLog};
use crate::loop_guard::{GuardConfig, LoopGuard, Verdict};

/// PNG bytes of the current browser viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    png: Vec<u8>,
}

impl Screenshot {
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn as_png(&self) -> &[u8] {
        &self.png
    }
}

/// Everything the planner sees for one decision.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub task: &'a str,
    pub screenshot: &'a Screenshot,
    pub previous_actions: &'a [Action],
    pub state_summary: &'a str,
}

/// Decides the next batch of actions.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<ActionBatch, PlanError>;
}

/// Applies actions, in order, to the live page.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, actions: &[Action]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;
    async fn capture_screenshot(&self) -> anyhow::Result<Screenshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Pause before each observation so the page can settle.
    pub settle_delay: Duration,
    pub history_window: usize,
    pub guard: GuardConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            history_window: HISTORY_WINDOW,
            guard: GuardConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorCause {
    #[error("could not open the start page: {0}")]
    Navigation(String),
    #[error("could not capture the page: {0}")]
    Observation(String),
    #[error("planner failed: {0}")]
    PlannerFailure(String),
    #[error("agent is stuck: {} actions blocked ({})", .0.len(), join(.0))]
    LoopSaturated(Vec<Signature>),
    #[error("planner gave up: {0}")]
    PlannerDeclared(String),
}

fn join(signatures: &[Signature]) -> String {
    signatures
        .iter()
        .map(Signature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Errored(ErrorCause),
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }
}

/// What one pass through the loop decided to do.
#[derive(Debug)]
pub enum Decision {
    Execute(ActionBatch),
    Skip,
    Abort(ErrorCause),
}

/// Mutable state owned by a single run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Progress hook; the loop only reads it.
    pub exploration: ExplorationState,
    history: HistoryLog,
    guard: LoopGuard,
    iterations: usize,
}

impl RunState {
    pub fn new(guard: GuardConfig) -> Self {
        Self {
            guard: LoopGuard::new(guard),
            ..Self::default()
        }
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn guard(&self) -> &LoopGuard {
        &self.guard
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn into_report(self, status: RunStatus) -> RunReport {
        RunReport {
            status,
            iterations: self.iterations,
            blocked: self.guard.blocked().to_vec(),
            history: self.history.into_entries(),
            exploration: self.exploration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub iterations: usize,
    pub history: Vec<Action>,
    pub blocked: Vec<Signature>,
    pub exploration: ExplorationState,
}

/// Drives one task to `finished` or `errored`.
pub struct ControlLoop<'a, P: ?Sized, E: ?Sized, D: ?Sized> {
    planner: &'a P,
    executor: &'a E,
    driver: &'a D,
    config: LoopConfig,
}

impl<'a, P, E, D> ControlLoop<'a, P, E, D>
where
    P: Planner + ?Sized,
    E: Executor + ?Sized,
    D: Driver + ?Sized,
{
    pub fn new(planner: &'a P, executor: &'a E, driver: &'a D, config: LoopConfig) -> Self {
        Self {
            planner,
            executor,
            driver,
            config,
        }
    }

    /// Open `url` and work on `task` until a terminal state.
    pub async fn run(&self, url: &str, task: &str) -> RunReport {
        let state = RunState::new(self.config.guard);
        info!(url, "navigating to start page");
        if let Err(e) = self.driver.navigate(url).await {
            error!("navigation failed: {:#}", e);
            return state.into_report(RunStatus::Errored(ErrorCause::Navigation(format!(
                "{e:#}"
            ))));
        }
        self.run_with_state(task, state).await
    }

    /// Continue from an existing state, e.g. one with a pre-seeded
    /// exploration record. Does not navigate.
    pub async fn run_with_state(&self, task: &str, mut state: RunState) -> RunReport {
        loop {
            state.iterations += 1;
            let batch = match self.decide(task, &mut state).await {
                Decision::Execute(batch) => batch,
                Decision::Skip => continue,
                Decision::Abort(cause) => {
                    error!(iteration = state.iterations, "run aborted: {}", cause);
                    return state.into_report(RunStatus::Errored(cause));
                }
            };

            info!(
                iteration = state.iterations,
                actions = batch.len(),
                last = %batch.last(),
                "executing batch"
            );
            for (i, action) in batch.actions().iter().enumerate() {
                info!("  {}. {} ({})", i + 1, action, action.rationale());
            }
            if let Err(e) = self.executor.execute(batch.actions()).await {
                warn!("execution failed, continuing: {:#}", e);
            }

            state.guard.record_executed(batch.signature());
            state.history.append(&batch);

            match batch.last() {
                Action::Finish { rationale } => {
                    info!(iterations = state.iterations, "task finished: {}", rationale);
                    return state.into_report(RunStatus::Finished);
                }
                Action::Error { rationale } => {
                    error!("planner declared an error: {}", rationale);
                    return state.into_report(RunStatus::Errored(ErrorCause::PlannerDeclared(
                        rationale.clone(),
                    )));
                }
                _ => {}
            }
        }
    }

    /// Observe, plan and consult the guard. Never executes anything.
    pub async fn decide(&self, task: &str, state: &mut RunState) -> Decision {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let screenshot = match self.driver.capture_screenshot().await {
            Ok(s) => s,
            Err(e) => return Decision::Abort(ErrorCause::Observation(format!("{e:#}"))),
        };

        let summary = state.exploration.summary(state.guard.blocked());
        let request = PlanRequest {
            task,
            screenshot: &screenshot,
            previous_actions: state.history.window(self.config.history_window),
            state_summary: &summary,
        };

        let batch = match self.planner.plan(request).await {
            Ok(batch) => batch,
            Err(e) => return Decision::Abort(ErrorCause::PlannerFailure(e.to_string())),
        };

        let signature = batch.signature();
        match state.guard.inspect(&signature) {
            Verdict::Allow => Decision::Execute(batch),
            Verdict::Veto { repeats } => {
                warn!(
                    signature = %signature,
                    repeats,
                    blocked = state.guard.blocked().len(),
                    "loop detected, blocking action and re-planning"
                );
                Decision::Skip
            }
            Verdict::Saturated => {
                Decision::Abort(ErrorCause::LoopSaturated(state.guard.blocked().to_vec()))
            }
        }
    }
}
