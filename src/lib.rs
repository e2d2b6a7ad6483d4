//! Vision-guided browser automation.
//!
//! A vision model looks at a screenshot and proposes a batch of actions; the
//! [`ControlLoop`] executes them, guards against repetition and stops when the
//! model says `finish` or `error`.

pub mod action;
pub mod agent;
pub mod error;
pub mod exploration;
pub mod history;
pub mod loop_guard;

pub use action::{Action, ActionBatch, ActionKind, Signature, WireAction};
pub use agent::{
    ControlLoop, Decision, Driver, ErrorCause, Executor, LoopConfig, PlanRequest, Planner,
    RunReport, RunState, RunStatus, Screenshot,
};
pub use error::{ActionError, PlanError};
pub use exploration::ExplorationState;
pub use history::{HISTORY_WINDOW, HistoryLog};
pub use loop_guard::{GuardConfig, LoopGuard, Verdict};
