use thiserror::Error;

/// Why a single wire record could not become an [`Action`](crate::Action).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action kind '{0}'")]
    UnknownKind(String),
    #[error("click action has no target label")]
    MissingTarget,
    #[error("type action has no text to type")]
    MissingValue,
}

/// Failure signal from the planner. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner returned an empty batch")]
    EmptyBatch,
    #[error("planner reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("action #{index} is invalid: {source}")]
    InvalidAction {
        index: usize,
        #[source]
        source: ActionError,
    },
    #[error("vision endpoint request failed: {0}")]
    Transport(String),
    #[error("vision endpoint returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("vision endpoint reply has no message content")]
    MissingContent,
}
