use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ActionError, PlanError};

/// The five things the planner may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Click,
    Type,
    Wait,
    Error,
    Finish,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Wait => "wait",
            ActionKind::Error => "error",
            ActionKind::Finish => "finish",
        }
    }

    /// `finish` and `error` end the run once a batch ending in them has executed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionKind::Finish | ActionKind::Error)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "click" => Ok(ActionKind::Click),
            "type" => Ok(ActionKind::Type),
            "wait" => Ok(ActionKind::Wait),
            "error" => Ok(ActionKind::Error),
            "finish" => Ok(ActionKind::Finish),
            other => Err(ActionError::UnknownKind(other.to_string())),
        }
    }
}

/// A single atomic browser instruction.
///
/// Each variant carries only the fields its kind needs, so a click without a
/// target or a type without text cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireAction", into = "WireAction")]
pub enum Action {
    /// Activate the element carrying the on-screen label `target`.
    Click { target: String, rationale: String },
    /// Enter `value` into the last focused input.
    Type { value: String, rationale: String },
    Wait { rationale: String },
    Error { rationale: String },
    Finish { rationale: String },
}

impl Action {
    pub fn click(target: impl Into<String>, rationale: impl Into<String>) -> Self {
        Action::Click {
            target: target.into(),
            rationale: rationale.into(),
        }
    }

    pub fn type_text(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Action::Type {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn wait(rationale: impl Into<String>) -> Self {
        Action::Wait {
            rationale: rationale.into(),
        }
    }

    pub fn error(rationale: impl Into<String>) -> Self {
        Action::Error {
            rationale: rationale.into(),
        }
    }

    pub fn finish(rationale: impl Into<String>) -> Self {
        Action::Finish {
            rationale: rationale.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click { .. } => ActionKind::Click,
            Action::Type { .. } => ActionKind::Type,
            Action::Wait { .. } => ActionKind::Wait,
            Action::Error { .. } => ActionKind::Error,
            Action::Finish { .. } => ActionKind::Finish,
        }
    }

    /// Locator for clicks, payload for typing, nothing otherwise.
    pub fn text(&self) -> Option<&str> {
        match self {
            Action::Click { target, .. } => Some(target),
            Action::Type { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            Action::Click { rationale, .. }
            | Action::Type { rationale, .. }
            | Action::Wait { rationale }
            | Action::Error { rationale }
            | Action::Finish { rationale } => rationale,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { target, .. } => write!(f, "click \"{target}\""),
            // Typed text may be a credential.
            Action::Type { value, .. } => write!(f, "type ({} chars)", value.chars().count()),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

/// The record exchanged with the vision model:
/// `{"action": "...", "text": "...", "explanation": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

impl TryFrom<WireAction> for Action {
    type Error = ActionError;

    fn try_from(wire: WireAction) -> Result<Self, ActionError> {
        let rationale = wire.explanation;
        let action = match wire.action.parse::<ActionKind>()? {
            ActionKind::Click => {
                let target = wire
                    .text
                    .map(|t| t.trim().to_ascii_uppercase())
                    .filter(|t| !t.is_empty())
                    .ok_or(ActionError::MissingTarget)?;
                Action::Click { target, rationale }
            }
            ActionKind::Type => {
                let value = wire.text.ok_or(ActionError::MissingValue)?;
                Action::Type { value, rationale }
            }
            ActionKind::Wait => Action::Wait { rationale },
            ActionKind::Error => Action::Error { rationale },
            ActionKind::Finish => Action::Finish { rationale },
        };
        Ok(action)
    }
}

impl From<Action> for WireAction {
    fn from(action: Action) -> Self {
        WireAction {
            action: action.kind().as_str().to_string(),
            text: action.text().map(str::to_string),
            explanation: action.rationale().to_string(),
        }
    }
}

/// Loop-detection key derived from the last action of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn of(action: &Action) -> Self {
        match action.text() {
            Some(text) => Signature(format!("{}:{}", action.kind(), text)),
            None => Signature(action.kind().as_str().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty, ordered group of actions from one planning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBatch(Vec<Action>);

impl ActionBatch {
    pub fn new(actions: Vec<Action>) -> Result<Self, PlanError> {
        if actions.is_empty() {
            return Err(PlanError::EmptyBatch);
        }
        Ok(ActionBatch(actions))
    }

    /// Parse a raw model reply. Markdown fences are tolerated and a bare
    /// object is treated as a one-element batch.
    pub fn parse(content: &str) -> Result<Self, PlanError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Reply {
            Many(Vec<WireAction>),
            One(WireAction),
        }

        let cleaned = strip_fences(content);
        if cleaned.is_empty() {
            return Err(PlanError::EmptyBatch);
        }

        let wire = match serde_json::from_str::<Reply>(cleaned)? {
            Reply::Many(items) => items,
            Reply::One(item) => vec![item],
        };

        let actions = wire
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Action::try_from(item).map_err(|source| PlanError::InvalidAction { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        ActionBatch::new(actions)
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn last(&self) -> &Action {
        // Non-empty by construction.
        &self.0[self.0.len() - 1]
    }

    pub fn signature(&self) -> Signature {
        Signature::of(self.last())
    }

    /// Kind of the last action; decides the run status after execution.
    pub fn terminal_kind(&self) -> ActionKind {
        self.last().kind()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A constructed batch is never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.0
    }
}

fn strip_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
