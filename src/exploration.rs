//! Coarse progress tracker for tasks that walk a menu tree.
//!
//! The control loop only reads this state to render the planner's summary.
//! Callers that know the page structure update it through the mutators.

use crate::action::Signature;
use std::fmt::Write;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExplorationState {
    explored: Vec<String>,
    current: Option<String>,
    checked: Vec<String>,
}

impl ExplorationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start exploring `item`. The previous current item, if any, counts as
    /// fully explored and its checked sub-items are forgotten.
    pub fn enter(&mut self, item: impl Into<String>) {
        let item = item.into();
        if self.current.as_deref() == Some(item.as_str()) {
            return;
        }
        if let Some(previous) = self.current.take() {
            push_unique(&mut self.explored, previous);
        }
        self.checked.clear();
        self.current = Some(item);
    }

    pub fn check_sub_item(&mut self, sub_item: impl Into<String>) {
        push_unique(&mut self.checked, sub_item.into());
    }

    /// Mark the current item as fully explored and clear it.
    pub fn finish_current(&mut self) {
        if let Some(item) = self.current.take() {
            push_unique(&mut self.explored, item);
        }
        self.checked.clear();
    }

    pub fn explored(&self) -> &[String] {
        &self.explored
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn checked(&self) -> &[String] {
        &self.checked
    }

    /// Natural-language block handed to the planner. The blocked list only
    /// appears once something has been blocked.
    pub fn summary(&self, blocked: &[Signature]) -> String {
        let mut out = String::from("Exploration progress:\n");
        let _ = writeln!(out, "- Fully explored items: {}", join_or_none(&self.explored));
        let _ = writeln!(
            out,
            "- Sub-items checked in the current item: {}",
            join_or_none(&self.checked)
        );
        let _ = writeln!(
            out,
            "- Currently exploring: {}",
            self.current.as_deref().unwrap_or("none")
        );

        if !blocked.is_empty() {
            let list = blocked
                .iter()
                .map(Signature::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "- BLOCKED actions (these caused a loop and must NOT be repeated): {list}"
            );
            out.push_str("Choose a different action than any blocked one.\n");
        }
        out
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
