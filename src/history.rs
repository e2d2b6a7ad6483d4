use crate::action::{Action, ActionBatch};

/// How many past actions the planner gets to see.
pub const HISTORY_WINDOW: usize = 10;

/// The last `cap` entries of `log` in original order, or all of it when shorter.
pub fn window(log: &[Action], cap: usize) -> &[Action] {
    if log.len() > cap {
        &log[log.len() - cap..]
    } else {
        log
    }
}

/// Append-only record of every executed action in the run.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<Action>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, batch: &ActionBatch) {
        self.entries.extend_from_slice(batch.actions());
    }

    pub fn window(&self, cap: usize) -> &[Action] {
        window(&self.entries, cap)
    }

    pub fn entries(&self) -> &[Action] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<Action> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicks(n: usize) -> Vec<Action> {
        (0..n).map(|i| Action::click(format!("L{i}"), "")).collect()
    }

    #[test]
    fn short_log_is_returned_whole() {
        let log = clicks(4);
        assert_eq!(window(&log, HISTORY_WINDOW), log.as_slice());
        assert!(window(&[], HISTORY_WINDOW).is_empty());
    }

    #[test]
    fn long_log_is_cut_to_most_recent_suffix() {
        let log = clicks(23);
        let view = window(&log, HISTORY_WINDOW);
        assert_eq!(view.len(), HISTORY_WINDOW);
        assert_eq!(view, &log[13..]);
        assert_eq!(view.last(), log.last());
    }

    #[test]
    fn log_grows_by_whole_batches() {
        let mut log = HistoryLog::new();
        for chunk in clicks(12).chunks(3) {
            log.append(&ActionBatch::new(chunk.to_vec()).unwrap());
        }
        assert_eq!(log.len(), 12);
        assert_eq!(log.window(HISTORY_WINDOW).len(), HISTORY_WINDOW);
        assert_eq!(log.window(HISTORY_WINDOW)[0], Action::click("L2", ""));
    }
}
