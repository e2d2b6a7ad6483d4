//! Repeated-action detection.
//!
//! The guard remembers the signatures of the last few executed batches. A
//! proposed batch whose signature would reach the repeat threshold inside
//! that window is vetoed and its signature blocked. Once enough distinct
//! signatures are blocked the run is judged stuck.

use std::collections::VecDeque;

use crate::action::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Executed signatures remembered.
    pub window: usize,
    /// Occurrences within the window (counting the proposal) that trigger a veto.
    pub repeat_threshold: usize,
    /// Blocked signatures after which the run aborts.
    pub max_blocked: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            window: 5,
            repeat_threshold: 3,
            max_blocked: 5,
        }
    }
}

/// Outcome of inspecting a proposed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Skip this batch and re-plan on the next iteration.
    Veto { repeats: usize },
    /// The blocked set is full; the run cannot recover.
    Saturated,
}

#[derive(Debug, Clone)]
pub struct LoopGuard {
    config: GuardConfig,
    recent: VecDeque<Signature>,
    blocked: Vec<Signature>,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

impl LoopGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.window),
            blocked: Vec::with_capacity(config.max_blocked),
            config,
        }
    }

    /// Judge a signature that has not been executed yet.
    ///
    /// On a veto the signature joins the blocked set and the recent window is
    /// cleared so the next proposals start from a clean slate.
    pub fn inspect(&mut self, signature: &Signature) -> Verdict {
        let seen = self.occurrences(signature);
        if seen + 1 < self.config.repeat_threshold {
            return Verdict::Allow;
        }

        if !self.blocked.contains(signature) {
            self.blocked.push(signature.clone());
        }
        self.recent.clear();

        if self.blocked.len() >= self.config.max_blocked {
            Verdict::Saturated
        } else {
            Verdict::Veto { repeats: seen + 1 }
        }
    }

    /// Remember a signature whose batch has just been executed.
    pub fn record_executed(&mut self, signature: Signature) {
        if self.config.window == 0 {
            return;
        }
        while self.recent.len() >= self.config.window {
            self.recent.pop_front();
        }
        self.recent.push_back(signature);
    }

    pub fn occurrences(&self, signature: &Signature) -> usize {
        self.recent.iter().filter(|s| *s == signature).count()
    }

    pub fn blocked(&self) -> &[Signature] {
        &self.blocked
    }

    pub fn recent(&self) -> impl Iterator<Item = &Signature> {
        self.recent.iter()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    fn sig(target: &str) -> Signature {
        Signature::of(&Action::click(target, ""))
    }

    /// Inspect and, when allowed, record as executed.
    fn propose(guard: &mut LoopGuard, s: &Signature) -> Verdict {
        let verdict = guard.inspect(s);
        if verdict == Verdict::Allow {
            guard.record_executed(s.clone());
        }
        verdict
    }

    #[test]
    fn third_identical_signature_is_vetoed() {
        let mut guard = LoopGuard::default();
        let da = sig("DA");
        assert_eq!(propose(&mut guard, &da), Verdict::Allow);
        assert_eq!(propose(&mut guard, &da), Verdict::Allow);
        assert_eq!(propose(&mut guard, &da), Verdict::Veto { repeats: 3 });
        assert_eq!(guard.blocked(), [da.clone()]);
        assert_eq!(guard.recent_len(), 0);
    }

    #[test]
    fn repeats_outside_the_window_are_forgotten() {
        let mut guard = LoopGuard::default();
        let da = sig("DA");
        propose(&mut guard, &da);
        for target in ["A1", "A2", "A3", "A4"] {
            assert_eq!(propose(&mut guard, &sig(target)), Verdict::Allow);
        }
        // The first DA was evicted; only one remains in view after this.
        assert_eq!(propose(&mut guard, &da), Verdict::Allow);
        assert_eq!(guard.occurrences(&da), 1);
        assert_eq!(guard.recent_len(), 5);
        assert!(guard.blocked().is_empty());
    }

    #[test]
    fn interleaved_repeats_still_count() {
        let mut guard = LoopGuard::default();
        let da = sig("DA");
        propose(&mut guard, &da);
        propose(&mut guard, &sig("XX"));
        propose(&mut guard, &da);
        propose(&mut guard, &sig("YY"));
        assert!(matches!(propose(&mut guard, &da), Verdict::Veto { .. }));
    }

    #[test]
    fn blocked_set_does_not_duplicate() {
        let mut guard = LoopGuard::default();
        let da = sig("DA");
        for _ in 0..2 {
            propose(&mut guard, &da);
            propose(&mut guard, &da);
            assert!(matches!(propose(&mut guard, &da), Verdict::Veto { .. }));
        }
        assert_eq!(guard.blocked().len(), 1);
    }

    #[test]
    fn fifth_distinct_block_saturates() {
        let mut guard = LoopGuard::default();
        for (i, target) in ["B1", "B2", "B3", "B4", "B5"].iter().enumerate() {
            let s = sig(target);
            propose(&mut guard, &s);
            propose(&mut guard, &s);
            let verdict = propose(&mut guard, &s);
            if i < 4 {
                assert!(matches!(verdict, Verdict::Veto { .. }));
            } else {
                assert_eq!(verdict, Verdict::Saturated);
            }
        }
        assert_eq!(guard.blocked().len(), 5);
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let mut guard = LoopGuard::new(GuardConfig {
            window: 3,
            repeat_threshold: 2,
            max_blocked: 1,
        });
        let da = sig("DA");
        assert_eq!(propose(&mut guard, &da), Verdict::Allow);
        assert_eq!(propose(&mut guard, &da), Verdict::Saturated);
    }
}
