use crate::domain::models::Gesture;

/// Candidates required before a gesture is confirmed
pub const DEBOUNCE_RUN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Not enough candidates yet
    Pending,
    /// A full run of identical candidates
    Confirmed(Gesture),
    /// A full run that disagreed, discarded
    Rejected,
}

/// Requires a run of identical candidates before a gesture counts
#[derive(Debug, Default)]
pub struct DebounceFilter {
    actions: Vec<Gesture>,
}

impl DebounceFilter {
    pub fn new() -> Self {
        Self {
            actions: Vec::with_capacity(DEBOUNCE_RUN),
        }
    }

    /// Record a candidate. `noop` is never buffered.
    pub fn push(&mut self, candidate: Gesture) -> DebounceOutcome {
        if candidate.is_noop() {
            return DebounceOutcome::Pending;
        }

        self.actions.push(candidate);
        if self.actions.len() < DEBOUNCE_RUN {
            return DebounceOutcome::Pending;
        }

        let first = self.actions[0];
        let agreed = self.actions.iter().all(|g| *g == first);
        self.actions.clear();

        if agreed {
            DebounceOutcome::Confirmed(first)
        } else {
            DebounceOutcome::Rejected
        }
    }

    pub fn pending(&self) -> &[Gesture] {
        &self.actions
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_identical_confirm_once() {
        let mut filter = DebounceFilter::new();
        assert_eq!(filter.push(Gesture::Up), DebounceOutcome::Pending);
        assert_eq!(filter.push(Gesture::Up), DebounceOutcome::Pending);
        assert_eq!(filter.push(Gesture::Up), DebounceOutcome::Confirmed(Gesture::Up));
        assert!(filter.pending().is_empty());
    }

    #[test]
    fn test_mismatch_rejects_and_clears() {
        let mut filter = DebounceFilter::new();
        filter.push(Gesture::Up);
        filter.push(Gesture::Down);
        assert_eq!(filter.push(Gesture::Up), DebounceOutcome::Rejected);
        assert!(filter.pending().is_empty());
    }

    #[test]
    fn test_noop_is_not_buffered() {
        let mut filter = DebounceFilter::new();
        filter.push(Gesture::Left);
        assert_eq!(filter.push(Gesture::Noop), DebounceOutcome::Pending);
        filter.push(Gesture::Left);
        assert_eq!(filter.pending(), &[Gesture::Left, Gesture::Left]);
        assert_eq!(
            filter.push(Gesture::Left),
            DebounceOutcome::Confirmed(Gesture::Left)
        );
    }
}
