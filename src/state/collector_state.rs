//! Collector state definitions for tracking collection progress
//!
//! Each unit of work moves `Idle -> WalkingCategories` (a category unit) or
//! `Idle -> EnumeratingLinks -> ExtractingProduct -> Idle` (a subcategory
//! unit). A run ends in `Done` or `Failed`.

use crate::HarvestError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectorState {
    /// Nothing in flight
    Idle,

    /// Fetching a category page and listing its subcategories
    WalkingCategories,

    /// Paginating through a subcategory listing
    EnumeratingLinks,

    /// Fetching and extracting product pages of a listing
    ExtractingProduct,

    /// All work exhausted
    Done,

    /// A non-recoverable error ended the run
    Failed,
}

impl CollectorState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is allowed
    pub fn can_transition_to(&self, next: CollectorState) -> bool {
        use CollectorState::*;

        match self {
            Idle => matches!(next, WalkingCategories | EnumeratingLinks | Done | Failed),
            WalkingCategories => matches!(next, EnumeratingLinks | Idle | Done | Failed),
            EnumeratingLinks => matches!(next, ExtractingProduct | Idle | Failed),
            ExtractingProduct => matches!(next, ExtractingProduct | Idle | Failed),
            Done | Failed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WalkingCategories => "walking_categories",
            Self::EnumeratingLinks => "enumerating_links",
            Self::ExtractingProduct => "extracting_product",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owns the current state of one unit of work
#[derive(Debug)]
pub struct StateTracker {
    /// What this tracker follows (a category or subcategory URL, or "run")
    subject: String,
    state: CollectorState,
}

impl StateTracker {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            state: CollectorState::Idle,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: CollectorState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!(subject = %self.subject, from = %self.state, to = %next, "state change");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcategory_cycle() {
        let mut tracker = StateTracker::new("https://example.com/price/1");
        tracker.transition(CollectorState::EnumeratingLinks).unwrap();
        tracker.transition(CollectorState::ExtractingProduct).unwrap();
        tracker.transition(CollectorState::ExtractingProduct).unwrap();
        tracker.transition(CollectorState::Idle).unwrap();
        assert_eq!(tracker.state(), CollectorState::Idle);
    }

    #[test]
    fn test_failed_enumeration_returns_to_idle() {
        let mut tracker = StateTracker::new("https://example.com/price/2");
        tracker.transition(CollectorState::EnumeratingLinks).unwrap();
        tracker.transition(CollectorState::Idle).unwrap();
        assert_eq!(tracker.state(), CollectorState::Idle);
        assert!(!tracker.state().is_terminal());
    }

    #[test]
    fn test_run_cycle() {
        let mut tracker = StateTracker::new("run");
        tracker.transition(CollectorState::WalkingCategories).unwrap();
        tracker.transition(CollectorState::Idle).unwrap();
        tracker.transition(CollectorState::Done).unwrap();
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!CollectorState::Done.can_transition_to(CollectorState::Idle));
        assert!(!CollectorState::Failed.can_transition_to(CollectorState::Idle));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut tracker = StateTracker::new("run");
        let err = tracker
            .transition(CollectorState::ExtractingProduct)
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::InvalidTransition {
                from: CollectorState::Idle,
                to: CollectorState::ExtractingProduct,
            }
        ));
        assert_eq!(tracker.state(), CollectorState::Idle);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CollectorState::EnumeratingLinks), "enumerating_links");
        assert_eq!(format!("{}", CollectorState::Done), "done");
    }
}
