//! Bootstrap state machine
//!
//! ```text
//! START -> CHECK_DERIVED -> LAUNCH
//!                        -> CHECK_BASE -> PATCHING -> LAUNCH
//!                                      -> FETCHING -> PATCHING
//! any non-terminal state -> FAILED
//! ```

use crate::error::StateError;
use std::fmt::{self, Display, Formatter};

/// Stage of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootState {
    Start,
    CheckDerived,
    CheckBase,
    Fetching,
    Patching,
    Launch,
    Failed,
}

impl BootState {
    pub const ALL: [Self; 7] = [
        Self::Start,
        Self::CheckDerived,
        Self::CheckBase,
        Self::Fetching,
        Self::Patching,
        Self::Launch,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::CheckDerived => "CHECK_DERIVED",
            Self::CheckBase => "CHECK_BASE",
            Self::Fetching => "FETCHING",
            Self::Patching => "PATCHING",
            Self::Launch => "LAUNCH",
            Self::Failed => "FAILED",
        }
    }

    /// No transitions leave this state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for BootState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: BootState) -> &'static [BootState] {
    use BootState::{CheckBase, CheckDerived, Failed, Fetching, Launch, Patching, Start};
    match from {
        Start => &[CheckDerived, Failed],
        CheckDerived => &[Launch, CheckBase, Failed],
        CheckBase => &[Patching, Fetching, Failed],
        Fetching => &[Patching, Failed],
        Patching => &[Launch, Failed],
        Launch | Failed => &[],
    }
}

/// Validates a state transition
///
/// # Errors
/// Returns [`StateError`] if `to` is not reachable from `from`
pub fn validate_transition(from: BootState, to: BootState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError { from, to })
    }
}

/// Current state plus every state visited so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    visited: Vec<BootState>,
}

impl StateTrace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            visited: vec![BootState::Start],
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> BootState {
        self.visited.last().copied().unwrap_or(BootState::Start)
    }

    #[inline]
    #[must_use]
    pub fn visited(&self) -> &[BootState] {
        &self.visited
    }

    /// Move to `to`, logging the transition
    ///
    /// # Errors
    /// Returns [`StateError`] on an illegal transition; the state is unchanged
    pub fn advance(&mut self, to: BootState) -> Result<(), StateError> {
        let from = self.current();
        validate_transition(from, to)?;
        tracing::info!(%from, %to, "state transition");
        self.visited.push(to);
        Ok(())
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}
