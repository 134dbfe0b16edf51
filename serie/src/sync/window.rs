//! Per-window lifecycle.
//!
//! ```text
//! Pending -> InFlight -> Succeeded
//!               |  ^
//!               v  |
//!            Retrying -> Failed      (attempts exhausted or fatal error)
//! Pending -> Cancelled               (shutdown, deadline or fatal sibling)
//! ```

use serie_core::{FetchWindow, SerieError, WindowFailure};

/// Lifecycle state of one fetch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Planned, not yet attempted.
    Pending,
    /// An attempt is running.
    InFlight,
    /// The last attempt failed and another one will follow.
    Retrying,
    /// An attempt returned a page.
    Succeeded,
    /// Attempts exhausted, or the error was not retryable.
    Failed,
    /// Never attempted.
    Cancelled,
}

impl WindowState {
    /// True for states with no outgoing transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Retrying, Self::InFlight)
                | (Self::Pending, Self::Cancelled)
                | (
                    Self::InFlight,
                    Self::Succeeded | Self::Retrying | Self::Failed
                )
        )
    }
}

/// One planned window and its attempt history.
#[derive(Debug, Clone)]
pub struct WindowTask {
    /// The remote call parameters.
    pub window: FetchWindow,
    /// Current state.
    pub state: WindowState,
    /// Attempts started so far.
    pub attempts: u32,
    /// Error of the most recent failed attempt.
    pub last_error: Option<SerieError>,
}

impl WindowTask {
    /// A pending task for `window`.
    #[must_use]
    pub const fn new(window: FetchWindow) -> Self {
        Self {
            window,
            state: WindowState::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    fn transition(&mut self, next: WindowState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal window transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Start an attempt.
    pub fn begin_attempt(&mut self) {
        self.transition(WindowState::InFlight);
        self.attempts += 1;
    }

    /// Record a successful attempt.
    pub fn succeed(&mut self) {
        self.transition(WindowState::Succeeded);
    }

    /// Record a failed attempt and return the resulting state.
    ///
    /// Retryable errors lead to `Retrying` while fewer than `max_attempts`
    /// attempts were made; everything else is `Failed`.
    pub fn fail_attempt(&mut self, err: SerieError, max_attempts: u32) -> WindowState {
        let next = if err.is_retryable() && self.attempts < max_attempts {
            WindowState::Retrying
        } else {
            WindowState::Failed
        };
        self.last_error = Some(err);
        self.transition(next);
        next
    }

    /// Mark a never-attempted window as cancelled.
    pub fn cancel(&mut self) {
        self.transition(WindowState::Cancelled);
    }

    /// Report entry for a failed window.
    #[must_use]
    pub fn into_failure(self) -> Option<WindowFailure> {
        match (self.state, self.last_error) {
            (WindowState::Failed, Some(error)) => Some(WindowFailure {
                window: self.window,
                attempts: self.attempts,
                error,
            }),
            _ => None,
        }
    }
}
