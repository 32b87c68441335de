use crate::action::Action;
use std::fmt;
use std::sync::Arc;

/// Shared, cheaply cloneable domain error carried by [`LoadableState::Failure`].
///
/// The core never inspects it beyond its `Display` description, which renderers show
/// as-is.
pub type SharedError = Arc<anyhow::Error>;

/// The four presentation states of one asynchronous operation.
///
/// # Equality
///
/// Equality is structural, with one exception: two [`Failure`](Self::Failure) states are equal
/// only when they carry the *same* error instance and the same retry action. Two different
/// errors with identical descriptions are distinct, so re-reporting a failure always notifies
/// observers.
///
/// # Related Types
///
/// - [`crate::state::LoadingManager`]: Owns one `LoadableState` and publishes its changes
/// - [`crate::state::GlobalStateAggregator`]: Merges several managers into one state
/// - [`StateKind`]: Payload-free discriminant used for settings lookup
#[derive(Clone, Debug, Default)]
pub enum LoadableState {
    /// Idle, nothing to show
    #[default]
    None,

    /// Operation in flight
    Loading,

    /// Operation finished; the message is the rendered text of the caller's value
    Success(String),

    /// Operation failed
    Failure {
        error: SharedError,
        on_retry: Option<Action>,
    },
}

/// Payload-free discriminant of [`LoadableState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    None,
    Loading,
    Success,
    Failure,
}

impl LoadableState {
    /// Build a success state from anything that renders as text.
    pub fn success(message: impl fmt::Display) -> Self {
        Self::Success(message.to_string())
    }

    /// Build a failure state, optionally wired to a retry action.
    pub fn failure(error: impl Into<anyhow::Error>, on_retry: Option<Action>) -> Self {
        Self::Failure {
            error: Arc::new(error.into()),
            on_retry,
        }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            Self::None => StateKind::None,
            Self::Loading => StateKind::Loading,
            Self::Success(_) => StateKind::Success,
            Self::Failure { .. } => StateKind::Failure,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Success message, if this is a success state.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(message) => Some(message),
            _ => None,
        }
    }

    /// Human-readable error description, if this is a failure state.
    pub fn error_description(&self) -> Option<String> {
        match self {
            Self::Failure { error, .. } => Some(error.to_string()),
            _ => None,
        }
    }

    /// Retry action attached to a failure state.
    pub fn retry_action(&self) -> Option<&Action> {
        match self {
            Self::Failure { on_retry, .. } => on_retry.as_ref(),
            _ => None,
        }
    }
}

impl PartialEq for LoadableState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::Loading, Self::Loading) => true,
            (Self::Success(lhs), Self::Success(rhs)) => lhs == rhs,
            (
                Self::Failure {
                    error: lhs_error,
                    on_retry: lhs_retry,
                },
                Self::Failure {
                    error: rhs_error,
                    on_retry: rhs_retry,
                },
            ) => {
                Arc::ptr_eq(lhs_error, rhs_error)
                    && lhs_retry.as_ref().map(Action::id) == rhs_retry.as_ref().map(Action::id)
            }
            _ => false,
        }
    }
}

impl fmt::Display for LoadableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Loading => write!(f, "Loading"),
            Self::Success(message) => write!(f, "Success: `{}`", message),
            Self::Failure { error, .. } => write!(f, "Error: `{}`", error),
        }
    }
}
