// Presentation settings
//
// Text-level settings for each visible state, resolved by an exhaustive match over StateKind.
// A provider overrides whatever it customizes; everything else falls back to the defaults.

use crate::action::Action;
use crate::models::{LoadableState, LoadingManagerSettings, StateKind};
use crate::state::LoadingManager;

pub const DEFAULT_LOADING_TEXT: &str = "Loading...";
pub const DEFAULT_SUCCESS_TEXT: &str = "Success!";
pub const DEFAULT_ERROR_TEXT: &str = "An error has occurred!";
pub const DEFAULT_CLOSE_TEXT: &str = "Close";
pub const DEFAULT_RETRY_TEXT: &str = "Retry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingPresentation {
    pub text: String,
    /// Maximum rendered lines; `None` is unlimited
    pub line_limit: Option<usize>,
}

impl Default for LoadingPresentation {
    fn default() -> Self {
        Self {
            text: DEFAULT_LOADING_TEXT.to_string(),
            line_limit: Some(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessPresentation {
    /// Headline shown above the success message; `None` shows the message alone
    pub text: Option<String>,
}

impl Default for SuccessPresentation {
    fn default() -> Self {
        Self {
            text: Some(DEFAULT_SUCCESS_TEXT.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePresentation {
    /// Headline shown above the error description
    pub error_text: Option<String>,
    pub close_button: String,
    pub retry_button: String,
}

impl Default for FailurePresentation {
    fn default() -> Self {
        Self {
            error_text: Some(DEFAULT_ERROR_TEXT.to_string()),
            close_button: DEFAULT_CLOSE_TEXT.to_string(),
            retry_button: DEFAULT_RETRY_TEXT.to_string(),
        }
    }
}

/// Settings for one state kind; `Hidden` means nothing is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationSettings {
    Hidden,
    Loading(LoadingPresentation),
    Success(SuccessPresentation),
    Failure(FailurePresentation),
}

/// Source of presentation settings for a surface
///
/// Every method has a default, so an implementation overrides only what it customizes and a
/// lookup can never miss.
pub trait PresentationProvider: Send + Sync {
    fn loading_manager_settings(&self) -> LoadingManagerSettings {
        LoadingManagerSettings::default()
    }

    fn loading(&self) -> LoadingPresentation {
        LoadingPresentation::default()
    }

    fn success(&self) -> SuccessPresentation {
        SuccessPresentation::default()
    }

    fn failure(&self) -> FailurePresentation {
        FailurePresentation::default()
    }

    fn settings_for(&self, kind: StateKind) -> PresentationSettings {
        match kind {
            StateKind::None => PresentationSettings::Hidden,
            StateKind::Loading => PresentationSettings::Loading(self.loading()),
            StateKind::Success => PresentationSettings::Success(self.success()),
            StateKind::Failure => PresentationSettings::Failure(self.failure()),
        }
    }

    /// One-line text rendition of `state`, or `None` when it is hidden
    fn describe(&self, state: &LoadableState) -> Option<String> {
        let text = match (self.settings_for(state.kind()), state) {
            (PresentationSettings::Hidden, _) => return None,
            (PresentationSettings::Loading(settings), _) => settings.text,
            (PresentationSettings::Success(settings), LoadableState::Success(message)) => {
                match settings.text {
                    Some(headline) => format!("{} {}", headline, message),
                    None => message.clone(),
                }
            }
            (PresentationSettings::Failure(settings), LoadableState::Failure { error, on_retry }) => {
                let mut text = match settings.error_text {
                    Some(headline) => format!("{} {}", headline, error),
                    None => error.to_string(),
                };
                if on_retry.is_some() {
                    text.push_str(&format!(" [{}]", settings.retry_button));
                }
                text.push_str(&format!(" [{}]", settings.close_button));
                text
            }
            // Settings always follow the state's own kind
            _ => state.to_string(),
        };
        Some(text)
    }
}

/// Provider with every setting at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPresentation;

impl PresentationProvider for DefaultPresentation {}

/// Action wired to a failure view's Close button: hides `manager`.
///
/// Holds the manager weakly, so it may be stored in the manager's own state.
pub fn close_action(manager: &LoadingManager) -> Action {
    let manager = manager.downgrade();
    Action::from_fn(move || {
        if let Some(manager) = manager.upgrade() {
            manager.hide();
        }
    })
}
