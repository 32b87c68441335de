// Unloader - loading / success / failure presentation state
//
// This is the library crate: the state type, per-operation managers with auto-hide, the global
// aggregator, the retry/fallback Action combinator and the renderer contract.
// The binary crate (main.rs) is a terminal demo.

pub mod action;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use action::{Action, ActionError, ActionResult, ActionValue};
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppError, LoadableState, LoadingManagerSettings, StateKind, UnloaderConfig};
pub use state::{GlobalStateAggregator, LoadingManager, StateChange, Subscription};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
