//! Data models shared by the state machine, the action combinator and the presentation layer.
//!
//! - [`LoadableState`]: The four-variant presentation state (`None`, `Loading`, `Success`,
//!   `Failure`) owned by [`LoadingManager`](crate::state::LoadingManager)
//! - [`LoadingManagerSettings`]: Immutable manager behaviour (auto-hide delay)
//! - [`UnloaderConfig`]: Everything loaded from `Unloader.yaml`
//! - [`AppError`]: Application errors with user-facing descriptions

pub mod config;
pub mod error;
pub mod loadable;

pub use config::{
    DEFAULT_AUTO_HIDE_DELAY, DebugOptions, LoadingManagerSettings, LoggingConfig, ManagerConfig,
    UnloaderConfig,
};
pub use error::{AppError, NetworkError, ResourceError};
pub use loadable::{LoadableState, SharedError, StateKind};
