use crate::action::UnwrapError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application errors with user-facing descriptions.
///
/// Any of these can be handed to
/// [`LoadingManager::show_failure`](crate::state::LoadingManager::show_failure); the `Display`
/// text is what a failure renderer shows.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Unwrap(#[from] UnwrapError),

    #[error("{}", .0.as_deref().unwrap_or("An unknown error occurred."))]
    Custom(Option<String>),

    #[error("{0}")]
    General(#[source] BoxError),
}

/// Errors related to resource availability or access.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("The requested resource is not available.")]
    NotAvailable,

    #[error("{0}")]
    Other(#[source] BoxError),
}

/// Errors related to network operations.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("The network is inaccessible. Please check your internet connection.")]
    Inaccessible,

    #[error("No response was received from the server.")]
    NoResponse,

    #[error("Invalid response type received: {0}")]
    InvalidResponseType(String),

    #[error("The server returned an empty response for status code {status}.")]
    NoResponseData { status: u16 },

    #[error("Endpoint error with status code {status}.")]
    Endpoint { status: u16, body: Option<Vec<u8>> },

    #[error("{}", .description.as_deref().unwrap_or("A custom network error occurred."))]
    Custom {
        code: Option<i32>,
        description: Option<String>,
    },

    #[error("{0}")]
    Other(#[source] BoxError),
}

impl AppError {
    pub fn custom(description: impl Into<String>) -> Self {
        Self::Custom(Some(description.into()))
    }

    pub fn general<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::General(Box::new(error))
    }
}
