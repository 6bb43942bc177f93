//! Error types for the hosting API clients

use mirror_core::ProviderError;
use thiserror::Error;

/// Errors raised while talking to a hosting API
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request could not be sent or the connection failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// The host answered with a status the call does not accept
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field the client relies on is absent from the response
    #[error("response has no `{0}` field")]
    MissingField(&'static str),

    /// GraphQL answered 200 with an error list
    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    /// A required environment variable is unset or empty
    #[error("environment variable {0} is not set")]
    MissingVar(String),

    /// An endpoint URL could not be built
    #[error("invalid URL: {0}")]
    Url(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry an access token in the query string.
        let err = err.without_url();
        if err.is_decode() {
            return ApiError::Http(format!("decode response: {err}"));
        }
        ApiError::Http(err.to_string())
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(msg) => ProviderError::Network(msg),
            ApiError::Status { status, body } => ProviderError::Api {
                status,
                message: body,
            },
            ApiError::Json(e) => ProviderError::InvalidResponse(e.to_string()),
            e @ (ApiError::MissingField(_) | ApiError::GraphQl(_)) => {
                ProviderError::InvalidResponse(e.to_string())
            }
            e @ (ApiError::MissingVar(_) | ApiError::Url(_)) => {
                ProviderError::Config(e.to_string())
            }
        }
    }
}

/// Result type for API client calls
pub type Result<T> = std::result::Result<T, ApiError>;
