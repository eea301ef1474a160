use thiserror::Error;

/// Errors returned by the backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP 401.
    #[error("Unauthorized")]
    Unauthorized,

    /// HTTP 404.
    #[error("Not found")]
    NotFound,

    /// The body was not the JSON we expected.
    #[error("Invalid response body: {0}")]
    Parse(#[from] serde_json::Error),

    /// A mutating call was attempted without a bearer token.
    #[error("No authentication token available")]
    MissingToken,

    /// Rejected before dispatch.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound,
            code => ApiError::Status {
                status: code,
                message: extract_message(&body).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                }),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::MissingToken)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized | ApiError::MissingToken => {
                "Authentication error: please log in again".to_string()
            }
            ApiError::Transport(_) => "Could not reach the server. Check your connection.".to_string(),
            ApiError::Parse(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Backend error bodies look like `{"message": "..."}` or `{"error": "..."}`.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .filter(|m| !m.is_empty())
}
