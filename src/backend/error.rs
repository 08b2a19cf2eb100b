//! Backend error type shared by the auth, REST, and RPC surfaces.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// A required environment variable is not set.
    #[error("missing config: env var {var} not set")]
    MissingEnv { var: String },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The HTTP request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The operation needs a signed-in session.
    #[error("not signed in")]
    NotSignedIn,
}

impl BackendError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingEnv { .. } => "E_MISSING_ENV",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_REQUEST",
            Self::Api { .. } => "E_API",
            Self::Parse(_) => "E_PARSE",
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
        }
    }

    /// Transport failures and throttling/server errors may succeed on retry.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Api { status: 429 | 500..=599, .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}
