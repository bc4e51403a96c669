//! Error handling for the weapon alert client

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP client error (connect, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-2xx response from the detection backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Platform capability unavailable or failed (audio, notification, frame grab)
    #[error("Capability error: {0}")]
    Capability(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 401,
            message: "Token is missing".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): Token is missing");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            Error::Config("bad".into()).to_string(),
            "Config error: bad"
        );
    }
}
