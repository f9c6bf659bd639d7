//! Errors from the chat transport.

use thiserror::Error;

/// Errors that can occur while sending a chat completion.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key; the user has not connected yet.
    #[error("Not connected: no OpenRouter API key is stored")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    /// API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An error object arrived inside the stream.
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("Request timed out".to_string())
        } else if err.is_connect() {
            Self::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Api {
            status: 401,
            message: "No auth credentials found".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): No auth credentials found");

        let err = ChatError::Stream("overloaded".to_string());
        assert_eq!(err.to_string(), "Stream error: overloaded");
    }

    #[test]
    fn test_chat_error_from_reqwest() {
        fn assert_from<T: From<reqwest::Error>>() {}
        assert_from::<ChatError>();
    }
}
