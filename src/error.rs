//! Custom error types for paperscout.
//!
//! This module defines all error types used throughout the engine.
//! All fallible functions return `Result<T, DiscoveryError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for paperscout operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload parsing error (malformed JSON structure, bad fields)
    #[error("Parse error: {0}")]
    Parse(String),

    /// XML parsing error from provider feeds
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from API
        code: i32,
        /// Error message from API
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Embedding or cross-encoder model error
    #[error("Model error: {0}")]
    Model(String),
}

/// Result type alias using `DiscoveryError`
pub type Result<T> = std::result::Result<T, DiscoveryError>;
