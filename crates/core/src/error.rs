//! Error types for the geoagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what a run
//! terminates with.

use thiserror::Error;

/// The top-level error type for all geoagent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool catalog unavailable: {0}")]
    ToolList(String),

    // --- Run limits ---
    #[error("Maximum tool call limit ({limit}) reached. Please try rephrasing your request.")]
    RoundLimitExceeded { limit: u32 },

    // --- Persistence ---
    #[error("Message {message_id} has invalid content structure - {reason}")]
    MalformedHistory { message_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    /// Missing or invalid settings, detected while wiring a service.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("{reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{0}")]
    CatalogUnavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_limit_message_names_the_limit() {
        let err = Error::RoundLimitExceeded { limit: 10 };
        assert_eq!(
            err.to_string(),
            "Maximum tool call limit (10) reached. Please try rephrasing your request."
        );
    }

    #[test]
    fn malformed_history_names_the_message() {
        let err = Error::MalformedHistory {
            message_id: "m-1".into(),
            reason: "expected { text: string }".into(),
        };
        assert_eq!(
            err.to_string(),
            "Message m-1 has invalid content structure - expected { text: string }"
        );
    }

    #[test]
    fn tool_execution_failure_displays_reason_only() {
        let err = ToolError::ExecutionFailed {
            tool_name: "geocode_address".into(),
            reason: "Failed to call tool: 500 - boom".into(),
        };
        assert_eq!(err.to_string(), "Failed to call tool: 500 - boom");
    }

    #[test]
    fn configuration_error_keeps_the_cause() {
        let err = Error::Config {
            message: "ANTHROPIC_API_KEY environment variable is required".into(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: ANTHROPIC_API_KEY environment variable is required"
        );
    }

    #[test]
    fn provider_error_converts_into_top_level() {
        let err: Error = ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        }
        .into();
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }
}
