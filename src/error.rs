//! Error types for the matchmaking engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Engine operations return [`Result`] and callers
//! that need to branch on a specific failure downcast to [`MatchmakingError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Validation failed: {reason}")]
    ValidationError { reason: String },

    #[error("Rank group not found: {name}")]
    GroupNotFound { name: String },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Participant already waiting: {participant}")]
    AlreadyWaiting { participant: String },

    #[error("Participant already in match {match_id}: {participant}")]
    AlreadyInMatch {
        participant: String,
        match_id: String,
    },

    #[error("Participant is not waiting: {participant}")]
    NotWaiting { participant: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Internal engine error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Shorthand for building a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Shorthand for building a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationError {
            reason: reason.into(),
        }
    }
}

/// Extract the typed matchmaking error from an anyhow error, if there is one
pub fn matchmaking_error(err: &anyhow::Error) -> Option<&MatchmakingError> {
    err.downcast_ref::<MatchmakingError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_round_trip() {
        let err: anyhow::Error = MatchmakingError::MatchNotFound {
            match_id: "match_abc".to_string(),
        }
        .into();

        assert_eq!(
            matchmaking_error(&err),
            Some(&MatchmakingError::MatchNotFound {
                match_id: "match_abc".to_string()
            })
        );
        assert_eq!(err.to_string(), "Match not found: match_abc");
    }

    #[test]
    fn test_foreign_errors_do_not_downcast() {
        let err = anyhow::anyhow!("plain failure");
        assert!(matchmaking_error(&err).is_none());
    }
}
