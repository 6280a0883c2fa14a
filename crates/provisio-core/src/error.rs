//! Reconciler error types
//!
//! One taxonomy shared by both domains. Remote diagnostics are carried
//! verbatim; nothing here is retried automatically.

use thiserror::Error;

/// Error that can occur while reconciling external state.
#[derive(Debug, Error)]
pub enum ReconcileError {
    // Local input errors
    /// Bundle name is not present in the bundle table.
    #[error("unknown role bundle: {name}")]
    UnknownBundle { name: String },

    /// Principal kind or email could not be parsed.
    #[error("invalid principal '{input}': {reason}")]
    InvalidPrincipal { input: String, reason: String },

    /// Other locally validated input (CIDR literal, prefix length, label).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration is incomplete or inconsistent.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    // Optimistic concurrency
    /// The fetched policy carried no concurrency token.
    #[error("policy for {resource} was fetched without a concurrency token; refusing to mutate")]
    MissingToken { resource: String },

    /// The concurrency token changed between fetch and write.
    #[error("policy for {resource} changed since it was read (expected etag {expected}, found {observed})")]
    Conflict {
        resource: String,
        expected: String,
        observed: String,
    },

    // Address reservations
    /// More than one reservation matched an exact lookup.
    #[error("{count} reservations match view={view} network={network} label={label}; refusing to pick one")]
    Ambiguous {
        view: String,
        network: String,
        label: String,
        count: usize,
    },

    /// Target object is absent.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The parent block has no free child of the requested size.
    #[error("no free /{prefix_length} block left in {parent} (view {view})")]
    NoCapacity {
        view: String,
        parent: String,
        prefix_length: u8,
    },

    /// The store refused a create because the object already exists.
    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    // Remote failures
    /// Transport, authentication or server-side failure.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote answered with data that does not fit the expected shape.
    #[error("malformed response: {message}\n--- raw response ---\n{raw}")]
    MalformedResponse { message: String, raw: String },
}

impl ReconcileError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::UnknownBundle { .. } => "UNKNOWN_BUNDLE",
            ReconcileError::InvalidPrincipal { .. } => "INVALID_PRINCIPAL",
            ReconcileError::InvalidInput { .. } => "INVALID_INPUT",
            ReconcileError::Configuration { .. } => "INVALID_CONFIG",
            ReconcileError::MissingToken { .. } => "MISSING_TOKEN",
            ReconcileError::Conflict { .. } => "CONFLICT",
            ReconcileError::Ambiguous { .. } => "AMBIGUOUS",
            ReconcileError::NotFound { .. } => "NOT_FOUND",
            ReconcileError::NoCapacity { .. } => "NO_CAPACITY",
            ReconcileError::AlreadyExists { .. } => "ALREADY_EXISTS",
            ReconcileError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            ReconcileError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
        }
    }

    /// Check if this error needs an operator decision before re-running.
    ///
    /// None of these are retried; silent overwrite or silent pick-first
    /// would violate the safety contract.
    pub fn is_operator_actionable(&self) -> bool {
        matches!(
            self,
            ReconcileError::Conflict { .. }
                | ReconcileError::Ambiguous { .. }
                | ReconcileError::MissingToken { .. }
                | ReconcileError::AlreadyExists { .. }
                | ReconcileError::NoCapacity { .. }
        )
    }

    /// Check if this error was caused by local input rather than remote state.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::UnknownBundle { .. }
                | ReconcileError::InvalidPrincipal { .. }
                | ReconcileError::InvalidInput { .. }
        )
    }

    // Convenience constructors

    /// Create a store unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ReconcileError::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a store unavailable error with source.
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ReconcileError::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed response error keeping the raw payload.
    pub fn malformed(message: impl Into<String>, raw: impl Into<String>) -> Self {
        ReconcileError::MalformedResponse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ReconcileError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        ReconcileError::NotFound { what: what.into() }
    }
}

/// Result type for reconciler operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_actionable_errors() {
        let actionable = vec![
            ReconcileError::Conflict {
                resource: "projects/p".to_string(),
                expected: "T1".to_string(),
                observed: "T2".to_string(),
            },
            ReconcileError::Ambiguous {
                view: "prod".to_string(),
                network: "10.0.1.0/26".to_string(),
                label: "team-x".to_string(),
                count: 2,
            },
            ReconcileError::MissingToken {
                resource: "projects/p".to_string(),
            },
            ReconcileError::NoCapacity {
                view: "prod".to_string(),
                parent: "10.0.0.0/16".to_string(),
                prefix_length: 26,
            },
        ];

        for err in actionable {
            assert!(
                err.is_operator_actionable(),
                "Expected {} to be operator actionable",
                err.error_code()
            );
            assert!(!err.is_input_error());
        }
    }

    #[test]
    fn test_remote_failures_are_not_actionable() {
        let err = ReconcileError::unavailable("HTTP 503: backend down");
        assert!(!err.is_operator_actionable());
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_malformed_response_keeps_raw_text() {
        let err = ReconcileError::malformed("expected a JSON object", "<html>proxy error</html>");
        let rendered = err.to_string();
        assert!(rendered.contains("expected a JSON object"));
        assert!(rendered.contains("<html>proxy error</html>"));
    }

    #[test]
    fn test_error_display() {
        let err = ReconcileError::NoCapacity {
            view: "prod".to_string(),
            parent: "10.0.0.0/16".to_string(),
            prefix_length: 26,
        };
        assert_eq!(
            err.to_string(),
            "no free /26 block left in 10.0.0.0/16 (view prod)"
        );

        let err = ReconcileError::UnknownBundle {
            name: "no-such-bundle".to_string(),
        };
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "unknown role bundle: no-such-bundle");
    }
}
