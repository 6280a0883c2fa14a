//! CLI error types and exit codes

use provisio_core::error::ReconcileError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success (including a no-op or nothing to delete)
/// - 1: Configuration or I/O error
/// - 3: Store unavailable
/// - 4: Invalid input
/// - 5: Malformed response from a store
/// - 6: Remote state needs an operator decision
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Reconcile(e) => match e {
                ReconcileError::Configuration { .. } => 1,
                ReconcileError::StoreUnavailable { .. } => 3,
                ReconcileError::MalformedResponse { .. } => 5,
                e if e.is_input_error() => 4,
                _ => 6,
            },
            CliError::Config(_) | CliError::Io(_) => 1,
            CliError::Validation(_) => 4,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    pub fn suggestion(&self) -> Option<&'static str> {
        let CliError::Reconcile(e) = self else {
            return match self {
                CliError::Config(_) => Some("Check --config, PROVISIO_CONFIG and the environment overrides."),
                _ => None,
            };
        };
        match e {
            ReconcileError::UnknownBundle { .. } => {
                Some("Run 'provisio bundles list' to see the available bundles.")
            }
            ReconcileError::Conflict { .. } => {
                Some("The policy changed underneath this run. Re-run to recompute against the current policy.")
            }
            ReconcileError::MissingToken { .. } => {
                Some("The store returned no etag; check the backend and the caller's permissions.")
            }
            ReconcileError::Ambiguous { .. } => {
                Some("Remove the duplicate reservations by hand, then re-run.")
            }
            ReconcileError::NoCapacity { .. } => {
                Some("Pick a larger supernet or a longer prefix length.")
            }
            ReconcileError::AlreadyExists { .. } => {
                Some("Another reservation took the proposed block first. Re-run to get a fresh proposal.")
            }
            ReconcileError::Configuration { .. } => {
                Some("Check --config, PROVISIO_CONFIG and the environment overrides.")
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(format!("JSON error: {}", e))
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(e: serde_yaml::Error) -> Self {
        CliError::Config(format!("YAML error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_input_errors() {
        let err: CliError = ReconcileError::UnknownBundle {
            name: "nope".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(CliError::Validation("x".to_string()).exit_code(), 4);
    }

    #[test]
    fn test_exit_code_store_unavailable() {
        let err: CliError = ReconcileError::unavailable("HTTP 503").into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_malformed() {
        let err: CliError = ReconcileError::malformed("bad json", "<html>").into();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_exit_code_operator_actionable() {
        let conflict: CliError = ReconcileError::Conflict {
            resource: "projects/p".to_string(),
            expected: "T1".to_string(),
            observed: "T2".to_string(),
        }
        .into();
        assert_eq!(conflict.exit_code(), 6);

        let missing: CliError = ReconcileError::not_found("project p").into();
        assert_eq!(missing.exit_code(), 6);
    }

    #[test]
    fn test_exit_code_configuration() {
        let err: CliError = ReconcileError::Configuration {
            message: "no token".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(CliError::Io("disk full".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_display_is_transparent() {
        let err: CliError = ReconcileError::unavailable("HTTP 502:\nupstream reset").into();
        assert!(err.to_string().contains("upstream reset"));
    }

    #[test]
    fn test_suggestion_for_unknown_bundle() {
        let err: CliError = ReconcileError::UnknownBundle {
            name: "nope".to_string(),
        }
        .into();
        assert!(err.suggestion().unwrap().contains("bundles list"));
    }
}
