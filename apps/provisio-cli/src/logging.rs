//! Log level selection and subscriber setup
//!
//! Diagnostics go to stderr through `tracing`. Reports are printed to
//! stdout by the commands, so the two channels never mix.

use std::fmt;
use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &[
    "provisio_core",
    "provisio_connector_gcp",
    "provisio_connector_infoblox",
    "provisio_cli",
];

/// Verbosity level for diagnostics
///
/// Levels are ordered: Quiet < Normal < Verbose < Debug < Trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Errors only
    Quiet,
    /// Warnings and errors (default)
    #[default]
    Normal,
    /// Phase progress from provisio crates
    Verbose,
    /// Request and response summaries
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Create LogLevel from CLI flags
    ///
    /// `-q` wins over any number of `-v`.
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        let crate_level = match self {
            Self::Quiet => return "error".to_string(),
            Self::Normal => return "warn".to_string(),
            Self::Verbose => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        let mut directive = "warn".to_string();
        for name in CRATES {
            directive.push_str(&format!(",{name}={crate_level}"));
        }
        directive
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Quiet => "QUIET",
            Self::Normal => "NORMAL",
            Self::Verbose => "VERBOSE",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over flags.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.directive()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(level >= LogLevel::Debug)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_flags() {
        assert_eq!(LogLevel::from_flags(0, false), LogLevel::Normal);
        assert_eq!(LogLevel::from_flags(1, false), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(2, false), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(7, false), LogLevel::Trace);
    }

    #[test]
    fn test_quiet_takes_precedence() {
        assert_eq!(LogLevel::from_flags(3, true), LogLevel::Quiet);
    }

    #[test]
    fn test_directive() {
        assert_eq!(LogLevel::Normal.directive(), "warn");
        assert_eq!(LogLevel::Quiet.directive(), "error");

        let verbose = LogLevel::Verbose.directive();
        assert!(verbose.starts_with("warn,"));
        assert!(verbose.contains("provisio_core=info"));
        assert!(verbose.contains("provisio_connector_infoblox=info"));
        assert!(EnvFilter::try_new(&verbose).is_ok());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Quiet < LogLevel::Normal);
        assert!(LogLevel::Verbose < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }
}
