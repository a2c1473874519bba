//! Error Module - gcsim Error Types
//!
//! Every failure in the engine is either a configuration mistake or an
//! accounting bug. Nothing here is transient, so nothing is retried.
//!
//! # Error Categories
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid resolved configuration
//! - `Parse` - Malformed configuration text
//! - `UnsupportedPhaseCount` - More than one phase requested
//!
//! ## Invariant Errors
//! - `InvariantViolation` - Live-size or alloc/free accounting mismatch
//! - `ApproximationFailed` - Partitioned totals or live bytes after init drifted beyond tolerance
//!
//! ## Runtime Errors
//! - `WorkerPanicked` - A worker thread panicked before reporting
//! - `Io` - Reading a configuration file failed

use thiserror::Error;

/// Main error type for all gcsim operations
///
/// # Examples
///
/// ```rust
/// use gcsim::error::SimError;
///
/// fn describe(err: &SimError) -> &'static str {
///     match err {
///         SimError::Parse { .. } => "bad config file",
///         SimError::InvariantViolation(_) => "accounting bug",
///         _ => "other",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration error
    ///
    /// **When returned:** A resolved configuration breaks a rule, e.g. a
    /// zero-weight bucket, a pin interval without a survival interval, or a
    /// missing allocation budget.
    ///
    /// **Recovery strategy:** Fix the configuration. Raised before any
    /// allocation begins.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration text could not be parsed
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The engine runs exactly one phase
    #[error("Unsupported phase count: {0} phases configured, exactly 1 is supported")]
    UnsupportedPhaseCount(usize),

    /// Invariant violation - indicates a bug in byte or object accounting
    ///
    /// **Recovery strategy:** Cannot recover. The run's measurements are
    /// meaningless once accounting is wrong.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Two quantities expected to be about equal are not
    #[error("Approximation failed for {what}: expected about {expected}, got {actual}")]
    ApproximationFailed {
        what: String,
        expected: u64,
        actual: u64,
    },

    /// A worker thread panicked
    #[error("Worker thread {index} panicked: {message}")]
    WorkerPanicked { index: usize, message: String },

    /// IO error while loading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Check if this error indicates a bug in the engine rather than in the
    /// configuration it was given
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            SimError::InvariantViolation(_)
                | SimError::ApproximationFailed { .. }
                | SimError::WorkerPanicked { .. }
        )
    }

    /// Shorthand for a parse error on a given line
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        SimError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for gcsim operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Ensure condition is true, otherwise return a configuration error
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::SimError::Configuration(format!($($arg)*)));
        }
    };
}

/// Assert that two byte totals are within `tolerance` (a fraction) of each other
///
/// Integer division when partitioning budgets across threads and buckets
/// cannot be exact, so this is the comparison used wherever a requested
/// total is checked against what was actually produced.
pub fn assert_about_equal(what: &str, expected: u64, actual: u64, tolerance: f64) -> Result<()> {
    let diff = expected.abs_diff(actual) as f64;
    if diff <= expected as f64 * tolerance {
        Ok(())
    } else {
        Err(SimError::ApproximationFailed {
            what: what.to_string(),
            expected,
            actual,
        })
    }
}
