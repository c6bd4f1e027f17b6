use thiserror::Error;

/// Rejected generator or simulation parameters.
///
/// Raised synchronously at the boundary; a config that fails validation is
/// never partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must not be negative (got {value})")]
    NegativeDimension { field: &'static str, value: i64 },

    #[error("{rows}x{columns} matrix exceeds the limit of {limit} cells")]
    TooManyCells {
        rows: usize,
        columns: usize,
        limit: usize,
    },

    #[error("active cell count {count} exceeds the {cells} available cells")]
    CountExceedsCells { count: usize, cells: usize },

    #[error("active fraction must lie in [0, 1] (got {0})")]
    FractionOutOfRange(f64),

    #[error("empty activation range: min {min} > max {max}")]
    EmptyRange { min: usize, max: usize },

    #[error("{key} must be a positive number of milliseconds")]
    NonPositiveDuration { key: &'static str },

    #[error("invalid value for {key}: expected {expected}")]
    InvalidValue { key: String, expected: &'static str },
}
