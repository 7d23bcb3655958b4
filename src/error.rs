use thiserror::Error;

/// Failures raised while ingesting a price history or classifying it.
///
/// Classifiers never hand these to the caller directly: they are carried in
/// [`crate::regime::ClassifierOutcome::Fallback`] next to the neutral labels.
/// Only structural input problems surface from the aggregator.
#[derive(Error, Debug)]
pub enum RegimeError {
    #[error("Series is empty")]
    EmptySeries,

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Timestamps must be strictly increasing (violated at row {0})")]
    NonMonotonicTimestamps(usize),

    #[error("Non-finite value in column '{column}' at row {index}")]
    NonFinite { column: String, index: usize },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Classifier worker '{0}' panicked")]
    WorkerPanicked(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RegimeError::NonFinite {
            column: "close".to_string(),
            index: 7,
        };
        assert_eq!(err.to_string(), "Non-finite value in column 'close' at row 7");

        let err = RegimeError::ColumnLength {
            column: "adx".to_string(),
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.to_string(), "Column 'adx' has 9 rows, expected 10");
    }
}
