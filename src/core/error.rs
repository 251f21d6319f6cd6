#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("breakeven undefined: interest rate {interest_rate} must exceed {reference_rate}")]
    DivisionByZero {
        interest_rate: f64,
        reference_rate: f64,
    },

    #[error("sweep `{sweep}` produced no selectable candidate")]
    EmptySweepResult { sweep: &'static str },

    #[error("invalid parameter {field}: {message}")]
    InvalidParameter {
        field: &'static str,
        message: String,
    },

    #[error("sweep grids do not line up at index {index}: expected rate {expected}, got {actual}")]
    GridMismatch {
        index: usize,
        expected: f64,
        actual: f64,
    },
}

impl SimError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            field,
            message: message.into(),
        }
    }
}
