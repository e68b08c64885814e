use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrateError {
    #[error("raw samples need at least {required} columns (time, x, y, z), got {actual}")]
    TooFewColumns { required: usize, actual: usize },

    #[error("row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("cannot merge calibration data with {actual} bins into {expected} bins")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unknown shaper '{0}'")]
    UnknownShaper(String),

    #[error("unknown axis '{0}'")]
    UnknownAxis(String),

    #[error("calibration data is empty")]
    EmptyCalibrationData,

    #[error("no shapers enabled for auto-tuning")]
    NoShapers,

    #[error("failed to write report")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CalibrateError>;
