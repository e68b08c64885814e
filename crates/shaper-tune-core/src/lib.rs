//! Resonance analysis and input shaper selection.
//!
//! Accelerometer captures are turned into per-axis power spectral densities,
//! every enabled shaper family is swept over its frequency range against
//! them, and the family with the best vibration/smoothing trade-off is
//! recommended.

pub mod calibration_data;
pub mod error;
pub mod interp;
pub mod matrix;
pub mod report;
pub mod selector;
pub mod shapers;
pub mod spectrum;
pub mod vibration;

pub use calibration_data::{Axis, CalibrationData, process_accelerometer_data};
pub use error::{CalibrateError, Result};
pub use matrix::{Matrix, MatrixView};
pub use selector::{
    CalibrateOptions, CalibrationResult, CalibrationResults, find_best_shaper, fit_shaper,
};
pub use shapers::{Shaper, ShaperKind};
