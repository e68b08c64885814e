pub mod calibrate;
pub mod psd;
