//! Channel data transforms.
pub mod fft;
pub mod processor;
